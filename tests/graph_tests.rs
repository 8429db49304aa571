//! Integration tests for the OneNote/OneDrive clients against a mocked Graph
//! endpoint: bearer-token discipline, request shapes, and error mapping.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use httpmock::prelude::*;
use tempfile::TempDir;

use lifelog::auth::{
    Authenticator, ClientIdentity, ProviderEndpoints, TokenCache, TokenPayload, TokenRecord,
};
use lifelog::error::LifelogError;
use lifelog::graph::onedrive::OneDriveClient;
use lifelog::graph::onenote::{NewPage, OneNoteClient};

fn identity() -> ClientIdentity {
    ClientIdentity {
        client_id: "client-123".to_string(),
        client_secret: "secret-456".to_string(),
        redirect_uri: "http://localhost:8000/callback".to_string(),
        scopes: vec!["Notes.Read".to_string()],
    }
}

/// An authenticator with a fresh cached token, so every Graph call is served
/// silently and the token endpoint is never involved.
fn signed_in_authenticator(tmp: &TempDir, access_token: &str) -> Authenticator {
    let cache_path = tmp.path().join("token_cache.json");
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    TokenCache::with_path(cache_path.clone())
        .save(&TokenRecord {
            payload: TokenPayload {
                access_token: access_token.to_string(),
                refresh_token: None,
                token_type: "Bearer".to_string(),
                expires_in: Some(3600),
                scope: None,
                extra: serde_json::Map::new(),
            },
            expires_at: Some(now + 3600),
        })
        .unwrap();

    Authenticator::builder(identity())
        .cache(TokenCache::with_path(cache_path))
        .auto_open_browser(false)
        .callback_timeout(Duration::from_secs(1))
        .build()
}

fn signed_out_authenticator(tmp: &TempDir) -> Authenticator {
    Authenticator::builder(identity())
        .endpoints(ProviderEndpoints {
            authorize_url: "http://127.0.0.1:1/authorize".to_string(),
            token_url: "http://127.0.0.1:1/token".to_string(),
        })
        .cache(TokenCache::with_path(tmp.path().join("token_cache.json")))
        .auto_open_browser(false)
        .build()
}

#[tokio::test]
async fn onenote_refuses_to_call_out_without_a_token() {
    let server = MockServer::start_async().await;
    let graph_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/me/onenote/notebooks");
            then.status(200).json_body(serde_json::json!({"value": []}));
        })
        .await;

    let tmp = TempDir::new().unwrap();
    let auth = signed_out_authenticator(&tmp);
    let onenote = OneNoteClient::with_base_url(&auth, server.url(""));

    let result = onenote.list_notebooks().await;
    assert!(matches!(result, Err(LifelogError::NotAuthenticated)));
    assert_eq!(graph_mock.hits_async().await, 0);
}

#[tokio::test]
async fn onenote_list_notebooks_attaches_bearer_token() {
    let server = MockServer::start_async().await;
    let graph_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/me/onenote/notebooks")
                .header("authorization", "Bearer tok-1");
            then.status(200).json_body(serde_json::json!({
                "value": [
                    {"id": "nb-1", "displayName": "Journal"},
                    {"id": "nb-2", "displayName": "Work"}
                ]
            }));
        })
        .await;

    let tmp = TempDir::new().unwrap();
    let auth = signed_in_authenticator(&tmp, "tok-1");
    let onenote = OneNoteClient::with_base_url(&auth, server.url(""));

    let notebooks = onenote.list_notebooks().await.unwrap();
    assert_eq!(notebooks.len(), 2);
    assert_eq!(notebooks[0].display_name, "Journal");
    graph_mock.assert_async().await;
}

#[tokio::test]
async fn onenote_create_page_resolves_first_section_and_posts_xhtml() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/me/onenote/notebooks");
            then.status(200).json_body(serde_json::json!({
                "value": [{"id": "nb-1", "displayName": "Journal"}]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/me/onenote/notebooks/nb-1/sections");
            then.status(200).json_body(serde_json::json!({
                "value": [{"id": "sec-1", "displayName": "Daily"}]
            }));
        })
        .await;
    let create_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/me/onenote/sections/sec-1/pages")
                .header("content-type", "application/xhtml+xml")
                .body_includes("<h1>Today</h1>")
                .body_includes("1 &lt; 2<br/>done");
            then.status(201).json_body(serde_json::json!({
                "id": "page-1",
                "title": "Today",
                "links": {"oneNoteWebUrl": {"href": "https://onenote.example/page-1"}}
            }));
        })
        .await;

    let tmp = TempDir::new().unwrap();
    let auth = signed_in_authenticator(&tmp, "tok-1");
    let onenote = OneNoteClient::with_base_url(&auth, server.url(""));

    let page = onenote
        .create_page(&NewPage {
            title: "Today".to_string(),
            content: "1 < 2\ndone".to_string(),
            notebook_id: None,
            section_id: None,
        })
        .await
        .unwrap();

    assert_eq!(page.id, "page-1");
    assert_eq!(
        page.links
            .unwrap()
            .one_note_web_url
            .unwrap()
            .href,
        "https://onenote.example/page-1"
    );
    create_mock.assert_async().await;
}

#[tokio::test]
async fn onenote_api_errors_carry_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/me/onenote/notebooks");
            then.status(403).body("insufficient scopes");
        })
        .await;

    let tmp = TempDir::new().unwrap();
    let auth = signed_in_authenticator(&tmp, "tok-1");
    let onenote = OneNoteClient::with_base_url(&auth, server.url(""));

    match onenote.list_notebooks().await {
        Err(LifelogError::Api { status, message }) => {
            assert_eq!(status, 403);
            assert!(message.contains("insufficient scopes"));
        }
        other => panic!("expected an API error, got {other:?}"),
    }
}

#[tokio::test]
async fn onedrive_lists_folder_children_by_path() {
    let server = MockServer::start_async().await;
    let graph_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/me/drive/root:/LifeLog:/children")
                .header("authorization", "Bearer tok-2");
            then.status(200).json_body(serde_json::json!({
                "value": [
                    {"id": "1", "name": "2026", "folder": {"childCount": 4}},
                    {"id": "2", "name": "notes.txt", "size": 120}
                ]
            }));
        })
        .await;

    let tmp = TempDir::new().unwrap();
    let auth = signed_in_authenticator(&tmp, "tok-2");
    let onedrive = OneDriveClient::with_base_url(&auth, server.url(""));

    let items = onedrive.list_files(Some("/LifeLog")).await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_folder());
    assert!(!items[1].is_folder());
    graph_mock.assert_async().await;
}

#[tokio::test]
async fn onedrive_uploads_file_content() {
    let server = MockServer::start_async().await;
    let upload_mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/me/drive/root:/notes.txt:/content")
                .header("content-type", "application/octet-stream")
                .body("hello drive");
            then.status(201).json_body(serde_json::json!({
                "id": "item-1",
                "name": "notes.txt",
                "size": 11,
                "webUrl": "https://onedrive.example/notes.txt"
            }));
        })
        .await;

    let tmp = TempDir::new().unwrap();
    let local = tmp.path().join("notes.txt");
    std::fs::write(&local, "hello drive").unwrap();

    let auth = signed_in_authenticator(&tmp, "tok-2");
    let onedrive = OneDriveClient::with_base_url(&auth, server.url(""));

    let item = onedrive.upload_file(&local, None, None).await.unwrap();
    assert_eq!(item.name, "notes.txt");
    assert_eq!(item.size, Some(11));
    upload_mock.assert_async().await;
}

#[tokio::test]
async fn onedrive_upload_of_missing_file_fails_locally() {
    let server = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();
    let auth = signed_in_authenticator(&tmp, "tok-2");
    let onedrive = OneDriveClient::with_base_url(&auth, server.url(""));

    let result = onedrive
        .upload_file(&tmp.path().join("missing.txt"), None, None)
        .await;
    assert!(matches!(result, Err(LifelogError::NotFound(_))));
}

#[tokio::test]
async fn onedrive_create_folder_reuses_existing_segments() {
    let server = MockServer::start_async().await;
    // First segment already exists
    server
        .mock_async(|when, then| {
            when.method(GET).path("/me/drive/root:/LifeLog");
            then.status(200).json_body(serde_json::json!({
                "id": "f-1", "name": "LifeLog", "folder": {}
            }));
        })
        .await;
    // Second segment does not
    server
        .mock_async(|when, then| {
            when.method(GET).path("/me/drive/root:/LifeLog/2026");
            then.status(404).body("not found");
        })
        .await;
    let create_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/me/drive/root:/LifeLog:/children")
                .body_includes(r#""name":"2026""#);
            then.status(201).json_body(serde_json::json!({
                "id": "f-2", "name": "2026", "folder": {}
            }));
        })
        .await;

    let tmp = TempDir::new().unwrap();
    let auth = signed_in_authenticator(&tmp, "tok-2");
    let onedrive = OneDriveClient::with_base_url(&auth, server.url(""));

    let folder = onedrive.create_folder("/LifeLog/2026").await.unwrap();
    assert_eq!(folder.name, "2026");
    create_mock.assert_async().await;
}
