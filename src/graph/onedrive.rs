//! OneDrive file and folder operations

use serde::Deserialize;
use std::path::Path;

use super::{GRAPH_ENDPOINT, bearer_token, expect_success};
use crate::auth::Authenticator;
use crate::error::{LifelogError, Result};

/// A file or folder in OneDrive
#[derive(Debug, Clone, Deserialize)]
pub struct DriveItem {
    /// Item id
    pub id: String,
    /// Item name
    pub name: String,
    /// Size in bytes, when reported
    #[serde(default)]
    pub size: Option<u64>,
    /// Web URL of the item
    #[serde(default, rename = "webUrl")]
    pub web_url: Option<String>,
    /// Folder facet; present only for folders
    #[serde(default)]
    pub folder: Option<serde_json::Value>,
}

impl DriveItem {
    /// Whether this item is a folder
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    value: Vec<DriveItem>,
}

/// OneDrive API client
pub struct OneDriveClient<'a> {
    auth: &'a Authenticator,
    http: reqwest::Client,
    base_url: String,
}

impl<'a> OneDriveClient<'a> {
    /// Create a client against the production Graph endpoint
    #[must_use]
    pub fn new(auth: &'a Authenticator) -> Self {
        Self::with_base_url(auth, GRAPH_ENDPOINT)
    }

    /// Create a client against a custom base URL
    #[must_use]
    pub fn with_base_url(auth: &'a Authenticator, base_url: impl Into<String>) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// List the children of a folder (drive root when `None`)
    ///
    /// # Errors
    ///
    /// Fails with `NotAuthenticated` when no token is available, or an API
    /// error when Graph rejects the request.
    pub async fn list_files(&self, folder: Option<&str>) -> Result<Vec<DriveItem>> {
        let token = bearer_token(self.auth).await?;
        let url = match folder {
            Some(path) => format!(
                "{}/me/drive/root:/{}:/children",
                self.base_url,
                path.trim_start_matches('/')
            ),
            None => format!("{}/me/drive/root/children", self.base_url),
        };
        let response = self.http.get(url).bearer_auth(&token).send().await?;
        let envelope: ListEnvelope = expect_success(response).await?.json().await?;
        Ok(envelope.value)
    }

    /// Create a folder path segment by segment, reusing segments that already
    /// exist. Returns the innermost folder.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` for an empty path, and with the usual auth/API
    /// errors otherwise.
    pub async fn create_folder(&self, folder_path: &str) -> Result<DriveItem> {
        let token = bearer_token(self.auth).await?;

        let mut current = String::new();
        let mut item: Option<DriveItem> = None;

        for part in folder_path
            .trim_start_matches('/')
            .split('/')
            .filter(|p| !p.is_empty())
        {
            let check_url = if current.is_empty() {
                format!("{}/me/drive/root:/{part}", self.base_url)
            } else {
                format!("{}/me/drive/root:/{current}/{part}", self.base_url)
            };
            let response = self.http.get(check_url).bearer_auth(&token).send().await?;
            if response.status().is_success() {
                item = Some(response.json().await?);
                push_segment(&mut current, part);
                continue;
            }

            let create_url = if current.is_empty() {
                format!("{}/me/drive/root/children", self.base_url)
            } else {
                format!("{}/me/drive/root:/{current}:/children", self.base_url)
            };
            let body = serde_json::json!({
                "name": part,
                "folder": {},
                "@microsoft.graph.conflictBehavior": "rename"
            });
            let response = self
                .http
                .post(create_url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;
            item = Some(expect_success(response).await?.json().await?);
            push_segment(&mut current, part);
        }

        item.ok_or_else(|| LifelogError::not_found("empty folder path"))
    }

    /// Upload a local file with the simple single-request upload.
    ///
    /// The target folder is created first when given; the file name defaults
    /// to the local name.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` when the local file does not exist, and with the
    /// usual auth/API errors otherwise.
    pub async fn upload_file(
        &self,
        file_path: &Path,
        target_folder: Option<&str>,
        target_name: Option<&str>,
    ) -> Result<DriveItem> {
        if !file_path.exists() {
            return Err(LifelogError::not_found(format!(
                "file does not exist: {}",
                file_path.display()
            )));
        }

        let name = match target_name {
            Some(name) => name.to_string(),
            None => file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    LifelogError::not_found(format!("no file name in {}", file_path.display()))
                })?,
        };

        let upload_path = match target_folder {
            Some(folder) => {
                let folder = folder.trim_start_matches('/');
                self.create_folder(folder).await?;
                format!("{folder}/{name}")
            }
            None => name.clone(),
        };

        let bytes = tokio::fs::read(file_path).await?;
        let token = bearer_token(self.auth).await?;
        tracing::debug!("uploading {name} ({} bytes)", bytes.len());

        let response = self
            .http
            .put(format!(
                "{}/me/drive/root:/{upload_path}:/content",
                self.base_url
            ))
            .bearer_auth(&token)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    /// Upload several files, collecting per-file outcomes instead of stopping
    /// at the first failure
    pub async fn upload_files(
        &self,
        file_paths: &[std::path::PathBuf],
        target_folder: Option<&str>,
    ) -> Vec<Result<DriveItem>> {
        let mut results = Vec::with_capacity(file_paths.len());
        for path in file_paths {
            let result = self.upload_file(path, target_folder, None).await;
            if let Err(e) = &result {
                tracing::warn!("upload of {} failed: {e}", path.display());
            }
            results.push(result);
        }
        results
    }

    /// Fetch metadata for an item by path
    ///
    /// # Errors
    ///
    /// Same failure modes as [`list_files`](Self::list_files).
    pub async fn get_file_info(&self, file_path: &str) -> Result<DriveItem> {
        let token = bearer_token(self.auth).await?;
        let response = self
            .http
            .get(format!(
                "{}/me/drive/root:/{}",
                self.base_url,
                file_path.trim_start_matches('/')
            ))
            .bearer_auth(&token)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }
}

fn push_segment(current: &mut String, part: &str) {
    if !current.is_empty() {
        current.push('/');
    }
    current.push_str(part);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_segment() {
        let mut path = String::new();
        push_segment(&mut path, "LifeLog");
        assert_eq!(path, "LifeLog");
        push_segment(&mut path, "2026");
        assert_eq!(path, "LifeLog/2026");
    }

    #[test]
    fn test_drive_item_folder_facet() {
        let folder: DriveItem = serde_json::from_str(
            r#"{"id": "1", "name": "LifeLog", "folder": {"childCount": 3}}"#,
        )
        .unwrap();
        assert!(folder.is_folder());

        let file: DriveItem =
            serde_json::from_str(r#"{"id": "2", "name": "notes.txt", "size": 120}"#).unwrap();
        assert!(!file.is_folder());
        assert_eq!(file.size, Some(120));
    }
}
