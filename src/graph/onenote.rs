//! OneNote notebook, section and page operations

use serde::Deserialize;

use super::{GRAPH_ENDPOINT, bearer_token, expect_success};
use crate::auth::Authenticator;
use crate::error::{LifelogError, Result};

/// A OneNote notebook
#[derive(Debug, Clone, Deserialize)]
pub struct Notebook {
    /// Notebook id
    pub id: String,
    /// Display name
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// A section within a notebook
#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    /// Section id
    pub id: String,
    /// Display name
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// A OneNote page
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    /// Page id
    pub id: String,
    /// Page title
    #[serde(default)]
    pub title: Option<String>,
    /// Links to open the page
    #[serde(default)]
    pub links: Option<PageLinks>,
}

/// Links attached to a page
#[derive(Debug, Clone, Deserialize)]
pub struct PageLinks {
    /// Web URL of the page
    #[serde(rename = "oneNoteWebUrl")]
    pub one_note_web_url: Option<ExternalLink>,
}

/// An href wrapper as Graph returns it
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalLink {
    /// The link target
    pub href: String,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

/// Parameters for creating a page.
///
/// Section resolution: an explicit `section_id` wins; otherwise the first
/// section of the explicit (or first available) notebook is used.
#[derive(Debug, Clone, Default)]
pub struct NewPage {
    /// Page title
    pub title: String,
    /// Plain-text body; rendered to XHTML with newlines preserved
    pub content: String,
    /// Target notebook (ignored when `section_id` is set)
    pub notebook_id: Option<String>,
    /// Target section
    pub section_id: Option<String>,
}

/// OneNote API client
pub struct OneNoteClient<'a> {
    auth: &'a Authenticator,
    http: reqwest::Client,
    base_url: String,
}

impl<'a> OneNoteClient<'a> {
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

    /// List all notebooks
    ///
    /// # Errors
    ///
    /// Fails with `NotAuthenticated` when no token is available, or an API
    /// error when Graph rejects the request.
    pub async fn list_notebooks(&self) -> Result<Vec<Notebook>> {
        let token = bearer_token(self.auth).await?;
        let response = self
            .http
            .get(format!("{}/me/onenote/notebooks", self.base_url))
            .bearer_auth(&token)
            .send()
            .await?;
        let envelope: ListEnvelope<Notebook> = expect_success(response).await?.json().await?;
        Ok(envelope.value)
    }

    /// List the sections of a notebook
    ///
    /// # Errors
    ///
    /// Same failure modes as [`list_notebooks`](Self::list_notebooks).
    pub async fn list_sections(&self, notebook_id: &str) -> Result<Vec<Section>> {
        let token = bearer_token(self.auth).await?;
        let response = self
            .http
            .get(format!(
                "{}/me/onenote/notebooks/{notebook_id}/sections",
                self.base_url
            ))
            .bearer_auth(&token)
            .send()
            .await?;
        let envelope: ListEnvelope<Section> = expect_success(response).await?.json().await?;
        Ok(envelope.value)
    }

    /// Fetch a single page by id
    ///
    /// # Errors
    ///
    /// Same failure modes as [`list_notebooks`](Self::list_notebooks).
    pub async fn get_page(&self, page_id: &str) -> Result<Page> {
        let token = bearer_token(self.auth).await?;
        let response = self
            .http
            .get(format!("{}/me/onenote/pages/{page_id}", self.base_url))
            .bearer_auth(&token)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    /// Create a page from plain text.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` when no notebook or section can be resolved, and
    /// with the usual auth/API errors otherwise.
    pub async fn create_page(&self, page: &NewPage) -> Result<Page> {
        let token = bearer_token(self.auth).await?;

        let section_id = match &page.section_id {
            Some(id) => id.clone(),
            None => self.resolve_section(page.notebook_id.as_deref()).await?,
        };

        let html = render_page_html(&page.title, &page.content);
        let response = self
            .http
            .post(format!(
                "{}/me/onenote/sections/{section_id}/pages",
                self.base_url
            ))
            .bearer_auth(&token)
            .header("Content-Type", "application/xhtml+xml")
            .body(html)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    async fn resolve_section(&self, notebook_id: Option<&str>) -> Result<String> {
        let notebook_id = match notebook_id {
            Some(id) => id.to_string(),
            None => {
                self.list_notebooks()
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        LifelogError::not_found(
                            "no notebooks available; create one in OneNote first",
                        )
                    })?
                    .id
            }
        };

        let section = self
            .list_sections(&notebook_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                LifelogError::not_found(format!("notebook {notebook_id} has no sections"))
            })?;
        Ok(section.id)
    }
}

/// Render the page XHTML Graph expects for page creation
fn render_page_html(title: &str, content: &str) -> String {
    let created = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let title = escape_html(title);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>{title}</title>\n\
         <meta name=\"created\" content=\"{created}\" />\n</head>\n<body>\n\
         <h1>{title}</h1>\n<div>{}</div>\n</body>\n</html>\n",
        text_to_html(content)
    )
}

/// Escape HTML special characters and keep line breaks
fn text_to_html(text: &str) -> String {
    escape_html(text).replace('\n', "<br/>")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a & b"), "a &amp; b");
        assert_eq!(escape_html("<tag>"), "&lt;tag&gt;");
        assert_eq!(escape_html("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_text_to_html_keeps_line_breaks() {
        assert_eq!(text_to_html("one\ntwo"), "one<br/>two");
        assert_eq!(text_to_html("a < b\nc"), "a &lt; b<br/>c");
    }

    #[test]
    fn test_render_page_html_escapes_title_and_body() {
        let html = render_page_html("Q & A", "1 < 2\ndone");

        assert!(html.contains("<title>Q &amp; A</title>"));
        assert!(html.contains("<h1>Q &amp; A</h1>"));
        assert!(html.contains("<div>1 &lt; 2<br/>done</div>"));
        assert!(html.contains("<meta name=\"created\""));
    }

    #[test]
    fn test_list_envelope_tolerates_missing_value() {
        let envelope: ListEnvelope<Notebook> = serde_json::from_str("{}").unwrap();
        assert!(envelope.value.is_empty());
    }
}
