//! Application configuration: `config.json` plus environment overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::ClientIdentity;
use crate::error::{LifelogError, Result};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Application configuration.
///
/// Loaded from a JSON file with per-section defaults, so a partial file only
/// overrides what it names. Credentials can also come from the environment
/// (`MS_CLIENT_ID`, `MS_CLIENT_SECRET`, `MS_REDIRECT_URI`), which wins over
/// the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Microsoft application registration
    pub microsoft: MicrosoftSettings,
    /// OneNote targets
    pub onenote: OneNoteSettings,
    /// OneDrive targets
    pub onedrive: OneDriveSettings,
}

/// Microsoft application registration and requested scopes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrosoftSettings {
    /// Application (client) id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Redirect URI registered for the application
    pub redirect_uri: String,
    /// Scopes to request
    pub scopes: Vec<String>,
}

impl Default for MicrosoftSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8000/callback".to_string(),
            // offline_access is what makes the provider hand out a refresh
            // token at all.
            scopes: vec![
                "offline_access".to_string(),
                "Notes.Create".to_string(),
                "Notes.Read".to_string(),
                "Files.ReadWrite".to_string(),
            ],
        }
    }
}

/// Default OneNote targets for `note create`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OneNoteSettings {
    /// Notebook used when none is given (first notebook when unset)
    pub default_notebook_id: Option<String>,
    /// Section used when none is given (first section when unset)
    pub default_section_id: Option<String>,
}

/// Default OneDrive targets for `upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OneDriveSettings {
    /// Folder uploads land in when none is given
    pub default_folder: String,
}

impl Default for OneDriveSettings {
    fn default() -> Self {
        Self {
            default_folder: "/LifeLog".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (default `config.json`), then apply
    /// environment overrides.
    ///
    /// A missing file yields the defaults; an unreadable or unparsable file is
    /// logged and also yields the defaults. Configuration trouble surfaces
    /// later, through [`validate`](Self::validate).
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("could not parse {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!("could not read {}: {e}", path.display());
                Self::default()
            }
        };

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("MS_CLIENT_ID") {
            if !value.is_empty() {
                self.microsoft.client_id = value;
            }
        }
        if let Ok(value) = std::env::var("MS_CLIENT_SECRET") {
            if !value.is_empty() {
                self.microsoft.client_secret = value;
            }
        }
        if let Ok(value) = std::env::var("MS_REDIRECT_URI") {
            if !value.is_empty() {
                self.microsoft.redirect_uri = value;
            }
        }
    }

    /// Write the configuration as pretty JSON (used by `config init`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check that the credentials required before any network activity are set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing field.
    pub fn validate(&self) -> Result<()> {
        if self.microsoft.client_id.is_empty() {
            return Err(LifelogError::config("microsoft.client_id is not set"));
        }
        if self.microsoft.client_secret.is_empty() {
            return Err(LifelogError::config("microsoft.client_secret is not set"));
        }
        Ok(())
    }

    /// The client identity handed to the authenticator
    #[must_use]
    pub fn client_identity(&self) -> ClientIdentity {
        ClientIdentity {
            client_id: self.microsoft.client_id.clone(),
            client_secret: self.microsoft.client_secret.clone(),
            redirect_uri: self.microsoft.redirect_uri.clone(),
            scopes: self.microsoft.scopes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert!(config.microsoft.client_id.is_empty());
        assert_eq!(config.microsoft.redirect_uri, "http://localhost:8000/callback");
        assert!(config.microsoft.scopes.contains(&"offline_access".to_string()));
        assert_eq!(config.onedrive.default_folder, "/LifeLog");
        assert!(config.onenote.default_notebook_id.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(Some(&temp_dir.path().join("nope.json")));

        assert!(config.microsoft.client_id.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_section_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"microsoft": {"client_id": "abc", "client_secret": "xyz"}}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path));

        assert_eq!(config.microsoft.client_id, "abc");
        // Untouched fields keep their defaults
        assert_eq!(config.microsoft.redirect_uri, "http://localhost:8000/callback");
        assert_eq!(config.onedrive.default_folder, "/LifeLog");
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{oops").unwrap();

        let config = Config::load(Some(&path));
        assert!(config.microsoft.client_id.is_empty());
    }

    #[test]
    fn test_validate_reports_missing_credentials() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.microsoft.client_id = "abc".to_string();
        assert!(config.validate().is_err());

        config.microsoft.client_secret = "xyz".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let mut config = Config::default();
        config.microsoft.client_id = "abc".to_string();
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path));
        assert_eq!(loaded.microsoft.client_id, "abc");
    }

    #[test]
    fn test_client_identity_conversion() {
        let mut config = Config::default();
        config.microsoft.client_id = "abc".to_string();
        config.microsoft.client_secret = "xyz".to_string();

        let identity = config.client_identity();
        assert_eq!(identity.client_id, "abc");
        assert_eq!(identity.client_secret, "xyz");
        assert_eq!(identity.redirect_uri, config.microsoft.redirect_uri);
        assert_eq!(identity.scopes, config.microsoft.scopes);
    }
}
