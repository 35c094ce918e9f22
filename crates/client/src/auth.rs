//! Credential storage.
//!
//! Reads/writes ~/.config/sheetsync/credentials.json (0600 on Unix).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How requests to the spreadsheet service are authorized.
///
/// An access token is preferred when both are present; an API key alone only
/// grants read access to publicly shared spreadsheets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Credentials {
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            access_token: None,
        }
    }

    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            api_key: None,
            access_token: Some(token.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        blank(&self.api_key) && blank(&self.access_token)
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Returns the path to the credentials file.
pub fn credentials_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("sheetsync/credentials.json"))
}

/// Load saved credentials. None if missing, unreadable or empty.
pub fn load_credentials() -> Option<Credentials> {
    load_credentials_from(&credentials_path()?)
}

pub fn load_credentials_from(path: &Path) -> Option<Credentials> {
    let contents = std::fs::read_to_string(path).ok()?;
    let creds: Credentials = serde_json::from_str(&contents).ok()?;
    (!creds.is_empty()).then_some(creds)
}

/// Save credentials, creating the parent directory if needed.
pub fn save_credentials(creds: &Credentials) -> Result<PathBuf, String> {
    let path = credentials_path().ok_or("Could not determine config directory")?;
    save_credentials_to(&path, creds)?;
    Ok(path)
}

pub fn save_credentials_to(path: &Path, creds: &Credentials) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(creds)
        .map_err(|e| format!("Failed to serialize credentials: {}", e))?;

    std::fs::write(path, &contents)
        .map_err(|e| format!("Failed to write credentials file: {}", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| format!("Failed to set file permissions: {}", e))?;
    }

    Ok(())
}

/// Delete saved credentials.
pub fn delete_credentials() -> Result<(), String> {
    let Some(path) = credentials_path() else {
        return Ok(());
    };
    if path.exists() {
        std::fs::remove_file(&path)
            .map_err(|e| format!("Failed to delete credentials file: {}", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_json_shape() {
        let creds = Credentials::with_api_key("k-123");
        let json = serde_json::to_string(&creds).unwrap();
        assert_eq!(json, r#"{"apiKey":"k-123"}"#);

        let parsed: Credentials = serde_json::from_str(r#"{"accessToken":"tok"}"#).unwrap();
        assert_eq!(parsed, Credentials::with_access_token("tok"));
    }

    #[test]
    fn test_blank_credentials_are_empty() {
        assert!(Credentials::default().is_empty());
        let blank = Credentials {
            api_key: Some("  ".into()),
            access_token: None,
        };
        assert!(blank.is_empty());
        assert!(!Credentials::with_api_key("k").is_empty());
    }

    #[test]
    fn test_credentials_path_exists() {
        let path = credentials_path().unwrap();
        assert!(path.to_string_lossy().contains("sheetsync"));
        assert!(path.to_string_lossy().ends_with("credentials.json"));
    }

    #[test]
    fn test_save_and_load_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/credentials.json");

        let creds = Credentials::with_access_token("tok123");
        save_credentials_to(&path, &creds).unwrap();
        assert_eq!(load_credentials_from(&path), Some(creds));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_load_rejects_garbage_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        assert!(load_credentials_from(&path).is_none());

        std::fs::write(&path, "not json").unwrap();
        assert!(load_credentials_from(&path).is_none());

        std::fs::write(&path, "{}").unwrap();
        assert!(load_credentials_from(&path).is_none());
    }
}
