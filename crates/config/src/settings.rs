// Sync settings
// Loaded from ~/.config/sheetsync/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Cache
    #[serde(rename = "cache.root")]
    pub cache_root: Option<PathBuf>,  // None = platform cache dir

    // Remote
    #[serde(rename = "remote.apiBase")]
    pub api_base: String,

    #[serde(rename = "remote.timeoutSecs")]
    pub timeout_secs: u64,

    // Reads
    #[serde(rename = "read.preferCache")]
    pub prefer_cache: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_root: None,
            api_base: "https://sheets.googleapis.com".to_string(),
            timeout_secs: 60,
            prefer_cache: false,
        }
    }
}

const DEFAULT_FILE: &str = r#"{
    // Where downloaded spreadsheets are kept as CSV (null = platform cache dir)
    "cache.root": null,

    // Spreadsheet service endpoint and request timeout
    "remote.apiBase": "https://sheets.googleapis.com",
    "remote.timeoutSecs": 60,

    // Serve `ssync get` from the local cache without contacting the service
    "read.preferCache": false
}
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetsync");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults.
    /// Writes a commented default file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            if let Err(e) = write_default_file(&path) {
                eprintln!("Error writing default settings.json: {}", e);
            }
            return Self::default();
        }

        Self::load_from(&path)
    }

    /// Load settings from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error parsing {}: {}", path.display(), e);
                    eprintln!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Directory holding cached spreadsheets
    pub fn cache_root(&self) -> PathBuf {
        match &self.cache_root {
            Some(root) => root.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sheetsync"),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn write_default_file(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    fs::write(path, DEFAULT_FILE).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_parses_to_defaults() {
        assert_eq!(Settings::parse(DEFAULT_FILE).unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings = Settings::parse(
            r#"{
    // only the cache moves
    "cache.root": "/tmp/sheets",
    "read.preferCache": true
}"#,
        )
        .unwrap();
        assert_eq!(settings.cache_root(), PathBuf::from("/tmp/sheets"));
        assert!(settings.prefer_cache);
        assert_eq!(settings.timeout_secs, 60);
        assert_eq!(settings.api_base, "https://sheets.googleapis.com");
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        assert_eq!(
            Settings::load_from(&dir.path().join("missing.json")),
            Settings::default()
        );
    }

    #[test]
    fn test_save_roundtrip_uses_dotted_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        let settings = Settings {
            timeout_secs: 5,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"remote.timeoutSecs\": 5"));
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_default_cache_root_and_timeout() {
        let settings = Settings {
            timeout_secs: 0,
            ..Settings::default()
        };
        assert!(settings.cache_root().ends_with("sheetsync"));
        assert_eq!(settings.timeout(), Duration::from_secs(1));
    }
}
