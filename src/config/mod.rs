//! Configuration for PromptWeave
//!
//! Configuration lives in a single JSON file at `~/.promptweave/config.json`
//! (the base directory can be moved with `PROMPTWEAVE_HOME`). Every section
//! is optional; missing fields fall back to their defaults.
//!
//! ```json
//! {
//!     "expansion": { "enabled": true, "max_depth": 8, "length_limit": 2500 },
//!     "custom": { "enabled": true, "files": ["~/directives/team.json"] },
//!     "scripts": { "enabled": true, "shell": "/bin/sh", "timeout_secs": 10 },
//!     "storage": { "path": null }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeaveError};

/// Environment variable that overrides the base directory.
pub const HOME_ENV: &str = "PROMPTWEAVE_HOME";

/// File name of the per-user custom directive document.
pub const CUSTOM_DIRECTIVES_FILENAME: &str = "custom-directives.json";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Settings for the expansion engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Master switch. When `false`, templates are returned untouched.
    pub enabled: bool,
    /// Maximum nesting depth for directives whose bodies are expanded
    /// before evaluation.
    pub max_depth: usize,
    /// Character budget for file contents, divided across selected files.
    pub length_limit: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: 8,
            length_limit: 2500,
        }
    }
}

/// Settings for user-supplied directive documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomDirectivesConfig {
    /// Whether custom directives are loaded at all.
    pub enabled: bool,
    /// Extra documents loaded after the default one, in order.
    pub files: Vec<String>,
}

impl Default for CustomDirectivesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            files: Vec::new(),
        }
    }
}

/// Settings for script directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Whether `{{shell:...}}` runs at all. Disabled scripts expand to `""`.
    pub enabled: bool,
    /// Interpreter used when the directive does not name one.
    pub shell: String,
    /// Execution budget per script.
    pub timeout_secs: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shell: "/bin/sh".to_string(),
            timeout_secs: 10,
        }
    }
}

impl ScriptConfig {
    /// Returns the timeout as a `Duration`, never shorter than one second.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Settings for durable storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage file. `None` means `<base dir>/storage.json`.
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Root config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub expansion: ExpansionConfig,
    pub custom: CustomDirectivesConfig,
    pub scripts: ScriptConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Base directory (`$PROMPTWEAVE_HOME` or `~/.promptweave`).
    pub fn dir() -> PathBuf {
        if let Ok(home) = std::env::var(HOME_ENV) {
            if !home.trim().is_empty() {
                return PathBuf::from(home);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".promptweave")
    }

    /// Default config file path.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default path. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    /// Load from an explicit path. A missing or blank file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            WeaveError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&content).map_err(|e| {
            WeaveError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Storage file used by the variable store and identifier ledger.
    pub fn storage_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| Self::dir().join("storage.json"))
    }

    /// Custom directive documents in load order: the default document in the
    /// base directory first, then the configured extra files (tilde-expanded).
    /// Empty when custom directives are disabled.
    pub fn custom_directive_files(&self) -> Vec<PathBuf> {
        if !self.custom.enabled {
            return Vec::new();
        }

        let mut files = vec![Self::dir().join(CUSTOM_DIRECTIVES_FILENAME)];
        files.extend(
            self.custom
                .files
                .iter()
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(|f| PathBuf::from(shellexpand::tilde(f).into_owned())),
        );
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.expansion.enabled);
        assert_eq!(config.expansion.max_depth, 8);
        assert_eq!(config.expansion.length_limit, 2500);
        assert!(config.custom.enabled);
        assert_eq!(config.scripts.shell, "/bin/sh");
        assert_eq!(config.scripts.timeout_secs, 10);
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert!(config.expansion.enabled);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"expansion": {"max_depth": 3}, "scripts": {"enabled": false}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.expansion.max_depth, 3);
        assert_eq!(config.expansion.length_limit, 2500);
        assert!(!config.scripts.enabled);
        assert_eq!(config.scripts.shell, "/bin/sh");
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, WeaveError::Config(_)));
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_blank_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "   \n").unwrap();
        assert!(Config::load_from(&path).is_ok());
    }

    #[test]
    fn test_storage_path_override() {
        let mut config = Config::default();
        config.storage.path = Some(PathBuf::from("/tmp/pw/storage.json"));
        assert_eq!(config.storage_path(), PathBuf::from("/tmp/pw/storage.json"));
    }

    #[test]
    fn test_custom_files_disabled() {
        let mut config = Config::default();
        config.custom.enabled = false;
        config.custom.files = vec!["/tmp/a.json".to_string()];
        assert!(config.custom_directive_files().is_empty());
    }

    #[test]
    fn test_custom_files_order() {
        let mut config = Config::default();
        config.custom.files = vec![
            "/tmp/a.json".to_string(),
            "  ".to_string(),
            "/tmp/b.json".to_string(),
        ];
        let files = config.custom_directive_files();
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with(CUSTOM_DIRECTIVES_FILENAME));
        assert_eq!(files[1], PathBuf::from("/tmp/a.json"));
        assert_eq!(files[2], PathBuf::from("/tmp/b.json"));
    }

    #[test]
    fn test_script_timeout_floor() {
        let scripts = ScriptConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(scripts.timeout(), std::time::Duration::from_secs(1));
    }
}
