//! Command handlers for the `promptweave` binary.

pub(crate) mod expand;
pub(crate) mod vars;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncReadExt;

use promptweave::config::Config;
use promptweave::engine::ExpansionContext;
use promptweave::host::Services;
use promptweave::variables::JsonFileStorage;

/// Load the config from `path`, or from the default location.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().with_context(|| "Failed to load config")?,
    };
    Ok(config)
}

/// Services over the configured storage file, with no host and no model.
pub(crate) fn open_services(config: &Config) -> Result<Services> {
    let path = config.storage_path();
    let storage = JsonFileStorage::open(&path)
        .with_context(|| format!("Failed to open storage at {}", path.display()))?;
    Ok(Services::new(Arc::new(storage)))
}

/// Template from the argument, the file, or stdin.
pub(crate) async fn read_template(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(file) = file {
        return tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("Failed to read template {}", file.display()));
    }

    let mut buf = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .with_context(|| "Failed to read template from stdin")?;
    Ok(buf)
}

/// Build a seed context from `KEY=VALUE` pairs. The value may contain `=`.
pub(crate) fn parse_seed(pairs: &[String]) -> Result<ExpansionContext> {
    let mut seed = ExpansionContext::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid --set '{}', expected KEY=VALUE", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid --set '{}', key is empty", pair);
        }
        seed.insert(key, value);
    }
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        let seed = parse_seed(&[
            "selectedFiles=/a.txt,/b.txt".to_string(),
            "input=x=y".to_string(),
        ])
        .unwrap();
        assert_eq!(seed.get("selectedFiles"), Some("/a.txt,/b.txt"));
        assert_eq!(seed.get("input"), Some("x=y"));
    }

    #[test]
    fn test_parse_seed_invalid() {
        assert!(parse_seed(&["novalue".to_string()]).is_err());
        assert!(parse_seed(&["=value".to_string()]).is_err());
        assert!(parse_seed(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"expansion": {"max_depth": 3}}"#).unwrap();
        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.expansion.max_depth, 3);
    }

    #[tokio::test]
    async fn test_read_template_prefers_text() {
        let text = read_template(Some("inline".into()), None).await.unwrap();
        assert_eq!(text, "inline");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, "from file").unwrap();
        let text = read_template(None, Some(path)).await.unwrap();
        assert_eq!(text, "from file");
    }
}
