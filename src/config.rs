use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::compress::Compression;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Base name of the store; the two files become
    /// `<name>_dataset.json` and `<name>_testcase.json`.
    pub name: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub compression: Compression,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate store
    if config.store.name.is_empty() {
        anyhow::bail!("store.name must not be empty");
    }

    if config.store.name.contains(['/', '\\']) {
        anyhow::bail!("store.name must not contain path separators");
    }

    if config.store.cache_dir.as_os_str().is_empty() {
        anyhow::bail!("store.cache_dir must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.toml");
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let (_tmp, path) = write_config("[store]\nname = \"bench\"\n");
        let config = load_config(&path).unwrap();
        assert_eq!(config.store.name, "bench");
        assert_eq!(config.store.cache_dir, PathBuf::from("./cache"));
        assert_eq!(config.store.compression, Compression::ByIndex);
    }

    #[test]
    fn test_explicit_compression_tag() {
        let (_tmp, path) = write_config(
            "[store]\nname = \"bench\"\ncache_dir = \"/tmp/c\"\ncompression = \"ref_by_source\"\n",
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.store.compression, Compression::BySource);
    }

    #[test]
    fn test_empty_name_rejected() {
        let (_tmp, path) = write_config("[store]\nname = \"\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_name_with_separator_rejected() {
        let (_tmp, path) = write_config("[store]\nname = \"a/b\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_unknown_compression_tag_rejected() {
        let (_tmp, path) = write_config("[store]\nname = \"x\"\ncompression = \"zip\"\n");
        assert!(load_config(&path).is_err());
    }
}
