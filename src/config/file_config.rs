//! Writing configuration files.
//!
//! # Configuration File Format
//!
//! ```toml
//! [pubmed]
//! search_url = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi"
//! fetch_url = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi"
//! max_results = 100
//!
//! [batch]
//! max_concurrency = 10
//! min_spacing_ms = 100
//!
//! [http]
//! timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::path::Path;

use super::Config;

/// Serialize `config` as TOML and write it to `path`, creating parent directories
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
    }

    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.batch.max_concurrency = 2;
        config.pubmed.api_key = Some("saved-key".to_string());

        save_config(&config, &path).unwrap();
        let loaded = load_config(Some(&path)).unwrap();

        assert_eq!(loaded.batch.max_concurrency, 2);
        assert_eq!(loaded.pubmed.api_key.as_deref(), Some("saved-key"));
    }

    #[test]
    fn test_saved_file_is_readable_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        save_config(&Config::default(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        assert!(content.contains("[batch]"));
        assert!(content.contains("max_concurrency = 10"));
    }
}
