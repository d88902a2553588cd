//! TOML configuration file support.
//!
//! Settings that rarely change between runs can live in a config file
//! instead of on the command line:
//!
//! ```toml
//! # cellscape.toml
//! [ingest]
//! features = ["^CD", "DAPI"]
//! annotations = ["cell_type"]
//! spatial_x = "X_centroid"
//! spatial_y = "Y_centroid"
//! min_quantile = 0.01
//! max_quantile = 0.99
//! layer = "rescaled"
//! ```
//!
//! Command-line flags take precedence over file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure for cellscape.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Ingest-specific settings.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Configuration for the ingest command.
#[derive(Debug, Default, Deserialize)]
pub struct IngestConfig {
    /// Feature-name regexes.
    #[serde(default)]
    pub features: Vec<String>,

    /// Columns copied as categorical annotations.
    #[serde(default)]
    pub annotations: Vec<String>,

    /// Column holding the x coordinate.
    pub spatial_x: Option<String>,

    /// Column holding the y coordinate.
    pub spatial_y: Option<String>,

    /// Lower clipping quantile.
    pub min_quantile: Option<f64>,

    /// Upper clipping quantile.
    pub max_quantile: Option<f64>,

    /// Layer receiving the rescaled values.
    pub layer: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [ingest]
            features = ["^CD", "DAPI"]
            annotations = ["cell_type"]
            spatial_x = "X_centroid"
            spatial_y = "Y_centroid"
            min_quantile = 0.05
            max_quantile = 0.95
            layer = "rescaled"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.ingest.features, vec!["^CD", "DAPI"]);
        assert_eq!(config.ingest.annotations, vec!["cell_type"]);
        assert_eq!(config.ingest.spatial_x.as_deref(), Some("X_centroid"));
        assert_eq!(config.ingest.min_quantile, Some(0.05));
        assert_eq!(config.ingest.max_quantile, Some(0.95));
        assert_eq!(config.ingest.layer.as_deref(), Some("rescaled"));
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [ingest]
            max_quantile = 0.9
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.ingest.max_quantile, Some(0.9));
        assert!(config.ingest.features.is_empty());
        assert_eq!(config.ingest.spatial_y, None);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.ingest.min_quantile, None);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::from_str("[ingest]\nfeatures = 3").is_err());
    }
}
