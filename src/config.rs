//! TOML configuration for the kernel, discovered from `classkit.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub enabled: bool,
    pub disable_caching: bool,
    pub cache_param: String,
    pub extension: String,
    /// Namespace prefix to base path, e.g. `"Ui" = "lib/ui"`.
    pub paths: BTreeMap<String, String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disable_caching: false,
            cache_param: "_dc".to_string(),
            extension: ".json".to_string(),
            paths: BTreeMap::new(),
        }
    }
}

impl KernelConfig {
    pub fn parse(text: &str) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Look for `classkit.toml` in the current directory.
    pub fn discover() -> Option<Self> {
        let path = Path::new("classkit.toml");
        if !path.exists() {
            return None;
        }
        match Self::load(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed classkit.toml");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::parse("").unwrap();
        assert!(config.loader.enabled);
        assert_eq!(config.loader.extension, ".json");
        assert_eq!(config.loader.cache_param, "_dc");
    }

    #[test]
    fn test_loader_section() {
        let config = KernelConfig::parse(
            r#"
            [loader]
            enabled = false
            disable_caching = true
            extension = ".unit"

            [loader.paths]
            "Ui" = "lib/ui"
            "Ui.chart" = "packages/charts"
            "#,
        )
        .unwrap();

        assert!(!config.loader.enabled);
        assert!(config.loader.disable_caching);
        assert_eq!(config.loader.extension, ".unit");
        assert_eq!(config.loader.paths["Ui.chart"], "packages/charts");
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert!(KernelConfig::parse("loader = 3").is_err());
    }
}
