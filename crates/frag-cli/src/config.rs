use std::path::{Path, PathBuf};

use anyhow::Context;
use frag_types::TypeRegistry;
use serde::{Deserialize, Serialize};

/// Default upper bound on a single payload: 5 MiB.
pub const DEFAULT_MAX_FRAGMENT_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentsConfig {
    /// Root directory of the filesystem store.
    pub data_dir: PathBuf,
    /// Content types accepted for new fragments.
    pub storable_types: Vec<String>,
    pub max_fragment_size: u64,
    /// `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for FragmentsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".fragments"),
            storable_types: vec!["text/plain".into()],
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
            log_filter: "warn".into(),
        }
    }
}

impl FragmentsConfig {
    /// Read a TOML config file. No path, or a path that does not exist,
    /// yields the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn registry(&self) -> anyhow::Result<TypeRegistry> {
        TypeRegistry::from_type_names(&self.storable_types)
            .context("invalid entry in storable_types")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frag_types::MediaKind;

    #[test]
    fn default_config() {
        let c = FragmentsConfig::default();
        assert_eq!(c.data_dir, PathBuf::from(".fragments"));
        assert_eq!(c.storable_types, vec!["text/plain"]);
        assert_eq!(c.max_fragment_size, 5 * 1024 * 1024);
        assert_eq!(c.log_filter, "warn");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = FragmentsConfig::from_toml(
            r#"
            data_dir = "/var/lib/fragments"
            storable_types = ["text/plain", "text/markdown", "image/png"]
            "#,
        )
        .unwrap();
        assert_eq!(c.data_dir, PathBuf::from("/var/lib/fragments"));
        assert_eq!(c.max_fragment_size, DEFAULT_MAX_FRAGMENT_SIZE);

        let registry = c.registry().unwrap();
        assert!(registry.is_storable(MediaKind::TextMarkdown));
        assert!(registry.is_storable(MediaKind::ImagePng));
        assert!(!registry.is_storable(MediaKind::TextCsv));
    }

    #[test]
    fn unknown_storable_type_is_an_error() {
        let c = FragmentsConfig::from_toml(r#"storable_types = ["application/msword"]"#).unwrap();
        assert!(c.registry().is_err());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(FragmentsConfig::from_toml("max_fragment_size = \"big\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = FragmentsConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(c, FragmentsConfig::default());
        assert_eq!(FragmentsConfig::load(None).unwrap(), FragmentsConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fragments.toml");
        std::fs::write(&path, "max_fragment_size = 1024\nlog_filter = \"debug\"\n").unwrap();
        let c = FragmentsConfig::load(Some(&path)).unwrap();
        assert_eq!(c.max_fragment_size, 1024);
        assert_eq!(c.log_filter, "debug");
    }
}
