use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KidvibeConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub project: ProjectConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    /// Directory holding the `token` and `user` entries.
    /// Falls back to `<data dir>/kidvibe` when unset.
    pub storage_dir: Option<PathBuf>,
}

impl SessionConfig {
    pub fn resolve_storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("kidvibe")))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProjectConfig {
    /// Substitute the canned analysis when the analyze call fails.
    pub fallback_on_analyze_error: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            fallback_on_analyze_error: true,
        }
    }
}

impl KidvibeConfig {
    /// Load from an optional TOML file, then apply `KIDVIBE_*` environment
    /// overrides (`KIDVIBE_API__BASE_URL`, `KIDVIBE_SESSION__STORAGE_DIR`, ...).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let s = builder
            .add_source(
                Environment::with_prefix("KIDVIBE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_point_at_local_backend() {
        let config = KidvibeConfig::default();
        assert_eq!(config.base_url(), "http://localhost:8000");
        assert_eq!(config.api.timeout_seconds, 30);
        assert!(config.project.fallback_on_analyze_error);
        assert!(config.session.storage_dir.is_none());
    }

    #[test]
    fn loads_partial_toml_file() {
        let dir = tempfile::TempDir::new().expect("tmp dir");
        let path = dir.path().join("kidvibe.toml");
        let mut f = std::fs::File::create(&path).expect("create");
        writeln!(
            f,
            "[api]\nbase_url = \"https://api.kidvibe.test/\"\ntimeout_seconds = 5\n\n[project]\nfallback_on_analyze_error = false"
        )
        .expect("write");

        let config = KidvibeConfig::load(path.to_str()).expect("load");
        assert_eq!(config.base_url(), "https://api.kidvibe.test");
        assert_eq!(config.api.timeout_seconds, 5);
        assert!(!config.project.fallback_on_analyze_error);
        assert!(config.session.storage_dir.is_none());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = KidvibeConfig::load(Some("/nonexistent/kidvibe")).expect("load");
        assert_eq!(config.api.timeout_seconds, 30);
    }

    #[test]
    fn explicit_storage_dir_wins() {
        let session = SessionConfig {
            storage_dir: Some(PathBuf::from("/tmp/kv")),
        };
        assert_eq!(session.resolve_storage_dir(), Some(PathBuf::from("/tmp/kv")));
    }
}
