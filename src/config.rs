use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Editor command for `--open`. Resolved in order: this value → $VISUAL → $EDITOR → vi
    pub editor: Option<String>,
    pub host: String,
    pub session: SessionConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 0 disables background polling
    pub poll_interval_secs: u64,
    pub notification_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by RUST_LOG
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: None,
            host: "github.com".to_owned(),
            session: SessionConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            notification_capacity: 64,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_owned(),
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Config {
    /// Loads `$XDG_CONFIG_HOME/octorus/review.toml`, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.host.trim().is_empty() {
            anyhow::bail!("host must not be empty");
        }
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        xdg::BaseDirectories::with_prefix("octorus")
            .ok()
            .map(|dirs| dirs.get_config_home().join("review.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.host, "github.com");
        assert_eq!(config.session.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.log.filter, "warn");
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = Config::from_toml_str(
            r#"
editor = "nvim"
host = "github.example.com"

[session]
poll_interval_secs = 0
"#,
        )
        .unwrap();

        assert_eq!(config.editor.as_deref(), Some("nvim"));
        assert_eq!(config.host, "github.example.com");
        assert!(config.session.poll_interval().is_zero());
        assert_eq!(config.session.notification_capacity, 64);
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(Config::from_toml_str("host = \"  \"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\nfilter = \"octorus_review=debug\"").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.log.filter, "octorus_review=debug");
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\npoll_interval_secs = \"soon\"").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }
}
