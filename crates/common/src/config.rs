use anyhow::{Context, Result};
use serde::Deserialize;
use std::str::FromStr;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: General,
    pub backend: Backend,
    pub ledger: Ledger,
    pub server: Server,
    pub observability: Observability,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    pub log_level: String,
}

/// Managed backend (REST, auth and realtime endpoints share one base URL).
#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
    pub url: String,
    pub anon_key: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub realtime: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Rest,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ledger {
    pub store: StoreKind,
    pub sqlite_path: String,
    pub local_user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Observability {
    pub prometheus_port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse wallet config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.server.port > 0, "server.port must be > 0");
        anyhow::ensure!(
            self.backend.request_timeout_secs > 0,
            "backend.request_timeout_secs must be > 0"
        );
        if self.ledger.store == StoreKind::Rest {
            anyhow::ensure!(
                self.backend.url.starts_with("http://") || self.backend.url.starts_with("https://"),
                "backend.url must be an http(s) URL"
            );
            anyhow::ensure!(
                !self.backend.anon_key.is_empty(),
                "backend.anon_key must be set for the rest store"
            );
        } else {
            anyhow::ensure!(
                !self.ledger.local_user_id.is_empty(),
                "ledger.local_user_id must be set for the sqlite store"
            );
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> &'static str {
        r#"
[general]
log_level = "info"

[backend]
url = "https://example.supabase.co"
anon_key = "anon"
request_timeout_secs = 15
realtime = true

[ledger]
store = "rest"
sqlite_path = "data/wallet.db"
local_user_id = "local-user"

[server]
host = "127.0.0.1"
port = 8080

[observability]
prometheus_port = 9096
"#
    }

    #[test]
    fn test_load_default_config() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.ledger.store, StoreKind::Sqlite);
        assert!(config.backend.request_timeout_secs > 0);
        assert!(config.server.api_key.is_none());
    }

    #[test]
    fn test_parse_valid_config() {
        let config = Config::from_toml_str(sample_config()).unwrap();
        assert_eq!(config.backend.url, "https://example.supabase.co");
        assert!(config.backend.realtime);
        assert_eq!(config.ledger.store, StoreKind::Rest);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.observability.prometheus_port, 9096);
    }

    #[test]
    fn test_parse_invalid_config_missing_section() {
        let bad = "
[general]
log_level = \"info\"
";
        assert!(Config::from_toml_str(bad).is_err());
    }

    #[test]
    fn test_rest_store_requires_http_url() {
        let content = sample_config().replace("https://example.supabase.co", "example.supabase.co");
        let err = Config::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("backend.url must be an http(s) URL"));
    }

    #[test]
    fn test_rest_store_requires_anon_key() {
        let content = sample_config().replace("anon_key = \"anon\"", "anon_key = \"\"");
        let err = Config::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("backend.anon_key must be set"));
    }

    #[test]
    fn test_sqlite_store_ignores_backend_url() {
        let content = sample_config()
            .replace("store = \"rest\"", "store = \"sqlite\"")
            .replace("https://example.supabase.co", "");
        let config = Config::from_toml_str(&content).unwrap();
        assert_eq!(config.ledger.store, StoreKind::Sqlite);
    }

    #[test]
    fn test_realtime_defaults_off() {
        let content = sample_config().replace("realtime = true\n", "");
        let config = Config::from_toml_str(&content).unwrap();
        assert!(!config.backend.realtime);
    }
}
