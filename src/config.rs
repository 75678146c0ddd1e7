//! Layered configuration: defaults < TOML file < environment < CLI flags.

use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "scrapewatch.toml";

/// Environment variable prefix, e.g. `SCRAPEWATCH_API_URL`.
pub const ENV_PREFIX: &str = "SCRAPEWATCH_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the scraping backend.
    pub api_url: String,
    /// Bearer token sent on job-control requests.
    pub auth_token: Option<String>,
    /// Keepalive period for open progress streams.
    pub keepalive_secs: u64,
    /// Retained events per tracked job.
    pub event_log_limit: usize,
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            auth_token: None,
            keepalive_secs: 30,
            event_log_limit: 100,
            verbose: false,
        }
    }
}

impl AppConfig {
    /// Resolve config from the default file location, the environment, and
    /// optional serialized CLI overrides (highest precedence).
    pub fn new<A: Serialize>(cli: Option<&A>) -> Result<Self> {
        Self::load(Path::new(CONFIG_FILE), cli)
    }

    pub fn load<A: Serialize>(config_file: &Path, cli: Option<&A>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX));

        if let Some(cli) = cli {
            figment = figment.merge(Serialized::defaults(cli));
        }

        figment.extract().context("Failed to load configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Overrides {
        #[serde(skip_serializing_if = "Option::is_none")]
        api_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        verbose: Option<bool>,
    }

    #[test]
    fn defaults_when_nothing_provided() {
        let config =
            AppConfig::load(Path::new("/nonexistent/scrapewatch.toml"), None::<&()>).unwrap();

        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.keepalive_secs, 30);
        assert_eq!(config.event_log_limit, 100);
        assert!(!config.verbose);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrapewatch.toml");
        std::fs::write(
            &path,
            "api_url = \"https://scraper.internal\"\nkeepalive_secs = 10\n",
        )
        .unwrap();

        let config = AppConfig::load(&path, None::<&()>).unwrap();
        assert_eq!(config.api_url, "https://scraper.internal");
        assert_eq!(config.keepalive_secs, 10);
        assert_eq!(config.event_log_limit, 100);
    }

    #[test]
    fn cli_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrapewatch.toml");
        std::fs::write(&path, "api_url = \"https://from-file\"\n").unwrap();

        let cli = Overrides {
            api_url: Some("https://from-cli".to_string()),
            verbose: Some(true),
        };
        let config = AppConfig::load(&path, Some(&cli)).unwrap();

        assert_eq!(config.api_url, "https://from-cli");
        assert!(config.verbose);
    }

    #[test]
    fn unset_cli_fields_do_not_mask_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrapewatch.toml");
        std::fs::write(&path, "api_url = \"https://from-file\"\n").unwrap();

        let cli = Overrides {
            api_url: None,
            verbose: Some(true),
        };
        let config = AppConfig::load(&path, Some(&cli)).unwrap();

        assert_eq!(config.api_url, "https://from-file");
    }
}
