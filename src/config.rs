//! Layered configuration.
//!
//! Lowest to highest precedence: built-in defaults, a TOML file, `JOBDECK_*`
//! environment variables, then command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "jobdeck.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root URL of the job service.
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Overview screen: recent jobs and counters.
    pub dashboard_refresh_secs: u64,
    /// Queue monitor auto-refresh.
    pub queue_refresh_secs: u64,
    /// Unread-notification badge.
    pub notification_refresh_secs: u64,
    /// Statistics report page.
    pub statistics_refresh_secs: u64,
    pub recent_jobs_limit: u32,
    pub queue_limit: u32,
    pub verbose: bool,
    pub json_logs: bool,
    /// Where the TUI writes its log. Defaults to `jobdeck.log` in the temp dir.
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 15,
            dashboard_refresh_secs: 30,
            queue_refresh_secs: 10,
            notification_refresh_secs: 60,
            statistics_refresh_secs: 300,
            recent_jobs_limit: 5,
            queue_limit: 50,
            verbose: false,
            json_logs: false,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Build the effective configuration. `overrides` is any serializable set
    /// of CLI arguments whose unset fields are skipped.
    pub fn new<T: Serialize>(
        config_file: Option<&Path>,
        overrides: Option<&T>,
    ) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        match config_file {
            Some(path) => figment = figment.merge(Toml::file_exact(path)),
            None => figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        }

        figment = figment.merge(Env::prefixed("JOBDECK_"));

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        figment.extract()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn dashboard_refresh(&self) -> Duration {
        Duration::from_secs(self.dashboard_refresh_secs)
    }

    pub fn queue_refresh(&self) -> Duration {
        Duration::from_secs(self.queue_refresh_secs)
    }

    pub fn notification_refresh(&self) -> Duration {
        Duration::from_secs(self.notification_refresh_secs)
    }

    pub fn statistics_refresh(&self) -> Duration {
        Duration::from_secs(self.statistics_refresh_secs)
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("jobdeck.log"))
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[derive(Serialize)]
    struct Overrides {
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        verbose: Option<bool>,
    }

    #[test]
    fn layers_apply_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                    base_url = "http://jobs.internal:8080"
                    queue_refresh_secs = 20
                    recent_jobs_limit = 8
                "#,
            )?;
            jail.set_env("JOBDECK_QUEUE_REFRESH_SECS", "15");

            let overrides = Overrides {
                base_url: Some("http://cli:9000".to_string()),
                verbose: None,
            };
            let config = AppConfig::new(Some(Path::new("custom.toml")), Some(&overrides))?;

            assert_eq!(config.base_url, "http://cli:9000");
            assert_eq!(config.queue_refresh_secs, 15);
            assert_eq!(config.recent_jobs_limit, 8);
            assert_eq!(config.dashboard_refresh_secs, 30);
            assert!(!config.verbose);
            Ok(())
        });
    }

    #[test]
    fn missing_default_file_is_fine_but_explicit_file_is_not() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::new(None, None::<&Overrides>)?;
            assert_eq!(config, AppConfig::default());
            assert!(AppConfig::new(Some(Path::new("absent.toml")), None::<&Overrides>).is_err());
            Ok(())
        });
    }

    #[test]
    fn toml_output_parses_back() {
        let config = AppConfig {
            log_file: Some(PathBuf::from("/var/log/jobdeck.log")),
            ..AppConfig::default()
        };
        let text = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
