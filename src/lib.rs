use config::{Config, Environment, File};
use heatmap::{Palette, Theme};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod activity;
pub mod contributions;
pub mod heatmap;
pub mod job;

/// Result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by all fallible operations within this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),
    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
    #[error("GitLab client error: {0}")]
    Client(#[from] activity::gitlab::ClientError),
}

impl Error {
    /// Returns `true` if the error means the remote host is unreachable or rejected our
    /// credentials, as opposed to a genuine data error.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Error::Client(err) => err.is_unavailable(),
            _ => false,
        }
    }
}

/// Default name of the rendered heatmap.
pub const DEFAULT_OUTPUT_PATH: &str = "gitlab-graph.svg";

fn default_timeout_secs() -> u64 {
    10
}

fn default_per_page() -> u32 {
    100
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

/// Configuration as it comes out of the layered sources, before validation.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct RawConfig {
    /// Base URL of the GitLab instance.
    pub host_url: Option<String>,
    /// Personal access token.
    pub access_token: Option<String>,
    /// Timeout applied to every HTTP request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of events requested per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Where the SVG is written.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Named color theme, used unless `palette` is set.
    #[serde(default)]
    pub theme: Theme,
    /// Explicit colors for the five buckets.
    pub palette: Option<Palette>,
}

/// Validated, immutable application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base URL of the GitLab instance.
    pub host_url: Url,
    /// Personal access token used for every request.
    pub access_token: String,
    /// Timeout applied to every HTTP request.
    pub timeout: Duration,
    /// Number of events requested per page.
    pub per_page: u32,
    /// Where the SVG is written.
    pub output_path: PathBuf,
    /// Colors for the five buckets.
    pub palette: Palette,
}

impl AppConfig {
    /// Loads the application configuration from optional files in the `config/` directory and
    /// environment variables.
    pub fn load() -> Result<AppConfig> {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "production".into());

        log::debug!("loading configuration using {} environment", app_env);

        let mut builder = Config::builder()
            // Optional defaults from `config/default.toml`.
            .add_source(File::with_name("config/default").required(false))
            // Optional environment specific config overrides, e.g. `config/ci.toml`.
            .add_source(File::with_name(&format!("config/{}", app_env)).required(false))
            // Optional local config overrides from `config/local.toml` (on .gitignore).
            .add_source(File::with_name("config/local").required(false))
            // Config from environment variables prefixed with `HEATMAP_`.
            .add_source(
                Environment::with_prefix("HEATMAP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // The two required settings are read from unprefixed variables and win over everything
        // else.
        for (key, var) in [("host_url", "HOST_URL"), ("access_token", "ACCESS_TOKEN")] {
            if let Ok(value) = env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        AppConfig::from_config(builder.build()?)
    }

    /// Deserializes and validates an already built `Config`.
    pub fn from_config(config: Config) -> Result<AppConfig> {
        let raw: RawConfig = config.try_deserialize()?;
        AppConfig::try_from(raw)
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(Error::MissingSetting(name)),
    }
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<AppConfig> {
        // Check the token first so a missing token is reported even if the URL is also absent.
        let access_token = required(raw.access_token, "ACCESS_TOKEN")?;
        let host_url = required(raw.host_url, "HOST_URL")?;

        let host_url = Url::parse(&host_url).map_err(|err| Error::InvalidSetting {
            name: "HOST_URL",
            reason: err.to_string(),
        })?;

        if host_url.cannot_be_a_base() {
            return Err(Error::InvalidSetting {
                name: "HOST_URL",
                reason: format!("`{host_url}` cannot be used as a base URL"),
            });
        }

        if raw.timeout_secs == 0 {
            return Err(Error::InvalidSetting {
                name: "timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }

        if !(1..=100).contains(&raw.per_page) {
            return Err(Error::InvalidSetting {
                name: "per_page",
                reason: format!("{} is outside of 1..=100", raw.per_page),
            });
        }

        let palette = raw.palette.unwrap_or_else(|| raw.theme.palette());

        Ok(AppConfig {
            host_url,
            access_token,
            timeout: Duration::from_secs(raw.timeout_secs),
            per_page: raw.per_page,
            output_path: raw.output_path,
            palette,
        })
    }
}
