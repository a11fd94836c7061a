use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use url::Url;

use crate::domain::FormVariant;

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub scoring_service_url: Url,
    pub request_timeout: Duration,
    pub form_variant: FormVariant,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, applying defaults for absent keys.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scoring_service_url = parse_service_url(
            &lookup("SCORING_SERVICE_URL").unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string()),
        )?;

        let timeout_secs: u64 = lookup("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| DEFAULT_TIMEOUT_SECS.to_string())
            .trim()
            .parse()?;
        if timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        let form_variant = lookup("FORM_VARIANT")
            .map(|raw| raw.parse::<FormVariant>())
            .transpose()
            .map_err(anyhow::Error::msg)?
            .unwrap_or_default();

        let log_format = match lookup("LOG_FORMAT")
            .unwrap_or_else(|| "pretty".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        };

        Ok(Config {
            scoring_service_url,
            request_timeout: Duration::from_secs(timeout_secs),
            form_variant,
            log_format,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        self.scoring_service_url
            .as_str()
            .trim_end_matches('/')
            .to_string()
    }

    pub fn analyze_url(&self) -> String {
        format!("{}/analyze", self.base_url())
    }

    pub fn health_url(&self) -> String {
        format!("{}/", self.base_url())
    }
}

fn parse_service_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("SCORING_SERVICE_URL must use http or https, got '{}'", url.scheme());
    }
    if url.host_str().is_none() {
        anyhow::bail!("SCORING_SERVICE_URL must include a host");
    }

    Ok(url)
}
