use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Site the search profiles were written for.
pub const SITE_ORIGIN: &str = "https://www.amazon.com.br";
/// `{keyword}` is replaced by the percent-encoded keyword.
pub const SEARCH_TEMPLATE: &str = "https://www.amazon.com.br/s?k={keyword}";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";
pub const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en;q=0.8";
pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub static_dir: PathBuf,
    pub site_origin: String,
    pub search_template: String,
    pub fetch_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: PathBuf::from("static"),
            site_origin: SITE_ORIGIN.to_string(),
            search_template: SEARCH_TEMPLATE.to_string(),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    /// Only the listening port can be overridden (`PORT`).
    pub fn from_env() -> Result<Self> {
        Self::with_port(env::var("PORT").ok())
    }

    fn with_port(port: Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(port) = port {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got {:?}", port))?;
        }
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
