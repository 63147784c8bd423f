use std::net::SocketAddr;

use axum::http::{header::InvalidHeaderValue, HeaderValue};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5555";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    fn parse(value: Option<&str>) -> Environment {
        match value {
            Some(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    /// Whether error responses may carry a stack of causes
    pub fn exposes_stack(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid BIND_ADDR {value:?}: {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid origin {value:?} in CORS_ORIGINS: {source}")]
    InvalidCorsOrigin {
        value: String,
        source: InvalidHeaderValue,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// No URL means books are kept in memory only
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    /// Empty means any origin is allowed
    pub cors_origins: Vec<HeaderValue>,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind_addr.clone(),
                source,
            })?;

        let environment = Environment::parse(lookup("APP_ENV").as_deref());

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|origins| parse_cors_origins(&origins))
            .transpose()?
            .unwrap_or_default();

        Ok(Config {
            database_url,
            bind_addr,
            environment,
            cors_origins,
        })
    }
}

fn parse_cors_origins(origins: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|source| ConfigError::InvalidCorsOrigin {
                value: origin.to_string(),
                source,
            })
        })
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5555)),
            environment: Environment::default(),
            cors_origins: Vec::new(),
        }
    }
}
