//! Environment-driven configuration. Call [`crate::bootstrap::init_env`] first so a local
//! `.env` file is visible here.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct ApiUrls {
    pub catalog_service_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub api: ApiUrls,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));
        let optional = |key: &'static str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed(
                    "DATABASE_MAX_CONNECTIONS",
                    lookup("DATABASE_MAX_CONNECTIONS"),
                    10,
                )?,
            },
            server: ServerConfig {
                host: optional("SERVER_HOST", "0.0.0.0"),
                port: parsed("SERVER_PORT", lookup("SERVER_PORT"), 15151)?,
            },
            auth: AuthConfig {
                jwt_secret: required("JWT_SECRET")?,
            },
            api: ApiUrls {
                catalog_service_url: optional(
                    "CATALOG_SERVICE_URL",
                    "http://localhost:3000/catalog-service",
                )
                .trim_end_matches('/')
                .to_string(),
            },
        })
    }
}

fn parsed<T: FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
