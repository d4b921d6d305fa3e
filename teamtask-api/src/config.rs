/// Configuration management for the API server
///
/// This module loads configuration from environment variables (and a `.env`
/// file when present) into a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (unset: in-memory stores)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: HS256 secret shared with the identity provider (required)
/// - `JWT_ISSUER`: Expected `iss` claim (default: teamtask)
/// - `AUTO_FINALIZE`: Close group tasks on the last confirmation (default: true)
/// - `MAX_WRITE_RETRIES`: Retries after a concurrent write (default: 5)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use teamtask_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use teamtask_shared::services::{ServiceConfig, DEFAULT_MAX_WRITE_RETRIES};

/// Minimum accepted length of `JWT_SECRET`
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration; `None` runs on in-memory stores
    pub database: Option<DatabaseConfig>,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Task behavior
    pub tasks: TaskConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for token verification
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Expected issuer
    pub issuer: String,
}

/// Task behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Finalize a group task when its last assignee confirms
    pub auto_finalize: bool,

    /// Retries after a concurrent write
    pub max_write_retries: u32,
}

fn parse_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} must be a boolean, got '{}'", key, other),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is missing or shorter than 32 characters
    /// - A variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let api_host = var("API_HOST", "0.0.0.0");
        let api_port = var("API_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is invalid: {}", e))?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let database = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
                    .parse::<u32>()
                    .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;
                Some(DatabaseConfig {
                    url,
                    max_connections,
                })
            }
            None => None,
        };

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LEN);
        }

        let auto_finalize = parse_bool("AUTO_FINALIZE", &var("AUTO_FINALIZE", "true"))?;
        let max_write_retries = var("MAX_WRITE_RETRIES", &DEFAULT_MAX_WRITE_RETRIES.to_string())
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("MAX_WRITE_RETRIES is invalid: {}", e))?;

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
            },
            database,
            jwt: JwtConfig {
                secret: jwt_secret,
                issuer: var("JWT_ISSUER", "teamtask"),
            },
            tasks: TaskConfig {
                auto_finalize,
                max_write_retries,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Service behavior derived from this configuration
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            auto_finalize: self.tasks.auto_finalize,
            max_write_retries: self.tasks.max_write_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(config.database.is_none());
        assert_eq!(config.jwt.issuer, "teamtask");
        assert_eq!(config.service_config(), ServiceConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "3000"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("DATABASE_URL", "postgresql://localhost/teamtask"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("AUTO_FINALIZE", "false"),
            ("MAX_WRITE_RETRIES", "9"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.api.cors_origins.len(), 2);
        assert_eq!(config.database.unwrap().max_connections, 4);
        assert!(!config.tasks.auto_finalize);
        assert_eq!(config.tasks.max_write_retries, 9);
    }

    #[test]
    fn test_jwt_secret_required() {
        assert!(load(&[]).is_err());
        assert!(load(&[("JWT_SECRET", "short")]).is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[("JWT_SECRET", SECRET), ("API_PORT", "http")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("AUTO_FINALIZE", "maybe")]).is_err());
    }
}
