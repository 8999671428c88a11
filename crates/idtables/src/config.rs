use std::{env, fmt, str::FromStr};

use thiserror::Error;

/// Rows per partition page requested from any backend.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Errors raised while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown backend '{0}', expected memory, sqlite or dynamodb")]
    UnknownBackend(String),
    #[error("backend '{0}' is not compiled in, rebuild with the '{1}' feature")]
    BackendNotCompiled(Backend, &'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Table store backend selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Memory,
    Sqlite,
    DynamoDb,
}

impl Backend {
    /// Cargo feature that compiles this backend in.
    pub fn feature(self) -> &'static str {
        match self {
            Self::Memory => "inmemory",
            Self::Sqlite => "sqlite",
            Self::DynamoDb => "dynamodb",
        }
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "dynamodb" => Ok(Self::DynamoDb),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::DynamoDb => "dynamodb",
        })
    }
}

/// Configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Table store backend (default: memory)
    pub backend: Backend,
    /// Prefix prepended to every logical table name (default: empty)
    pub table_prefix: String,
    /// Rows per partition page for every backend (default: 1000)
    pub page_size: usize,
    /// Path to SQLite database file (default: "idtables.db")
    pub sqlite_path: String,
    /// DynamoDB endpoint override, e.g. a local emulator
    pub aws_endpoint_url: Option<String>,
    /// AWS region (default: "us-east-1")
    pub aws_region: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `IDTABLES_BACKEND` - memory, sqlite or dynamodb (default: memory)
    /// - `IDTABLES_TABLE_PREFIX` - table name prefix (default: empty)
    /// - `IDTABLES_PAGE_SIZE` - partition page size (default: 1000)
    /// - `SQLITE_PATH` - SQLite database path (default: "idtables.db")
    /// - `AWS_ENDPOINT_URL` - DynamoDB endpoint override (default: unset)
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("IDTABLES_BACKEND") {
            Some(value) => value.parse()?,
            None => Backend::default(),
        };

        let page_size = match lookup("IDTABLES_PAGE_SIZE") {
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "IDTABLES_PAGE_SIZE",
                    value,
                })?,
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            backend,
            table_prefix: lookup("IDTABLES_TABLE_PREFIX").unwrap_or_default(),
            page_size,
            sqlite_path: lookup("SQLITE_PATH").unwrap_or_else(|| "idtables.db".to_string()),
            aws_endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|url| !url.is_empty()),
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            table_prefix: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            sqlite_path: "idtables.db".to_string(),
            aws_endpoint_url: None,
            aws_region: "us-east-1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.sqlite_path, "idtables.db");
        assert_eq!(config.aws_region, "us-east-1");
        assert!(config.aws_endpoint_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("IDTABLES_BACKEND", "SQLite"),
            ("IDTABLES_TABLE_PREFIX", "staging"),
            ("IDTABLES_PAGE_SIZE", "25"),
            ("SQLITE_PATH", "/tmp/id.db"),
            ("AWS_ENDPOINT_URL", "http://localhost:8000"),
        ])
        .unwrap();

        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.table_prefix, "staging");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.sqlite_path, "/tmp/id.db");
        assert_eq!(
            config.aws_endpoint_url.as_deref(),
            Some("http://localhost:8000")
        );
    }

    #[test]
    fn test_unknown_backend() {
        let err = config_from(&[("IDTABLES_BACKEND", "postgres")]).unwrap_err();
        assert_eq!(err, ConfigError::UnknownBackend("postgres".to_string()));
        assert_eq!(
            err.to_string(),
            "unknown backend 'postgres', expected memory, sqlite or dynamodb"
        );
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let err = config_from(&[("IDTABLES_PAGE_SIZE", "0")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "IDTABLES_PAGE_SIZE",
                value: "0".to_string()
            }
        );
    }

    #[test]
    fn test_backend_display_round_trips() {
        for backend in [Backend::Memory, Backend::Sqlite, Backend::DynamoDb] {
            assert_eq!(backend.to_string().parse::<Backend>().unwrap(), backend);
        }
    }
}
