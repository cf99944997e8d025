use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;

/// Environment variables start with this prefix, e.g. `SALESAPI_DB_HOST`.
pub const ENV_PREFIX: &str = "SALESAPI_";

const ENV_REFERENCE: &str = "\
Configuration (environment variables):
  SALESAPI_DB_USER         database user (default \"postgres\")
  SALESAPI_DB_PASSWORD     database password (default \"postgres\")
  SALESAPI_DB_HOST         database host (default \"localhost\")
  SALESAPI_DB_NAME         database name (default \"postgres\")
  SALESAPI_DB_DISABLE_TLS  disable TLS for the database connection (default \"false\")
  SALESAPI_HTTP_ADDRESS    HTTP listen address (default \":7070\")";

#[derive(Parser, Debug)]
#[command(
    name = "salesapi",
    about = "This daemon is a service which manages products.",
    after_help = ENV_REFERENCE
)]
pub struct Args {
    /// Only show the parsed configuration and exit.
    #[arg(long)]
    pub config_only: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("parsing {key}: invalid value {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("enabling tls for database connections is not yet supported")]
    TlsNotSupported,
}

// NOTE: No aceptamos un connection string completo; la aplicación asume
//       ciertos parámetros fijos (ver products::connect).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbConfig {
    #[serde(rename = "User")]
    pub user: String,
    // Prevent the marshalling of secrets.
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "DisableTLS")]
    pub disable_tls: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpConfig {
    #[serde(rename = "Address")]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    #[serde(rename = "DB")]
    pub db: DbConfig,
    #[serde(rename = "HTTP")]
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig {
                user: "postgres".to_string(),
                password: "postgres".to_string(),
                host: "localhost".to_string(),
                name: "postgres".to_string(),
                disable_tls: false,
            },
            http: HttpConfig {
                address: ":7070".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Builds a configuration from an environment snapshot. Keys without the
    /// application prefix are ignored; unset keys keep their defaults.
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| k.strip_prefix(ENV_PREFIX).map(|k| (k.to_string(), v)))
            .collect();

        let mut cfg = Config::default();
        if let Some(v) = vars.get("DB_USER") {
            cfg.db.user = v.clone();
        }
        if let Some(v) = vars.get("DB_PASSWORD") {
            cfg.db.password = v.clone();
        }
        if let Some(v) = vars.get("DB_HOST") {
            cfg.db.host = v.clone();
        }
        if let Some(v) = vars.get("DB_NAME") {
            cfg.db.name = v.clone();
        }
        if let Some(v) = vars.get("DB_DISABLE_TLS") {
            cfg.db.disable_tls = parse_bool("DB_DISABLE_TLS", v)?;
        }
        if let Some(v) = vars.get("HTTP_ADDRESS") {
            cfg.http.address = v.clone();
        }

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.db.disable_tls {
            return Err(ConfigError::TlsNotSupported);
        }

        Ok(())
    }
}

impl DbConfig {
    /// SSL mode derived from `disable_tls`. The non-disable token is
    /// `"require"`, the spelling the Postgres driver accepts.
    pub fn ssl_mode(&self) -> &'static str {
        if self.disable_tls {
            "disable"
        } else {
            "require"
        }
    }
}

impl HttpConfig {
    /// Bind address for the listener. A bare `:port` address listens on all
    /// interfaces.
    pub fn listen_addr(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "t" | "true" | "True" | "TRUE" => Ok(true),
        "0" | "f" | "false" | "False" | "FALSE" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
