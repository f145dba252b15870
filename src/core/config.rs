//! Connection configuration
//!
//! Connection settings are read from a flat JSON object such as
//!
//! ```json
//! {
//!     "driver": "postgres",
//!     "host": "localhost",
//!     "port": 5432,
//!     "user": "app",
//!     "password": "secret",
//!     "database": "inventory"
//! }
//! ```
//!
//! `host`, `port`, `user`, `password` and `database` are required; a missing
//! key fails construction. `driver` is optional and defaults to `postgres`.

use super::database::ConnectionBuilder;
use super::database_types::DatabaseType;
use super::error::{DatabaseError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Driver used when the configuration does not name one
pub const DEFAULT_DRIVER: DatabaseType = DatabaseType::Postgres;

/// Key/value configuration backed by a JSON object
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    values: Map<String, Value>,
}

impl JsonConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse configuration from JSON text; the top level must be an object
    pub fn from_json(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(values) => Ok(Self { values }),
            other => Err(DatabaseError::configuration(
                "<root>",
                format!("expected a JSON object, found {}", json_kind(&other)),
            )),
        }
    }

    /// Value of `key` as text
    ///
    /// Strings are returned as-is; numbers and booleans are formatted. Nulls,
    /// arrays and objects count as absent.
    pub fn get_value(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn require(&self, key: &str) -> Result<String> {
        self.get_value(key)
            .ok_or_else(|| DatabaseError::configuration(key, "missing required setting"))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validated settings for opening a database connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_driver")]
    pub driver: DatabaseType,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

fn default_driver() -> DatabaseType {
    DEFAULT_DRIVER
}

impl ConnectionSettings {
    /// Build settings from a configuration source
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Configuration`] naming the first missing or
    /// malformed key.
    pub fn from_config(config: &JsonConfig) -> Result<Self> {
        let host = config.require("host")?;
        let port = config.require("port")?;
        let user = config.require("user")?;
        let password = config.require("password")?;
        let database = config.require("database")?;

        let port = port.trim().parse::<u16>().map_err(|_| {
            DatabaseError::configuration("port", format!("'{}' is not a valid port", port))
        })?;

        let driver = match config.get_value("driver") {
            Some(name) => name
                .parse::<DatabaseType>()
                .map_err(|e| DatabaseError::configuration("driver", e))?,
            None => DEFAULT_DRIVER,
        };

        Ok(Self {
            driver,
            host,
            port,
            user,
            password,
            database,
        })
    }

    /// Load and validate settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&JsonConfig::from_file(path)?)
    }

    /// Connection builder pre-filled with these settings
    pub fn builder(&self) -> ConnectionBuilder {
        ConnectionBuilder::new(self.driver)
            .host(self.host.clone())
            .port(self.port)
            .username(self.user.clone())
            .password(self.password.clone())
            .database(self.database.clone())
    }

    /// Connection string for the configured driver
    pub fn connection_string(&self) -> String {
        self.builder().build_connection_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"{
        "host": "db.internal",
        "port": 5433,
        "user": "app",
        "password": "secret",
        "database": "inventory"
    }"#;

    #[test]
    fn test_get_value_formats_scalars() {
        let config = JsonConfig::from_json(r#"{"a": "x", "b": 7, "c": true, "d": null}"#)
            .expect("valid json");
        assert_eq!(config.get_value("a").as_deref(), Some("x"));
        assert_eq!(config.get_value("b").as_deref(), Some("7"));
        assert_eq!(config.get_value("c").as_deref(), Some("true"));
        assert_eq!(config.get_value("d"), None);
        assert_eq!(config.get_value("missing"), None);
    }

    #[test]
    fn test_settings_from_config() {
        let config = JsonConfig::from_json(FULL).expect("valid json");
        let settings = ConnectionSettings::from_config(&config).expect("complete settings");

        assert_eq!(settings.driver, DatabaseType::Postgres);
        assert_eq!(settings.port, 5433);
        assert_eq!(
            settings.connection_string(),
            "host=db.internal port=5433 dbname=inventory user=app password=secret"
        );
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let config = JsonConfig::from_json(
            r#"{"host": "h", "port": "1", "user": "u", "database": "d"}"#,
        )
        .expect("valid json");

        match ConnectionSettings::from_config(&config) {
            Err(DatabaseError::Configuration { key, .. }) => assert_eq!(key, "password"),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_port_and_driver() {
        let config = JsonConfig::from_json(
            r#"{"host": "h", "port": "http", "user": "u", "password": "p", "database": "d"}"#,
        )
        .expect("valid json");
        assert!(matches!(
            ConnectionSettings::from_config(&config),
            Err(DatabaseError::Configuration { ref key, .. }) if key == "port"
        ));

        let config = JsonConfig::from_json(
            r#"{"driver": "oracle", "host": "h", "port": 1, "user": "u", "password": "p", "database": "d"}"#,
        )
        .expect("valid json");
        assert!(matches!(
            ConnectionSettings::from_config(&config),
            Err(DatabaseError::Configuration { ref key, .. }) if key == "driver"
        ));
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        assert!(matches!(
            JsonConfig::from_json("[1, 2]"),
            Err(DatabaseError::Configuration { .. })
        ));
        assert!(matches!(
            JsonConfig::from_json("{ not json"),
            Err(DatabaseError::JsonError(_))
        ));
    }

    #[test]
    fn test_from_file_sqlite_driver() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"driver": "sqlite", "host": "-", "port": 0, "user": "-", "password": "", "database": "app.db"}}"#
        )
        .expect("write config");

        let settings = ConnectionSettings::from_file(file.path()).expect("settings");
        assert_eq!(settings.driver, DatabaseType::Sqlite);
        assert_eq!(settings.connection_string(), "app.db");
    }
}
