//! Database type definitions
//!
//! This module defines the database kinds the mapper can talk to and the
//! dialect details that differ between them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
#[derive(Default)]
pub enum DatabaseType {
    /// No database type specified
    #[default]
    None = 0,
    /// PostgreSQL database
    Postgres = 1,
    /// SQLite database
    Sqlite = 3,
}

/// How bound parameters are written in statement text sent to a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderStyle {
    /// `@name`, one bound value per distinct name (SQLite)
    Named,
    /// `?`, one bound value per occurrence
    Question,
    /// `$1`, `$2`, numbered by first appearance of each name (PostgreSQL)
    Dollar,
}

impl DatabaseType {
    /// Convert database type to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            DatabaseType::None => "none",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Sqlite => "sqlite",
        }
    }

    /// Check if this database type is SQL-based
    pub fn is_sql(&self) -> bool {
        !matches!(self, DatabaseType::None)
    }

    /// Parameter syntax understood by this database
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            DatabaseType::Postgres => PlaceholderStyle::Dollar,
            DatabaseType::Sqlite | DatabaseType::None => PlaceholderStyle::Named,
        }
    }

    /// Port a server of this type listens on by default
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DatabaseType::Postgres => Some(5432),
            DatabaseType::Sqlite | DatabaseType::None => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(DatabaseType::None),
            "postgres" | "postgresql" => Ok(DatabaseType::Postgres),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            _ => Err(format!("Invalid database type: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_str() {
        assert_eq!(
            "postgresql".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Postgres)
        );
        assert_eq!(
            "SQLite3".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Sqlite)
        );
        assert_eq!("mysql".parse::<DatabaseType>().ok(), None);
        assert_eq!("oracle".parse::<DatabaseType>().ok(), None);
    }

    #[test]
    fn test_placeholder_styles() {
        assert_eq!(
            DatabaseType::Sqlite.placeholder_style(),
            PlaceholderStyle::Named
        );
        assert_eq!(
            DatabaseType::Postgres.placeholder_style(),
            PlaceholderStyle::Dollar
        );
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(DatabaseType::Postgres.default_port(), Some(5432));
        assert_eq!(DatabaseType::Sqlite.default_port(), None);
        assert!(!DatabaseType::None.is_sql());
    }
}
