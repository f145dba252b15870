//! SQL statement builders
//!
//! Builders for the four statement shapes the mapper emits. Table and column
//! names come from registered record metadata and are concatenated into the
//! text after validation; every value is bound through a named placeholder.
//! Building fails with [`DatabaseError::SqlSynthesis`] instead of producing
//! text with a dangling separator when a clause would be empty.

use super::error::{DatabaseError, Result};
use super::statement::{Param, Statement};
use super::value::DatabaseValue;
use std::collections::HashSet;

/// Suffix that keeps key placeholders apart from SET placeholders
pub const KEY_PLACEHOLDER_SUFFIX: &str = "_cond";

/// Check that `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`)
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DatabaseError::synthesis(format!(
            "'{}' is not a valid SQL identifier",
            name
        )))
    }
}

/// Check a table name; schema-qualified names (`schema.table`) are allowed
pub fn validate_table_name(name: &str) -> Result<()> {
    name.split('.').try_for_each(validate_identifier)
}

fn append_filter(sql: &mut String, filter: Option<&str>) {
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        sql.push(' ');
        sql.push_str(filter);
    }
}

/// Hands out placeholder names that are unique within one statement
#[derive(Debug, Default)]
struct PlaceholderNames {
    used: HashSet<String>,
}

impl PlaceholderNames {
    fn claim(&mut self, base: &str, suffix: &str) -> String {
        let mut candidate = base.to_string();
        while self.used.contains(&candidate) {
            candidate.push_str(suffix);
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

/// Render `col = @placeholder` predicates for the key columns
fn key_predicates(
    keys: &[(String, DatabaseValue)],
    names: &mut PlaceholderNames,
    params: &mut Vec<Param>,
) -> Result<String> {
    let mut predicates = Vec::with_capacity(keys.len());
    for (column, value) in keys {
        validate_identifier(column)?;
        let placeholder = names.claim(
            &format!("{}{}", column, KEY_PLACEHOLDER_SUFFIX),
            KEY_PLACEHOLDER_SUFFIX,
        );
        predicates.push(format!("{} = @{}", column, placeholder));
        params.push(Param::new(placeholder, value.clone()));
    }
    Ok(predicates.join(" AND "))
}

/// SELECT statement builder
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<String>,
    filter: Option<String>,
}

impl SelectBuilder {
    /// Create a new SELECT builder
    ///
    /// # Example
    ///
    /// ```
    /// use rust_record_mapper::core::query_builder::SelectBuilder;
    ///
    /// let stmt = SelectBuilder::new("User")
    ///     .filter("WHERE Email = 'alice@x.com'")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(stmt.sql(), "SELECT * FROM User WHERE Email = 'alice@x.com'");
    /// ```
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: None,
        }
    }

    /// Select specific columns instead of `*`
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Append a caller-supplied clause such as `WHERE x > 1`
    ///
    /// The fragment is used verbatim and is not parameterized.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Build the statement
    pub fn build(&self) -> Result<Statement> {
        validate_table_name(&self.table)?;
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            for column in &self.columns {
                validate_identifier(column)?;
            }
            self.columns.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, self.table);
        append_filter(&mut sql, self.filter.as_deref());
        Ok(Statement::new(sql))
    }
}

/// INSERT statement builder
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    values: Vec<(String, DatabaseValue)>,
}

impl InsertBuilder {
    /// Create a new INSERT builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Add a column-value pair
    #[must_use]
    pub fn value(mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    /// Build the statement; at least one column is required
    pub fn build(&self) -> Result<Statement> {
        validate_table_name(&self.table)?;
        if self.values.is_empty() {
            return Err(DatabaseError::synthesis(format!(
                "INSERT INTO {} has no columns",
                self.table
            )));
        }

        let mut names = PlaceholderNames::default();
        let mut columns = Vec::with_capacity(self.values.len());
        let mut placeholders = Vec::with_capacity(self.values.len());
        let mut params = Vec::with_capacity(self.values.len());

        for (column, value) in &self.values {
            validate_identifier(column)?;
            let placeholder = names.claim(column, "_");
            columns.push(column.as_str());
            placeholders.push(format!("@{}", placeholder));
            params.push(Param::new(placeholder, value.clone()));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(Statement::with_params(sql, params))
    }
}

/// UPDATE statement builder
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    set_values: Vec<(String, DatabaseValue)>,
    keys: Vec<(String, DatabaseValue)>,
}

impl UpdateBuilder {
    /// Create a new UPDATE builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set_values: Vec::new(),
            keys: Vec::new(),
        }
    }

    /// Set a column value
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.set_values.push((column.into(), value.into()));
        self
    }

    /// Add a key equality predicate to the WHERE clause
    #[must_use]
    pub fn where_key(mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.keys.push((column.into(), value.into()));
        self
    }

    /// Build the statement
    ///
    /// Both the SET list and the key list must be non-empty: an UPDATE
    /// without keys would rewrite every row.
    pub fn build(&self) -> Result<Statement> {
        validate_table_name(&self.table)?;
        if self.set_values.is_empty() {
            return Err(DatabaseError::synthesis(format!(
                "UPDATE {} has no non-key columns to set",
                self.table
            )));
        }
        if self.keys.is_empty() {
            return Err(DatabaseError::synthesis(format!(
                "UPDATE {} has no key columns to match",
                self.table
            )));
        }

        let mut names = PlaceholderNames::default();
        let mut params = Vec::with_capacity(self.set_values.len() + self.keys.len());
        let mut assignments = Vec::with_capacity(self.set_values.len());

        for (column, value) in &self.set_values {
            validate_identifier(column)?;
            let placeholder = names.claim(column, "_");
            assignments.push(format!("{} = @{}", column, placeholder));
            params.push(Param::new(placeholder, value.clone()));
        }
        let predicates = key_predicates(&self.keys, &mut names, &mut params)?;

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table,
            assignments.join(", "),
            predicates
        );
        Ok(Statement::with_params(sql, params))
    }
}

/// DELETE statement builder
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    keys: Vec<(String, DatabaseValue)>,
    filter: Option<String>,
    all_rows: bool,
}

impl DeleteBuilder {
    /// Create a DELETE builder that matches rows by key
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            keys: Vec::new(),
            filter: None,
            all_rows: false,
        }
    }

    /// Create a DELETE builder without key predicates
    ///
    /// Without a [`DeleteBuilder::filter`] the statement deletes every row in
    /// the table.
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            all_rows: true,
            ..Self::new(table)
        }
    }

    /// Add a key equality predicate to the WHERE clause
    #[must_use]
    pub fn where_key(mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.keys.push((column.into(), value.into()));
        self
    }

    /// Append a caller-supplied clause (delete-all only)
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Build the statement
    pub fn build(&self) -> Result<Statement> {
        validate_table_name(&self.table)?;
        let mut sql = format!("DELETE FROM {}", self.table);

        if self.all_rows {
            if !self.keys.is_empty() {
                return Err(DatabaseError::synthesis(
                    "delete-all statements take a filter, not key predicates",
                ));
            }
            append_filter(&mut sql, self.filter.as_deref());
            return Ok(Statement::new(sql));
        }

        if self.keys.is_empty() {
            return Err(DatabaseError::synthesis(format!(
                "DELETE FROM {} has no key columns to match",
                self.table
            )));
        }
        if self.filter.is_some() {
            return Err(DatabaseError::synthesis(
                "key-matched deletes do not take a filter",
            ));
        }

        let mut names = PlaceholderNames::default();
        let mut params = Vec::with_capacity(self.keys.len());
        let predicates = key_predicates(&self.keys, &mut names, &mut params)?;
        sql.push_str(" WHERE ");
        sql.push_str(&predicates);
        Ok(Statement::with_params(sql, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_basic() {
        let stmt = SelectBuilder::new("User").build().unwrap();
        assert_eq!(stmt.sql(), "SELECT * FROM User");
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_select_columns_and_filter() {
        let stmt = SelectBuilder::new("User")
            .columns(&["Id", "Name"])
            .filter("  WHERE Id > 1  ")
            .build()
            .unwrap();
        assert_eq!(stmt.sql(), "SELECT Id, Name FROM User WHERE Id > 1");

        let stmt = SelectBuilder::new("User").filter("   ").build().unwrap();
        assert_eq!(stmt.sql(), "SELECT * FROM User");
    }

    #[test]
    fn test_insert() {
        let stmt = InsertBuilder::new("User")
            .value("Id", DatabaseValue::Null)
            .value("Name", "Alice")
            .value("Email", "alice@x.com")
            .build()
            .unwrap();

        assert_eq!(
            stmt.sql(),
            "INSERT INTO User (Id, Name, Email) VALUES (@Id, @Name, @Email)"
        );
        assert_eq!(stmt.params().len(), 3);
        assert_eq!(stmt.param("Id"), Some(&DatabaseValue::Null));
    }

    #[test]
    fn test_insert_without_columns_is_rejected() {
        let err = InsertBuilder::new("User").build().unwrap_err();
        assert!(err.is_synthesis());
    }

    #[test]
    fn test_update() {
        let stmt = UpdateBuilder::new("User")
            .set("Name", "Bob")
            .set("Email", DatabaseValue::Null)
            .where_key("Id", 1)
            .build()
            .unwrap();

        assert_eq!(
            stmt.sql(),
            "UPDATE User SET Name = @Name, Email = @Email WHERE Id = @Id_cond"
        );
        let names: Vec<&str> = stmt.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Email", "Id_cond"]);
    }

    #[test]
    fn test_update_key_placeholder_never_collides() {
        let stmt = UpdateBuilder::new("T")
            .set("Id_cond", 5)
            .where_key("Id", 1)
            .build()
            .unwrap();
        assert_eq!(
            stmt.sql(),
            "UPDATE T SET Id_cond = @Id_cond WHERE Id = @Id_cond_cond"
        );
        assert_eq!(stmt.param("Id_cond_cond"), Some(&DatabaseValue::Int(1)));
    }

    #[test]
    fn test_update_rejects_empty_clauses() {
        let no_set = UpdateBuilder::new("User").where_key("Id", 1).build();
        assert!(no_set.unwrap_err().is_synthesis());

        let no_keys = UpdateBuilder::new("User").set("Name", "Bob").build();
        assert!(no_keys.unwrap_err().is_synthesis());
    }

    #[test]
    fn test_delete_by_composite_key() {
        let stmt = DeleteBuilder::new("OrderLine")
            .where_key("OrderId", 7)
            .where_key("Line", 2)
            .build()
            .unwrap();

        assert_eq!(
            stmt.sql(),
            "DELETE FROM OrderLine WHERE OrderId = @OrderId_cond AND Line = @Line_cond"
        );
        assert_eq!(stmt.params().len(), 2);
    }

    #[test]
    fn test_delete_without_keys_is_rejected() {
        let err = DeleteBuilder::new("User").build().unwrap_err();
        assert!(err.is_synthesis());
    }

    #[test]
    fn test_delete_all() {
        let stmt = DeleteBuilder::all("User").build().unwrap();
        assert_eq!(stmt.sql(), "DELETE FROM User");

        let stmt = DeleteBuilder::all("User")
            .filter("WHERE Name LIKE 'tmp%'")
            .build()
            .unwrap();
        assert_eq!(stmt.sql(), "DELETE FROM User WHERE Name LIKE 'tmp%'");
    }

    #[test]
    fn test_identifiers_are_validated() {
        assert!(validate_table_name("app.users").is_ok());
        assert!(validate_table_name("users; DROP TABLE x").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("").is_err());

        let err = InsertBuilder::new("User")
            .value("Name) VALUES ('x'); --", "y")
            .build()
            .unwrap_err();
        assert!(err.is_synthesis());
    }
}
