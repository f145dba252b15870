//! Statement synthesis for record operations
//!
//! Turns a record, its mapped fields and the table's key columns into the
//! [`Statement`] the mapper executes. Nothing here touches a connection.

use super::mapping::MappedField;
use super::record::Record;
use super::row::{bind_insert_parameters, bind_parameters};
use crate::core::error::{DatabaseError, Result};
use crate::core::query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
use crate::core::statement::Statement;
use crate::core::value::DatabaseValue;

/// Caller-supplied overrides for select and delete-all
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    filter: Option<String>,
    sql: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clause appended after the table name, e.g. `WHERE Active = 1`
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Complete SELECT text to run instead of the synthesized one
    #[must_use]
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn filter_text(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn raw_sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }
}

fn is_key(column: &str, keys: &[String]) -> bool {
    keys.iter().any(|k| k.eq_ignore_ascii_case(column))
}

/// Value of the field mapped to key column `key`
fn key_value<T: Record>(
    record: &T,
    fields: &[MappedField<T>],
    key: &str,
) -> Result<(String, DatabaseValue)> {
    fields
        .iter()
        .find(|m| m.column.eq_ignore_ascii_case(key))
        .and_then(|m| m.field.read(record).map(|value| (m.column.clone(), value)))
        .ok_or_else(|| {
            DatabaseError::synthesis(format!(
                "{} has no readable field for key column '{}'",
                T::type_name(),
                key
            ))
        })
}

/// `SELECT * FROM table [filter]`, or the raw override verbatim
pub fn select_statement(table: &str, options: &QueryOptions) -> Result<Statement> {
    if let Some(sql) = options.raw_sql() {
        return Ok(Statement::new(sql));
    }
    let mut builder = SelectBuilder::new(table);
    if let Some(filter) = options.filter_text() {
        builder = builder.filter(filter);
    }
    builder.build()
}

/// INSERT binding every readable field
pub fn insert_statement<T: Record>(
    table: &str,
    fields: &[MappedField<T>],
    record: &T,
) -> Result<Statement> {
    bind_insert_parameters(record, fields)
        .into_iter()
        .fold(InsertBuilder::new(table), |builder, (column, value)| {
            builder.value(column, value)
        })
        .build()
}

/// UPDATE setting every non-key field, matched on every key column
///
/// # Errors
///
/// Fails when the table has no key columns, when every field is a key, or
/// when a key column has no matching field.
pub fn update_statement<T: Record>(
    table: &str,
    fields: &[MappedField<T>],
    keys: &[String],
    record: &T,
) -> Result<Statement> {
    if keys.is_empty() {
        return Err(DatabaseError::synthesis(format!(
            "cannot update {}: table {} has no primary key",
            T::type_name(),
            table
        )));
    }

    let mut builder = UpdateBuilder::new(table);
    for (column, value) in bind_parameters(record, fields) {
        if !is_key(&column, keys) {
            builder = builder.set(column, value);
        }
    }
    for key in keys {
        let (column, value) = key_value(record, fields, key)?;
        builder = builder.where_key(column, value);
    }
    builder.build()
}

/// DELETE matched on every key column
pub fn delete_statement<T: Record>(
    table: &str,
    fields: &[MappedField<T>],
    keys: &[String],
    record: &T,
) -> Result<Statement> {
    if keys.is_empty() {
        return Err(DatabaseError::synthesis(format!(
            "cannot delete {}: table {} has no primary key",
            T::type_name(),
            table
        )));
    }

    let mut builder = DeleteBuilder::new(table);
    for key in keys {
        let (column, value) = key_value(record, fields, key)?;
        builder = builder.where_key(column, value);
    }
    builder.build()
}

/// `DELETE FROM table [filter]`
pub fn delete_all_statement(table: &str, options: &QueryOptions) -> Result<Statement> {
    if options.raw_sql().is_some() {
        return Err(DatabaseError::synthesis(
            "raw SQL overrides apply to select only",
        ));
    }
    let mut builder = DeleteBuilder::all(table);
    if let Some(filter) = options.filter_text() {
        builder = builder.filter(filter);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PlaceholderStyle;
    use crate::orm::mapping::MappingRegistry;

    crate::record! {
        struct User {
            #[auto]
            Id: i64,
            Name: String,
            Email: String,
        }
    }

    crate::record! {
        struct OrderLine {
            OrderId: i64,
            Line: i32,
            Sku: String,
        }
    }

    crate::record! {
        struct Tag {
            Id: i64,
        }
    }

    fn user() -> User {
        User {
            Id: 5,
            Name: "Bob".to_string(),
            Email: "bob@x.com".to_string(),
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_update_statement_shape() {
        let fields = MappingRegistry::new().columns::<User>();
        let stmt = update_statement("User", &fields, &keys(&["Id"]), &user()).unwrap();

        assert_eq!(
            stmt.sql(),
            "UPDATE User SET Name = @Name, Email = @Email WHERE Id = @Id_cond"
        );
        assert_eq!(stmt.param("Id_cond"), Some(&DatabaseValue::Long(5)));
        assert_eq!(stmt.param("Name"), Some(&DatabaseValue::from("Bob")));
    }

    #[test]
    fn test_update_matches_keys_case_insensitively() {
        let fields = MappingRegistry::new().columns::<User>();
        let stmt = update_statement("User", &fields, &keys(&["id"]), &user()).unwrap();
        assert_eq!(
            stmt.sql(),
            "UPDATE User SET Name = @Name, Email = @Email WHERE Id = @Id_cond"
        );
    }

    #[test]
    fn test_composite_keys() {
        let fields = MappingRegistry::new().columns::<OrderLine>();
        let line = OrderLine {
            OrderId: 10,
            Line: 2,
            Sku: "A-1".to_string(),
        };
        let keys = keys(&["OrderId", "Line"]);

        let update = update_statement("OrderLine", &fields, &keys, &line).unwrap();
        assert_eq!(
            update.sql(),
            "UPDATE OrderLine SET Sku = @Sku WHERE OrderId = @OrderId_cond AND Line = @Line_cond"
        );

        let delete = delete_statement("OrderLine", &fields, &keys, &line).unwrap();
        assert_eq!(
            delete.sql(),
            "DELETE FROM OrderLine WHERE OrderId = @OrderId_cond AND Line = @Line_cond"
        );
    }

    #[test]
    fn test_update_without_keys_or_non_key_fields_is_rejected() {
        let fields = MappingRegistry::new().columns::<User>();
        let err = update_statement("User", &fields, &[], &user()).unwrap_err();
        assert!(err.is_synthesis());

        let tag_fields = MappingRegistry::new().columns::<Tag>();
        let err = update_statement("Tag", &tag_fields, &keys(&["Id"]), &Tag { Id: 1 })
            .unwrap_err();
        assert!(err.is_synthesis());
    }

    #[test]
    fn test_key_without_matching_field_is_rejected() {
        let fields = MappingRegistry::new().columns::<User>();
        let err = delete_statement("User", &fields, &keys(&["Uuid"]), &user()).unwrap_err();
        assert!(err.is_synthesis());
    }

    #[test]
    fn test_insert_binds_null_for_unassigned_auto_increment() {
        let fields = MappingRegistry::new().columns::<User>();
        let fresh = User {
            Id: 0,
            ..user()
        };
        let stmt = insert_statement("User", &fields, &fresh).unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO User (Id, Name, Email) VALUES (@Id, @Name, @Email)"
        );
        assert_eq!(stmt.param("Id"), Some(&DatabaseValue::Null));
    }

    #[test]
    fn test_select_and_delete_all() {
        let plain = select_statement("User", &QueryOptions::new()).unwrap();
        assert_eq!(plain.sql(), "SELECT * FROM User");

        let filtered =
            select_statement("User", &QueryOptions::new().filter("WHERE Name = 'Bob'")).unwrap();
        assert_eq!(filtered.sql(), "SELECT * FROM User WHERE Name = 'Bob'");

        let raw = select_statement(
            "User",
            &QueryOptions::new().sql("SELECT Id FROM User ORDER BY Id"),
        )
        .unwrap();
        assert_eq!(raw.sql(), "SELECT Id FROM User ORDER BY Id");

        let all = delete_all_statement("User", &QueryOptions::new()).unwrap();
        assert_eq!(all.sql(), "DELETE FROM User");

        let err = delete_all_statement("User", &QueryOptions::new().sql("DELETE FROM User"))
            .unwrap_err();
        assert!(err.is_synthesis());
    }

    #[test]
    fn test_renders_for_each_backend_style() {
        let fields = MappingRegistry::new().columns::<User>();
        let stmt = update_statement("User", &fields, &keys(&["Id"]), &user()).unwrap();

        let (sql, values) = stmt.render(PlaceholderStyle::Dollar).unwrap();
        assert_eq!(sql, "UPDATE User SET Name = $1, Email = $2 WHERE Id = $3");
        assert_eq!(values.len(), 3);
        assert_eq!(values[2], DatabaseValue::Long(5));
    }
}
