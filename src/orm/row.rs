//! Conversion between rows and records

use super::mapping::MappedField;
use super::record::Record;
use crate::core::error::Result;
use crate::core::value::{DatabaseRow, DatabaseValue};

/// Find `column` in `row`, falling back to a case-insensitive match
///
/// PostgreSQL folds unquoted identifiers to lower case, so `Id` comes back as
/// `id`.
pub fn lookup<'a>(row: &'a DatabaseRow, column: &str) -> Option<&'a DatabaseValue> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

/// Build a record from one result row
///
/// Writable fields whose column is absent keep their default; null columns
/// set the field's zero value.
///
/// # Errors
///
/// Returns [`DatabaseError::Mapping`](crate::core::DatabaseError::Mapping)
/// when a column value cannot be converted to its field's type.
pub fn map_row<T: Record>(row: &DatabaseRow, fields: &[MappedField<T>]) -> Result<T> {
    let mut record = T::default();
    for mapped in fields.iter().filter(|m| m.field.writable()) {
        if let Some(value) = lookup(row, &mapped.column) {
            mapped.field.write(&mut record, value)?;
        }
    }
    Ok(record)
}

/// Map every row of a result set
pub fn map_rows<T: Record>(rows: &[DatabaseRow], fields: &[MappedField<T>]) -> Result<Vec<T>> {
    rows.iter().map(|row| map_row(row, fields)).collect()
}

/// Column/value pairs for every readable field, in declaration order
pub fn bind_parameters<T: Record>(
    record: &T,
    fields: &[MappedField<T>],
) -> Vec<(String, DatabaseValue)> {
    fields
        .iter()
        .filter_map(|mapped| {
            mapped
                .field
                .read(record)
                .map(|value| (mapped.column.clone(), value))
        })
        .collect()
}

/// Like [`bind_parameters`], but auto-increment fields still holding their
/// zero value bind null so the database assigns them
pub fn bind_insert_parameters<T: Record>(
    record: &T,
    fields: &[MappedField<T>],
) -> Vec<(String, DatabaseValue)> {
    fields
        .iter()
        .filter_map(|mapped| {
            let value = mapped.field.read(record)?;
            if mapped.field.auto_increment && mapped.field.awaiting_generation(record) {
                Some((mapped.column.clone(), DatabaseValue::Null))
            } else {
                Some((mapped.column.clone(), value))
            }
        })
        .collect()
}
