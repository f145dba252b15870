//! Table and column name resolution
//!
//! By default a record maps to the table named after its type and each field
//! to the column of the same name. [`MappingRegistry`] holds per-type
//! overrides; [`PrimaryKeyCache`] remembers the key columns discovered for a
//! table so batches after the first skip the catalog lookup.

use super::record::{FieldDescriptor, Record};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
struct TypeMapping {
    table: Option<String>,
    columns: HashMap<&'static str, String>,
}

/// A field paired with the column it maps to
#[derive(Debug, Clone)]
pub struct MappedField<T> {
    pub column: String,
    pub field: FieldDescriptor<T>,
}

/// Per-type table and column name overrides
#[derive(Debug, Default)]
pub struct MappingRegistry {
    mappings: RwLock<HashMap<TypeId, TypeMapping>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map records of type `T` to `table` instead of the type name
    pub fn map_table<T: Record>(&self, table: impl Into<String>) {
        self.mappings
            .write()
            .entry(TypeId::of::<T>())
            .or_default()
            .table = Some(table.into());
    }

    /// Map field `field` of `T` to `column` instead of the field name
    pub fn map_column<T: Record>(&self, field: &'static str, column: impl Into<String>) {
        self.mappings
            .write()
            .entry(TypeId::of::<T>())
            .or_default()
            .columns
            .insert(field, column.into());
    }

    /// Table name for `T`
    pub fn table_name<T: Record>(&self) -> String {
        self.mappings
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|m| m.table.clone())
            .unwrap_or_else(|| T::type_name().to_string())
    }

    /// Column name for field `field` of `T`
    pub fn column_name<T: Record>(&self, field: &str) -> String {
        self.mappings
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|m| m.columns.get(field).cloned())
            .unwrap_or_else(|| field.to_string())
    }

    /// Fields of `T` paired with their resolved column names
    pub fn columns<T: Record>(&self) -> Vec<MappedField<T>> {
        let mappings = self.mappings.read();
        let overrides = mappings.get(&TypeId::of::<T>());
        T::fields()
            .into_iter()
            .map(|field| {
                let column = overrides
                    .and_then(|m| m.columns.get(field.name).cloned())
                    .unwrap_or_else(|| field.name.to_string());
                MappedField { column, field }
            })
            .collect()
    }
}

/// Primary key columns discovered per table
#[derive(Debug, Default)]
pub struct PrimaryKeyCache {
    entries: RwLock<HashMap<String, Vec<String>>>,
}

impl PrimaryKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<Vec<String>> {
        self.entries.read().get(table).cloned()
    }

    pub fn insert(&self, table: impl Into<String>, keys: Vec<String>) {
        self.entries.write().insert(table.into(), keys);
    }

    /// Forget the keys of one table, e.g. after its schema changed
    pub fn invalidate(&self, table: &str) -> bool {
        self.entries.write().remove(table).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        struct Invoice {
            Number: i64,
            Total: f64,
        }
    }

    crate::record! {
        struct Customer {
            Name: String,
        }
    }

    #[test]
    fn test_default_names() {
        let registry = MappingRegistry::new();
        assert_eq!(registry.table_name::<Invoice>(), "Invoice");
        assert_eq!(registry.column_name::<Invoice>("Total"), "Total");

        let columns: Vec<String> = registry
            .columns::<Invoice>()
            .into_iter()
            .map(|m| m.column)
            .collect();
        assert_eq!(columns, vec!["Number", "Total"]);
    }

    #[test]
    fn test_overrides_are_per_type() {
        let registry = MappingRegistry::new();
        registry.map_table::<Invoice>("billing.invoices");
        registry.map_column::<Invoice>("Total", "total_amount");

        assert_eq!(registry.table_name::<Invoice>(), "billing.invoices");
        assert_eq!(registry.column_name::<Invoice>("Total"), "total_amount");
        assert_eq!(registry.column_name::<Invoice>("Number"), "Number");
        assert_eq!(registry.table_name::<Customer>(), "Customer");

        let mapped = registry.columns::<Invoice>();
        assert_eq!(mapped[1].field.name, "Total");
        assert_eq!(mapped[1].column, "total_amount");
    }

    #[test]
    fn test_primary_key_cache() {
        let cache = PrimaryKeyCache::new();
        assert!(cache.is_empty());

        cache.insert("User", vec!["Id".to_string()]);
        cache.insert("OrderLine", vec!["OrderId".to_string(), "Line".to_string()]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("User"), Some(vec!["Id".to_string()]));

        assert!(cache.invalidate("User"));
        assert!(!cache.invalidate("User"));
        assert_eq!(cache.get("User"), None);

        cache.clear();
        assert!(cache.is_empty());
    }
}
