//! Record types and their field tables
//!
//! A record type describes itself through [`Record::fields`]: an ordered list
//! of [`FieldDescriptor`]s, each naming one mapped field together with its
//! kind and the accessors used to read it into a [`DatabaseValue`] or write
//! a column value back into it. The [`record!`](crate::record) macro builds
//! that table from a struct definition.

use crate::core::error::{DatabaseError, Result};
use crate::core::value::DatabaseValue;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Semantic kind of a mapped field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer,
    Float,
    Text,
    Boolean,
    DateTime,
    Binary,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Text => "text",
            FieldKind::Boolean => "boolean",
            FieldKind::DateTime => "datetime",
            FieldKind::Binary => "binary",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust type that can be stored in a record field
pub trait FieldValue: Sized + Default {
    const KIND: FieldKind;
    const NULLABLE: bool = false;

    /// Value to bind for this field
    fn to_value(&self) -> DatabaseValue;

    /// Strict conversion from a non-null column value
    fn from_value(value: &DatabaseValue) -> Option<Self>;

    /// Whether the field still holds its zero value
    fn is_unset(&self) -> bool;
}

macro_rules! impl_field_value {
    ($ty:ty, $kind:expr, $convert:expr, $unset:expr) => {
        impl FieldValue for $ty {
            const KIND: FieldKind = $kind;

            fn to_value(&self) -> DatabaseValue {
                DatabaseValue::from(self.clone())
            }

            fn from_value(value: &DatabaseValue) -> Option<Self> {
                $convert(value)
            }

            fn is_unset(&self) -> bool {
                $unset(self)
            }
        }
    };
}

impl_field_value!(i32, FieldKind::Integer, DatabaseValue::as_int, |v: &i32| *v == 0);
impl_field_value!(i64, FieldKind::Integer, DatabaseValue::as_long, |v: &i64| *v == 0);
impl_field_value!(f32, FieldKind::Float, DatabaseValue::as_float, |v: &f32| *v == 0.0);
impl_field_value!(f64, FieldKind::Float, DatabaseValue::as_double, |v: &f64| *v == 0.0);
impl_field_value!(bool, FieldKind::Boolean, DatabaseValue::as_bool, |v: &bool| !*v);
impl_field_value!(String, FieldKind::Text, DatabaseValue::as_text, |v: &String| {
    v.is_empty()
});
impl_field_value!(
    Vec<u8>,
    FieldKind::Binary,
    |v: &DatabaseValue| v.as_bytes().map(<[u8]>::to_vec),
    |v: &Vec<u8>| v.is_empty()
);
impl_field_value!(
    NaiveDateTime,
    FieldKind::DateTime,
    DatabaseValue::as_datetime,
    |v: &NaiveDateTime| *v == NaiveDateTime::default()
);
impl_field_value!(
    DateTime<Utc>,
    FieldKind::DateTime,
    |v: &DatabaseValue| v.as_datetime().map(|dt| dt.and_utc()),
    |v: &DateTime<Utc>| *v == DateTime::<Utc>::default()
);

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: FieldKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> DatabaseValue {
        match self {
            Some(v) => v.to_value(),
            None => DatabaseValue::Null,
        }
    }

    fn from_value(value: &DatabaseValue) -> Option<Self> {
        T::from_value(value).map(Some)
    }

    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

/// Decode a column value for `field`
///
/// Nulls decode to the type's zero value (`None` for optional fields).
///
/// # Errors
///
/// Returns [`DatabaseError::Mapping`] when the value cannot represent `V`.
pub fn decode_field<V: FieldValue>(field: &str, value: &DatabaseValue) -> Result<V> {
    if value.is_null() {
        return Ok(V::default());
    }
    V::from_value(value)
        .ok_or_else(|| DatabaseError::mapping(field, V::KIND.name(), value.describe()))
}

/// Metadata and accessors for one mapped field of `T`
pub struct FieldDescriptor<T> {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    pub auto_increment: bool,
    getter: Option<fn(&T) -> DatabaseValue>,
    setter: Option<fn(&mut T, &DatabaseValue) -> Result<()>>,
    unset: Option<fn(&T) -> bool>,
}

impl<T> FieldDescriptor<T> {
    /// Descriptor for a field of Rust type `V`, with no accessors yet
    pub fn of<V: FieldValue>(name: &'static str) -> Self {
        Self {
            name,
            kind: V::KIND,
            nullable: V::NULLABLE,
            auto_increment: false,
            getter: None,
            setter: None,
            unset: None,
        }
    }

    /// Make the field readable (bound on writes)
    #[must_use]
    pub fn reader(mut self, getter: fn(&T) -> DatabaseValue) -> Self {
        self.getter = Some(getter);
        self
    }

    /// Make the field writable (populated from rows)
    #[must_use]
    pub fn writer(mut self, setter: fn(&mut T, &DatabaseValue) -> Result<()>) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Mark the field as database-generated
    ///
    /// `is_unset` reports when the record still holds the zero value, in
    /// which case inserts bind null and let the database assign it.
    #[must_use]
    pub fn auto_increment(mut self, is_unset: fn(&T) -> bool) -> Self {
        self.auto_increment = true;
        self.unset = Some(is_unset);
        self
    }

    pub fn readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Current value of the field, if readable
    pub fn read(&self, record: &T) -> Option<DatabaseValue> {
        self.getter.map(|get| get(record))
    }

    /// Store a column value into the field
    ///
    /// Writing a read-only field is a no-op.
    pub fn write(&self, record: &mut T, value: &DatabaseValue) -> Result<()> {
        match self.setter {
            Some(set) => set(record, value),
            None => Ok(()),
        }
    }

    /// True when an auto-increment field still awaits a generated value
    pub fn awaiting_generation(&self, record: &T) -> bool {
        self.unset.is_some_and(|unset| unset(record))
    }
}

impl<T> Clone for FieldDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            kind: self.kind,
            nullable: self.nullable,
            auto_increment: self.auto_increment,
            getter: self.getter,
            setter: self.setter,
            unset: self.unset,
        }
    }
}

impl<T> std::fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("auto_increment", &self.auto_increment)
            .field("readable", &self.readable())
            .field("writable", &self.writable())
            .finish()
    }
}

/// A type that maps to one database table
pub trait Record: Default + Send + Sync + 'static {
    /// Bare type name; the default table name
    fn type_name() -> &'static str;

    /// Mapped fields in declaration order
    fn fields() -> Vec<FieldDescriptor<Self>>;
}

/// Look a field up by name
pub fn find_field<'a, T>(
    fields: &'a [FieldDescriptor<T>],
    name: &str,
) -> Option<&'a FieldDescriptor<T>> {
    fields.iter().find(|f| f.name == name)
}

/// Declare a struct together with its [`Record`] field table
///
/// Every declared field is mapped, readable and writable, in declaration
/// order. `#[auto]` marks a database-generated column. The struct derives
/// `Default`; add any other derives as outer attributes.
///
/// ```
/// use rust_record_mapper::record;
/// use rust_record_mapper::orm::Record;
///
/// record! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub struct User {
///         #[auto]
///         pub Id: i64,
///         pub Name: String,
///         pub Email: Option<String>,
///     }
/// }
///
/// assert_eq!(User::type_name(), "User");
/// assert_eq!(User::fields().len(), 3);
/// assert!(User::fields()[0].auto_increment);
/// ```
#[macro_export]
macro_rules! record {
    (@descriptor $name:ident, $field:ident, $ty:ty, auto) => {
        $crate::record!(@descriptor $name, $field, $ty)
            .auto_increment(|record: &$name| {
                <$ty as $crate::orm::record::FieldValue>::is_unset(&record.$field)
            })
    };

    (@descriptor $name:ident, $field:ident, $ty:ty) => {
        $crate::orm::record::FieldDescriptor::<$name>::of::<$ty>(stringify!($field))
            .reader(|record: &$name| {
                <$ty as $crate::orm::record::FieldValue>::to_value(&record.$field)
            })
            .writer(|record: &mut $name, value: &$crate::core::value::DatabaseValue| {
                record.$field = $crate::orm::record::decode_field::<$ty>(stringify!($field), value)?;
                Ok(())
            })
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$flag:ident])? $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Default)]
        #[allow(non_snake_case)]
        $vis struct $name {
            $( $fvis $field: $ty, )*
        }

        impl $crate::orm::record::Record for $name {
            fn type_name() -> &'static str {
                stringify!($name)
            }

            fn fields() -> Vec<$crate::orm::record::FieldDescriptor<Self>> {
                vec![
                    $(
                        $crate::record!(@descriptor $name, $field, $ty $(, $flag)?),
                    )*
                ]
            }
        }
    };
}
