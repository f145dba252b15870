//! Record mapping
//!
//! [`Record`] types describe their fields, [`MappingRegistry`] resolves table
//! and column names, and [`Mapper`] runs select, insert, update and delete
//! for them against any [`Database`](crate::core::Database).

pub mod mapper;
pub mod mapping;
pub mod record;
pub mod row;
pub mod statements;

pub use mapper::{Mapper, MapperOptions, WriteOutcome};
pub use mapping::{MappedField, MappingRegistry, PrimaryKeyCache};
pub use record::{find_field, FieldDescriptor, FieldKind, FieldValue, Record};
pub use row::{bind_parameters, map_row};
pub use statements::QueryOptions;
