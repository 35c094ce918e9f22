//! Keeps typed record tables in step with spreadsheet grids.
//!
//! A record type declares its fields ([`sheet_record!`]), gets flattened into
//! columns once ([`SchemaRegistry`]), and the [`SyncEngine`] moves rows
//! between a [`SheetTable`] and any [`sheetsync_core::GridSource`], converting
//! cells through the [`codec`] and the table's [`Mapping`]s.

pub mod codec;
pub mod error;
pub mod mapping;
pub mod report;
pub mod schema;
pub mod sync;
pub mod table;
pub mod value;

pub use error::{MappingError, SchemaError, SyncError};
pub use mapping::{
    resolve_mapping, CompositeKeyMapping, EnumMapping, EnumMember, ItemSet, Mapping,
    MappingEntry, Pair, PairMapping, SetItem,
};
pub use report::{SyncReport, SyncWarning};
pub use schema::{flatten, Column, FieldDef, FieldKind, PathSegment, SchemaRegistry, SheetRecord};
pub use sync::{Overwrite, SyncEngine, SyncState, TableShape, TemplateOutcome, WriteOutcome};
pub use table::{SheetTable, TableDefinition};
pub use value::{CellType, ItemPath, ObjectRef, Scalar, SheetEnum, Value, ValueType};
