use std::fmt;

use sheetsync_core::{AddressError, GridError};

/// A record type cannot be laid out as columns. Raised before any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The record type declares no columns
    NoFields(String),
    /// Column crosses more than one array level
    NestedArray(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::NoFields(ty) => write!(f, "{} has no fields to map to columns", ty),
            SchemaError::NestedArray(column) => {
                write!(f, "column '{}' is nested inside more than one array", column)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// A composite key could not be resolved. Fatal for the whole operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    MalformedKey(String),
    ItemNotFound(String),
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::MalformedKey(key) => write!(f, "malformed item key '{}'", key),
            MappingError::ItemNotFound(key) => write!(f, "item not found: {}", key),
        }
    }
}

impl std::error::Error for MappingError {}

#[derive(Debug)]
pub enum SyncError {
    Address(AddressError),
    Schema(SchemaError),
    Mapping(MappingError),
    Grid(GridError),
    /// Write or dropdown sync on a table without data rows
    NoRows,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Address(e) => write!(f, "Address error: {}", e),
            SyncError::Schema(e) => write!(f, "Schema error: {}", e),
            SyncError::Mapping(e) => write!(f, "Mapping error: {}", e),
            SyncError::Grid(e) => write!(f, "{}", e),
            SyncError::NoRows => write!(f, "Table has no rows"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Address(e) => Some(e),
            SyncError::Schema(e) => Some(e),
            SyncError::Mapping(e) => Some(e),
            SyncError::Grid(e) => Some(e),
            SyncError::NoRows => None,
        }
    }
}

impl From<AddressError> for SyncError {
    fn from(e: AddressError) -> Self {
        SyncError::Address(e)
    }
}

impl From<SchemaError> for SyncError {
    fn from(e: SchemaError) -> Self {
        SyncError::Schema(e)
    }
}

impl From<MappingError> for SyncError {
    fn from(e: MappingError) -> Self {
        SyncError::Mapping(e)
    }
}

impl From<GridError> for SyncError {
    fn from(e: GridError) -> Self {
        SyncError::Grid(e)
    }
}
