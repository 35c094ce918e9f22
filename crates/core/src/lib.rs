//! Core types shared by every sheetsync crate.
//!
//! No I/O in here: addresses and ranges, the grid snapshot shape returned by
//! range queries, and the `GridSource` contract that the remote service, the
//! local CSV cache and the in-memory grid all satisfy.

pub mod address;
pub mod error;
pub mod grid;
pub mod memory;
pub mod source;

pub use address::{
    add_columns, column_to_index, index_to_column, parse_range, Bound, Bounds, CellAddress,
    CellRange, GridSize, RangeRef,
};
pub use error::{AddressError, GridError};
pub use grid::{compact, extent, overlay, slice, transpose, Dimension, Grid};
pub use memory::MemoryGrid;
pub use source::{ColumnValidation, FallbackGrid, GridSource, SheetDownload, SheetRef};
