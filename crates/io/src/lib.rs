// File I/O: CSV storage and the local sheet cache

pub mod cache;
pub mod csv;

pub use cache::{CachedGrid, SheetCache};
