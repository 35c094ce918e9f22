//! The grid source contract.
//!
//! Every backing store (the remote service, the local CSV cache, an in-memory
//! grid) answers the same three calls with the same compaction semantics, so
//! the sync engine never needs to know which one it is talking to.

use serde::{Deserialize, Serialize};

use crate::address::{parse_range, CellRange, RangeRef};
use crate::error::{AddressError, GridError};
use crate::grid::{Dimension, Grid};

/// One tab of one spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRef {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

impl SheetRef {
    pub fn new(spreadsheet_id: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
        }
    }

    /// The sheet name as it appears in a range reference, quoted when it is
    /// not a plain identifier. On its own it addresses the whole tab.
    pub fn quoted_name(&self) -> String {
        let name = &self.sheet_name;
        let plain = !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if plain {
            name.clone()
        } else {
            format!("'{}'", name.replace('\'', "''"))
        }
    }

    /// Prefix `range` with this sheet's name: `Data!A1:B2`, `'My Sheet'!A1:B2`.
    /// A prefix already on `range` is replaced.
    pub fn qualify(&self, range: &str) -> String {
        let body = range.rfind('!').map_or(range, |i| &range[i + 1..]);
        format!("{}!{body}", self.quoted_name())
    }

    /// Parse a range meant for this tab. A range that names another tab is
    /// an error in every source.
    pub fn parse_range(&self, range: &str) -> Result<RangeRef, GridError> {
        let parsed = parse_range(range)?;
        match &parsed.sheet {
            Some(name) if *name != self.sheet_name => Err(GridError::InvalidRange(
                AddressError::InvalidRange(format!(
                    "{range} names sheet '{name}', not '{}'",
                    self.sheet_name
                )),
            )),
            _ => Ok(parsed),
        }
    }
}

/// A dropdown restricting a block of cells to a fixed list of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnValidation {
    pub range: CellRange,
    pub options: Vec<String>,
    /// Array columns hold comma-joined keys, so the cell may contain more
    /// than one option.
    pub multi_select: bool,
}

/// Read/write access to spreadsheet grids.
#[allow(async_fn_in_trait)]
pub trait GridSource {
    /// One compacted grid per entry of `ranges`, in request order.
    async fn get_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        ranges: &[String],
    ) -> Result<Vec<Grid>, GridError>;

    /// Write `grid` with its top-left cell at the start of `range`.
    async fn put_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        grid: Grid,
        range: &str,
    ) -> Result<(), GridError>;

    /// Install dropdowns, one rule per entry, in a single batch.
    async fn set_column_validation(
        &self,
        sheet: &SheetRef,
        rules: &[ColumnValidation],
    ) -> Result<(), GridError>;
}

impl<T: GridSource + ?Sized> GridSource for &T {
    async fn get_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        ranges: &[String],
    ) -> Result<Vec<Grid>, GridError> {
        (**self).get_values(sheet, dimension, ranges).await
    }

    async fn put_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        grid: Grid,
        range: &str,
    ) -> Result<(), GridError> {
        (**self).put_values(sheet, dimension, grid, range).await
    }

    async fn set_column_validation(
        &self,
        sheet: &SheetRef,
        rules: &[ColumnValidation],
    ) -> Result<(), GridError> {
        (**self).set_column_validation(sheet, rules).await
    }
}

/// Whole-spreadsheet download, used to populate the local cache.
#[allow(async_fn_in_trait)]
pub trait SheetDownload {
    /// Titles of every tab, in spreadsheet order.
    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, GridError>;

    /// Full contents of the named tabs as (title, grid) pairs.
    async fn download_sheets(
        &self,
        spreadsheet_id: &str,
        titles: &[String],
    ) -> Result<Vec<(String, Grid)>, GridError>;
}

/// Reads from `primary`, switching to `fallback` when the primary cannot be
/// reached. Writes only ever go to the primary.
pub struct FallbackGrid<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackGrid<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

impl<P: GridSource, F: GridSource> GridSource for FallbackGrid<P, F> {
    async fn get_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        ranges: &[String],
    ) -> Result<Vec<Grid>, GridError> {
        match self.primary.get_values(sheet, dimension, ranges).await {
            Err(e) if e.is_transport() => {
                log::warn!(
                    "Reading '{}' from fallback source: {}",
                    sheet.sheet_name,
                    e
                );
                self.fallback.get_values(sheet, dimension, ranges).await
            }
            other => other,
        }
    }

    async fn put_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        grid: Grid,
        range: &str,
    ) -> Result<(), GridError> {
        self.primary.put_values(sheet, dimension, grid, range).await
    }

    async fn set_column_validation(
        &self,
        sheet: &SheetRef,
        rules: &[ColumnValidation],
    ) -> Result<(), GridError> {
        self.primary.set_column_validation(sheet, rules).await
    }
}
