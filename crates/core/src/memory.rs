//! In-memory grid source.
//!
//! Holds whole sheets and slices them with the shared compaction rule. Hosts
//! use it for scratch tables; tests use it as a stand-in for the remote.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::GridError;
use crate::grid::{self, Dimension, Grid};
use crate::source::{ColumnValidation, GridSource, SheetDownload, SheetRef};

#[derive(Default)]
struct MemoryState {
    sheets: BTreeMap<SheetRef, Grid>,
    validations: Vec<(SheetRef, ColumnValidation)>,
    requests: usize,
    offline: bool,
}

#[derive(Default)]
pub struct MemoryGrid {
    state: Mutex<MemoryState>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a whole sheet.
    pub fn with_sheet(self, sheet: SheetRef, grid: Grid) -> Self {
        self.set_sheet(sheet, grid);
        self
    }

    pub fn set_sheet(&self, sheet: SheetRef, grid: Grid) {
        self.state.lock().sheets.insert(sheet, grid);
    }

    /// Raw contents of a sheet (empty when the sheet does not exist).
    pub fn sheet(&self, sheet: &SheetRef) -> Grid {
        self.state.lock().sheets.get(sheet).cloned().unwrap_or_default()
    }

    /// Validation rules installed on `sheet`, in installation order.
    pub fn validations(&self, sheet: &SheetRef) -> Vec<ColumnValidation> {
        self.state
            .lock()
            .validations
            .iter()
            .filter(|(s, _)| s == sheet)
            .map(|(_, rule)| rule.clone())
            .collect()
    }

    /// Number of calls received, of any kind.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests
    }

    /// While offline every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    fn begin(&self) -> Result<parking_lot::MutexGuard<'_, MemoryState>, GridError> {
        let mut state = self.state.lock();
        state.requests += 1;
        if state.offline {
            return Err(GridError::Network("memory grid is offline".to_string()));
        }
        Ok(state)
    }
}

impl GridSource for MemoryGrid {
    async fn get_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        ranges: &[String],
    ) -> Result<Vec<Grid>, GridError> {
        let state = self.begin()?;
        let empty = Grid::new();
        let source = state.sheets.get(sheet).unwrap_or(&empty);
        ranges
            .iter()
            .map(|text| -> Result<Grid, GridError> {
                let range = sheet.parse_range(text)?;
                Ok(grid::slice(source, &range, dimension))
            })
            .collect()
    }

    async fn put_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        values: Grid,
        range: &str,
    ) -> Result<(), GridError> {
        let mut state = self.begin()?;
        let target = sheet.parse_range(range)?;
        let block = match dimension {
            Dimension::Rows => values,
            Dimension::Columns => grid::transpose(&values),
        };

        let first_row = target.start.row.unwrap_or(1);
        let first_col = target.start.column.unwrap_or(1);
        let (rows, cols) = grid::extent(&block);
        let too_tall = target
            .end
            .row
            .is_some_and(|end| rows as u64 > u64::from(end.saturating_sub(first_row)) + 1);
        let too_wide = target
            .end
            .column
            .is_some_and(|end| cols as u64 > u64::from(end.saturating_sub(first_col)) + 1);
        if too_tall || too_wide {
            return Err(GridError::Http(
                400,
                format!("{rows}x{cols} values do not fit range {range}"),
            ));
        }

        let dest = state.sheets.entry(sheet.clone()).or_default();
        grid::overlay(dest, first_row as usize - 1, first_col as usize - 1, &block);
        Ok(())
    }

    async fn set_column_validation(
        &self,
        sheet: &SheetRef,
        rules: &[ColumnValidation],
    ) -> Result<(), GridError> {
        let mut state = self.begin()?;
        state
            .validations
            .extend(rules.iter().map(|rule| (sheet.clone(), rule.clone())));
        Ok(())
    }
}

impl SheetDownload for MemoryGrid {
    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, GridError> {
        let state = self.begin()?;
        Ok(state
            .sheets
            .keys()
            .filter(|s| s.spreadsheet_id == spreadsheet_id)
            .map(|s| s.sheet_name.clone())
            .collect())
    }

    async fn download_sheets(
        &self,
        spreadsheet_id: &str,
        titles: &[String],
    ) -> Result<Vec<(String, Grid)>, GridError> {
        let state = self.begin()?;
        Ok(titles
            .iter()
            .map(|title| {
                let key = SheetRef::new(spreadsheet_id, title.as_str());
                let contents = state.sheets.get(&key).cloned().unwrap_or_default();
                (title.clone(), grid::compact(contents))
            })
            .collect())
    }
}
