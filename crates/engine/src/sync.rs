//! The sync engine: size detection, read, write, dropdowns and templates.
//!
//! Every operation runs `Idle → DetectingSize → (Reading | Writing) →
//! Reporting → Idle`. Local rows are replaced only after the last grid call of
//! a read has returned, so dropping an operation's future mid-flight leaves
//! the table as it was.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sheetsync_core::{
    AddressError, CellAddress, CellRange, ColumnValidation, Dimension, Grid, GridSize, GridSource,
};

use crate::codec;
use crate::error::SyncError;
use crate::mapping::Mapping;
use crate::report::{SyncReport, SyncWarning};
use crate::schema::{self, Column, SchemaRegistry, SheetRecord};
use crate::table::{SheetTable, TableDefinition};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    DetectingSize,
    Reading,
    Writing,
    Reporting,
}

/// Whether a write may replace data already in the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    Deny,
    Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(SyncReport),
    /// The sheet already holds data and the caller did not confirm.
    ConfirmationRequired { existing_rows: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOutcome {
    Created(SyncReport),
    /// The template rectangle is not empty.
    NotEnoughSpace,
}

/// Detected table extent (header row included) and header text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableShape {
    pub size: GridSize,
    pub header: Vec<String>,
}

impl TableShape {
    pub fn data_rows(&self) -> u32 {
        self.size.height - 1
    }

    /// Width counts the start cell plus the contiguous non-empty header cells
    /// after it; height counts the start cell plus the contiguous non-empty
    /// cells below it.
    fn from_spans(row_span: Option<&Grid>, column_span: Option<&Grid>) -> Self {
        let mut width = 1;
        let mut header = Vec::new();
        if let Some(row) = row_span.and_then(|g| g.first()) {
            if let Some((first, rest)) = row.split_first() {
                header.push(first.clone());
                for cell in rest.iter().take_while(|cell| !cell.is_empty()) {
                    header.push(cell.clone());
                    width += 1;
                }
            }
        }

        let mut height = 1;
        if let Some(column) = column_span {
            height += column.iter().skip(1).take_while(|row| !row.is_empty()).count() as u32;
        }

        Self { size: GridSize { width, height }, header }
    }
}

/// Resets the engine state to `Idle` when the operation ends, however it ends.
struct Transition<'a> {
    state: &'a Mutex<SyncState>,
}

impl<'a> Transition<'a> {
    fn new(state: &'a Mutex<SyncState>) -> Self {
        Self { state }
    }

    fn enter(&self, next: SyncState) {
        let mut state = self.state.lock();
        log::debug!("sync state {:?} -> {:?}", *state, next);
        *state = next;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        self.enter(SyncState::Idle);
    }
}

/// A non-primitive column paired with its mapping, if any.
struct Binding<'a> {
    column: &'a Column,
    mapping: Option<&'a Mapping>,
}

fn bind<'a>(columns: &'a [Column], definition: &'a TableDefinition) -> Vec<Binding<'a>> {
    columns
        .iter()
        .map(|column| Binding {
            column,
            mapping: if column.is_primitive {
                None
            } else {
                definition.mapping_for(&column.name)
            },
        })
        .collect()
}

fn header_index(header: &[String], column: &Column) -> Option<usize> {
    header.iter().position(|h| h.eq_ignore_ascii_case(&column.name))
}

fn to_u32(n: usize, what: &str) -> Result<u32, AddressError> {
    u32::try_from(n).map_err(|_| AddressError::Overflow(format!("{n} {what}")))
}

pub struct SyncEngine<S> {
    source: S,
    registry: Arc<SchemaRegistry>,
    state: Mutex<SyncState>,
}

impl<S: GridSource> SyncEngine<S> {
    pub fn new(source: S) -> Self {
        Self::with_registry(source, Arc::new(SchemaRegistry::new()))
    }

    /// Share one schema registry between several engines.
    pub fn with_registry(source: S, registry: Arc<SchemaRegistry>) -> Self {
        Self { source, registry, state: Mutex::new(SyncState::Idle) }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock()
    }

    /// Locate the table: one query for the header row and the first column.
    pub async fn detect_size(&self, definition: &TableDefinition) -> Result<TableShape, SyncError> {
        let transition = Transition::new(&self.state);
        self.detect(definition, &transition).await
    }

    async fn detect(
        &self,
        definition: &TableDefinition,
        transition: &Transition<'_>,
    ) -> Result<TableShape, SyncError> {
        transition.enter(SyncState::DetectingSize);
        let start = definition.start.normalized();
        start.column_index()?;
        let ranges = [start.row_span(), start.column_span()];
        let grids = self
            .source
            .get_values(&definition.sheet, Dimension::Rows, &ranges)
            .await?;
        let shape = TableShape::from_spans(grids.first(), grids.get(1));
        log::debug!(
            "Detected {}x{} table at {}!{}",
            shape.size.width,
            shape.size.height,
            definition.sheet.sheet_name,
            start
        );
        Ok(shape)
    }

    /// Replace `table.rows` with the sheet's contents.
    pub async fn read<R: SheetRecord>(
        &self,
        table: &mut SheetTable<R>,
    ) -> Result<SyncReport, SyncError> {
        let columns = self.registry.columns::<R>()?;
        let transition = Transition::new(&self.state);
        let definition = &table.definition;
        let shape = self.detect(definition, &transition).await?;

        transition.enter(SyncState::Reading);
        let start = definition.start.normalized();
        let range = CellRange::build(&start, shape.size)?;
        let block = self
            .source
            .get_values(&definition.sheet, Dimension::Rows, &[range])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let data_rows = shape.data_rows() as usize;
        let mut report = SyncReport::new(format!("Reading {}", definition.sheet.sheet_name));
        report.rows = data_rows;

        let header = block.first().map(Vec::as_slice).unwrap_or_default();
        let mut bound = Vec::new();
        for binding in bind(&columns, definition) {
            let index = header_index(header, binding.column);
            if index.is_none() {
                report.warn(SyncWarning::UnmatchedColumn(binding.column.name.clone()));
            }
            if !binding.column.is_primitive && binding.mapping.is_none() {
                report.warn(SyncWarning::UnmappedField(binding.column.name.clone()));
            }
            if let Some(index) = index {
                bound.push((index, binding));
            }
        }

        let mut rows = Vec::with_capacity(data_rows);
        for r in 0..data_rows {
            let cells = block.get(r + 1);
            let mut tree = BTreeMap::new();
            for (index, binding) in &bound {
                let text = cells
                    .and_then(|c| c.get(*index))
                    .map(String::as_str)
                    .unwrap_or("");
                let decoded = codec::to_typed(text, binding.column, binding.mapping)?;
                if !decoded.valid {
                    report.warn(SyncWarning::MappingValidation {
                        cell: start.offset(*index as i64, r as i64 + 1)?,
                        field: binding.column.name.clone(),
                    });
                }
                schema::write_column(&mut tree, binding.column, decoded.value);
            }
            rows.push(Value::Record(tree).into_record::<R>());
        }

        transition.enter(SyncState::Reporting);
        table.rows = rows;
        report.log();
        Ok(report)
    }

    /// Write the header and every row starting at the table's start cell.
    ///
    /// Rows left over from a larger previous table are cleared. Dropdowns are
    /// refreshed for the written rows.
    pub async fn write<R: SheetRecord>(
        &self,
        table: &SheetTable<R>,
        overwrite: Overwrite,
    ) -> Result<WriteOutcome, SyncError> {
        let columns = self.registry.columns::<R>()?;
        if table.rows.is_empty() {
            return Err(SyncError::NoRows);
        }
        let definition = &table.definition;
        let start = definition.start.normalized();
        let width = to_u32(columns.len(), "columns")?;
        let height = to_u32(table.rows.len() + 1, "rows")?;
        let target = CellRange::build(&start, GridSize::new(width, height)?)?;

        let transition = Transition::new(&self.state);
        transition.enter(SyncState::DetectingSize);
        let scan = self
            .source
            .get_values(
                &definition.sheet,
                Dimension::Rows,
                &[start.row_span(), start.column_span(), target],
            )
            .await?;
        let existing = TableShape::from_spans(scan.first(), scan.get(1));
        let occupied = scan
            .get(2)
            .map_or(0, |g| g.iter().skip(1).filter(|row| !row.is_empty()).count());
        let existing_rows = existing.data_rows().max(to_u32(occupied, "rows")?);
        if existing_rows > 0 && overwrite == Overwrite::Deny {
            log::info!(
                "{} already holds {} rows, write needs confirmation",
                definition.sheet.sheet_name,
                existing_rows
            );
            return Ok(WriteOutcome::ConfirmationRequired { existing_rows });
        }

        transition.enter(SyncState::Writing);
        let mut report = SyncReport::new(format!("Writing {}", definition.sheet.sheet_name));
        report.rows = table.rows.len();

        let bindings = bind(&columns, definition);
        for binding in &bindings {
            if !binding.column.is_primitive && binding.mapping.is_none() {
                report.warn(SyncWarning::UnmappedField(binding.column.name.clone()));
                report.note_unmapped(&binding.column.name);
            }
        }

        let header: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let mut grid: Grid = vec![header.clone()];
        for row in &table.rows {
            let tree = Value::record(row);
            let mut cells = Vec::with_capacity(bindings.len());
            for binding in &bindings {
                let value = schema::read_column(&tree, binding.column);
                let encoded = codec::to_text(&value, binding.column, binding.mapping);
                report.cells_written_empty += encoded.empty_cells;
                cells.push(encoded.text);
            }
            grid.push(cells);
        }

        let clear = GridSize {
            width: width.max(existing.size.width),
            height: height.max(existing.size.height),
        };
        for row in &mut grid {
            row.resize(clear.width as usize, String::new());
        }
        grid.resize(clear.height as usize, vec![String::new(); clear.width as usize]);
        let range = CellRange::build(&start, clear)?;
        let rules = dropdown_rules(&columns, definition, &header, &start, height - 1, &mut report)?;
        self.source
            .put_values(&definition.sheet, Dimension::Rows, grid, &range)
            .await?;

        // The rows are in the sheet from here on
        self.refresh_dropdowns(definition, &rules, &mut report).await;

        transition.enter(SyncState::Reporting);
        report.log();
        Ok(WriteOutcome::Written(report))
    }

    /// Install one dropdown per mapped column over the table's data rows.
    pub async fn sync_dropdowns<R: SheetRecord>(
        &self,
        definition: &TableDefinition,
    ) -> Result<SyncReport, SyncError> {
        let columns = self.registry.columns::<R>()?;
        let transition = Transition::new(&self.state);
        let shape = self.detect(definition, &transition).await?;
        if shape.data_rows() == 0 {
            return Err(SyncError::NoRows);
        }

        transition.enter(SyncState::Writing);
        let start = definition.start.normalized();
        let mut report = SyncReport::new(format!("Dropdowns {}", definition.sheet.sheet_name));
        report.rows = shape.data_rows() as usize;
        let rules = dropdown_rules(
            &columns,
            definition,
            &shape.header,
            &start,
            shape.data_rows(),
            &mut report,
        )?;
        if !rules.is_empty() {
            self.source
                .set_column_validation(&definition.sheet, &rules)
                .await?;
        }

        transition.enter(SyncState::Reporting);
        report.log();
        Ok(report)
    }

    /// Write a header row into empty space and prepare dropdowns for
    /// `row_count` rows (at least one).
    pub async fn create_template<R: SheetRecord>(
        &self,
        definition: &TableDefinition,
        row_count: u32,
    ) -> Result<TemplateOutcome, SyncError> {
        let columns = self.registry.columns::<R>()?;
        let row_count = row_count.max(1);
        let start = definition.start.normalized();
        let width = to_u32(columns.len(), "columns")?;
        let height = row_count
            .checked_add(1)
            .ok_or_else(|| AddressError::Overflow(format!("{row_count} rows")))?;
        let range = CellRange::build(&start, GridSize::new(width, height)?)?;

        let transition = Transition::new(&self.state);
        transition.enter(SyncState::DetectingSize);
        let scan = self
            .source
            .get_values(&definition.sheet, Dimension::Rows, std::slice::from_ref(&range))
            .await?;
        if scan.first().is_some_and(|g| !g.is_empty()) {
            log::warn!(
                "Not enough empty space in {} for a {}x{} template",
                definition.sheet.sheet_name,
                width,
                height
            );
            return Ok(TemplateOutcome::NotEnoughSpace);
        }

        transition.enter(SyncState::Writing);
        let header: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let mut report = SyncReport::new(format!("Template {}", definition.sheet.sheet_name));
        report.rows = row_count as usize;
        let rules = dropdown_rules(&columns, definition, &header, &start, row_count, &mut report)?;
        self.source
            .put_values(&definition.sheet, Dimension::Rows, vec![header], &range)
            .await?;

        self.refresh_dropdowns(definition, &rules, &mut report).await;

        transition.enter(SyncState::Reporting);
        report.log();
        Ok(TemplateOutcome::Created(report))
    }
}

impl<S: GridSource> SyncEngine<S> {
    /// Dropdowns that follow a successful write. A failure here does not undo
    /// the write, so it is reported as a warning.
    async fn refresh_dropdowns(
        &self,
        definition: &TableDefinition,
        rules: &[ColumnValidation],
        report: &mut SyncReport,
    ) {
        if rules.is_empty() {
            return;
        }
        if let Err(e) = self.source.set_column_validation(&definition.sheet, rules).await {
            log::warn!("Dropdowns for {} not installed: {}", definition.sheet.sheet_name, e);
            report.warn(SyncWarning::DropdownsFailed(e.to_string()));
        }
    }
}

/// One rule per mapped field with at least one key, located by header text
/// and covering the `row_count` rows under the header.
fn dropdown_rules(
    columns: &[Column],
    definition: &TableDefinition,
    header: &[String],
    start: &CellAddress,
    row_count: u32,
    report: &mut SyncReport,
) -> Result<Vec<ColumnValidation>, SyncError> {
    let mut rules: Vec<ColumnValidation> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for entry in &definition.mappings {
        let Some(mapping) = &entry.mapping else {
            continue;
        };
        let Some(column) = columns.iter().find(|c| c.name == entry.field_name) else {
            continue;
        };
        if seen.contains(&column.name.as_str()) {
            continue;
        }
        let options = mapping.all_keys();
        if options.is_empty() {
            continue;
        }
        let Some(index) = header_index(header, column) else {
            report.warn(SyncWarning::UnmatchedColumn(column.name.clone()));
            continue;
        };
        seen.push(&column.name);
        rules.push(ColumnValidation {
            range: CellRange::new(start.offset(index as i64, 1)?, GridSize::new(1, row_count)?)?,
            options,
            multi_select: column.is_array,
        });
    }
    Ok(rules)
}
