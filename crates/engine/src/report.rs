//! Operation reports.

use std::fmt;

use sheetsync_core::CellAddress;

/// Soft problem found during an operation. The operation still completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// No header cell matches this column
    UnmatchedColumn(String),
    /// Non-primitive column without a mapping
    UnmappedField(String),
    /// A mapping rejected the value decoded from this cell
    MappingValidation { cell: CellAddress, field: String },
    /// Data was written but the dropdowns could not be installed
    DropdownsFailed(String),
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::UnmatchedColumn(name) => write!(f, "No column found for field: {}", name),
            SyncWarning::UnmappedField(name) => write!(f, "No mapping found for column: {}", name),
            SyncWarning::MappingValidation { cell, field } => {
                write!(f, "Mapping error at cell: {} ({})", cell, field)
            }
            SyncWarning::DropdownsFailed(reason) => write!(f, "Dropdowns not installed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub label: String,
    /// Data rows read or written
    pub rows: usize,
    pub warnings: Vec<SyncWarning>,
    pub cells_written_empty: usize,
    pub fields_without_mapping: Vec<String>,
}

impl SyncReport {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), ..Default::default() }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn warn(&mut self, warning: SyncWarning) {
        self.warnings.push(warning);
    }

    pub(crate) fn note_unmapped(&mut self, field: &str) {
        if !self.fields_without_mapping.iter().any(|f| f == field) {
            self.fields_without_mapping.push(field.to_string());
        }
    }

    /// Log at info when clean, warn otherwise.
    pub fn log(&self) {
        if self.is_clean() {
            log::info!("{}", self);
        } else {
            log::warn!("{}", self);
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} rows", self.label, self.rows)?;
        for warning in &self.warnings {
            write!(f, "\n  {}", warning)?;
        }
        if !self.fields_without_mapping.is_empty() {
            write!(
                f,
                "\n  Fields without mapping ({}): {}",
                self.fields_without_mapping.len(),
                self.fields_without_mapping.join(", ")
            )?;
        }
        if self.cells_written_empty > 0 {
            write!(f, "\n  {} cells written with empty values", self.cells_written_empty)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let mut report = SyncReport::new("Reading Units");
        report.rows = 2;
        assert_eq!(report.to_string(), "Reading Units: 2 rows");
        assert!(report.is_clean());

        report.warn(SyncWarning::MappingValidation {
            cell: CellAddress::new("C", 4).unwrap(),
            field: "color".into(),
        });
        report.note_unmapped("icon");
        report.note_unmapped("icon");
        report.cells_written_empty = 3;
        assert_eq!(
            report.to_string(),
            "Reading Units: 2 rows\n  Mapping error at cell: C4 (color)\n  \
             Fields without mapping (1): icon\n  3 cells written with empty values"
        );
        assert!(!report.is_clean());
    }
}
