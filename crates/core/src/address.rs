//! A1-style addressing.
//!
//! Columns are bijective base-26 numerals: A=1 … Z=26, AA=27, with no zero
//! digit, so every positive index has exactly one spelling. Rows are 1-based.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

const LETTERS: u32 = 26;

/// Convert column letters to a 1-based index. Case-insensitive.
pub fn column_to_index(letters: &str) -> Result<u32, AddressError> {
    if letters.is_empty() {
        return Err(AddressError::EmptyColumn);
    }
    letters.bytes().try_fold(0u32, |acc, b| {
        if !b.is_ascii_alphabetic() {
            return Err(AddressError::InvalidColumn(letters.to_string()));
        }
        let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        acc.checked_mul(LETTERS)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| AddressError::Overflow(format!("column '{letters}'")))
    })
}

/// Convert a 1-based column index to letters: 1=A, 26=Z, 27=AA, 703=AAA.
pub fn index_to_column(index: u32) -> Result<String, AddressError> {
    if index == 0 {
        return Err(AddressError::NegativeColumn(0));
    }
    let mut result = String::new();
    let mut n = index;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % LETTERS) as u8) as char);
        n /= LETTERS;
    }
    Ok(result)
}

/// Shift column letters by `offset` columns (negative moves left).
pub fn add_columns(letters: &str, offset: i64) -> Result<String, AddressError> {
    let index = i64::from(column_to_index(letters)?) + offset;
    if index < 1 {
        return Err(AddressError::NegativeColumn(index));
    }
    let index = u32::try_from(index)
        .map_err(|_| AddressError::Overflow(format!("column index {index}")))?;
    index_to_column(index)
}

// ============================================================================
// Cells
// ============================================================================

/// A single cell coordinate, e.g. `B3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    /// Column letters, uppercase
    pub column: String,
    /// Row number (1-based)
    pub row: u32,
}

impl Default for CellAddress {
    fn default() -> Self {
        Self { column: "A".to_string(), row: 1 }
    }
}

impl CellAddress {
    pub fn new(column: &str, row: u32) -> Result<Self, AddressError> {
        column_to_index(column)?;
        if row == 0 {
            return Err(AddressError::InvalidRow(0));
        }
        Ok(Self { column: column.to_ascii_uppercase(), row })
    }

    /// Copy with unset parts defaulted: an empty column becomes `A` and row 0
    /// becomes row 1. Host configuration may leave the start cell blank.
    pub fn normalized(&self) -> Self {
        let column = self.column.trim();
        let column = if column.is_empty() {
            "A".to_string()
        } else {
            column.to_ascii_uppercase()
        };
        Self { column, row: self.row.max(1) }
    }

    pub fn column_index(&self) -> Result<u32, AddressError> {
        column_to_index(&self.column)
    }

    /// The cell `columns` to the right and `rows` down (negative moves back).
    pub fn offset(&self, columns: i64, rows: i64) -> Result<Self, AddressError> {
        let column = add_columns(&self.column, columns)?;
        let row = i64::from(self.row) + rows;
        if row < 1 {
            return Err(AddressError::InvalidRow(row));
        }
        let row = u32::try_from(row).map_err(|_| AddressError::Overflow(format!("row {row}")))?;
        Ok(Self { column, row })
    }

    /// (row, column), both 0-based.
    pub fn zero_based(&self) -> Result<(usize, usize), AddressError> {
        if self.row == 0 {
            return Err(AddressError::InvalidRow(0));
        }
        let col = self.column_index()?;
        Ok(((self.row - 1) as usize, (col - 1) as usize))
    }

    /// This cell to the end of its row: `B3:3`.
    pub fn row_span(&self) -> String {
        format!("{}{}:{}", self.column, self.row, self.row)
    }

    /// This cell to the bottom of its column: `B3:B`.
    pub fn column_span(&self) -> String {
        format!("{}{}:{}", self.column, self.row, self.column)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

impl FromStr for CellAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bound = parse_bound(s).map_err(|_| AddressError::InvalidCell(s.to_string()))?;
        match (bound.column, bound.row) {
            (Some(column), Some(row)) => Ok(Self { column: index_to_column(column)?, row }),
            _ => Err(AddressError::InvalidCell(s.to_string())),
        }
    }
}

// ============================================================================
// Rectangles
// ============================================================================

/// Width and height of a rectangular block, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub fn new(width: u32, height: u32) -> Result<Self, AddressError> {
        if width == 0 || height == 0 {
            return Err(AddressError::EmptySize { width, height });
        }
        Ok(Self { width, height })
    }
}

/// A rectangular block anchored at its top-left cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellAddress,
    pub size: GridSize,
}

impl CellRange {
    pub fn new(start: CellAddress, size: GridSize) -> Result<Self, AddressError> {
        let size = GridSize::new(size.width, size.height)?;
        Ok(Self { start, size })
    }

    /// Bottom-right cell.
    pub fn end(&self) -> Result<CellAddress, AddressError> {
        self.start.offset(
            i64::from(self.size.width) - 1,
            i64::from(self.size.height) - 1,
        )
    }

    /// `"{start}:{end}"` for a block of `size` cells anchored at `start`.
    pub fn build(start: &CellAddress, size: GridSize) -> Result<String, AddressError> {
        CellRange::new(start.clone(), size)?.to_a1()
    }

    pub fn to_a1(&self) -> Result<String, AddressError> {
        Ok(format!("{}:{}", self.start, self.end()?))
    }
}

// ============================================================================
// Range references
// ============================================================================

/// One corner of a range reference. A missing part is open-ended: `A` alone
/// spans every row, `3` alone spans every column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bound {
    /// 1-based column index
    pub column: Option<u32>,
    /// 1-based row number
    pub row: Option<u32>,
}

/// A parsed range reference such as `Sheet1!A1:C4`, `A1:1` or `B2:B`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub start: Bound,
    pub end: Bound,
}

/// Inclusive, 0-based cell bounds inside a concrete grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub first_row: usize,
    pub last_row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

impl Bounds {
    pub fn rows(&self) -> usize {
        self.last_row - self.first_row + 1
    }

    pub fn cols(&self) -> usize {
        self.last_col - self.first_col + 1
    }
}

impl RangeRef {
    /// Resolve against a grid of `rows` x `cols` cells. Open ends extend to
    /// the grid edge; the result is clipped to the grid. `None` when nothing
    /// inside the grid is selected.
    pub fn resolve(&self, rows: usize, cols: usize) -> Option<Bounds> {
        let (first_row, last_row) = resolve_axis(self.start.row, self.end.row, rows)?;
        let (first_col, last_col) = resolve_axis(self.start.column, self.end.column, cols)?;
        Some(Bounds { first_row, last_row, first_col, last_col })
    }
}

fn resolve_axis(start: Option<u32>, end: Option<u32>, len: usize) -> Option<(usize, usize)> {
    let edge = len.checked_sub(1)?;
    let (first, last) = match (start, end) {
        // Explicit corners may be given in either order
        (Some(a), Some(b)) => (a.min(b) as usize - 1, a.max(b) as usize - 1),
        (Some(a), None) => (a as usize - 1, edge),
        (None, Some(b)) => (0, b as usize - 1),
        (None, None) => (0, edge),
    };
    let last = last.min(edge);
    (first <= last).then_some((first, last))
}

/// Parse a range reference. Accepts an optional `Sheet!` prefix (single
/// quotes stripped), `$` anchors, single cells and open-ended spans.
pub fn parse_range(text: &str) -> Result<RangeRef, AddressError> {
    let invalid = || AddressError::InvalidRange(text.to_string());
    let trimmed = text.trim();
    let (sheet, body) = match trimmed.rfind('!') {
        Some(i) => (Some(unquote_sheet(&trimmed[..i])), &trimmed[i + 1..]),
        None => (None, trimmed),
    };

    let mut parts = body.split(':');
    let first = parts.next().unwrap_or_default();
    let second = parts.next();
    if parts.next().is_some() {
        return Err(invalid());
    }

    let start = parse_bound(first).map_err(|_| invalid())?;
    let end = match second {
        Some(s) => parse_bound(s).map_err(|_| invalid())?,
        None => start,
    };
    Ok(RangeRef { sheet, start, end })
}

fn parse_bound(text: &str) -> Result<Bound, AddressError> {
    let invalid = || AddressError::InvalidCell(text.to_string());
    let cleaned: String = text.trim().chars().filter(|c| *c != '$').collect();
    let split = cleaned
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(cleaned.len());
    let (letters, digits) = cleaned.split_at(split);

    if letters.is_empty() && digits.is_empty() {
        return Err(invalid());
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let column = if letters.is_empty() {
        None
    } else {
        Some(column_to_index(letters)?)
    };
    let row = if digits.is_empty() {
        None
    } else {
        let row: u32 = digits.parse().map_err(|_| AddressError::Overflow(format!("row {digits}")))?;
        if row == 0 {
            return Err(AddressError::InvalidRow(0));
        }
        Some(row)
    };
    Ok(Bound { column, row })
}

fn unquote_sheet(name: &str) -> String {
    let name = name.trim();
    match name.strip_prefix('\'').and_then(|n| n.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_to_index() {
        assert_eq!(column_to_index("A").unwrap(), 1);
        assert_eq!(column_to_index("Z").unwrap(), 26);
        assert_eq!(column_to_index("AA").unwrap(), 27);
        assert_eq!(column_to_index("az").unwrap(), 52);
        assert_eq!(column_to_index("ZZ").unwrap(), 702);
        assert_eq!(column_to_index("AAA").unwrap(), 703);
    }

    #[test]
    fn test_column_to_index_rejects_garbage() {
        assert_eq!(column_to_index(""), Err(AddressError::EmptyColumn));
        assert!(matches!(column_to_index("A1"), Err(AddressError::InvalidColumn(_))));
        assert!(matches!(column_to_index("ZZZZZZZZZZ"), Err(AddressError::Overflow(_))));
    }

    #[test]
    fn test_index_to_column() {
        assert_eq!(index_to_column(1).unwrap(), "A");
        assert_eq!(index_to_column(26).unwrap(), "Z");
        assert_eq!(index_to_column(27).unwrap(), "AA");
        assert_eq!(index_to_column(702).unwrap(), "ZZ");
        assert_eq!(index_to_column(703).unwrap(), "AAA");
        assert!(index_to_column(0).is_err());
    }

    #[test]
    fn test_add_columns() {
        assert_eq!(add_columns("A", 0).unwrap(), "A");
        assert_eq!(add_columns("Z", 1).unwrap(), "AA");
        assert_eq!(add_columns("b", 2).unwrap(), "D");
        assert_eq!(add_columns("AA", -1).unwrap(), "Z");
        assert_eq!(add_columns("B", -2), Err(AddressError::NegativeColumn(0)));
        assert_eq!(add_columns("A", -5), Err(AddressError::NegativeColumn(-4)));
    }

    #[test]
    fn test_range_build() {
        let start = CellAddress::new("B", 3).unwrap();
        let size = GridSize::new(2, 4).unwrap();
        assert_eq!(CellRange::build(&start, size).unwrap(), "B3:C6");

        let single = GridSize::new(1, 1).unwrap();
        assert_eq!(CellRange::build(&CellAddress::default(), single).unwrap(), "A1:A1");
        assert!(GridSize::new(0, 3).is_err());
    }

    #[test]
    fn test_cell_address_parse_and_display() {
        let cell: CellAddress = "ab12".parse().unwrap();
        assert_eq!(cell.column, "AB");
        assert_eq!(cell.row, 12);
        assert_eq!(cell.to_string(), "AB12");
        assert!("12".parse::<CellAddress>().is_err());
        assert!("B".parse::<CellAddress>().is_err());
        assert!("B0".parse::<CellAddress>().is_err());
    }

    #[test]
    fn test_normalized_defaults_blank_start() {
        let blank = CellAddress { column: String::new(), row: 0 };
        assert_eq!(blank.normalized(), CellAddress::default());

        let lower = CellAddress { column: "c".into(), row: 4 };
        assert_eq!(lower.normalized().to_string(), "C4");
    }

    #[test]
    fn test_spans() {
        let cell = CellAddress::new("B", 3).unwrap();
        assert_eq!(cell.row_span(), "B3:3");
        assert_eq!(cell.column_span(), "B3:B");
        assert_eq!(cell.zero_based().unwrap(), (2, 1));
        assert_eq!(cell.offset(1, 2).unwrap().to_string(), "C5");
        assert!(cell.offset(0, -3).is_err());
    }

    #[test]
    fn test_parse_range_forms() {
        let r = parse_range("B2:D3").unwrap();
        assert_eq!(r.sheet, None);
        assert_eq!(r.start, Bound { column: Some(2), row: Some(2) });
        assert_eq!(r.end, Bound { column: Some(4), row: Some(3) });

        let r = parse_range("'My ''Data'''!A1:1").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("My 'Data'"));
        assert_eq!(r.end, Bound { column: None, row: Some(1) });

        let r = parse_range("Sheet1!$C$5").unwrap();
        assert_eq!(r.start, r.end);

        assert!(parse_range("A1:B2:C3").is_err());
        assert!(parse_range("1A").is_err());
        assert!(parse_range(":").is_err());
    }

    #[test]
    fn test_resolve_open_ranges() {
        // 4 rows x 3 cols of data
        let row_span = parse_range("B1:1").unwrap();
        assert_eq!(
            row_span.resolve(4, 3),
            Some(Bounds { first_row: 0, last_row: 0, first_col: 1, last_col: 2 })
        );

        let col_span = parse_range("A2:A").unwrap();
        assert_eq!(
            col_span.resolve(4, 3),
            Some(Bounds { first_row: 1, last_row: 3, first_col: 0, last_col: 0 })
        );

        // Entirely outside the data
        assert_eq!(parse_range("E1:F2").unwrap().resolve(4, 3), None);
        assert_eq!(parse_range("A1:B2").unwrap().resolve(0, 0), None);
        assert_eq!(parse_range("A3:A").unwrap().resolve(2, 3), None);

        // Reversed corners are normalized
        let reversed = parse_range("C3:A1").unwrap();
        assert_eq!(
            reversed.resolve(4, 3),
            Some(Bounds { first_row: 0, last_row: 2, first_col: 0, last_col: 2 })
        );
    }
}
