//! Grid snapshots and the compaction rule every source follows.
//!
//! A range query never returns trailing empties: each returned row (or column,
//! for column-major queries) is cut after its last non-empty cell, and fully
//! empty rows at the end of the block are dropped. Empty rows in the middle of
//! the block survive as zero-length vectors. The local cache and the in-memory
//! grid slice through [`slice`] so they answer exactly like the remote service.

use serde::{Deserialize, Serialize};

use crate::address::{Bounds, RangeRef};

/// Row-major text cells.
pub type Grid = Vec<Vec<String>>;

/// Major dimension of a range query or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dimension {
    #[default]
    Rows,
    Columns,
}

impl Dimension {
    /// Wire name used by the remote service.
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Rows => "ROWS",
            Dimension::Columns => "COLUMNS",
        }
    }
}

/// Apply the canonical compaction rule.
pub fn compact(mut grid: Grid) -> Grid {
    for row in &mut grid {
        while row.last().is_some_and(|cell| cell.is_empty()) {
            row.pop();
        }
    }
    while grid.last().is_some_and(|row| row.is_empty()) {
        grid.pop();
    }
    grid
}

/// (rows, columns) covered by a ragged grid.
pub fn extent(grid: &Grid) -> (usize, usize) {
    let cols = grid.iter().map(Vec::len).max().unwrap_or(0);
    (grid.len(), cols)
}

/// Swap rows and columns, padding ragged rows with empty cells.
pub fn transpose(grid: &Grid) -> Grid {
    let (rows, cols) = extent(grid);
    (0..cols)
        .map(|c| {
            (0..rows)
                .map(|r| grid[r].get(c).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Cut `range` out of `source` and compact it the way the remote does.
pub fn slice(source: &Grid, range: &RangeRef, dimension: Dimension) -> Grid {
    let (rows, cols) = extent(source);
    let Some(bounds) = range.resolve(rows, cols) else {
        return Vec::new();
    };
    let block = copy_block(source, bounds);
    match dimension {
        Dimension::Rows => compact(block),
        Dimension::Columns => compact(transpose(&block)),
    }
}

fn copy_block(source: &Grid, b: Bounds) -> Grid {
    source[b.first_row..=b.last_row]
        .iter()
        .map(|row| {
            (b.first_col..=b.last_col)
                .map(|c| row.get(c).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Write `block` into `target` with its top-left cell at (row, col), 0-based.
/// The target grows as needed. Empty strings in the block clear cells.
pub fn overlay(target: &mut Grid, row: usize, col: usize, block: &Grid) {
    for (r, values) in block.iter().enumerate() {
        let r = row + r;
        if target.len() <= r {
            target.resize_with(r + 1, Vec::new);
        }
        let dest = &mut target[r];
        for (c, value) in values.iter().enumerate() {
            let c = col + c;
            if dest.len() <= c {
                dest.resize(c + 1, String::new());
            }
            dest[c] = value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::parse_range;

    fn grid(rows: &[&[&str]]) -> Grid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_compact_trims_trailing_cells_and_rows() {
        let g = grid(&[&["a", "", ""], &["", "", ""], &["b", "c", ""], &["", ""], &[]]);
        assert_eq!(compact(g), grid(&[&["a"], &[], &["b", "c"]]));
    }

    #[test]
    fn test_compact_all_empty() {
        assert!(compact(grid(&[&["", ""], &[""]])).is_empty());
    }

    #[test]
    fn test_slice_row_major() {
        let source = grid(&[
            &["h1", "h2", "h3"],
            &["a", "", ""],
            &["", "", ""],
            &["d", "e", "f"],
        ]);
        let range = parse_range("A2:C4").unwrap();
        assert_eq!(
            slice(&source, &range, Dimension::Rows),
            grid(&[&["a"], &[], &["d", "e", "f"]])
        );
    }

    #[test]
    fn test_slice_open_ranges() {
        let source = grid(&[&["", "x", "y", ""], &["", "1"], &["", "2"], &[""]]);

        let row = parse_range("B1:1").unwrap();
        assert_eq!(slice(&source, &row, Dimension::Rows), grid(&[&["x", "y"]]));

        let col = parse_range("B1:B").unwrap();
        assert_eq!(slice(&source, &col, Dimension::Columns), grid(&[&["x", "1", "2"]]));
    }

    #[test]
    fn test_slice_column_major_compacts_columns() {
        let source = grid(&[&["a", "b"], &["", "c"], &["", ""]]);
        let range = parse_range("A1:B3").unwrap();
        assert_eq!(
            slice(&source, &range, Dimension::Columns),
            grid(&[&["a"], &["b", "c"]])
        );
    }

    #[test]
    fn test_slice_outside_data() {
        let source = grid(&[&["a"]]);
        let range = parse_range("C5:D9").unwrap();
        assert!(slice(&source, &range, Dimension::Rows).is_empty());
    }

    #[test]
    fn test_overlay_grows_target() {
        let mut target = grid(&[&["a"]]);
        overlay(&mut target, 1, 2, &grid(&[&["x", "y"]]));
        assert_eq!(target, grid(&[&["a"], &["", "", "x", "y"]]));

        overlay(&mut target, 0, 0, &grid(&[&[""]]));
        assert_eq!(target[0], vec![String::new()]);
    }

    #[test]
    fn test_dimension_wire_names() {
        assert_eq!(Dimension::Rows.as_str(), "ROWS");
        assert_eq!(Dimension::Columns.as_str(), "COLUMNS");
    }
}
