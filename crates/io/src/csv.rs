// CSV storage for cached sheets (RFC 4180, comma-delimited, no header row)

use std::io::Read;
use std::path::Path;

use sheetsync_core::Grid;

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Parse CSV text into rows. Rows keep whatever width they were written with.
pub fn parse_grid(content: &str) -> Result<Grid, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Grid::new();
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

/// Render rows as CSV text.
///
/// The reader skips blank lines, so an empty row is written as a single
/// quoted empty field to keep later rows at their original index.
pub fn write_grid(grid: &Grid) -> Result<String, String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for row in grid {
        if row.is_empty() {
            writer.write_record([""]).map_err(|e| e.to_string())?;
        } else {
            writer.write_record(row).map_err(|e| e.to_string())?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

pub fn read_file(path: &Path) -> Result<Grid, String> {
    let content = read_file_as_utf8(path)?;
    parse_grid(&content)
}

pub fn write_file(path: &Path, grid: &Grid) -> Result<(), String> {
    let content = write_grid(grid)?;
    std::fs::write(path, content).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn grid(rows: &[&[&str]]) -> Grid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_embedded_comma_and_quote_roundtrip() {
        let rows = grid(&[&["a", "b,c"], &["d\"e", "f"]]);
        let text = write_grid(&rows).unwrap();
        assert!(text.contains("\"b,c\""));
        assert!(text.contains("\"d\"\"e\""));
        assert_eq!(parse_grid(&text).unwrap(), rows);
    }

    #[test]
    fn test_embedded_newlines_roundtrip() {
        let rows = grid(&[&["line one\nline two", "x"], &["crlf\r\ninside"]]);
        let text = write_grid(&rows).unwrap();
        assert_eq!(parse_grid(&text).unwrap(), rows);
    }

    #[test]
    fn test_empty_rows_keep_position() {
        let rows = grid(&[&["header"], &[], &["after"]]);
        let text = write_grid(&rows).unwrap();
        let parsed = parse_grid(&text).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1], vec![String::new()]);
        assert_eq!(parsed[2], vec!["after".to_string()]);
    }

    #[test]
    fn test_ragged_rows() {
        let parsed = parse_grid("a,b,c\nd\n,e\n").unwrap();
        assert_eq!(parsed, grid(&[&["a", "b", "c"], &["d"], &["", "e"]]));
    }

    #[test]
    fn test_windows_1252_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        // "café,naïve" in Windows-1252
        fs::write(&path, b"caf\xe9,na\xefve\n").unwrap();

        let rows = read_file(&path).unwrap();
        assert_eq!(rows, grid(&[&["café", "naïve"]]));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        let rows = grid(&[&["name", "score"], &["Ann", "5"]]);
        write_file(&path, &rows).unwrap();
        assert_eq!(read_file(&path).unwrap(), rows);
    }
}
