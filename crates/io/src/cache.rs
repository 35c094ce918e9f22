//! Local CSV mirror of remote spreadsheets.
//!
//! Layout: `{root}/{spreadsheet_id}/{sheet_name}.csv`, one file per tab.
//! Characters that cannot appear in a file name are percent-encoded so the
//! original tab title can be recovered from the directory listing.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use sheetsync_core::{
    grid, ColumnValidation, Dimension, Grid, GridError, GridSource, SheetDownload,
    SheetRef,
};

use crate::csv;

const EXTENSION: &str = "csv";
const STAGING_PREFIX: &str = ".staging-";

/// Clones share one store counter, so a `CachedGrid` notices refreshes made
/// through any clone.
#[derive(Debug, Clone)]
pub struct SheetCache {
    root: PathBuf,
    generation: Arc<AtomicU64>,
}

impl SheetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of `store` calls made through this cache or its clones.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn spreadsheet_dir(&self, spreadsheet_id: &str) -> PathBuf {
        self.root.join(encode_name(spreadsheet_id))
    }

    pub fn sheet_path(&self, sheet: &SheetRef) -> PathBuf {
        self.spreadsheet_dir(&sheet.spreadsheet_id)
            .join(format!("{}.{EXTENSION}", encode_name(&sheet.sheet_name)))
    }

    pub fn is_cached(&self, spreadsheet_id: &str) -> bool {
        self.spreadsheet_dir(spreadsheet_id).is_dir()
    }

    /// Cached spreadsheet ids, sorted.
    pub fn spreadsheet_ids(&self) -> Result<Vec<String>, GridError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            ids.push(decode_name(&name));
        }
        ids.sort();
        Ok(ids)
    }

    /// Cached tab titles of one spreadsheet, sorted.
    pub fn sheet_names(&self, spreadsheet_id: &str) -> Result<Vec<String>, GridError> {
        let dir = self.spreadsheet_dir(spreadsheet_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(decode_name(stem));
            }
        }
        names.sort();
        Ok(names)
    }

    /// Replace the cached copy of a spreadsheet with `sheets`.
    ///
    /// Files are written to a staging directory first and renamed into place
    /// one by one, so a reader never sees a half-written file. Tabs no longer
    /// present in `sheets` are removed afterwards.
    pub fn store(&self, spreadsheet_id: &str, sheets: &[(String, Grid)]) -> Result<(), GridError> {
        let staging = self
            .root
            .join(format!("{STAGING_PREFIX}{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&staging).map_err(|e| io_error(&staging, e))?;

        let result = self.store_via(&staging, spreadsheet_id, sheets);
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = fs::remove_dir_all(&staging) {
            log::warn!("could not remove staging dir {}: {e}", staging.display());
        }
        result
    }

    fn store_via(
        &self,
        staging: &Path,
        spreadsheet_id: &str,
        sheets: &[(String, Grid)],
    ) -> Result<(), GridError> {
        let mut staged = Vec::with_capacity(sheets.len());
        for (title, contents) in sheets {
            let file_name = format!("{}.{EXTENSION}", encode_name(title));
            let path = staging.join(&file_name);
            csv::write_file(&path, contents).map_err(GridError::Io)?;
            staged.push((path, file_name));
        }

        let dir = self.spreadsheet_dir(spreadsheet_id);
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let mut kept = HashSet::new();
        for (path, file_name) in staged {
            let dest = dir.join(&file_name);
            fs::rename(&path, &dest).map_err(|e| io_error(&dest, e))?;
            kept.insert(file_name);
        }

        for entry in fs::read_dir(&dir).map_err(|e| io_error(&dir, e))? {
            let entry = entry.map_err(|e| io_error(&dir, e))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !kept.contains(&file_name) && file_name.ends_with(&format!(".{EXTENSION}")) {
                let stale = entry.path();
                log::debug!("removing stale sheet {}", stale.display());
                fs::remove_file(&stale).map_err(|e| io_error(&stale, e))?;
            }
        }
        Ok(())
    }

    /// Download every tab of `spreadsheet_id` and store it. Returns the
    /// titles that were cached.
    pub async fn refresh<D: SheetDownload>(
        &self,
        downloader: &D,
        spreadsheet_id: &str,
    ) -> Result<Vec<String>, GridError> {
        let titles = downloader.sheet_titles(spreadsheet_id).await?;
        let sheets = downloader.download_sheets(spreadsheet_id, &titles).await?;

        let cache = self.clone();
        let id = spreadsheet_id.to_string();
        smol::unblock(move || cache.store(&id, &sheets)).await?;

        log::info!("cached {} sheet(s) of {spreadsheet_id}", titles.len());
        Ok(titles)
    }

    /// Refresh only when nothing is cached yet. Returns whether a download
    /// happened.
    pub async fn cache_if_missing<D: SheetDownload>(
        &self,
        downloader: &D,
        spreadsheet_id: &str,
    ) -> Result<bool, GridError> {
        if self.is_cached(spreadsheet_id) {
            return Ok(false);
        }
        self.refresh(downloader, spreadsheet_id).await?;
        Ok(true)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> GridError {
    GridError::Io(format!("{}: {e}", path.display()))
}

fn reserved(c: char) -> bool {
    matches!(c, '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        if reserved(c) || (i == 0 && c == '.') {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn decode_name(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// What a memoized file was parsed from. A refresh replaces files by rename,
/// which changes the file identity even when mtime and length do not move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    generation: u64,
    modified: Option<SystemTime>,
    len: u64,
    identity: Option<(u64, u64)>,
}

#[cfg(unix)]
fn file_identity(meta: &fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_identity(meta: &fs::Metadata) -> Option<(u64, u64)> {
    let created = meta.created().ok()?;
    let since = created.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    Some((since.as_secs(), u64::from(since.subsec_nanos())))
}

/// Read-only [`GridSource`] over a [`SheetCache`].
///
/// Each file is parsed once and kept until its modification stamp changes.
#[derive(Debug)]
pub struct CachedGrid {
    cache: SheetCache,
    loaded: Mutex<HashMap<PathBuf, (Stamp, Arc<Grid>)>>,
}

impl CachedGrid {
    pub fn new(cache: SheetCache) -> Self {
        Self {
            cache,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &SheetCache {
        &self.cache
    }

    fn load(&self, sheet: &SheetRef) -> Result<Arc<Grid>, GridError> {
        let path = self.cache.sheet_path(sheet);
        let generation = self.cache.generation();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(GridError::NotCached {
                    spreadsheet_id: sheet.spreadsheet_id.clone(),
                    sheet_name: sheet.sheet_name.clone(),
                })
            }
            Err(e) => return Err(io_error(&path, e)),
        };
        let stamp = Stamp {
            generation,
            modified: meta.modified().ok(),
            len: meta.len(),
            identity: file_identity(&meta),
        };

        if let Some((seen, contents)) = self.loaded.lock().get(&path) {
            if *seen == stamp && stamp.modified.is_some() {
                return Ok(Arc::clone(contents));
            }
        }

        let contents = Arc::new(csv::read_file(&path).map_err(GridError::Parse)?);
        log::debug!("loaded {} ({} rows)", path.display(), contents.len());
        self.loaded
            .lock()
            .insert(path, (stamp, Arc::clone(&contents)));
        Ok(contents)
    }
}

impl GridSource for CachedGrid {
    async fn get_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        ranges: &[String],
    ) -> Result<Vec<Grid>, GridError> {
        let contents = self.load(sheet)?;
        ranges
            .iter()
            .map(|text| -> Result<Grid, GridError> {
                let range = sheet.parse_range(text)?;
                Ok(grid::slice(&contents, &range, dimension))
            })
            .collect()
    }

    async fn put_values(
        &self,
        _sheet: &SheetRef,
        _dimension: Dimension,
        _grid: Grid,
        _range: &str,
    ) -> Result<(), GridError> {
        Err(GridError::ReadOnly("local sheet cache"))
    }

    async fn set_column_validation(
        &self,
        _sheet: &SheetRef,
        _rules: &[ColumnValidation],
    ) -> Result<(), GridError> {
        Err(GridError::ReadOnly("local sheet cache"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_encoding_roundtrip() {
        for name in ["Data", "Q1/Q2", "a%b", "What? <yes>", ".hidden", "Ünïcode: ok"] {
            let encoded = encode_name(name);
            assert!(!encoded.contains('/'));
            assert!(!encoded.starts_with('.'));
            assert_eq!(decode_name(&encoded), name);
        }
    }

    #[test]
    fn test_decode_leaves_stray_percent() {
        assert_eq!(decode_name("100%"), "100%");
        assert_eq!(decode_name("%zz"), "%zz");
    }
}
