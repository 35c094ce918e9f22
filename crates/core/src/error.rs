use std::fmt;

/// Malformed address input or column arithmetic that leaves the grid.
///
/// Always a caller bug: nothing here is recoverable by retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Column letters were empty.
    EmptyColumn,
    /// Column contained something other than ASCII letters.
    InvalidColumn(String),
    /// Column arithmetic produced an index below 1.
    NegativeColumn(i64),
    /// Row number below 1.
    InvalidRow(i64),
    /// Index does not fit the address space.
    Overflow(String),
    /// A cell reference like `B3` could not be parsed.
    InvalidCell(String),
    /// A range reference like `A1:C4` could not be parsed.
    InvalidRange(String),
    /// Range width or height of zero.
    EmptySize { width: u32, height: u32 },
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyColumn => write!(f, "column letters are empty"),
            Self::InvalidColumn(c) => write!(f, "invalid column letters '{c}'"),
            Self::NegativeColumn(i) => write!(f, "column index {i} is before column A"),
            Self::InvalidRow(r) => write!(f, "row {r} is before row 1"),
            Self::Overflow(what) => write!(f, "address overflow: {what}"),
            Self::InvalidCell(c) => write!(f, "invalid cell reference '{c}'"),
            Self::InvalidRange(r) => write!(f, "invalid range reference '{r}'"),
            Self::EmptySize { width, height } => {
                write!(f, "range size {width}x{height} must be at least 1x1")
            }
        }
    }
}

impl std::error::Error for AddressError {}

/// Failure reported by a grid source.
#[derive(Debug)]
pub enum GridError {
    /// No credentials configured for the remote service
    NotAuthenticated,
    /// Network error (connection refused, timeout, TLS...)
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// Response body did not have the expected shape
    Parse(String),
    /// File I/O error
    Io(String),
    /// The local cache has no copy of this sheet
    NotCached { spreadsheet_id: String, sheet_name: String },
    /// A range passed to the source could not be parsed
    InvalidRange(AddressError),
    /// Write attempted against a read-only source
    ReadOnly(&'static str),
}

impl GridError {
    /// True when the failure is about reaching the service rather than the
    /// request itself. Fallback sources switch over on these.
    pub fn is_transport(&self) -> bool {
        match self {
            GridError::NotAuthenticated | GridError::Network(_) => true,
            GridError::Http(status, _) => *status == 401 || *status == 403 || *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::NotAuthenticated => write!(f, "Not authenticated: no credentials configured"),
            GridError::Network(msg) => write!(f, "Network error: {}", msg),
            GridError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            GridError::Parse(msg) => write!(f, "Parse error: {}", msg),
            GridError::Io(msg) => write!(f, "I/O error: {}", msg),
            GridError::NotCached { spreadsheet_id, sheet_name } => {
                write!(f, "Sheet '{}' of spreadsheet {} is not cached", sheet_name, spreadsheet_id)
            }
            GridError::InvalidRange(e) => write!(f, "{}", e),
            GridError::ReadOnly(what) => write!(f, "{} is read-only", what),
        }
    }
}

impl std::error::Error for GridError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GridError::InvalidRange(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AddressError> for GridError {
    fn from(e: AddressError) -> Self {
        GridError::InvalidRange(e)
    }
}
