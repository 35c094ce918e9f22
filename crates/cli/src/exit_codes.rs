//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code  | Meaning                                        |
//! |-------|------------------------------------------------|
//! | 0     | Success                                        |
//! | 1     | General error (unspecified)                    |
//! | 2     | Usage error (bad args, malformed range)        |
//! | 3     | Local file error (cache or settings I/O)       |
//! | 10    | No credentials for the spreadsheet service     |
//! | 11    | Spreadsheet service unreachable or refused     |
//! | 12    | Requested sheet is not in the local cache      |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments or an unparseable range.
pub const EXIT_USAGE: u8 = 2;

/// Reading or writing a local file failed.
pub const EXIT_IO: u8 = 3;

/// No API key or access token was given or saved.
pub const EXIT_NOT_AUTH: u8 = 10;

/// Network failure or an HTTP error status from the service.
pub const EXIT_REMOTE: u8 = 11;

/// The sheet has never been downloaded.
pub const EXIT_NOT_CACHED: u8 = 12;
