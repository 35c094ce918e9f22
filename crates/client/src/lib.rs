//! Remote spreadsheet access.
//!
//! Credentials on disk, a blocking HTTP client for the four calls the sync
//! makes, and `RemoteGrid`, which puts that client behind the `GridSource`
//! and `SheetDownload` traits.

mod auth;
mod client;
mod remote;

pub use auth::{
    credentials_path, delete_credentials, load_credentials, load_credentials_from,
    save_credentials, save_credentials_to, Credentials,
};
pub use client::{
    ClientError, SheetProperties, SheetsClient, ValueRange, DEFAULT_API_BASE,
    DEFAULT_TIMEOUT_SECS,
};
pub use remote::RemoteGrid;
