//! Common types for the Polyaxon agent runtime: schemas, errors, and utilities

pub mod constants;
pub mod error;
pub mod logging;
pub mod retry;
pub mod schemas;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
