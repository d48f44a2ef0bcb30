//! Centralized error handling for the EPG import pipeline
//!
//! Errors are split the same way the pipeline is: [`ImportError`] covers
//! everything that can go wrong while fetching, decoding and parsing a
//! source, while [`StoreError`] is what an EPG store reports back when an
//! import or reload call fails.
//!
//! Most of these errors are recoverable from the pipeline's point of view.
//! They are logged with enough context to diagnose the failing source and
//! the run moves on; only the binary boundary turns them into `anyhow`
//! errors.
//!
//! # Usage
//!
//! ```rust
//! use epg_import::errors::{ImportError, ImportResult};
//!
//! fn example_function() -> ImportResult<String> {
//!     Err(ImportError::configuration("no parser registered"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using ImportError
pub type ImportResult<T> = Result<T, ImportError>;

/// Convenience type alias for store Results
pub type StoreResult<T> = Result<T, StoreError>;
