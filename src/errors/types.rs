//! Error type definitions for the EPG import pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Top-level import error type
///
/// Every stage of the pipeline reports failures through this enum. The
/// controller decides per variant whether the failure triggers URL failover,
/// abandons the current source, or is only logged.
#[derive(Error, Debug)]
pub enum ImportError {
    /// Network or transport failure while downloading a URL
    #[error("Fetch failed: {url} - {message}")]
    Fetch { url: String, message: String },

    /// A downloaded or local file turned out to be empty or missing
    #[error("File is empty: {}", path.display())]
    EmptyDownload { path: PathBuf },

    /// Local filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed feed or channel data
    #[error("Parse error: {context} - {message}")]
    Parse { context: String, message: String },

    /// Errors reported by the EPG store
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Mismatch between what a source needs and what the host provides
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Parser id that resolves to no registered parser
    #[error("Unknown parser: {name}")]
    UnknownParser { name: String },

    /// Background worker failed to hand its result back
    #[error("Worker error: {message}")]
    Worker { message: String },
}

/// Errors raised by an EPG store implementation
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store does not implement the requested operation
    #[error("Unsupported store operation: {operation}")]
    Unsupported { operation: &'static str },

    /// The store refused the data or the reload
    #[error("Store rejected request: {message}")]
    Rejected { message: String },

    /// I/O errors from file backed stores
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience methods for creating common error types
impl ImportError {
    /// Create a fetch error for a URL
    pub fn fetch<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a parse error with the element or file it happened in
    pub fn parse<C: Into<String>, M: Into<String>>(context: C, message: M) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a worker error
    pub fn worker<S: Into<String>>(message: S) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }
}

impl StoreError {
    /// Create a rejected error
    pub fn rejected<S: Into<String>>(message: S) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}
