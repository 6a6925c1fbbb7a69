//! Unified error type for periploko.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].
//! Only [`Error::NotFound`], [`Error::InvalidRequest`] and
//! [`Error::RangeNotSatisfiable`] are expected to reach clients during normal
//! operation; the rest degrade into partial data where they occur.

use std::fmt;

/// Unified error type covering all failure modes in periploko.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested file, subtitle or movie does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "file", "movie").
        entity: String,
        /// The identifier or path that was looked up.
        id: String,
    },

    /// Malformed request data: bad Range syntax, a path escaping the media
    /// root, an unsupported file type.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested byte range starts beyond the end of the file.
    #[error("Range not satisfiable (size {size})")]
    RangeNotSatisfiable {
        /// Size of the file in bytes.
        size: u64,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed or timed out.
    #[error("Probe error: {0}")]
    Probe(String),

    /// External metadata lookup failed or timed out.
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// The encoder failed while producing a transcoded stream.
    #[error("Transcode error: {0}")]
    Transcode(String),

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::InvalidRequest(_) => 400,
            Error::RangeNotSatisfiable { .. } => 416,
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Probe(_) => 422,
            Error::Enrichment(_) => 502,
            Error::Transcode(_) => 500,
            Error::Config(_) => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::InvalidRequest(_) => "invalid_request",
            Error::RangeNotSatisfiable { .. } => "range_not_satisfiable",
            Error::Io { .. } => "io_error",
            Error::Tool { .. } => "tool_error",
            Error::Probe(_) => "probe_error",
            Error::Enrichment(_) => "enrichment_error",
            Error::Transcode(_) => "transcode_error",
            Error::Config(_) => "config_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::InvalidRequest`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidRequest(message.into())
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
