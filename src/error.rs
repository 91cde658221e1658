//! Error types for ZIP code resolution.

use thiserror::Error;

/// Failures of the resolution pipeline.
///
/// Every variant is absorbed by the request handler into the uniform
/// `{ "zips": [], "error": "..." }` response, so the messages here are what callers see.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZipMatchError {
    /// The request body could not be read as a JSON object.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Malformed or unsupported input geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The postal boundary dataset could not be queried.
    #[error("candidate source unavailable: {0}")]
    CandidateSourceUnavailable(String),

    /// Union or intersection failures left the request without any match.
    #[error("geometry operation failed: {0}")]
    GeometryOperationFailure(String),
}

pub type Result<T> = std::result::Result<T, ZipMatchError>;
