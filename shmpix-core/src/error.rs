//! Custom error types for shmpix.
//!
//! Recoverable failures are explicit enum variants. Caller contract violations
//! (uploading a released buffer, tearing a buffer down twice) are not errors at
//! all: they panic.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SegmentId;

/// Top-level error type for shmpix.
#[derive(Debug, Error)]
pub enum ShmpixError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Shared Memory Errors
    // =========================================================================
    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] SharedMemoryError),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid input detected before any resource is allocated.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid buffer size {width}x{height}: {reason}")]
    InvalidBufferSize {
        width: i32,
        height: i32,
        reason: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Shared memory errors.
#[derive(Debug, Error)]
pub enum SharedMemoryError {
    #[error("Failed to create shared memory segment: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Failed to open shared memory segment: {name} - {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("Failed to map shared memory: {reason}")]
    MapFailed { reason: String },

    #[error("Failed to unmap shared memory: {reason}")]
    UnmapFailed { reason: String },

    #[error("Failed to unlink shared memory segment: {name} - {reason}")]
    UnlinkFailed { name: String, reason: String },
}

/// Errors reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to attach segment {name}: {reason}")]
    AttachFailed { name: String, reason: String },

    #[error("Segment {0} is not attached")]
    UnknownSegment(SegmentId),

    #[error("PutImage failed on segment {segment}: {reason}")]
    PutImageFailed { segment: SegmentId, reason: String },

    #[error("Failed to detach segment {segment}: {reason}")]
    DetachFailed { segment: SegmentId, reason: String },
}

/// Result type alias using ShmpixError.
pub type ShmpixResult<T> = Result<T, ShmpixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_buffer_size_display() {
        let err = HardValidationError::InvalidBufferSize {
            width: 0,
            height: 12,
            reason: "sides must be positive".to_string(),
        };
        assert!(err.to_string().contains("0x12"));
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_error_chain() {
        let transport_err = TransportError::UnknownSegment(SegmentId::new(7));
        let err: ShmpixError = transport_err.into();
        assert!(matches!(err, ShmpixError::Transport(_)));
        assert!(err.to_string().contains("seg#7"));
    }
}
