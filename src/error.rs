//! Error types for the Nova3D culling core
//!
//! This module defines the error types used throughout the crate.
//! The taxonomy is small and precondition-based: there is no I/O
//! anywhere in this core, so almost every failure is an integration
//! bug between the pipeline and its caller.

use std::fmt;

/// Result type for Nova3D culling operations
pub type Nova3dResult<T> = std::result::Result<T, Nova3dError>;

/// Nova3D culling core errors
#[derive(Debug, Clone)]
pub enum Nova3dError {
    /// A call was made out of sequence (e.g. adding a cluster object
    /// before `init` or after `generate`). Programmer error, not a
    /// recoverable runtime condition.
    InvalidOperation(String),

    /// Invalid resource (geometry buffer, occluder mesh, etc.)
    InvalidResource(String),

    /// Initialization failed (threadpool, camera state)
    InitializationFailed(String),
}

impl fmt::Display for Nova3dError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nova3dError::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Nova3dError::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Nova3dError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Nova3dError {}

/// Crate-internal aliases, used by every module.
pub type Error = Nova3dError;
pub type Result<T> = Nova3dResult<T>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
