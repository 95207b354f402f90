//! # contract: interface for the backing object store
//!
//! This module defines a single trait (`ObjectStore`) and its supporting
//! types for copying build artifacts between storage locations and listing
//! objects under a key prefix.
//!
//! ## Interface & Extensibility
//! - Implement the [`ObjectStore`] trait to back the workflow with a real
//!   storage service, a local filesystem, or a test fake.
//! - All methods are async and return [`StoreError`] on failure.
//! - A failed call is always surfaced as an `Err`; implementations must not
//!   report a failed listing as an empty one.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests. An in-memory fake lives
//!   in [`crate::store`].

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use mockall::automock;

/// Where an artifact lives: an object in a remote bucket or a file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectLocation {
    Remote { bucket: String, key: String },
    Local(PathBuf),
}

impl ObjectLocation {
    pub fn remote(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        ObjectLocation::Remote {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        ObjectLocation::Local(path.into())
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectLocation::Remote { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            ObjectLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Error from an object-store operation.
///
/// A genuine query failure (launch error, non-zero exit, garbled output) is
/// distinct from a successful-but-empty listing, so callers can refuse to
/// treat "the check failed" as "no snapshot exists".
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    /// The storage command ran but reported failure.
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    /// The listing output could not be decoded.
    InvalidListing(String),
    Other(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "storage I/O error: {}", e),
            StoreError::CommandFailed {
                program,
                status,
                stderr,
            } => match status {
                Some(code) => {
                    write!(f, "{} exited with code {}: {}", program, code, stderr.trim())
                }
                None => write!(f, "{} terminated by signal: {}", program, stderr.trim()),
            },
            StoreError::InvalidListing(msg) => write!(f, "invalid listing output: {}", msg),
            StoreError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Trait for copying artifacts between storage locations and listing objects.
/// The implementor is responsible for connecting to a backing service.
///
/// The trait is implemented by the real storage client ([`crate::store::AwsCliStore`]),
/// by an in-memory fake ([`crate::store::InMemoryStore`]) and by generated mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy a single object between locations (remote-to-remote, or either
    /// direction between remote and local).
    async fn copy(&self, src: &ObjectLocation, dst: &ObjectLocation) -> Result<(), StoreError>;

    /// List the keys in `bucket` that start with `prefix`.
    ///
    /// An empty `Ok` means the query succeeded and found nothing; any failure
    /// of the query itself must be an `Err`.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError>;
}
