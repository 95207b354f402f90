//! Object-store implementations behind [`crate::contract::ObjectStore`].
//!
//! [`AwsCliStore`] shells out to the `aws s3` command line tool; credentials
//! and region come from the ambient environment the way the rest of the
//! pipeline configures them. [`InMemoryStore`] is a test fake holding objects
//! in a map so the deploy workflow can be exercised without network access.

use std::process::Command;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::contract::{ObjectLocation, ObjectStore, StoreError};

/// Real store backed by the `aws s3` CLI.
pub struct AwsCliStore;

impl AwsCliStore {
    pub fn new() -> Self {
        AwsCliStore
    }
}

impl Default for AwsCliStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for AwsCliStore {
    async fn copy(&self, src: &ObjectLocation, dst: &ObjectLocation) -> Result<(), StoreError> {
        info!(src = %src, dst = %dst, "aws s3 cp");
        let output = Command::new("aws")
            .arg("s3")
            .arg("cp")
            .arg(src.to_string())
            .arg(dst.to_string())
            .output()?;
        if !output.status.success() {
            return Err(StoreError::CommandFailed {
                program: "aws s3 cp".to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let target = format!("s3://{}/{}", bucket, prefix);
        info!(target = %target, "aws s3 ls");
        let output = Command::new("aws").arg("s3").arg("ls").arg(&target).output()?;

        // `aws s3 ls` exits 1 with no output when nothing matches; that is a
        // successful empty listing. Anything else non-zero is a real failure
        // and must not be mistaken for "no objects".
        match output.status.code() {
            Some(0) => {}
            Some(1) if output.stdout.is_empty() && output.stderr.is_empty() => {
                return Ok(Vec::new())
            }
            code => {
                return Err(StoreError::CommandFailed {
                    program: "aws s3 ls".to_string(),
                    status: code,
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| StoreError::InvalidListing(e.to_string()))?;
        let mut keys = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            // Each line is "<date> <time> <size> <key>".
            let key = line
                .split_whitespace()
                .nth(3)
                .ok_or_else(|| StoreError::InvalidListing(format!("unparseable line: {line}")))?;
            keys.push(key.to_string());
        }
        debug!(count = keys.len(), target = %target, "listing complete");
        Ok(keys)
    }
}

#[cfg(any(test, feature = "test-export-mocks"))]
pub use fake::InMemoryStore;

#[cfg(any(test, feature = "test-export-mocks"))]
mod fake {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::contract::{ObjectLocation, ObjectStore, StoreError};

    /// In-memory fake: remote objects live in a map keyed by (bucket, key);
    /// local locations read and write the real filesystem so the gzip and
    /// annotation steps are exercised end to end.
    #[derive(Default)]
    pub struct InMemoryStore {
        objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
        list_calls: AtomicUsize,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), bytes);
        }

        pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
        }

        pub fn contains(&self, bucket: &str, key: &str) -> bool {
            self.get(bucket, key).is_some()
        }

        /// Keys currently stored in `bucket`.
        pub fn keys_in(&self, bucket: &str) -> Vec<String> {
            self.objects
                .lock()
                .unwrap()
                .keys()
                .filter(|(b, _)| b == bucket)
                .map(|(_, k)| k.clone())
                .collect()
        }

        /// How many times `list` has been invoked.
        pub fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        fn read(&self, loc: &ObjectLocation) -> Result<Vec<u8>, StoreError> {
            match loc {
                ObjectLocation::Remote { bucket, key } => self
                    .get(bucket, key)
                    .ok_or_else(|| StoreError::Other(format!("no such object: {}", loc))),
                ObjectLocation::Local(path) => Ok(std::fs::read(path)?),
            }
        }

        fn write(&self, loc: &ObjectLocation, bytes: Vec<u8>) -> Result<(), StoreError> {
            match loc {
                ObjectLocation::Remote { bucket, key } => {
                    self.insert(bucket, key, bytes);
                    Ok(())
                }
                ObjectLocation::Local(path) => Ok(std::fs::write(path, bytes)?),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for InMemoryStore {
        async fn copy(
            &self,
            src: &ObjectLocation,
            dst: &ObjectLocation,
        ) -> Result<(), StoreError> {
            let bytes = self.read(src)?;
            self.write(dst, bytes)
        }

        async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .objects
                .lock()
                .unwrap()
                .keys()
                .filter(|(b, k)| b == bucket && k.starts_with(prefix))
                .map(|(_, k)| k.clone())
                .collect())
        }
    }
}
