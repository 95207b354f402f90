//! High-level workflow: promote builds from staging to production and cut
//! dated snapshots.
//!
//! For each named build this module:
//!   - Copies the two "latest" artifacts (main Auspice document plus the
//!     companion root-sequence document) from staging to production, always
//!     overwriting (latest-pointer semantics)
//!   - Unless disabled, checks production for a snapshot dated today and, if
//!     none exists or `force` is set, downloads the latest artifacts into a
//!     per-build scratch directory, annotates every tree node with a fresh id
//!     via [`crate::annotate`], and archives both artifacts under dated keys
//!   - Aggregates per-build outcomes into a [`DeployReport`]
//!
//! # Error Handling
//! A failure on one build is recorded in the report and the remaining builds
//! still run; each build gets its own scratch directory so no state leaks
//! between iterations. An existing dated snapshot without `force` is a
//! deliberate skip, not an error.
//!
//! # Navigation
//! - Main entrypoint: [`deploy`]
//! - Supporting types: [`DeployConfig`], [`DeployReport`], [`BuildOutcome`]

use std::fmt;
use std::fs::File;
use std::path::PathBuf;

use chrono::Local;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::annotate::{self, AnnotateError};
use crate::contract::{ObjectLocation, ObjectStore, StoreError};
use crate::keys;

/// The full deploy configuration, threaded explicitly through the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Prefix shared by all builds in this invocation.
    pub prefix: String,
    /// Build names to deploy.
    pub build_names: Vec<String>,
    /// Overwrite an existing dated snapshot.
    pub force: bool,
    /// Skip the dated-snapshot step entirely.
    pub no_dated: bool,
    /// Push local files to staging instead of promoting staging to production.
    pub staging: bool,
    /// Directory holding the local artifacts for the staging push.
    pub local_source_dir: PathBuf,
}

impl DeployConfig {
    pub fn new(prefix: impl Into<String>, build_names: Vec<String>) -> Self {
        DeployConfig {
            prefix: prefix.into(),
            build_names,
            force: false,
            no_dated: false,
            staging: false,
            local_source_dir: PathBuf::from(keys::LOCAL_AUSPICE_DIR),
        }
    }
}

/// Outcome report for a whole invocation, one entry per build.
#[derive(Debug)]
pub struct DeployReport {
    pub builds: Vec<BuildReport>,
}

impl DeployReport {
    pub fn any_failed(&self) -> bool {
        self.builds
            .iter()
            .any(|b| matches!(b.outcome, BuildOutcome::Failed(_)))
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub build_name: String,
    pub outcome: BuildOutcome,
}

#[derive(Debug)]
pub enum BuildOutcome {
    /// Latest artifacts copied to production.
    Promoted { dated: DatedOutcome },
    /// Local artifacts pushed to the staging bucket.
    PushedToStaging,
    Failed(BuildError),
}

/// What happened to the dated-snapshot step of a promoted build.
#[derive(Debug, PartialEq, Eq)]
pub enum DatedOutcome {
    Created,
    /// A snapshot for today already exists and `force` was not set.
    SkippedExisting,
    /// The step was disabled for this invocation.
    NotRequested,
}

/// Error failing a single build. Does not abort the remaining builds.
#[derive(Debug)]
pub enum BuildError {
    Store(StoreError),
    Annotate(AnnotateError),
    Io(std::io::Error),
    Json(serde_json::Error),
    /// The store reported a successful download but the file is not on disk.
    MissingDownload(PathBuf),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Store(e) => write!(f, "storage operation failed: {}", e),
            BuildError::Annotate(e) => write!(f, "tree annotation failed: {}", e),
            BuildError::Io(e) => write!(f, "I/O error: {}", e),
            BuildError::Json(e) => write!(f, "malformed build document: {}", e),
            BuildError::MissingDownload(path) => write!(
                f,
                "downloaded artifact missing from disk: {}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Store(e) => Some(e),
            BuildError::Annotate(e) => Some(e),
            BuildError::Io(e) => Some(e),
            BuildError::Json(e) => Some(e),
            BuildError::MissingDownload(_) => None,
        }
    }
}

impl From<StoreError> for BuildError {
    fn from(e: StoreError) -> Self {
        BuildError::Store(e)
    }
}

impl From<AnnotateError> for BuildError {
    fn from(e: AnnotateError) -> Self {
        BuildError::Annotate(e)
    }
}

impl From<std::io::Error> for BuildError {
    fn from(e: std::io::Error) -> Self {
        BuildError::Io(e)
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(e: serde_json::Error) -> Self {
        BuildError::Json(e)
    }
}

/// Count the dated snapshots in production for `(prefix, build, date)`.
///
/// A failure of the underlying listing is surfaced as an error; it is never
/// reported as a count of zero, so a transient storage failure cannot be
/// mistaken for "safe to create a snapshot".
pub async fn dated_snapshot_count<S>(
    store: &S,
    prefix: &str,
    build: &str,
    date: &str,
) -> Result<usize, StoreError>
where
    S: ObjectStore,
{
    let listed = store
        .list(keys::PRODUCTION_BUCKET, &keys::dated_key(prefix, build, date))
        .await?;
    Ok(listed.len())
}

/// Entrypoint: deploy every configured build, one at a time.
pub async fn deploy<S>(config: &DeployConfig, store: &S) -> DeployReport
where
    S: ObjectStore,
{
    info!(
        builds = ?config.build_names,
        prefix = %config.prefix,
        target = if config.staging { "staging" } else { "production" },
        "Starting deploy"
    );

    let mut builds = Vec::new();
    for build_name in &config.build_names {
        let result = if config.staging {
            push_to_staging(config, store, build_name)
                .await
                .map(|_| BuildOutcome::PushedToStaging)
        } else {
            promote(config, store, build_name)
                .await
                .map(|dated| BuildOutcome::Promoted { dated })
        };
        let outcome = result.unwrap_or_else(|e| {
            error!(build = %build_name, error = %e, "Build deploy failed");
            BuildOutcome::Failed(e)
        });
        builds.push(BuildReport {
            build_name: build_name.clone(),
            outcome,
        });
    }
    DeployReport { builds }
}

/// Push a build's local artifacts to the staging bucket.
async fn push_to_staging<S>(
    config: &DeployConfig,
    store: &S,
    build_name: &str,
) -> Result<(), BuildError>
where
    S: ObjectStore,
{
    info!(build = %build_name, "Deploying build to staging");
    for key in [
        keys::latest_key(&config.prefix, build_name),
        keys::latest_root_sequence_key(&config.prefix, build_name),
    ] {
        store
            .copy(
                &ObjectLocation::local(config.local_source_dir.join(&key)),
                &ObjectLocation::remote(keys::STAGING_BUCKET, key.clone()),
            )
            .await?;
    }
    info!(
        build = %build_name,
        url = %keys::build_url(&config.prefix, build_name, None, true),
        "Uploaded build to staging"
    );
    Ok(())
}

/// Promote a build's latest artifacts to production and, unless disabled,
/// archive a dated snapshot with per-node ids injected.
async fn promote<S>(
    config: &DeployConfig,
    store: &S,
    build_name: &str,
) -> Result<DatedOutcome, BuildError>
where
    S: ObjectStore,
{
    info!(build = %build_name, "Deploying build to production");

    // Latest copies are overwritten unconditionally.
    for key in [
        keys::latest_key(&config.prefix, build_name),
        keys::latest_root_sequence_key(&config.prefix, build_name),
    ] {
        store
            .copy(
                &ObjectLocation::remote(keys::STAGING_BUCKET, key.clone()),
                &ObjectLocation::remote(keys::PRODUCTION_BUCKET, key),
            )
            .await?;
    }
    info!(
        build = %build_name,
        url = %keys::build_url(&config.prefix, build_name, None, true),
        "Uploaded build to production"
    );

    if config.no_dated {
        return Ok(DatedOutcome::NotRequested);
    }

    let today = Local::now().format("%Y-%m-%d").to_string();
    let existing = dated_snapshot_count(store, &config.prefix, build_name, &today).await?;
    if existing > 0 && !config.force {
        warn!(
            build = %build_name,
            date = %today,
            url = %keys::build_url(&config.prefix, build_name, Some(&today), false),
            "Dated build for today already exists, skipping upload; \
             use the -f/--force flag to overwrite existing dated builds"
        );
        return Ok(DatedOutcome::SkippedExisting);
    }
    if existing > 0 {
        info!(build = %build_name, "Overwriting existing dated build due to --force flag");
    }

    // Per-build scratch directory, dropped (and deleted) at the end of this
    // build's iteration.
    let scratch = tempfile::tempdir()?;

    let latest_key = keys::latest_key(&config.prefix, build_name);
    let root_sequence_key = keys::latest_root_sequence_key(&config.prefix, build_name);
    for key in [&latest_key, &root_sequence_key] {
        store
            .copy(
                &ObjectLocation::remote(keys::STAGING_BUCKET, key.clone()),
                &ObjectLocation::local(scratch.path().join(key)),
            )
            .await?;
    }

    let document_path = scratch.path().join(&latest_key);
    if !document_path.exists() {
        return Err(BuildError::MissingDownload(document_path));
    }
    let root_sequence_path = scratch.path().join(&root_sequence_key);
    if !root_sequence_path.exists() {
        return Err(BuildError::MissingDownload(root_sequence_path));
    }

    // The staged document is gzip JSON; the dated snapshot is plain JSON.
    let mut document: serde_json::Value =
        serde_json::from_reader(GzDecoder::new(File::open(&document_path)?))?;
    annotate::annotate_document(&mut document)?;

    let dated_key = keys::dated_key(&config.prefix, build_name, &today);
    let dated_path = scratch.path().join(&dated_key);
    serde_json::to_writer(File::create(&dated_path)?, &document)?;

    store
        .copy(
            &ObjectLocation::local(&dated_path),
            &ObjectLocation::remote(keys::PRODUCTION_BUCKET, dated_key),
        )
        .await?;
    store
        .copy(
            &ObjectLocation::local(&root_sequence_path),
            &ObjectLocation::remote(
                keys::PRODUCTION_BUCKET,
                keys::dated_root_sequence_key(&config.prefix, build_name, &today),
            ),
        )
        .await?;

    info!(
        build = %build_name,
        date = %today,
        url = %keys::build_url(&config.prefix, build_name, Some(&today), false),
        "Uploaded dated build to production"
    );
    Ok(DatedOutcome::Created)
}
