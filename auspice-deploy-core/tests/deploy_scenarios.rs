use std::io::Write;

use chrono::Local;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;

use auspice_deploy_core::contract::{MockObjectStore, StoreError};
use auspice_deploy_core::deploy::{
    dated_snapshot_count, deploy, BuildError, BuildOutcome, DatedOutcome, DeployConfig,
};
use auspice_deploy_core::keys;
use auspice_deploy_core::store::InMemoryStore;

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// A minimal staged Auspice document, gzip-compressed as the pipeline stores it.
fn gzipped_document() -> Vec<u8> {
    let document = json!({
        "version": "v2",
        "meta": { "title": "Seasonal influenza" },
        "tree": {
            "name": "root",
            "children": [
                { "name": "tip_a" },
                { "name": "internal", "children": [ { "name": "tip_b" } ] }
            ]
        }
    });
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(document.to_string().as_bytes())
        .expect("gzip write failed");
    encoder.finish().expect("gzip finish failed")
}

/// Seeds the staging bucket with both latest artifacts for a build.
fn seed_staging(store: &InMemoryStore, prefix: &str, build: &str) {
    store.insert(
        keys::STAGING_BUCKET,
        &keys::latest_key(prefix, build),
        gzipped_document(),
    );
    store.insert(
        keys::STAGING_BUCKET,
        &keys::latest_root_sequence_key(prefix, build),
        br#"{"nuc": "ATGC"}"#.to_vec(),
    );
}

fn count_ids(node: &serde_json::Value) -> usize {
    let mut count = 0;
    if node["branch_attrs"]["labels"]["id"].is_string() {
        count += 1;
    }
    if let Some(children) = node.get("children").and_then(|c| c.as_array()) {
        for child in children {
            count += count_ids(child);
        }
    }
    count
}

#[tokio::test]
async fn fresh_promotion_copies_latest_and_creates_dated_snapshot() {
    let store = InMemoryStore::new();
    seed_staging(&store, "nextstrain", "flu_seasonal");

    let config = DeployConfig::new("nextstrain", vec!["flu_seasonal".to_string()]);
    let report = deploy(&config, &store).await;

    assert_eq!(report.builds.len(), 1);
    assert!(matches!(
        report.builds[0].outcome,
        BuildOutcome::Promoted {
            dated: DatedOutcome::Created
        }
    ));
    assert!(!report.any_failed());

    // Latest pointers are in production.
    assert!(store.contains(keys::PRODUCTION_BUCKET, "nextstrain_flu_seasonal.json"));
    assert!(store.contains(
        keys::PRODUCTION_BUCKET,
        "nextstrain_flu_seasonal_root-sequence.json"
    ));

    // The dated snapshot is plain JSON with every node annotated.
    let dated_key = keys::dated_key("nextstrain", "flu_seasonal", &today());
    let bytes = store
        .get(keys::PRODUCTION_BUCKET, &dated_key)
        .expect("dated snapshot should exist");
    let document: serde_json::Value =
        serde_json::from_slice(&bytes).expect("dated snapshot should be uncompressed JSON");
    assert_eq!(document["meta"]["title"], "Seasonal influenza");
    assert_eq!(count_ids(&document["tree"]), 4, "all four nodes annotated");

    // The companion is archived under the dated key too.
    assert!(store.contains(
        keys::PRODUCTION_BUCKET,
        &keys::dated_root_sequence_key("nextstrain", "flu_seasonal", &today())
    ));
}

#[tokio::test]
async fn existing_dated_snapshot_is_skipped_without_force() {
    let store = InMemoryStore::new();
    seed_staging(&store, "nextstrain", "flu_seasonal");
    let dated_key = keys::dated_key("nextstrain", "flu_seasonal", &today());
    store.insert(keys::PRODUCTION_BUCKET, &dated_key, b"original".to_vec());

    let config = DeployConfig::new("nextstrain", vec!["flu_seasonal".to_string()]);
    let report = deploy(&config, &store).await;

    assert!(matches!(
        report.builds[0].outcome,
        BuildOutcome::Promoted {
            dated: DatedOutcome::SkippedExisting
        }
    ));
    // The basic copy still happened.
    assert!(store.contains(keys::PRODUCTION_BUCKET, "nextstrain_flu_seasonal.json"));
    // The existing snapshot was left untouched.
    assert_eq!(
        store.get(keys::PRODUCTION_BUCKET, &dated_key),
        Some(b"original".to_vec())
    );
}

#[tokio::test]
async fn force_overwrites_existing_dated_snapshot() {
    let store = InMemoryStore::new();
    seed_staging(&store, "nextstrain", "flu_seasonal");
    let dated_key = keys::dated_key("nextstrain", "flu_seasonal", &today());
    store.insert(keys::PRODUCTION_BUCKET, &dated_key, b"original".to_vec());

    let mut config = DeployConfig::new("nextstrain", vec!["flu_seasonal".to_string()]);
    config.force = true;
    let report = deploy(&config, &store).await;

    assert!(matches!(
        report.builds[0].outcome,
        BuildOutcome::Promoted {
            dated: DatedOutcome::Created
        }
    ));
    let bytes = store.get(keys::PRODUCTION_BUCKET, &dated_key).unwrap();
    assert_ne!(bytes, b"original".to_vec());
    let document: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(document["tree"]["branch_attrs"]["labels"]["id"].is_string());
}

#[tokio::test]
async fn no_dated_skips_existence_check_and_snapshot() {
    let store = InMemoryStore::new();
    seed_staging(&store, "nextstrain", "flu_seasonal");

    let mut config = DeployConfig::new("nextstrain", vec!["flu_seasonal".to_string()]);
    config.no_dated = true;
    let report = deploy(&config, &store).await;

    assert!(matches!(
        report.builds[0].outcome,
        BuildOutcome::Promoted {
            dated: DatedOutcome::NotRequested
        }
    ));
    assert_eq!(store.list_calls(), 0, "no existence check should run");
    // Only the two latest artifacts arrive in production.
    assert_eq!(store.keys_in(keys::PRODUCTION_BUCKET).len(), 2);
}

#[tokio::test]
async fn staging_mode_pushes_local_files_and_skips_production() {
    let store = InMemoryStore::new();
    let local_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        local_dir.path().join("nextstrain_flu_seasonal.json"),
        b"{\"tree\": {}}",
    )
    .unwrap();
    std::fs::write(
        local_dir
            .path()
            .join("nextstrain_flu_seasonal_root-sequence.json"),
        b"{}",
    )
    .unwrap();

    let mut config = DeployConfig::new("nextstrain", vec!["flu_seasonal".to_string()]);
    config.staging = true;
    config.local_source_dir = local_dir.path().to_path_buf();
    let report = deploy(&config, &store).await;

    assert!(matches!(
        report.builds[0].outcome,
        BuildOutcome::PushedToStaging
    ));
    assert!(store.contains(keys::STAGING_BUCKET, "nextstrain_flu_seasonal.json"));
    assert!(store.contains(
        keys::STAGING_BUCKET,
        "nextstrain_flu_seasonal_root-sequence.json"
    ));
    assert!(
        store.keys_in(keys::PRODUCTION_BUCKET).is_empty(),
        "staging mode must not touch production"
    );
    assert_eq!(store.list_calls(), 0, "staging mode runs no dated logic");
}

#[tokio::test]
async fn existence_count_goes_from_zero_to_positive_after_snapshot() {
    let store = InMemoryStore::new();
    seed_staging(&store, "nextstrain", "flu_seasonal");

    let before = dated_snapshot_count(&store, "nextstrain", "flu_seasonal", &today())
        .await
        .unwrap();
    assert_eq!(before, 0);

    let config = DeployConfig::new("nextstrain", vec!["flu_seasonal".to_string()]);
    deploy(&config, &store).await;

    let after = dated_snapshot_count(&store, "nextstrain", "flu_seasonal", &today())
        .await
        .unwrap();
    assert!(after > 0);
}

#[tokio::test]
async fn listing_failure_fails_the_build_loudly() {
    let mut store = MockObjectStore::new();
    // The unconditional latest copies still run first.
    store.expect_copy().times(2).returning(|_, _| Ok(()));
    store.expect_list().return_once(|_, _| {
        Err(StoreError::CommandFailed {
            program: "aws s3 ls".to_string(),
            status: Some(255),
            stderr: "Unable to locate credentials".to_string(),
        })
    });

    let config = DeployConfig::new("nextstrain", vec!["flu_seasonal".to_string()]);
    let report = deploy(&config, &store).await;

    // A failed existence check must not be treated as "zero snapshots".
    assert!(matches!(
        report.builds[0].outcome,
        BuildOutcome::Failed(BuildError::Store(_))
    ));
    assert!(report.any_failed());
}

#[tokio::test]
async fn missing_download_fails_with_diagnostic() {
    let mut store = MockObjectStore::new();
    // Every copy "succeeds" but nothing is ever written to disk.
    store.expect_copy().returning(|_, _| Ok(()));
    store.expect_list().returning(|_, _| Ok(vec![]));

    let config = DeployConfig::new("nextstrain", vec!["flu_seasonal".to_string()]);
    let report = deploy(&config, &store).await;

    match &report.builds[0].outcome {
        BuildOutcome::Failed(BuildError::MissingDownload(path)) => {
            assert!(path.to_string_lossy().contains("nextstrain_flu_seasonal"));
        }
        other => panic!("expected MissingDownload failure, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_document_fails_fast() {
    let store = InMemoryStore::new();
    // A document with no 'tree' key.
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(br#"{"meta": {"title": "no tree here"}}"#)
        .unwrap();
    store.insert(
        keys::STAGING_BUCKET,
        "nextstrain_flu_seasonal.json",
        encoder.finish().unwrap(),
    );
    store.insert(
        keys::STAGING_BUCKET,
        "nextstrain_flu_seasonal_root-sequence.json",
        b"{}".to_vec(),
    );

    let config = DeployConfig::new("nextstrain", vec!["flu_seasonal".to_string()]);
    let report = deploy(&config, &store).await;

    assert!(matches!(
        report.builds[0].outcome,
        BuildOutcome::Failed(BuildError::Annotate(_))
    ));
    // No dated snapshot may appear from a failed annotation.
    assert!(!store.contains(
        keys::PRODUCTION_BUCKET,
        &keys::dated_key("nextstrain", "flu_seasonal", &today())
    ));
}

#[tokio::test]
async fn one_failed_build_does_not_abort_the_rest() {
    let store = InMemoryStore::new();
    // Only the second build is staged; the first will fail its basic copy.
    seed_staging(&store, "nextstrain", "measles");

    let config = DeployConfig::new(
        "nextstrain",
        vec!["flu_seasonal".to_string(), "measles".to_string()],
    );
    let report = deploy(&config, &store).await;

    assert_eq!(report.builds.len(), 2);
    assert!(matches!(
        report.builds[0].outcome,
        BuildOutcome::Failed(_)
    ));
    assert!(matches!(
        report.builds[1].outcome,
        BuildOutcome::Promoted {
            dated: DatedOutcome::Created
        }
    ));
    assert!(report.any_failed());
}
