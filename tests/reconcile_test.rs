// tests/reconcile_test.rs

//! Integration tests for nfvpkg
//!
//! These drive the reconciler end-to-end through its public API, with the
//! management client and transfer collaborators replaced by in-memory fakes
//! that record every call.

use nfvpkg::api::ManagementClient;
use nfvpkg::reconcile::{DesiredState, PackageSpec, Reconciler};
use nfvpkg::report::Report;
use nfvpkg::transfer::SecureTransfer;
use nfvpkg::Result;
use reqwest::Method;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Fake management API that serves a fixed listing and records mutations
struct FakeApi {
    listing: Value,
    calls: RefCell<Vec<(String, Method, Option<Value>)>>,
}

impl FakeApi {
    fn new(listing: Value) -> Self {
        Self {
            listing,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn mutation_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(_, m, _)| *m != Method::GET)
            .count()
    }
}

impl ManagementClient for FakeApi {
    fn query(&self, path: &str) -> Result<Value> {
        self.calls
            .borrow_mut()
            .push((path.to_string(), Method::GET, None));
        Ok(self.listing.clone())
    }

    fn mutate(&self, path: &str, method: Method, payload: Option<Value>) -> Result<Value> {
        self.calls
            .borrow_mut()
            .push((path.to_string(), method, payload));
        Ok(Value::Null)
    }
}

/// Fake uploader that copies the artifact into a local staging directory,
/// so tests can verify exactly what would land on the host
struct FakeTransfer {
    staging: tempfile::TempDir,
    uploads: RefCell<Vec<(PathBuf, String)>>,
}

impl FakeTransfer {
    fn new() -> Self {
        Self {
            staging: tempfile::tempdir().unwrap(),
            uploads: RefCell::new(Vec::new()),
        }
    }

    fn staged(&self, remote: &str) -> PathBuf {
        self.staging
            .path()
            .join(remote.trim_start_matches('/').replace('/', "_"))
    }
}

impl SecureTransfer for FakeTransfer {
    fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        std::fs::copy(local, self.staged(remote))?;
        self.uploads
            .borrow_mut()
            .push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }
}

fn listing_with(names: &[(&str, &str)]) -> Value {
    let image: Vec<Value> = names
        .iter()
        .map(|(name, src)| json!({"name": name, "src": src}))
        .collect();
    json!({"vmlc:images": {"image": image}})
}

fn present_spec(name: &str, file: &Path) -> PackageSpec {
    PackageSpec {
        name: name.to_string(),
        state: DesiredState::Present,
        file: Some(file.to_path_buf()),
        dest: "/data/intdatastore/uploads".to_string(),
    }
}

fn absent_spec(name: &str) -> PackageSpec {
    PackageSpec {
        name: name.to_string(),
        state: DesiredState::Absent,
        file: None,
        dest: "/data/intdatastore/uploads".to_string(),
    }
}

#[test]
fn test_present_run_uploads_artifact_content() {
    let artifact = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(artifact.path(), b"fake qcow2 payload").unwrap();

    let api = FakeApi::new(json!({}));
    let transfer = FakeTransfer::new();
    let reconciler = Reconciler::new(&api, &transfer, false);

    let outcome = reconciler
        .run(&present_spec("asav", artifact.path()))
        .unwrap();
    assert!(outcome.changed);

    // The bytes that would land on the host are the artifact's bytes
    let staged = transfer.staged("/data/intdatastore/uploads/asav.tar.gz");
    assert_eq!(std::fs::read(staged).unwrap(), b"fake qcow2 payload");

    // Exactly one mutation: the create call, referencing the uploaded file
    let calls = api.calls.borrow();
    let create = calls.iter().find(|(_, m, _)| *m == Method::POST).unwrap();
    assert_eq!(create.0, "/config/vm_lifecycle/images");
    assert_eq!(
        create.2,
        Some(json!({
            "image": {
                "name": "asav",
                "src": "file:///data/intdatastore/uploads/asav.tar.gz"
            }
        }))
    );
}

#[test]
fn test_present_is_idempotent_across_runs() {
    let artifact = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(artifact.path(), b"payload").unwrap();
    let spec = present_spec("asav", artifact.path());

    // First run: the host has no images, so the run acts
    let api = FakeApi::new(json!({}));
    let transfer = FakeTransfer::new();
    let first = Reconciler::new(&api, &transfer, false).run(&spec).unwrap();
    assert!(first.changed);
    assert_eq!(api.mutation_count(), 1);

    // Second run: the host now reports the image, so nothing happens
    let api = FakeApi::new(listing_with(&[(
        "asav",
        "file:///data/intdatastore/uploads/asav.tar.gz",
    )]));
    let transfer = FakeTransfer::new();
    let second = Reconciler::new(&api, &transfer, false).run(&spec).unwrap();
    assert!(!second.changed);
    assert_eq!(api.mutation_count(), 0);
    assert!(transfer.uploads.borrow().is_empty());
}

#[test]
fn test_absent_is_idempotent_across_runs() {
    let spec = absent_spec("asav");

    // First run: the image is registered, so the run acts
    let api = FakeApi::new(listing_with(&[("asav", "file:///x/asav.tar.gz")]));
    let transfer = FakeTransfer::new();
    let first = Reconciler::new(&api, &transfer, false).run(&spec).unwrap();
    assert!(first.changed);
    assert_eq!(api.mutation_count(), 2);

    // Second run: the image is gone, so nothing happens
    let api = FakeApi::new(json!({}));
    let transfer = FakeTransfer::new();
    let second = Reconciler::new(&api, &transfer, false).run(&spec).unwrap();
    assert!(!second.changed);
    assert_eq!(api.mutation_count(), 0);
}

#[test]
fn test_absent_run_deletes_registration_then_backing_file() {
    let api = FakeApi::new(listing_with(&[("asav", "file:///x/asav.tar.gz")]));
    let transfer = FakeTransfer::new();

    let outcome = Reconciler::new(&api, &transfer, false)
        .run(&absent_spec("asav"))
        .unwrap();
    assert!(outcome.changed);

    let calls = api.calls.borrow();
    let mutations: Vec<_> = calls.iter().filter(|(_, m, _)| *m != Method::GET).collect();
    assert_eq!(mutations.len(), 2);

    // Order matters: registration first, then the file it pointed at
    assert_eq!(mutations[0].0, "/config/vm_lifecycle/images/image/asav");
    assert_eq!(mutations[0].1, Method::DELETE);
    assert_eq!(mutations[1].0, "/operations/system/file-delete/file");
    assert_eq!(
        mutations[1].2,
        Some(json!({"input": {"name": "/x/asav.tar.gz"}}))
    );
}

#[test]
fn test_check_mode_matches_live_changed_values() {
    let artifact = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(artifact.path(), b"payload").unwrap();

    // (listing, spec, changed a live run would report)
    let cases = [
        (json!({}), present_spec("asav", artifact.path()), true),
        (
            listing_with(&[("asav", "file:///x/asav.tar.gz")]),
            present_spec("asav", artifact.path()),
            false,
        ),
        (
            listing_with(&[("asav", "file:///x/asav.tar.gz")]),
            absent_spec("asav"),
            true,
        ),
        (json!({}), absent_spec("asav"), false),
    ];

    for (listing, spec, expected_changed) in cases {
        let api = FakeApi::new(listing);
        let transfer = FakeTransfer::new();
        let outcome = Reconciler::new(&api, &transfer, true).run(&spec).unwrap();

        assert_eq!(outcome.changed, expected_changed, "spec: {:?}", spec);
        assert_eq!(api.mutation_count(), 0, "check mode must not mutate");
        assert!(
            transfer.uploads.borrow().is_empty(),
            "check mode must not upload"
        );
    }
}

#[test]
fn test_malformed_listing_is_treated_as_empty_inventory() {
    // A host reporting zero images may answer with a shape the indexer
    // cannot interpret; the run proceeds as if the inventory were empty
    for listing in [json!(null), json!([]), json!({"vmlc:images": "?"})] {
        let api = FakeApi::new(listing);
        let transfer = FakeTransfer::new();
        let outcome = Reconciler::new(&api, &transfer, false)
            .run(&absent_spec("asav"))
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(api.mutation_count(), 0);
    }
}

#[test]
fn test_report_round_trip_from_outcome() {
    let api = FakeApi::new(listing_with(&[("asav", "file:///x/asav.tar.gz")]));
    let transfer = FakeTransfer::new();
    let outcome = Reconciler::new(&api, &transfer, false)
        .run(&absent_spec("asav"))
        .unwrap();

    let report = Report::success(outcome);
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["changed"], json!(true));
    // The snapshot predates the deletion, so the image is still listed
    assert_eq!(
        value["current"]["vmlc:images"]["image"][0]["name"],
        json!("asav")
    );
    assert!(value.get("failed").is_none());
}
