// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use super::*;
use crate::error::ErrorCode;

fn registration(group: &str, host: &str, name: &str, endpoint: &str) -> Registration {
    Registration {
        group: group.to_owned(),
        host: host.to_owned(),
        name: name.to_owned(),
        endpoint: endpoint.to_owned(),
        platform: Platform::default(),
    }
}

fn memory_registry() -> anyhow::Result<Registry> {
    Registry::open(MemoryStore::new())
}

fn assert_counts_consistent(summary: &Summary) {
    let packages: usize = summary.groups.iter().map(|g| g.packages.len()).sum();
    assert_eq!(summary.group_count, summary.groups.len());
    assert_eq!(summary.package_count, packages);
    assert_eq!(summary.host_count, model::distinct_hosts(summary.packages()));
    assert!(summary.groups.iter().all(|g| !g.packages.is_empty()));
}

/// Store whose writes can be switched off to simulate a full disk.
struct FlakyStore {
    inner: MemoryStore,
    failing: Arc<AtomicBool>,
}

impl SnapshotStore for FlakyStore {
    fn load(&self) -> anyhow::Result<Option<Summary>> {
        if self.failing.load(Ordering::Relaxed) {
            anyhow::bail!("read failed");
        }
        self.inner.load()
    }

    fn save(&self, summary: &Summary) -> anyhow::Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            anyhow::bail!("disk full");
        }
        self.inner.save(summary)
    }
}

#[test]
fn open_creates_and_persists_empty_snapshot() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let registry = Registry::open(JsonFileStore::in_dir(dir.path()))?;
    assert_eq!(registry.snapshot(), Summary::default());
    assert!(dir.path().join(store::SNAPSHOT_FILE).exists());
    Ok(())
}

#[test]
fn open_reloads_previous_snapshot() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    {
        let registry = Registry::open(JsonFileStore::in_dir(dir.path()))?;
        registry.save(registration("basic", "h1", "default", "http://h1:9180/x/"))?;
    }
    let registry = Registry::open(JsonFileStore::in_dir(dir.path()))?;
    let summary = registry.find_all();
    assert_eq!(summary.package_count, 1);
    assert_eq!(summary.groups[0].packages[0].host, "h1");
    Ok(())
}

#[test]
fn open_refuses_corrupt_snapshot() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join(store::SNAPSHOT_FILE), "{not json")?;
    assert!(Registry::open(JsonFileStore::in_dir(dir.path())).is_err());
    Ok(())
}

#[test]
fn first_registration_populates_counts() -> anyhow::Result<()> {
    let registry = memory_registry()?;
    let outcome = registry.save(registration("basic", "h1", "default", "http://h1:9180/x/"))?;
    assert_eq!(outcome, SaveOutcome::Created);

    let summary = registry.find_all();
    assert_eq!(summary.group_count, 1);
    assert_eq!(summary.package_count, 1);
    assert_eq!(summary.host_count, 1);
    assert_eq!(summary.groups[0].packages[0].status, PackageStatus::Alive);
    Ok(())
}

#[test]
fn reregistration_updates_in_place() -> anyhow::Result<()> {
    let registry = memory_registry()?;
    registry.save(registration("basic", "h1", "default", "http://h1:9180/x/"))?;
    registry.unregister("http://h1:9180/x/")?;

    let outcome = registry.save(registration("basic", "h1", "default", "http://h1:9180/y/"))?;
    assert_eq!(outcome, SaveOutcome::Updated);

    let summary = registry.find_all();
    assert_eq!(summary.package_count, 1);
    let pkg = &summary.groups[0].packages[0];
    assert_eq!(pkg.endpoint, "http://h1:9180/y/");
    assert_eq!(pkg.status, PackageStatus::Alive);
    Ok(())
}

#[test]
fn save_rejects_missing_fields() -> anyhow::Result<()> {
    let registry = memory_registry()?;
    let err = registry.save(registration("", "h1", "default", "http://h1/")).err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::BadRequest));
    assert_eq!(registry.snapshot().package_count, 0);
    Ok(())
}

#[test]
fn removing_last_package_drops_group() -> anyhow::Result<()> {
    let registry = memory_registry()?;
    registry.save(registration("basic", "h1", "a", "http://h1:1/"))?;
    registry.save(registration("batch", "h2", "a", "http://h2:1/"))?;
    assert_eq!(registry.snapshot().group_count, 2);

    let removed = registry.delete("http://h2:1/")?;
    assert_eq!(removed.map(|p| p.host), Some("h2".to_owned()));

    let summary = registry.snapshot();
    assert_eq!(summary.group_count, 1);
    assert_eq!(summary.package_count, 1);
    assert_eq!(summary.host_count, 1);
    assert!(summary.find_group("batch").is_none());
    Ok(())
}

#[test]
fn unregister_keeps_package_until_removed() -> anyhow::Result<()> {
    let registry = memory_registry()?;
    registry.save(registration("basic", "h1", "a", "http://h1:1/"))?;

    let dead = registry.unregister("HTTP://H1:1/")?;
    assert_eq!(dead.map(|p| p.status), Some(PackageStatus::Dead));
    let pkg = registry.find_by_endpoint("http://h1:1/");
    assert_eq!(pkg.map(|p| p.status), Some(PackageStatus::Dead));
    assert_eq!(registry.snapshot().package_count, 1);

    registry.delete("http://h1:1/")?;
    assert!(registry.find_by_endpoint("http://h1:1/").is_none());
    assert_eq!(registry.snapshot().package_count, 0);
    Ok(())
}

#[test]
fn unknown_endpoint_is_a_miss() -> anyhow::Result<()> {
    let registry = memory_registry()?;
    assert!(registry.delete("http://nowhere/")?.is_none());
    assert!(registry.unregister("http://nowhere/")?.is_none());
    Ok(())
}

#[test]
fn empty_point_resolves_only_sole_package() -> anyhow::Result<()> {
    let registry = memory_registry()?;
    let empty = Point::parse("");
    assert!(registry.find_by_point(&empty).is_none());

    registry.save(registration("basic", "h1", "a", "http://h1:1/"))?;
    assert_eq!(registry.find_by_point(&empty).map(|p| p.host), Some("h1".to_owned()));

    registry.save(registration("basic", "h2", "a", "http://h2:1/"))?;
    assert!(registry.find_by_point(&empty).is_none());
    assert!(registry.find_by_point(&Point::parse("H2:A")).is_some());
    Ok(())
}

#[test]
fn find_group_is_case_insensitive() -> anyhow::Result<()> {
    let registry = memory_registry()?;
    registry.save(registration("Basic", "h1", "a", "http://h1:1/"))?;
    let group = registry.find_group("BASIC");
    assert_eq!(group.map(|g| g.endpoints()), Some(vec!["http://h1:1/".to_owned()]));
    Ok(())
}

#[test]
fn failed_persist_leaves_registry_untouched() -> anyhow::Result<()> {
    let failing = Arc::new(AtomicBool::new(false));
    let registry =
        Registry::open(FlakyStore { inner: MemoryStore::new(), failing: Arc::clone(&failing) })?;
    registry.save(registration("basic", "h1", "a", "http://h1:1/"))?;

    failing.store(true, Ordering::Relaxed);
    let err = registry.save(registration("basic", "h2", "a", "http://h2:1/")).err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::Internal));
    let err = registry.delete("http://h1:1/").err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::Internal));

    let summary = registry.snapshot();
    assert_eq!(summary.package_count, 1);
    assert_eq!(summary.groups[0].packages[0].host, "h1");
    Ok(())
}

#[test]
fn find_all_serves_stale_copy_when_reload_fails() -> anyhow::Result<()> {
    let failing = Arc::new(AtomicBool::new(false));
    let registry =
        Registry::open(FlakyStore { inner: MemoryStore::new(), failing: Arc::clone(&failing) })?;
    registry.save(registration("basic", "h1", "a", "http://h1:1/"))?;

    failing.store(true, Ordering::Relaxed);
    let summary = registry.find_all();
    assert_eq!(summary.package_count, 1);
    Ok(())
}

#[test]
fn apply_health_skips_vanished_endpoints() -> anyhow::Result<()> {
    let registry = memory_registry()?;
    registry.save(registration("basic", "h1", "a", "http://h1:1/"))?;
    let applied = registry.apply_health(&[
        ("http://h1:1/".to_owned(), PackageStatus::Dead),
        ("http://gone:1/".to_owned(), PackageStatus::Alive),
    ])?;
    assert_eq!(applied, 1);
    let pkg = registry.find_by_endpoint("http://h1:1/");
    assert_eq!(pkg.map(|p| p.status), Some(PackageStatus::Dead));
    Ok(())
}

#[derive(Debug, Clone)]
enum Op {
    Register { group: u8, host: u8, name: u8 },
    Unregister { host: u8, name: u8 },
    Remove { host: u8, name: u8 },
}

fn endpoint_of(host: u8, name: u8) -> String {
    format!("http://host{host}:9180/{name}/")
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..3, 0u8..4, 0u8..3).prop_map(|(group, host, name)| Op::Register { group, host, name }),
        (0u8..4, 0u8..3).prop_map(|(host, name)| Op::Unregister { host, name }),
        (0u8..4, 0u8..3).prop_map(|(host, name)| Op::Remove { host, name }),
    ]
}

proptest! {
    #[test]
    fn counts_match_collections_after_every_call(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let registry = Registry::open(MemoryStore::new()).map_err(|e| TestCaseError::fail(e.to_string()))?;
        for op in ops {
            match op {
                Op::Register { group, host, name } => {
                    let reg = registration(
                        &format!("group{group}"),
                        &format!("HOST{host}"),
                        &format!("n{name}"),
                        &endpoint_of(host, name),
                    );
                    registry.save(reg).map_err(|e| TestCaseError::fail(e.to_string()))?;
                }
                Op::Unregister { host, name } => {
                    let before = registry.snapshot().package_count;
                    registry.unregister(&endpoint_of(host, name)).map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(registry.snapshot().package_count, before);
                }
                Op::Remove { host, name } => {
                    registry.delete(&endpoint_of(host, name)).map_err(|e| TestCaseError::fail(e.to_string()))?;
                }
            }
            let summary = registry.snapshot();
            assert_counts_consistent(&summary);
            let mut points: Vec<_> = summary.packages().map(|p| p.point()).collect();
            let total = points.len();
            points.sort_by(|a, b| (&a.host, &a.name).cmp(&(&b.host, &b.name)));
            points.dedup();
            prop_assert_eq!(points.len(), total);
        }
    }
}
