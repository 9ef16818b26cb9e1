// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use chrono::{Offset, Utc};

use super::*;
use crate::auth::local::UserRecord;
use crate::error::ErrorCode;
use crate::registry::{MemoryStore, PackageStatus, Platform};
use crate::token::TokenPolicy;
use crate::upstream::client::ClientTimeouts;

fn test_gateway(staging: &Path) -> anyhow::Result<Gateway> {
    let shutdown = CancellationToken::new();
    let client = PackageClient::new(ClientTimeouts::default())?;
    Ok(Gateway::new(
        Arc::new(Registry::open(MemoryStore::new())?),
        TokenService::new(TokenPolicy::default(), &shutdown),
        Authenticator::Local(LocalUsers::new(vec![
            UserRecord { id: "ops".to_owned(), passwd: "s3cret".to_owned(), role: Role::Operator },
            UserRecord { id: "eye".to_owned(), passwd: "look".to_owned(), role: Role::Monitor },
        ])),
        DeployCoordinator::new(client.clone(), "far", staging.to_path_buf()),
        client,
        shutdown,
    ))
}

fn registration(group: &str, host: &str, name: &str, endpoint: &str) -> Registration {
    Registration {
        group: group.to_owned(),
        host: host.to_owned(),
        name: name.to_owned(),
        endpoint: endpoint.to_owned(),
        platform: Platform::default(),
    }
}

async fn closed_endpoint() -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}/"))
}

#[tokio::test]
async fn lookup_prefers_point_then_caller() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let gw = test_gateway(dir.path())?;
    gw.register_package(registration("basic", "h1", "a", "http://10.0.0.1:9180/a/")).await?;
    gw.register_package(registration("basic", "h2", "a", "http://10.0.0.2:9180/a/")).await?;

    let by_point = gw.lookup_endpoint(Some(&Point::parse("h2:a")), "10.0.0.1:5000")?;
    assert_eq!(by_point, "http://10.0.0.2:9180/a/");

    let by_caller = gw.lookup_endpoint(None, "10.0.0.1:5000")?;
    assert_eq!(by_caller, "http://10.0.0.1:9180/a/");

    let fallback = gw.lookup_endpoint(Some(&Point::parse("h9:a")), "10.0.0.2:1")?;
    assert_eq!(fallback, "http://10.0.0.2:9180/a/");

    let miss = gw.lookup_endpoint(None, "192.168.1.1:1").err();
    assert_eq!(miss.map(|e| e.code), Some(ErrorCode::NotFound));
    Ok(())
}

#[tokio::test]
async fn unregister_and_remove_unknown_are_not_found() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let gw = test_gateway(dir.path())?;
    assert_eq!(gw.unregister_package("http://x/").await.err().map(|e| e.code), Some(ErrorCode::NotFound));
    assert_eq!(gw.remove_package("http://x/").await.err().map(|e| e.code), Some(ErrorCode::NotFound));
    Ok(())
}

#[tokio::test]
async fn process_commands_validate_before_resolving() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let gw = test_gateway(dir.path())?;
    let target = DeployTarget::Group("basic".into());

    let no_group_id = ProcessCommand { process: "worker".into(), group_id: None };
    let err = gw.register_process(no_group_id.clone(), &target, None).await.err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::BadRequest));

    let err = gw.unregister_process(no_group_id, &target, None).await.err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::NotFound));
    Ok(())
}

#[tokio::test]
async fn summary_reprobes_and_filters_by_group() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let gw = test_gateway(dir.path())?;
    gw.register_package(registration("basic", "h1", "a", &closed_endpoint().await?)).await?;
    gw.register_package(registration("basic", "H1", "b", &closed_endpoint().await?)).await?;
    gw.register_package(registration("batch", "h2", "a", &closed_endpoint().await?)).await?;

    let all = gw.get_summary(None, Utc.fix()).await?;
    assert_eq!(all.group_count, 2);
    assert_eq!(all.package_count, 3);
    assert_eq!(all.host_count, 2);
    assert_eq!(all.health, TallyReport { total: 3, succeeded: 0, failed: 3 });
    assert!(all
        .deployment
        .iter()
        .flat_map(|g| g.packages.iter())
        .all(|p| p.package.status == PackageStatus::Dead && p.registered_date == "-"));

    let basic = gw.get_summary(Some("BASIC"), Utc.fix()).await?;
    assert_eq!(basic.group_count, 1);
    assert_eq!(basic.package_count, 2);
    assert_eq!(basic.host_count, 1);

    let none = gw.get_summary(Some("missing"), Utc.fix()).await?;
    assert_eq!(none.group_count, 0);
    assert_eq!(none.package_count, 0);
    Ok(())
}

#[tokio::test]
async fn authenticate_issues_tokens_by_role() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let gw = test_gateway(dir.path())?;

    let (token, role) = gw.authenticate("ops", "s3cret", false).await?;
    assert_eq!(role, Role::Operator);
    assert_eq!(gw.validate_token(&token, Role::Operator)?, Role::Operator);

    let (token, _) = gw.authenticate("eye", "look", true).await?;
    assert!(gw.validate_token(&token, Role::Monitor).is_ok());
    assert_eq!(
        gw.validate_token(&token, Role::Operator).err().map(|e| e.code),
        Some(ErrorCode::Unauthorized)
    );
    Ok(())
}

#[yare::parameterized(
    short_id = { "op", "s3cret", ErrorCode::BadRequest },
    short_password = { "ops", "pw", ErrorCode::BadRequest },
    wrong_password = { "ops", "wrong", ErrorCode::Unauthorized },
    unknown_user = { "nobody", "s3cret", ErrorCode::Unauthorized },
)]
#[test_macro(tokio::test)]
async fn authenticate_rejections(id: &str, password: &str, expected: ErrorCode) {
    let dir = tempfile::tempdir().expect("tempdir");
    let gw = test_gateway(dir.path()).expect("gateway");
    let err = gw.authenticate(id, password, false).await.err();
    assert_eq!(err.map(|e| e.code), Some(expected));
}

/// Store whose writes stall the calling thread.
struct StallingStore {
    inner: MemoryStore,
    stall: std::time::Duration,
}

impl crate::registry::SnapshotStore for StallingStore {
    fn load(&self) -> anyhow::Result<Option<crate::registry::Summary>> {
        self.inner.load()
    }

    fn save(&self, summary: &crate::registry::Summary) -> anyhow::Result<()> {
        std::thread::sleep(self.stall);
        self.inner.save(summary)
    }
}

#[tokio::test(flavor = "current_thread")]
async fn slow_snapshot_write_does_not_stall_runtime() -> anyhow::Result<()> {
    use std::time::{Duration, Instant};

    let dir = tempfile::tempdir()?;
    let shutdown = CancellationToken::new();
    let client = PackageClient::new(ClientTimeouts::default())?;
    let store = StallingStore {
        inner: MemoryStore::with_snapshot(crate::registry::Summary::default()),
        stall: Duration::from_millis(400),
    };
    let gw = Arc::new(Gateway::new(
        Arc::new(Registry::open(store)?),
        TokenService::new(TokenPolicy::default(), &shutdown),
        Authenticator::Local(LocalUsers::new(Vec::new())),
        DeployCoordinator::new(client.clone(), "far", dir.path().to_path_buf()),
        client,
        shutdown,
    ));

    let register = tokio::spawn({
        let gw = Arc::clone(&gw);
        async move { gw.register_package(registration("basic", "h1", "a", "http://h1:1/")).await }
    });
    tokio::task::yield_now().await;

    let started = Instant::now();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(started.elapsed() < Duration::from_millis(300));

    register.await??;
    assert_eq!(gw.registry().snapshot().package_count, 1);
    Ok(())
}
