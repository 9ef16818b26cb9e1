// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn users() -> LocalUsers {
    LocalUsers::new(vec![
        UserRecord { id: "ops".to_owned(), passwd: "s3cret".to_owned(), role: Role::Operator },
        UserRecord { id: "viewer".to_owned(), passwd: "look".to_owned(), role: Role::Monitor },
    ])
}

#[test]
fn correct_password_returns_role() {
    let users = users();
    assert_eq!(users.authenticate("ops", "s3cret"), Ok(Role::Operator));
    assert_eq!(users.authenticate("viewer", "look"), Ok(Role::Monitor));
}

#[test]
fn unknown_user_and_wrong_password_are_distinct() {
    let users = users();
    assert_eq!(users.authenticate("ghost", "s3cret"), Err(AuthFailure::NotFound));
    assert_eq!(users.authenticate("ops", "S3CRET"), Err(AuthFailure::Mismatch));
}

#[test]
fn hash_is_lower_hex_sha256() {
    assert_eq!(
        hash_password("admin"),
        "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918"
    );
}

#[yare::parameterized(
    equal = { b"abc", b"abc", true },
    differ = { b"abc", b"abd", false },
    length = { b"abc", b"abcd", false },
    empty = { b"", b"", true },
)]
fn constant_time_comparison(a: &[u8], b: &[u8], expected: bool) {
    assert_eq!(constant_time_eq(a, b), expected);
}

#[test]
fn open_bootstraps_admin_when_missing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(USERS_FILE);
    let users = LocalUsers::open(&path)?;

    assert!(path.exists());
    assert_eq!(users.len(), 1);
    assert_eq!(users.authenticate("admin", "admin"), Ok(Role::Operator));

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(raw["users"][0]["role"], "OPERATOR");
    Ok(())
}

#[test]
fn open_reads_existing_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(USERS_FILE);
    std::fs::write(&path, r#"{"users":[{"id":"ro","passwd":"pw","role":"monitor"}]}"#)?;

    let users = LocalUsers::open(&path)?;
    assert_eq!(users.authenticate("ro", "pw"), Ok(Role::Monitor));
    assert_eq!(users.authenticate("admin", "admin"), Err(AuthFailure::NotFound));
    Ok(())
}
