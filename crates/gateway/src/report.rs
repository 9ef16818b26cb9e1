// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-facing registry view with registration times rendered at the
//! caller's UTC offset.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;

use crate::registry::{Group, Package, PackageStatus};

/// Request header carrying the caller's UTC offset, e.g. `+09:00`.
pub const TIMEZONE_HEADER: &str = "fleetgate-timezone";

/// Rendered in place of a date for dead packages.
pub const NO_DATE: &str = "-";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Resolve a timezone header value. `UTC`, `Z` and `+HH:MM` offsets are
/// understood; anything else falls back to UTC.
pub fn parse_zone(raw: Option<&str>) -> FixedOffset {
    raw.map(str::trim)
        .filter(|name| !name.eq_ignore_ascii_case("utc") && !name.eq_ignore_ascii_case("z"))
        .and_then(|name| name.parse::<FixedOffset>().ok())
        .unwrap_or_else(|| Utc.fix())
}

/// `YYYY-MM-DD HH:MM:SS` in `zone`, or [`NO_DATE`] when the package is dead.
pub fn registered_date(package: &Package, zone: FixedOffset) -> String {
    if package.status == PackageStatus::Dead {
        return NO_DATE.to_owned();
    }
    let secs = i64::try_from(package.registered_at).unwrap_or(i64::MAX);
    match DateTime::from_timestamp(secs, 0) {
        Some(at) => at.with_timezone(&zone).format(DATE_FORMAT).to_string(),
        None => NO_DATE.to_owned(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    #[serde(flatten)]
    pub package: Package,
    pub registered_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    #[serde(rename = "group_name")]
    pub name: String,
    pub packages: Vec<PackageReport>,
}

impl GroupReport {
    pub fn render(group: Group, zone: FixedOffset) -> Self {
        let packages = group
            .packages
            .into_iter()
            .map(|package| {
                let registered_date = registered_date(&package, zone);
                PackageReport { package, registered_date }
            })
            .collect();
        Self { name: group.name, packages }
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
