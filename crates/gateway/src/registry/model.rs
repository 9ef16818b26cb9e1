// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry data model: packages, groups, and the persisted summary.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name assumed when a point omits the `:name` part.
pub const DEFAULT_PACKAGE_NAME: &str = "default";

/// Liveness of a registered package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackageStatus {
    #[default]
    Alive,
    Dead,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "ALIVE",
            Self::Dead => "DEAD",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform metadata reported by a package at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

/// A registered worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub endpoint: String,
    pub host: String,
    pub name: String,
    /// Registration time as epoch seconds.
    pub registered_at: u64,
    pub status: PackageStatus,
    #[serde(default)]
    pub platform: Platform,
}

impl Package {
    pub fn point(&self) -> Point {
        Point::new(self.host.clone(), self.name.clone())
    }
}

/// Named collection of packages; the unit of broadcast targeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "group_name")]
    pub name: String,
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl Group {
    pub fn endpoints(&self) -> Vec<String> {
        self.packages.iter().map(|p| p.endpoint.clone()).collect()
    }
}

/// Full registry snapshot, persisted as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub group_count: usize,
    pub host_count: usize,
    pub package_count: usize,
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// Addressing key for a package: `(host, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub host: String,
    pub name: String,
}

impl Point {
    pub fn new(host: impl Into<String>, name: impl Into<String>) -> Self {
        Self { host: host.into(), name: name.into() }
    }

    /// Parse the `host:name` text form. A missing name means `default`.
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((host, name)) => Self::new(host, name),
            None => Self::new(text, DEFAULT_PACKAGE_NAME),
        }
    }

    /// A point without a host addresses nothing in particular.
    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    pub fn matches(&self, package: &Package) -> bool {
        package.host.eq_ignore_ascii_case(&self.host) && package.name.eq_ignore_ascii_case(&self.name)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.name)
    }
}

/// Registration request as submitted by a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub group: String,
    pub host: String,
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub platform: Platform,
}

impl Registration {
    /// Name of the first required field that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("group", &self.group),
            ("host", &self.host),
            ("name", &self.name),
            ("endpoint", &self.endpoint),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }

    pub(crate) fn into_package(self, registered_at: u64) -> (String, Package) {
        let package = Package {
            endpoint: self.endpoint,
            host: self.host,
            name: self.name,
            registered_at,
            status: PackageStatus::Alive,
            platform: self.platform,
        };
        (self.group, package)
    }
}

/// How a save changed the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// New package appended.
    Created,
    /// Existing package updated in place.
    Updated,
    /// Existing point re-registered under a different group.
    Moved,
}

impl Summary {
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.groups.iter().flat_map(|g| g.packages.iter())
    }

    /// Recompute all counters from the collections.
    pub fn recount(&mut self) {
        self.group_count = self.groups.len();
        self.package_count = self.groups.iter().map(|g| g.packages.len()).sum();
        self.host_count = distinct_hosts(self.packages());
    }

    /// The only package in the registry, iff there is exactly one.
    pub fn sole_package(&self) -> Option<&Package> {
        let mut iter = self.packages();
        match (iter.next(), iter.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    pub fn find_group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name.eq_ignore_ascii_case(name))
    }

    pub fn find_by_point(&self, point: &Point) -> Option<&Package> {
        self.packages().find(|p| point.matches(p))
    }

    pub fn find_by_endpoint(&self, endpoint: &str) -> Option<&Package> {
        self.packages().find(|p| p.endpoint.eq_ignore_ascii_case(endpoint))
    }

    pub fn find_by_address(&self, address: &str) -> Option<&Package> {
        if let Some(only) = self.sole_package() {
            return Some(only);
        }
        let caller = strip_port(address);
        if caller.is_empty() {
            return None;
        }
        self.packages().find(|p| endpoint_host(&p.endpoint).eq_ignore_ascii_case(caller))
    }

    fn locate(&self, pred: impl Fn(&Package) -> bool) -> Option<(usize, usize)> {
        self.groups.iter().enumerate().find_map(|(gi, g)| {
            g.packages.iter().position(|p| pred(p)).map(|pi| (gi, pi))
        })
    }

    pub(crate) fn locate_endpoint(&self, endpoint: &str) -> Option<(usize, usize)> {
        self.locate(|p| p.endpoint.eq_ignore_ascii_case(endpoint))
    }

    pub(crate) fn package_mut(&mut self, at: (usize, usize)) -> Option<&mut Package> {
        self.groups.get_mut(at.0).and_then(|g| g.packages.get_mut(at.1))
    }

    /// Remove the package at `at`, dropping its group when it empties.
    pub(crate) fn remove_at(&mut self, at: (usize, usize)) -> Option<Package> {
        let (gi, pi) = at;
        let group = self.groups.get_mut(gi)?;
        if pi >= group.packages.len() {
            return None;
        }
        let removed = group.packages.remove(pi);
        if group.packages.is_empty() {
            self.groups.remove(gi);
        }
        Some(removed)
    }

    /// Insert or update a registration. Counters are not touched; call
    /// [`Summary::recount`] afterwards.
    pub(crate) fn upsert(&mut self, registration: Registration, now: u64) -> SaveOutcome {
        let point = Point::new(registration.host.clone(), registration.name.clone());
        let mut moved = false;

        if let Some(at) = self.locate(|p| point.matches(p)) {
            let same_group = self.groups[at.0].name.eq_ignore_ascii_case(&registration.group);
            if same_group {
                if let Some(existing) = self.package_mut(at) {
                    existing.endpoint = registration.endpoint;
                    existing.registered_at = now;
                    existing.status = PackageStatus::Alive;
                    existing.platform = registration.platform;
                }
                return SaveOutcome::Updated;
            }
            // (host, name) is unique registry-wide: leave the old group first.
            self.remove_at(at);
            moved = true;
        }

        let (group_name, package) = registration.into_package(now);
        match self.groups.iter_mut().find(|g| g.name.eq_ignore_ascii_case(&group_name)) {
            Some(group) => group.packages.push(package),
            None => self.groups.push(Group { name: group_name, packages: vec![package] }),
        }

        if moved {
            SaveOutcome::Moved
        } else {
            SaveOutcome::Created
        }
    }
}

/// Number of distinct hosts, compared case-insensitively.
pub fn distinct_hosts<'a>(packages: impl Iterator<Item = &'a Package>) -> usize {
    packages.map(|p| p.host.to_lowercase()).collect::<HashSet<_>>().len()
}

/// Strip the port from a caller address (`host:port`, `[v6]:port`, `host`).
pub fn strip_port(address: &str) -> &str {
    let address = address.trim();
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(host, _)| host);
    }
    match address.rsplit_once(':') {
        // More than one colon without brackets is a bare IPv6 address.
        Some((host, _)) if !host.contains(':') => host,
        _ => address,
    }
}

/// Host portion of an endpoint URL, with scheme, port, and path removed.
pub fn endpoint_host(endpoint: &str) -> &str {
    let rest = endpoint
        .strip_prefix("http://")
        .or_else(|| endpoint.strip_prefix("https://"))
        .unwrap_or(endpoint);
    let authority = rest.split('/').next().unwrap_or(rest);
    strip_port(authority)
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
