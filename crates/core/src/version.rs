// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector image version gates.

use std::cmp::Ordering;

/// Oldest source image that implements `clear-destination`.
pub const CLEAR_DESTINATION_MIN_VERSION: &str = "v0.2.0";

/// Oldest source image that accepts `--max-discover-threads`.
pub const MAX_DISCOVER_THREADS_MIN_VERSION: &str = "v0.1.6";

/// A `vMAJOR.MINOR.PATCH` connector version; pre-release suffixes are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConnectorVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ConnectorVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.strip_prefix('v').or_else(|| raw.strip_prefix('V')).unwrap_or(raw);
        let core = raw.split(&['-', '+'][..]).next()?;
        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor, patch })
    }
}

/// Whether a connector version is at least `minimum`.
///
/// Tags that are not versions (`latest`, `dev`, branch builds) pass the gate.
pub fn supports_version(version: &str, minimum: &str) -> bool {
    match (ConnectorVersion::parse(version), ConnectorVersion::parse(minimum)) {
        (Some(v), Some(min)) => v.cmp(&min) != Ordering::Less,
        _ => true,
    }
}
