// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes label syntax and object-name sanitizing.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of a label name, a label value and a sanitized pod name.
pub const MAX_NAME_LEN: usize = 63;

/// Maximum length of a label key prefix (a DNS subdomain).
const MAX_PREFIX_LEN: usize = 253;

/// Label name segment, or a non-empty label value.
#[allow(clippy::expect_used)]
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").expect("constant regex pattern is valid")
});

/// DNS subdomain used as a label key prefix.
#[allow(clippy::expect_used)]
static PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("constant regex pattern is valid")
});

/// Check a qualified label key (`[prefix/]name`).
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("key is empty".to_string());
    }
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN || !PREFIX_PATTERN.is_match(prefix) {
                return Err(format!("prefix {prefix:?} is not a DNS subdomain"));
            }
            name
        }
        None => key,
    };
    if name.is_empty() {
        return Err("name is empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("name longer than {MAX_NAME_LEN} characters"));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(format!("name {name:?} must be alphanumeric with '-', '_' or '.' inside"));
    }
    Ok(())
}

/// Check a label value. Empty values are allowed.
pub fn validate_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > MAX_NAME_LEN {
        return Err(format!("value longer than {MAX_NAME_LEN} characters"));
    }
    if !NAME_PATTERN.is_match(value) {
        return Err(format!("value {value:?} must be alphanumeric with '-', '_' or '.' inside"));
    }
    Ok(())
}

/// Pod name derived from a workflow id.
///
/// Lower-cased, anything outside `[a-z0-9-]` becomes `-`, at most 63
/// characters, no leading or trailing hyphen.
pub fn sanitize_name(raw: &str) -> String {
    let replaced: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect();
    let trimmed = replaced.trim_matches('-');
    let truncated: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    let name = truncated.trim_end_matches('-');
    if name.is_empty() {
        "olake".to_string()
    } else {
        name.to_string()
    }
}

/// Label value derived from an arbitrary string (e.g. a workflow id).
pub fn sanitize_label_value(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '-' })
        .collect();
    let truncated: String = replaced.chars().take(MAX_NAME_LEN).collect();
    truncated.trim_matches(|c: char| !c.is_ascii_alphanumeric()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        simple        = { "disktype", true },
        prefixed      = { "node.kubernetes.io/instance-type", true },
        dotted_name   = { "olake.pool_a", true },
        empty         = { "", false },
        empty_name    = { "example.com/", false },
        empty_prefix  = { "/disktype", false },
        upper_prefix  = { "Example.com/x", false },
        leading_dash  = { "-disk", false },
        trailing_dot  = { "disk.", false },
        space         = { "disk type", false },
        two_slashes   = { "a/b/c", false },
    )]
    fn label_keys(key: &str, ok: bool) {
        assert_eq!(validate_key(key).is_ok(), ok, "{key:?}");
    }

    #[test]
    fn long_label_name_is_rejected() {
        assert!(validate_key(&"a".repeat(63)).is_ok());
        assert!(validate_key(&"a".repeat(64)).is_err());
    }

    #[yare::parameterized(
        empty   = { "", true },
        ssd     = { "ssd", true },
        mixed   = { "Zone_A-1.b", true },
        slash   = { "a/b", false },
        leading = { "_x", false },
        long    = { "abcdefghijabcdefghijabcdefghijabcdefghijabcdefghijabcdefghijabcd", false },
    )]
    fn label_values(value: &str, ok: bool) {
        assert_eq!(validate_value(value).is_ok(), ok, "{value:?}");
    }

    #[yare::parameterized(
        plain     = { "sync-proj-7", "sync-proj-7" },
        upper     = { "Sync-Proj-7", "sync-proj-7" },
        timestamp = { "sync-p-1-2026-01-01T00:15:00.000Z", "sync-p-1-2026-01-01t00-15-00-000z" },
        edges     = { "__discover__", "discover" },
        empty     = { "***", "olake" },
    )]
    fn pod_names(raw: &str, expected: &str) {
        assert_eq!(sanitize_name(raw), expected);
    }

    #[test]
    fn pod_name_is_truncated_without_trailing_hyphen() {
        let raw = format!("{}-{}", "a".repeat(62), "bbbb");
        let name = sanitize_name(&raw);
        assert_eq!(name, "a".repeat(62));
        assert!(name.len() <= MAX_NAME_LEN);
    }

    #[test]
    fn label_value_sanitizing() {
        assert_eq!(sanitize_label_value("sync-p-1-2026-01-01T00:15:00Z"), "sync-p-1-2026-01-01T00-15-00Z");
        assert!(validate_value(&sanitize_label_value(&"x:".repeat(50))).is_ok());
    }
}
