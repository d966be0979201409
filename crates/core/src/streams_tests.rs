// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn catalog(users_mode: &str, users_regex: &str, with_orders: bool) -> String {
    let mut selected = vec![json!({
        "stream_name": "users",
        "partition_regex": users_regex,
        "normalization": false,
    })];
    let mut streams = vec![json!({
        "stream": { "name": "users", "namespace": "public", "sync_mode": users_mode }
    })];
    if with_orders {
        selected.push(json!({ "stream_name": "orders", "partition_regex": "", "normalization": true }));
        streams.push(json!({
            "stream": { "name": "orders", "namespace": "public", "sync_mode": "full_refresh" }
        }));
    }
    json!({ "selected_streams": { "public": selected }, "streams": streams }).to_string()
}

fn selected_names(diff: &str) -> Vec<String> {
    let value: Value = serde_json::from_str(diff).unwrap();
    value["selected_streams"]
        .as_object()
        .unwrap()
        .values()
        .flat_map(|v| v.as_array().unwrap().iter())
        .map(|e| e["stream_name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn identical_configs_have_empty_difference() {
    let cfg = catalog("cdc", "", true);
    let diff = stream_difference(&cfg, &cfg).unwrap();
    assert!(is_empty_selection(&diff).unwrap());
}

#[test]
fn sync_mode_change_is_included() {
    let old = catalog("cdc", "", true);
    let new = catalog("full_refresh", "", true);
    let diff = stream_difference(&old, &new).unwrap();
    assert_eq!(selected_names(&diff), vec!["users"]);

    let value: Value = serde_json::from_str(&diff).unwrap();
    assert_eq!(value["streams"][0]["stream"]["sync_mode"], "full_refresh");
}

#[test]
fn partition_change_is_included() {
    let old = catalog("cdc", "", false);
    let new = catalog("cdc", "/{created_at,day}", false);
    assert_eq!(selected_names(&stream_difference(&old, &new).unwrap()), vec!["users"]);
}

#[test]
fn newly_selected_stream_is_not_included() {
    let old = catalog("cdc", "", false);
    let new = catalog("cdc", "", true);
    assert!(is_empty_selection(&stream_difference(&old, &new).unwrap()).unwrap());
}

#[test]
fn deselected_stream_is_not_included() {
    let old = catalog("cdc", "", true);
    let new = catalog("full_refresh", "", false);
    assert_eq!(selected_names(&stream_difference(&old, &new).unwrap()), vec!["users"]);
}

#[test]
fn empty_old_config_is_accepted() {
    let new = catalog("cdc", "", true);
    assert!(is_empty_selection(&stream_difference("", &new).unwrap()).unwrap());
}

#[test]
fn malformed_config_is_an_error() {
    assert!(stream_difference("[1,2]", "{}").is_err());
    assert!(stream_difference("{", "{}").is_err());
    let bad = json!({ "selected_streams": { "public": [ { "partition_regex": "" } ] } }).to_string();
    assert!(stream_difference(&bad, "{}").is_err());
}
