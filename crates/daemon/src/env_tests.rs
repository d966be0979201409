// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn clear(keys: &[&str]) {
    for key in keys {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn state_dir_prefers_explicit_override() {
    std::env::set_var("OLAKE_STATE_DIR", "/srv/olake");
    std::env::set_var("XDG_STATE_HOME", "/xdg");
    assert_eq!(state_dir().unwrap(), PathBuf::from("/srv/olake"));

    std::env::remove_var("OLAKE_STATE_DIR");
    assert_eq!(state_dir().unwrap(), PathBuf::from("/xdg/olake"));
    clear(&["XDG_STATE_HOME"]);
}

#[test]
#[serial]
fn defaults_apply_when_unset() {
    clear(&[
        "OLAKE_EXECUTOR",
        "OLAKE_TASK_QUEUE",
        "OLAKE_PERSISTENT_DIR",
        "OLAKE_K8S_POLL_INTERVAL_MS",
        "OLAKE_CLEAR_WAIT_TIMEOUT_SECS",
        "OLAKE_IPC_TIMEOUT_MS",
        "OLAKE_LOG",
        "OLAKE_RUN_RETENTION_SECS",
    ]);
    assert_eq!(executor(), "docker");
    assert_eq!(task_queue(), None);
    assert_eq!(persistent_dir(), PathBuf::from("/tmp/olake-config"));
    assert_eq!(k8s_poll_interval(), Duration::from_secs(5));
    assert_eq!(clear_wait_timeout(), Duration::from_secs(600));
    assert_eq!(ipc_timeout(), Duration::from_secs(5));
    assert_eq!(log_filter(), "info");
    assert_eq!(run_retention(), Duration::from_secs(7 * 24 * 60 * 60));
}

#[test]
#[serial]
fn unparseable_numbers_fall_back_to_defaults() {
    std::env::set_var("OLAKE_IPC_TIMEOUT_MS", "soon");
    std::env::set_var("OLAKE_MAX_DISCOVER_THREADS", "-3");
    assert_eq!(ipc_timeout(), Duration::from_secs(5));
    assert_eq!(max_discover_threads(), None);

    std::env::set_var("OLAKE_IPC_TIMEOUT_MS", "250");
    std::env::set_var("OLAKE_MAX_DISCOVER_THREADS", "8");
    assert_eq!(ipc_timeout(), Duration::from_millis(250));
    assert_eq!(max_discover_threads(), Some(8));
    clear(&["OLAKE_IPC_TIMEOUT_MS", "OLAKE_MAX_DISCOVER_THREADS"]);
}

#[test]
#[serial]
fn empty_values_count_as_unset() {
    std::env::set_var("OLAKE_SECRET_KEY", "");
    std::env::set_var("OLAKE_WORKER_ID", "");
    std::env::set_var("HOSTNAME", "worker-7");
    assert_eq!(secret_key(), None);
    assert_eq!(worker_id(), "worker-7");
    clear(&["OLAKE_SECRET_KEY", "OLAKE_WORKER_ID", "HOSTNAME"]);
}
