// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::backend::load_mapping;
use super::*;
use olake_core::JobId;
use serial_test::serial;

#[yare::parameterized(
    docker     = { "docker", ExecutorKind::Docker },
    kubernetes = { "kubernetes", ExecutorKind::Kubernetes },
    short      = { "k8s", ExecutorKind::Kubernetes },
    mixed_case = { "Docker", ExecutorKind::Docker },
)]
fn executor_names(raw: &str, expected: ExecutorKind) {
    assert_eq!(raw.parse::<ExecutorKind>().unwrap(), expected);
}

#[test]
fn unknown_executor_is_rejected() {
    assert!(matches!("nomad".parse::<ExecutorKind>(), Err(LifecycleError::InvalidConfig(_))));
}

#[test]
fn task_queue_defaults_follow_the_executor() {
    let dir = PathBuf::from("/state");
    assert_eq!(Config::for_state_dir(dir.clone(), ExecutorKind::Docker).task_queue, "OLAKE_DOCKER_TASK_QUEUE");
    assert_eq!(Config::for_state_dir(dir, ExecutorKind::Kubernetes).task_queue, "OLAKE_K8S_TASK_QUEUE");
}

#[test]
fn paths_live_under_the_state_dir() {
    let config = Config::for_state_dir(PathBuf::from("/state"), ExecutorKind::Docker);
    assert_eq!(config.socket_path, PathBuf::from("/state/worker.sock"));
    assert_eq!(config.lock_path, PathBuf::from("/state/worker.pid"));
    assert_eq!(config.jobs_path, PathBuf::from("/state/jobs.json"));
    assert_eq!(config.log_dir, PathBuf::from("/state/logs"));
}

const ENV_KEYS: [&str; 9] = [
    "OLAKE_STATE_DIR",
    "OLAKE_EXECUTOR",
    "OLAKE_TASK_QUEUE",
    "OLAKE_SECRET_KEY",
    "OLAKE_PERSISTENT_DIR",
    "OLAKE_HOST_PERSISTENT_DIR",
    "OLAKE_K8S_NAMESPACE",
    "OLAKE_CLEAR_WAIT_TIMEOUT_SECS",
    "OLAKE_RUN_RETENTION_SECS",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn load_reads_kubernetes_settings() {
    clear_env();
    std::env::set_var("OLAKE_STATE_DIR", "/var/lib/olake");
    std::env::set_var("OLAKE_EXECUTOR", "kubernetes");
    std::env::set_var("OLAKE_SECRET_KEY", "s3cret");
    std::env::set_var("OLAKE_PERSISTENT_DIR", "/data/olake");
    std::env::set_var("OLAKE_K8S_NAMESPACE", "etl");
    std::env::set_var("OLAKE_CLEAR_WAIT_TIMEOUT_SECS", "30");
    std::env::set_var("OLAKE_RUN_RETENTION_SECS", "3600");

    let config = Config::load().unwrap();
    assert_eq!(config.executor, ExecutorKind::Kubernetes);
    assert_eq!(config.task_queue, "OLAKE_K8S_TASK_QUEUE");
    assert_eq!(config.state_dir, PathBuf::from("/var/lib/olake"));
    assert_eq!(config.kubernetes.namespace, "etl");
    assert_eq!(config.kubernetes.persistent_dir, PathBuf::from("/data/olake"));
    assert_eq!(config.kubernetes.secret_key.as_deref(), Some("s3cret"));
    assert_eq!(config.worker.secret_key.as_deref(), Some("s3cret"));
    assert_eq!(config.service_config().clear_wait_timeout, Duration::from_secs(30));
    assert_eq!(config.run_retention, Duration::from_secs(3600));
    clear_env();
}

#[test]
#[serial]
fn load_defaults_host_dir_to_persistent_dir() {
    clear_env();
    std::env::set_var("OLAKE_STATE_DIR", "/var/lib/olake");
    std::env::set_var("OLAKE_PERSISTENT_DIR", "/data/olake");
    std::env::set_var("OLAKE_TASK_QUEUE", "custom-queue");

    let config = Config::load().unwrap();
    assert_eq!(config.executor, ExecutorKind::Docker);
    assert_eq!(config.task_queue, "custom-queue");
    assert_eq!(config.docker.host_persistent_dir, PathBuf::from("/data/olake"));

    std::env::set_var("OLAKE_HOST_PERSISTENT_DIR", "/host/olake");
    assert_eq!(Config::load().unwrap().docker.host_persistent_dir, PathBuf::from("/host/olake"));
    clear_env();
}

#[test]
#[serial]
fn load_rejects_unknown_executor() {
    clear_env();
    std::env::set_var("OLAKE_STATE_DIR", "/var/lib/olake");
    std::env::set_var("OLAKE_EXECUTOR", "podman");
    assert!(matches!(Config::load(), Err(LifecycleError::InvalidConfig(_))));
    clear_env();
}

#[test]
fn mapping_loads_valid_entries() {
    let policy = load_mapping(Some(r#"{"5": {"disktype": "ssd"}, "6": null}"#)).unwrap();
    assert_eq!(policy.len(), 1);
    assert!(policy.node_labels(Some(JobId(5))).is_some());
    assert!(load_mapping(None).unwrap().is_empty());
}

#[test]
fn mapping_that_is_not_an_object_is_fatal() {
    assert!(matches!(load_mapping(Some("[1, 2]")), Err(LifecycleError::Mapping(_))));
}
