// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use olake_core::test_support::job;
use tempfile::TempDir;

fn store(dir: &TempDir) -> FileJobStore {
    FileJobStore::open(dir.path().join("jobs.json")).unwrap()
}

#[tokio::test]
async fn missing_file_opens_empty() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    assert!(store.is_empty());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn rows_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = store(&dir);
        store.save_job_data(&job(1)).await.unwrap();
        store.save_job_data(&job(2)).await.unwrap();
        store.update_job_state(JobId(2), r#"{"cursor":42}"#, false).await.unwrap();
        store.delete_job_data(JobId(1)).await.unwrap();
    }

    let reopened = store(&dir);
    assert_eq!(reopened.len(), 1);
    let row = reopened.get_job_data(JobId(2)).await.unwrap();
    assert_eq!(row.state, r#"{"cursor":42}"#);
    assert!(!row.active);
    assert!(!dir.path().join("jobs.tmp").exists());
}

#[tokio::test]
async fn failed_update_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    store.save_job_data(&job(1)).await.unwrap();
    let before = std::fs::read_to_string(store.path()).unwrap();

    let err = store.update_job_state(JobId(9), "{}", true).await.unwrap_err();
    assert!(matches!(err, JobStoreError::NotFound(JobId(9))));
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
}

#[tokio::test]
async fn checkpoint_keeps_active_flag() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    store.save_job_data(&job(1)).await.unwrap();
    store.update_job_state(JobId(1), "{}", false).await.unwrap();

    store.save_checkpoint(JobId(1), r#"{"cursor":7}"#).await.unwrap();

    let row = self::store(&dir).get_job_data(JobId(1)).await.unwrap();
    assert_eq!(row.state, r#"{"cursor":7}"#);
    assert!(!row.active);
    assert!(matches!(store.save_checkpoint(JobId(9), "{}").await.unwrap_err(), JobStoreError::NotFound(JobId(9))));
}

#[tokio::test]
async fn save_returns_previous_row() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    assert_eq!(store.save_job_data(&job(1)).await.unwrap(), None);

    let mut changed = job(1);
    changed.frequency = "@daily".to_string();
    assert_eq!(store.save_job_data(&changed).await.unwrap(), Some(job(1)));
    assert_eq!(store.jobs(), vec![changed]);
}

#[test]
fn unknown_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.json");
    std::fs::write(&path, r#"{"v":7,"jobs":[]}"#).unwrap();
    assert!(matches!(FileJobStore::open(&path), Err(StorageError::UnsupportedVersion(7))));
}

#[test]
fn corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(FileJobStore::open(&path), Err(StorageError::Json(_))));
}
