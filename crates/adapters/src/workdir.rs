// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config distribution on shared storage.
//!
//! Each execution owns one directory under the shared root, named by its
//! directory id. Config files are written there before the container starts
//! and mounted at [`CONTAINER_CONFIG_PATH`]. Files are left in place after
//! the run for operators to inspect.
//!
//! ```text
//! {root}/{directory id}/
//!     config.json       source config
//!     streams.json      catalog
//!     writer.json       destination config, wrapped for the connector
//!     state.json        checkpoint (read back after sync)
//!     stats.json        post-sync metrics
//! ```

use std::path::{Path, PathBuf};

use olake_core::{ConfigFile, ResultMap};

use crate::ExecutionError;

/// Where the execution directory is mounted inside the connector container.
pub const CONTAINER_CONFIG_PATH: &str = "/mnt/config";

pub const CONFIG_FILE: &str = "config.json";
pub const STREAMS_FILE: &str = "streams.json";
pub const WRITER_FILE: &str = "writer.json";
pub const STATE_FILE: &str = "state.json";
pub const STATS_FILE: &str = "stats.json";

/// Path of a config file as the connector sees it.
pub fn container_path(name: &str) -> String {
    format!("{}/{}", CONTAINER_CONFIG_PATH, name)
}

/// Root of the shared storage holding execution directories.
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one execution.
    pub fn path(&self, directory_id: &str) -> PathBuf {
        self.root.join(directory_id)
    }

    /// Create the execution directory and write every config file into it.
    pub async fn write_configs(
        &self,
        directory_id: &str,
        configs: &[ConfigFile],
    ) -> Result<PathBuf, ExecutionError> {
        validate_name(directory_id)?;
        let dir = self.path(directory_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ExecutionError::Config { path: dir.clone(), source })?;

        for config in configs {
            validate_name(&config.name)?;
            let path = dir.join(&config.name);
            tokio::fs::write(&path, config.data.as_bytes())
                .await
                .map_err(|source| ExecutionError::Config { path: path.clone(), source })?;
        }

        tracing::debug!(directory_id, files = configs.len(), "wrote execution configs");
        Ok(dir)
    }

    /// Read a file from an execution directory; `None` if it does not exist.
    pub async fn read_file(
        &self,
        directory_id: &str,
        name: &str,
    ) -> Result<Option<String>, ExecutionError> {
        validate_name(directory_id)?;
        validate_name(name)?;
        let path = self.path(directory_id).join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ExecutionError::Config { path, source }),
        }
    }

    /// Read a JSON object file from an execution directory.
    ///
    /// Returns `None` when the file is missing or does not hold a JSON object.
    pub async fn read_json(
        &self,
        directory_id: &str,
        name: &str,
    ) -> Result<Option<ResultMap>, ExecutionError> {
        let Some(text) = self.read_file(directory_id, name).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(serde_json::Value::Object(map)) => Ok(Some(map)),
            Ok(_) | Err(_) => {
                tracing::warn!(directory_id, file = name, "output file is not a JSON object");
                Ok(None)
            }
        }
    }
}

/// A single path component; no separators or parent references.
fn validate_name(name: &str) -> Result<(), ExecutionError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(ExecutionError::InvalidConfigName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "workdir_tests.rs"]
mod tests;
