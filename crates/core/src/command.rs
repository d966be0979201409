// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector commands and the operation types derived from them.

use serde::{Deserialize, Serialize};

/// A connector lifecycle command.
///
/// Doubles as the searchable `OperationType` attribute on workflow
/// executions and the `olake.io/operation-type` pod label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    Discover,
    Check,
    Sync,
    Spec,
    ClearDestination,
}

crate::simple_display! {
    Command {
        Discover => "discover",
        Check => "check",
        Sync => "sync",
        Spec => "spec",
        ClearDestination => "clear-destination",
    }
}

impl Command {
    pub const ALL: [Command; 5] =
        [Command::Discover, Command::Check, Command::Sync, Command::Spec, Command::ClearDestination];

    /// Sub-command passed to the connector binary.
    pub fn cli_name(self) -> &'static str {
        match self {
            Command::Discover => "discover",
            Command::Check => "check",
            Command::Sync => "sync",
            Command::Spec => "spec",
            Command::ClearDestination => "clear-destination",
        }
    }

    /// Parse a label/CLI value back into a command.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.cli_name() == s)
    }

    /// Sync and ClearDestination run for up to 30 days; the rest are
    /// interactive and bounded to minutes.
    pub fn is_long_running(self) -> bool {
        matches!(self, Command::Sync | Command::ClearDestination)
    }
}

/// Which side of a job a connector config belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorRole {
    Source,
    Destination,
}

crate::simple_display! {
    ConnectorRole {
        Source => "source",
        Destination => "destination",
    }
}
