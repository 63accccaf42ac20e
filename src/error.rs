//! Error types for the vault boundary and for run-terminating failures.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a [`VaultClient`](crate::vault::VaultClient).
#[derive(Debug, Error)]
pub enum VaultError {
    /// The vault CLI is not installed or cannot be executed.
    #[error("vault client '{binary}' is not available: {reason}")]
    Unavailable { binary: String, reason: String },

    /// The vault CLI ran but exited with an error.
    #[error("vault command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// The requested item does not exist in the given account.
    #[error("item {item_id} not found in account {account_id}")]
    ItemNotFound { item_id: String, account_id: String },

    /// The vault CLI produced output we could not understand.
    #[error("cannot parse output of `{command}`: {source}")]
    Parse {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Conditions that terminate a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("vault client is unavailable: {0}")]
    VaultUnavailable(#[source] VaultError),

    #[error("no accounts are signed in to the vault client")]
    NoAccounts,

    #[error("no valid account was selected")]
    NothingSelected,

    #[error("{context}: {}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The caller could not provide a selection (e.g. stdin closed).
    #[error("cannot read account selection: {0}")]
    Selection(#[source] anyhow::Error),
}
