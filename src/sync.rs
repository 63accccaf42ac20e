//! Sync orchestration - Drive the export pipeline end to end.
//!
//! accounts -> selection -> (per account) discovery -> (per item) detail ->
//! extraction -> naming -> write. Only a missing vault client, no signed-in
//! accounts and an empty selection stop the run; everything else is
//! reported through [`SyncEvent`]s and counted in [`SyncResult`].

use crate::config::Config;
use crate::discover::{DiscoveryTier, KeyItemDiscoverer};
use crate::error::{SyncError, VaultError};
use crate::extract::{extract, Extraction};
use crate::keygen::KeyDeriver;
use crate::naming::{self, ResolvedFilename};
use crate::select::{select_accounts, RejectedToken};
use crate::vault::{Account, KeyItem, VaultClient};
use crate::writer::{
    create_private_dir, BackupDir, KeyWriter, PublicKeyStatus, WriteError, WriteReport,
};
use chrono::Local;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Why an item produced no key files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Item fields could not be fetched
    DetailUnavailable(String),
    NoPrivateKey,
    /// Existing key could not be backed up, so it was left alone
    BackupFailed(String),
    /// Private key could not be written; earlier backups are kept
    WriteFailed {
        error: String,
        backed_up: Vec<PathBuf>,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DetailUnavailable(e) => write!(f, "cannot fetch item: {}", e),
            Self::NoPrivateKey => write!(f, "no private key found"),
            Self::BackupFailed(e) => write!(f, "backup failed, existing key kept: {}", e),
            Self::WriteFailed { error, .. } => write!(f, "write failed: {}", error),
        }
    }
}

/// Result of processing one item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Written {
        target: ResolvedFilename,
        report: WriteReport,
    },
    Skipped(SkipReason),
}

/// Progress notifications for the caller's running commentary.
#[derive(Debug)]
pub enum SyncEvent<'a> {
    AccountsFound(&'a [Account]),
    SelectionRejected(&'a RejectedToken),
    BackupDirCreated(&'a Path),
    AccountStarted {
        account: &'a Account,
        position: usize,
        total: usize,
    },
    /// Listing failed; the account is skipped
    AccountFailed {
        account: &'a Account,
        error: &'a VaultError,
    },
    ItemsDiscovered {
        account: &'a Account,
        count: usize,
        tier: DiscoveryTier,
    },
    /// An earlier item of this run already wrote to the same name
    NameReused { item: &'a KeyItem, base: &'a str },
    ItemProcessed {
        item: &'a KeyItem,
        outcome: &'a ItemOutcome,
    },
}

/// Totals of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub items_found: usize,
    pub keys_written: usize,
    pub keys_skipped: usize,
    /// Items whose previous key files were backed up
    pub keys_backed_up: usize,
    /// Written items left without a public key
    pub public_keys_missing: usize,
    pub backup_dir: PathBuf,
    /// False when the backup directory was removed because it stayed empty
    pub backup_kept: bool,
}

impl SyncResult {
    fn new(backup_dir: &Path) -> Self {
        Self {
            items_found: 0,
            keys_written: 0,
            keys_skipped: 0,
            keys_backed_up: 0,
            public_keys_missing: 0,
            backup_dir: backup_dir.to_path_buf(),
            backup_kept: true,
        }
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Written { report, .. } => {
                self.keys_written += 1;
                if !report.backed_up.is_empty() {
                    self.keys_backed_up += 1;
                }
                if matches!(report.public, PublicKeyStatus::Missing { .. }) {
                    self.public_keys_missing += 1;
                }
            }
            ItemOutcome::Skipped(reason) => {
                self.keys_skipped += 1;
                if let SkipReason::WriteFailed { backed_up, .. } = reason {
                    if !backed_up.is_empty() {
                        self.keys_backed_up += 1;
                    }
                }
            }
        }
    }
}

/// Runs the export pipeline.
pub struct Syncer<'a> {
    config: &'a Config,
    client: &'a dyn VaultClient,
    deriver: &'a dyn KeyDeriver,
}

impl<'a> Syncer<'a> {
    pub fn new(
        config: &'a Config,
        client: &'a dyn VaultClient,
        deriver: &'a dyn KeyDeriver,
    ) -> Self {
        Self {
            config,
            client,
            deriver,
        }
    }

    /// Run one export.
    ///
    /// `select` receives the signed-in accounts and returns the raw
    /// selection expression (`all` or 1-based indices).
    pub fn run<S, E>(&self, select: S, mut on_event: E) -> Result<SyncResult, SyncError>
    where
        S: FnOnce(&[Account]) -> anyhow::Result<String>,
        E: FnMut(SyncEvent<'_>),
    {
        info!("[Sync] Listing {} accounts", self.client.name());
        let accounts = self
            .client
            .list_accounts()
            .map_err(SyncError::VaultUnavailable)?;
        if accounts.is_empty() {
            return Err(SyncError::NoAccounts);
        }
        on_event(SyncEvent::AccountsFound(&accounts));

        let input = select(&accounts).map_err(SyncError::Selection)?;
        let selection = select_accounts(&accounts, &input);
        for rejected in &selection.rejected {
            on_event(SyncEvent::SelectionRejected(rejected));
        }
        if selection.is_empty() {
            return Err(SyncError::NothingSelected);
        }
        let multi_account = selection.is_multi_account();

        let ssh_dir = &self.config.ssh_dir;
        ensure_ssh_dir(ssh_dir)?;
        let backup = BackupDir::create(ssh_dir, &Local::now()).map_err(|source| SyncError::Io {
            context: "cannot create backup directory under",
            path: ssh_dir.clone(),
            source,
        })?;
        on_event(SyncEvent::BackupDirCreated(backup.path()));

        let writer = KeyWriter::new(&backup, self.deriver);
        let discoverer =
            KeyItemDiscoverer::new(&self.config.vault.category, &self.config.vault.title_filter);
        let mut result = SyncResult::new(backup.path());
        let mut used_names = HashSet::new();

        let total = selection.accounts.len();
        for (i, account) in selection.accounts.iter().enumerate() {
            on_event(SyncEvent::AccountStarted {
                account,
                position: i + 1,
                total,
            });

            let discovery = match discoverer.discover(self.client, &account.id) {
                Ok(discovery) => discovery,
                Err(error) => {
                    debug!("[Sync] Cannot list items of {}: {}", account.email, error);
                    on_event(SyncEvent::AccountFailed {
                        account,
                        error: &error,
                    });
                    continue;
                }
            };
            on_event(SyncEvent::ItemsDiscovered {
                account,
                count: discovery.items.len(),
                tier: discovery.tier,
            });
            result.items_found += discovery.items.len();

            for item in &discovery.items {
                let outcome = self.process_item(&writer, account, item, multi_account);
                if let ItemOutcome::Written { target, .. } = &outcome {
                    if !used_names.insert(target.base.clone()) {
                        debug!("[Sync] {} was already written in this run", target.base);
                        on_event(SyncEvent::NameReused {
                            item,
                            base: &target.base,
                        });
                    }
                }
                result.record(&outcome);
                on_event(SyncEvent::ItemProcessed {
                    item,
                    outcome: &outcome,
                });
            }
        }

        match backup.remove_if_empty() {
            Ok(removed) => result.backup_kept = !removed,
            Err(e) => warn!(
                "[Sync] Cannot clean up {}: {}",
                backup.path().display(),
                e
            ),
        }

        info!(
            "[Sync] Done: {} found, {} written, {} skipped, {} backed up",
            result.items_found, result.keys_written, result.keys_skipped, result.keys_backed_up
        );
        Ok(result)
    }

    fn process_item(
        &self,
        writer: &KeyWriter<'_>,
        account: &Account,
        item: &KeyItem,
        multi_account: bool,
    ) -> ItemOutcome {
        let detail = match self.client.get_item_detail(&item.id, &item.account_id) {
            Ok(detail) => detail,
            Err(e) => return ItemOutcome::Skipped(SkipReason::DetailUnavailable(e.to_string())),
        };

        let (private, public) = match extract(&detail) {
            Extraction::Complete { private, public } => (private, Some(public)),
            Extraction::NeedsDerivation { private } => (private, None),
            Extraction::MissingPrivate => return ItemOutcome::Skipped(SkipReason::NoPrivateKey),
        };

        let target = naming::resolve(
            &self.config.ssh_dir,
            &item.title,
            &account.email,
            &item.id,
            multi_account,
        );

        match writer.write(&target, &private, public.as_deref()) {
            Ok(report) => ItemOutcome::Written { target, report },
            Err(e @ WriteError::Backup { .. }) => {
                ItemOutcome::Skipped(SkipReason::BackupFailed(e.to_string()))
            }
            Err(WriteError::Write {
                path,
                backed_up,
                source,
            }) => ItemOutcome::Skipped(SkipReason::WriteFailed {
                error: format!("cannot write {}: {}", path.display(), source),
                backed_up,
            }),
        }
    }
}

/// Create the ssh directory (owner-only) if it does not exist yet.
fn ensure_ssh_dir(ssh_dir: &Path) -> Result<(), SyncError> {
    if ssh_dir.is_dir() {
        return Ok(());
    }
    let io_error = |source: std::io::Error| SyncError::Io {
        context: "cannot create ssh directory",
        path: ssh_dir.to_path_buf(),
        source,
    };
    if let Some(parent) = ssh_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    create_private_dir(ssh_dir).map_err(io_error)?;
    info!("[Sync] Created {}", ssh_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(backed_up: usize, public: PublicKeyStatus) -> WriteReport {
        WriteReport {
            backed_up: (0..backed_up)
                .map(|i| PathBuf::from(format!("/backup/{}", i)))
                .collect(),
            public,
        }
    }

    fn written(report: WriteReport) -> ItemOutcome {
        ItemOutcome::Written {
            target: ResolvedFilename::new(Path::new("/ssh"), "key".to_string()),
            report,
        }
    }

    #[test]
    fn test_result_accumulates_outcomes() {
        let mut result = SyncResult::new(Path::new("/ssh/backup_x"));
        result.record(&written(report(0, PublicKeyStatus::Provided)));
        result.record(&written(report(2, PublicKeyStatus::Derived)));
        result.record(&written(report(
            1,
            PublicKeyStatus::Missing {
                reason: "no ssh-keygen".to_string(),
            },
        )));
        result.record(&ItemOutcome::Skipped(SkipReason::NoPrivateKey));
        result.record(&ItemOutcome::Skipped(SkipReason::BackupFailed(
            "denied".to_string(),
        )));
        result.record(&ItemOutcome::Skipped(SkipReason::WriteFailed {
            error: "read-only".to_string(),
            backed_up: vec![PathBuf::from("/backup/key")],
        }));

        assert_eq!(result.keys_written, 3);
        assert_eq!(result.keys_backed_up, 3);
        assert_eq!(result.public_keys_missing, 1);
        assert_eq!(result.keys_skipped, 3);
        assert_eq!(result.items_found, 0);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::NoPrivateKey.to_string(), "no private key found");
        assert_eq!(
            SkipReason::BackupFailed("denied".to_string()).to_string(),
            "backup failed, existing key kept: denied"
        );
    }

    #[test]
    fn test_ensure_ssh_dir_creates_owner_only() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let ssh_dir = temp.path().join("home").join(".ssh");

        ensure_ssh_dir(&ssh_dir)?;
        assert!(ssh_dir.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&ssh_dir)?.permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }

        // Existing directory is left as is.
        ensure_ssh_dir(&ssh_dir)?;
        Ok(())
    }
}
