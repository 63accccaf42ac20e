//! Key writer - Back up existing keys, then write new ones with safe modes.
//!
//! Per item: BACKUP (only if a target exists) -> WRITE_PRIVATE ->
//! WRITE_PUBLIC or DERIVE_PUBLIC. Nothing is overwritten before its backup
//! copy exists, and a failed backup stops the item right there.

use crate::keygen::KeyDeriver;
use crate::naming::ResolvedFilename;
use chrono::{DateTime, Local};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// rw-------
pub const PRIVATE_KEY_MODE: u32 = 0o600;
/// rw-r--r--
pub const PUBLIC_KEY_MODE: u32 = 0o644;
/// rwx------ (ssh dir and backup dir)
pub const PRIVATE_DIR_MODE: u32 = 0o700;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot back up {}: {source}", path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Backups made before the failure stay in the backup directory.
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        backed_up: Vec<PathBuf>,
        #[source]
        source: io::Error,
    },
}

/// Where the public key of a written item came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyStatus {
    /// Taken from the vault item
    Provided,
    /// Computed from the private key
    Derived,
    /// Not written; the private key is still in place
    Missing { reason: String },
}

/// Outcome of a successful write.
#[derive(Debug, Clone)]
pub struct WriteReport {
    /// Backup copies made before overwriting
    pub backed_up: Vec<PathBuf>,
    pub public: PublicKeyStatus,
}

/// Per-run backup directory, `backup_<YYYYmmdd_HHMMSS>` inside the ssh dir.
#[derive(Debug)]
pub struct BackupDir {
    path: PathBuf,
}

impl BackupDir {
    /// Create a fresh backup directory.
    ///
    /// Two runs within the same second would pick the same name; the later
    /// one gets a `_1`, `_2`, ... suffix instead of sharing the directory.
    pub fn create(ssh_dir: &Path, now: &DateTime<Local>) -> io::Result<Self> {
        let stamp = now.format("%Y%m%d_%H%M%S");
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("backup_{}", stamp)
            } else {
                format!("backup_{}_{}", stamp, attempt)
            };
            let path = ssh_dir.join(name);
            match create_private_dir(&path) {
                Ok(()) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy `file` into the backup directory under its own name.
    ///
    /// An earlier backup with the same name is kept; the new copy gets a
    /// `.1`, `.2`, ... suffix.
    pub fn backup(&self, file: &Path) -> io::Result<PathBuf> {
        let name = file.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", file.display()),
            )
        })?;

        let mut target = self.path.join(name);
        let mut n = 0u32;
        while target.exists() {
            n += 1;
            target = self
                .path
                .join(format!("{}.{}", name.to_string_lossy(), n));
        }

        fs::copy(file, &target)?;
        Ok(target)
    }

    /// Remove the directory if nothing was backed up. Returns whether it was removed.
    pub fn remove_if_empty(&self) -> io::Result<bool> {
        if fs::read_dir(&self.path)?.next().is_none() {
            fs::remove_dir(&self.path)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Writes key pairs into the ssh directory.
pub struct KeyWriter<'a> {
    backup: &'a BackupDir,
    deriver: &'a dyn KeyDeriver,
}

impl<'a> KeyWriter<'a> {
    pub fn new(backup: &'a BackupDir, deriver: &'a dyn KeyDeriver) -> Self {
        Self { backup, deriver }
    }

    /// Write one key pair. `public == None` derives the public key.
    pub fn write(
        &self,
        target: &ResolvedFilename,
        private: &str,
        public: Option<&str>,
    ) -> Result<WriteReport, WriteError> {
        let mut backed_up = Vec::new();
        for path in [&target.private_path, &target.public_path] {
            if path.exists() {
                let copy = self.backup.backup(path).map_err(|source| WriteError::Backup {
                    path: path.clone(),
                    source,
                })?;
                info!("[Writer] Backed up {} to {}", path.display(), copy.display());
                backed_up.push(copy);
            }
        }

        if let Err(source) = write_key_file(&target.private_path, private, PRIVATE_KEY_MODE) {
            return Err(WriteError::Write {
                path: target.private_path.clone(),
                backed_up,
                source,
            });
        }
        info!("[Writer] Wrote {}", target.private_path.display());

        let public = match public {
            Some(text) => self.write_public(target, text, PublicKeyStatus::Provided),
            None => self.derive_public(target),
        };

        Ok(WriteReport { backed_up, public })
    }

    fn write_public(
        &self,
        target: &ResolvedFilename,
        text: &str,
        status: PublicKeyStatus,
    ) -> PublicKeyStatus {
        match write_key_file(&target.public_path, text, PUBLIC_KEY_MODE) {
            Ok(()) => {
                info!("[Writer] Wrote {}", target.public_path.display());
                status
            }
            Err(e) => {
                debug!("[Writer] Cannot write {}: {}", target.public_path.display(), e);
                PublicKeyStatus::Missing {
                    reason: format!("cannot write {}: {}", target.public_path.display(), e),
                }
            }
        }
    }

    fn derive_public(&self, target: &ResolvedFilename) -> PublicKeyStatus {
        match self.deriver.derive_public(&target.private_path) {
            Ok(text) => self.write_public(target, &text, PublicKeyStatus::Derived),
            Err(e) => {
                debug!(
                    "[Writer] Cannot derive public key for {}: {:#}",
                    target.private_path.display(),
                    e
                );
                // A .pub from before the run no longer matches the new
                // private key. It is already in the backup directory.
                if target.public_path.exists() {
                    if let Err(e) = fs::remove_file(&target.public_path) {
                        warn!(
                            "[Writer] Cannot remove stale {}: {}",
                            target.public_path.display(),
                            e
                        );
                    }
                }
                PublicKeyStatus::Missing {
                    reason: format!("{:#}", e),
                }
            }
        }
    }
}

/// Create a directory only the owner can enter.
pub fn create_private_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().mode(PRIVATE_DIR_MODE).create(path)
    }

    #[cfg(not(unix))]
    {
        fs::create_dir(path)
    }
}

/// Write `contents` to `path` and force `mode`, also on a pre-existing file.
pub fn write_key_file(path: &Path, contents: &str, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }

    #[cfg(not(unix))]
    {
        let _ = mode;
        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }

    Ok(())
}
