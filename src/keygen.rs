//! Public key derivation via `ssh-keygen -y`.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Computes a public key from a private key file.
pub trait KeyDeriver {
    /// Public key text for the private key at `private_path`.
    fn derive_public(&self, private_path: &Path) -> Result<String>;
}

/// `ssh-keygen` wrapper.
pub struct SshKeygen {
    binary: PathBuf,
}

impl SshKeygen {
    pub fn new() -> Self {
        Self::with_binary("ssh-keygen")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SshKeygen {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDeriver for SshKeygen {
    fn derive_public(&self, private_path: &Path) -> Result<String> {
        debug!("[Keygen] Deriving public key from {}", private_path.display());

        // Empty passphrase so an encrypted key fails instead of prompting.
        let output = Command::new(&self.binary)
            .arg("-y")
            .arg("-P")
            .arg("")
            .arg("-f")
            .arg(private_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Cannot execute {}", self.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} failed ({}): {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            );
        }

        let public = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if public.is_empty() {
            bail!("{} produced no output", self.binary.display());
        }
        Ok(format!("{}\n", public))
    }
}
