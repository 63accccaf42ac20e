//! Filename resolution - Turn vault item titles into key file names.
//!
//! Names are a pure function of (title, account email, item id, whether
//! several accounts are exported), so re-running an export hits the same
//! files and backs them up instead of piling up copies.

use std::path::{Path, PathBuf};

/// Title that vaults give to otherwise unnamed SSH key items.
const GENERIC_TITLE: &str = "ssh_key";

/// Number of item id characters used in fallback names.
const ITEM_ID_PREFIX_LEN: usize = 8;

/// On-disk names for one key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFilename {
    pub base: String,
    pub private_path: PathBuf,
    pub public_path: PathBuf,
}

impl ResolvedFilename {
    /// Place `base` inside `ssh_dir`.
    pub fn new(ssh_dir: &Path, base: String) -> Self {
        Self {
            private_path: ssh_dir.join(&base),
            public_path: ssh_dir.join(format!("{}.pub", base)),
            base,
        }
    }
}

/// Normalize a name to `[a-z0-9._-]`.
///
/// Lowercases, replaces every other character with `_` and strips
/// leading/trailing `_`.
///
/// # Examples
/// ```
/// # use ssh_export::naming::normalize;
/// assert_eq!(normalize("GitHub SSH Key"), "github_ssh_key");
/// assert_eq!(normalize("  (work) "), "work");
/// ```
pub fn normalize(name: &str) -> String {
    let replaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    replaced.trim_matches('_').to_string()
}

/// Normalized local part of an email address.
pub fn account_short(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    normalize(local)
}

/// Base file name for a key item.
///
/// # Examples
/// ```
/// # use ssh_export::naming::resolve_base;
/// assert_eq!(resolve_base("GitHub SSH Key", "alice@example.com", "x", false), "github_ssh_key");
/// assert_eq!(resolve_base("deploy-key", "bob@example.com", "x", true), "deploy-key_bob");
/// assert_eq!(
///     resolve_base("", "alice@example.com", "abcdef1234567890", false),
///     "id_rsa_alice_abcdef12"
/// );
/// ```
pub fn resolve_base(
    title: &str,
    account_email: &str,
    item_id: &str,
    multi_account: bool,
) -> String {
    let title = normalize(title);
    let short = account_short(account_email);

    // "." and ".." name directories, not files.
    if title.chars().all(|c| c == '.') || title == GENERIC_TITLE {
        let id_prefix: String = item_id.chars().take(ITEM_ID_PREFIX_LEN).collect();
        format!("id_rsa_{}_{}", short, id_prefix)
    } else if multi_account {
        format!("{}_{}", title, short)
    } else {
        title
    }
}

/// Resolve the full key paths for an item inside `ssh_dir`.
pub fn resolve(
    ssh_dir: &Path,
    title: &str,
    account_email: &str,
    item_id: &str,
    multi_account: bool,
) -> ResolvedFilename {
    ResolvedFilename::new(
        ssh_dir,
        resolve_base(title, account_email, item_id, multi_account),
    )
}
