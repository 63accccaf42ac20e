//! ssh-export Library
//!
//! Exports SSH key-pairs stored in a password manager vault into a local
//! SSH directory. Provides the following capabilities:
//! - Query the vault CLI for accounts and SSH key items
//! - Resolve which accounts to export from a selection expression
//! - Extract private/public keys from item fields (deriving the public key if needed)
//! - Name key files deterministically and write them with strict permissions
//! - Back up every key file that gets replaced
//!
//! Pipeline: Select accounts -> Discover items -> Extract keys -> Resolve names -> Write

pub mod config;
pub mod discover;
pub mod error;
pub mod extract;
pub mod keygen;
pub mod naming;
pub mod select;
pub mod sync;
pub mod vault;
pub mod writer;

// Re-export main types
pub use config::Config;
pub use error::{SyncError, VaultError};
pub use keygen::{KeyDeriver, SshKeygen};
pub use sync::{ItemOutcome, SkipReason, SyncEvent, SyncResult, Syncer};
pub use vault::{Account, ItemDetail, KeyItem, OpClient, VaultClient};
