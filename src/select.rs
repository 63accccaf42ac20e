//! Account selection - Resolve a user's selection expression to accounts.
//!
//! Accepted input: the word `all` (any case) or whitespace-separated
//! 1-based indices into the listed accounts. Bad tokens are dropped one by
//! one, never the whole selection.

use crate::vault::Account;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Why a selection token was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NotANumber,
    /// Index outside `[1, count]`
    OutOfRange { count: usize },
}

/// A selection token that was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedToken {
    pub token: String,
    pub reason: RejectReason,
}

impl fmt::Display for RejectedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            RejectReason::NotANumber => write!(f, "'{}' is not a number", self.token),
            RejectReason::OutOfRange { count } => {
                write!(f, "'{}' is not between 1 and {}", self.token, count)
            }
        }
    }
}

/// Result of resolving a selection expression.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Selected accounts, in listing order, without duplicates
    pub accounts: Vec<Account>,
    pub rejected: Vec<RejectedToken>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Whether keys need an account suffix to stay distinct.
    pub fn is_multi_account(&self) -> bool {
        self.accounts.len() > 1
    }
}

/// Resolve `input` against `accounts`.
pub fn select_accounts(accounts: &[Account], input: &str) -> Selection {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return Selection {
            accounts: accounts.to_vec(),
            rejected: Vec::new(),
        };
    }

    let count = accounts.len();
    let mut indices = BTreeSet::new();
    let mut rejected = Vec::new();

    for token in input.split_whitespace() {
        let reason = match token.parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => {
                indices.insert(n - 1);
                continue;
            }
            Ok(_) => RejectReason::OutOfRange { count },
            Err(_) => RejectReason::NotANumber,
        };
        let rejected_token = RejectedToken {
            token: token.to_string(),
            reason,
        };
        debug!("[Select] Ignoring selection token: {}", rejected_token);
        rejected.push(rejected_token);
    }

    Selection {
        accounts: indices.into_iter().map(|i| accounts[i].clone()).collect(),
        rejected,
    }
}
