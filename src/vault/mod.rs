//! Vault module - Read accounts and SSH key items from a password manager.
//!
//! This module contains:
//! - Record types returned by the vault (accounts, items, item fields)
//! - VaultClient trait for abstraction
//! - 1Password `op` CLI client

pub mod op;

pub use op::OpClient;

use crate::error::VaultError;

/// A signed-in vault account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Opaque unique identifier (account UUID)
    pub id: String,
    /// Email address of the signed-in user
    pub email: String,
    /// Sign-in address of the account
    pub url: String,
}

/// An item that may hold an SSH key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyItem {
    pub id: String,
    pub title: String,
    /// Account the item was listed from
    pub account_id: String,
}

/// Type of a field as far as key extraction is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Sensitive value (passwords, private keys)
    Concealed,
    Other,
}

impl FieldType {
    /// Map the vault's field type name.
    pub fn from_wire(kind: &str) -> Self {
        if kind.eq_ignore_ascii_case("CONCEALED") {
            Self::Concealed
        } else {
            Self::Other
        }
    }
}

/// One field of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub id: String,
    pub field_type: FieldType,
    pub value: Option<String>,
    /// OpenSSH rendering of a private key, when the vault provides one
    pub openssh: Option<String>,
}

impl Field {
    /// Plain field without an OpenSSH rendering.
    pub fn new(label: &str, id: &str, field_type: FieldType, value: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            id: id.to_string(),
            field_type,
            value: value.map(str::to_string),
            openssh: None,
        }
    }
}

/// Full field set of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetail {
    pub item_id: String,
    /// Fields in the order the vault returned them
    pub fields: Vec<Field>,
}

/// Trait for vault backends.
///
/// All calls are synchronous and one-shot: no retries, no timeouts.
pub trait VaultClient {
    /// Backend name (for logs)
    fn name(&self) -> &'static str;

    /// List signed-in accounts. Empty if none are signed in.
    fn list_accounts(&self) -> Result<Vec<Account>, VaultError>;

    /// List items of an account, optionally restricted to one category.
    fn list_items(
        &self,
        account_id: &str,
        category: Option<&str>,
    ) -> Result<Vec<KeyItem>, VaultError>;

    /// Fetch all fields of one item.
    fn get_item_detail(&self, item_id: &str, account_id: &str) -> Result<ItemDetail, VaultError>;
}
