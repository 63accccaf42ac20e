use super::{Account, Field, FieldType, ItemDetail, KeyItem, VaultClient};
use crate::error::VaultError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// Windows flag to prevent console window from appearing
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

const DEFAULT_BINARY: &str = "op";

#[derive(Debug, Deserialize)]
struct OpAccount {
    account_uuid: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpItem {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct OpItemDetail {
    id: String,
    #[serde(default)]
    fields: Vec<OpField>,
}

#[derive(Debug, Deserialize)]
struct OpField {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    ssh_formats: Option<OpSshFormats>,
}

#[derive(Debug, Deserialize)]
struct OpSshFormats {
    openssh: Option<OpSshFormat>,
}

#[derive(Debug, Deserialize)]
struct OpSshFormat {
    value: Option<String>,
}

/// 1Password CLI client.
/// Wraps the `op` command line tool; the session is whatever `op` has.
pub struct OpClient {
    binary: PathBuf,
}

impl OpClient {
    /// Client using `op` from PATH.
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    /// Client using a specific `op` binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.binary.display(), args.join(" "))
    }

    /// Run op and return stdout.
    fn run_op(&self, args: &[&str]) -> Result<String, VaultError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        debug!("[Vault] Running {}", self.describe(args));
        let output = cmd.output().map_err(|e| VaultError::Unavailable {
            binary: self.binary.display().to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(VaultError::CommandFailed {
                command: self.describe(args),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, VaultError> {
        let stdout = self.run_op(args)?;
        parse_json(&stdout).map_err(|source| VaultError::Parse {
            command: self.describe(args),
            source,
        })
    }

    fn run_json_list<T: DeserializeOwned>(&self, args: &[&str]) -> Result<Vec<T>, VaultError> {
        let stdout = self.run_op(args)?;
        parse_json_list(&stdout).map_err(|source| VaultError::Parse {
            command: self.describe(args),
            source,
        })
    }
}

impl Default for OpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultClient for OpClient {
    fn name(&self) -> &'static str {
        "1password"
    }

    fn list_accounts(&self) -> Result<Vec<Account>, VaultError> {
        let accounts: Vec<OpAccount> =
            self.run_json_list(&["account", "list", "--format=json"])?;
        Ok(accounts.into_iter().map(Account::from).collect())
    }

    fn list_items(
        &self,
        account_id: &str,
        category: Option<&str>,
    ) -> Result<Vec<KeyItem>, VaultError> {
        let mut args = vec!["item", "list", "--account", account_id];
        if let Some(category) = category {
            args.push("--categories");
            args.push(category);
        }
        args.push("--format=json");

        let items: Vec<OpItem> = self.run_json_list(&args)?;
        Ok(items
            .into_iter()
            .map(|item| KeyItem {
                id: item.id,
                title: item.title,
                account_id: account_id.to_string(),
            })
            .collect())
    }

    fn get_item_detail(&self, item_id: &str, account_id: &str) -> Result<ItemDetail, VaultError> {
        let args = [
            "item",
            "get",
            item_id,
            "--account",
            account_id,
            "--format=json",
        ];
        let detail: OpItemDetail = match self.run_json(&args) {
            Err(VaultError::CommandFailed { stderr, .. }) if is_not_found(&stderr) => {
                return Err(VaultError::ItemNotFound {
                    item_id: item_id.to_string(),
                    account_id: account_id.to_string(),
                });
            }
            other => other?,
        };
        Ok(detail.into())
    }
}

impl From<OpAccount> for Account {
    fn from(account: OpAccount) -> Self {
        Self {
            id: account.account_uuid,
            email: account.email,
            url: account.url,
        }
    }
}

impl From<OpItemDetail> for ItemDetail {
    fn from(detail: OpItemDetail) -> Self {
        Self {
            item_id: detail.id,
            fields: detail
                .fields
                .into_iter()
                .map(|field| Field {
                    field_type: FieldType::from_wire(&field.kind),
                    openssh: field
                        .ssh_formats
                        .and_then(|f| f.openssh)
                        .and_then(|f| f.value),
                    label: field.label,
                    id: field.id,
                    value: field.value,
                })
                .collect(),
        }
    }
}

fn is_not_found(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("isn't an item") || stderr.contains("not found")
}

fn parse_json<T: DeserializeOwned>(stdout: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(stdout.trim())
}

/// op prints nothing at all for some empty listings.
fn parse_json_list<T: DeserializeOwned>(stdout: &str) -> Result<Vec<T>, serde_json::Error> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    parse_json(stdout)
}
