//! Key item discovery - Find SSH key items in one account.
//!
//! Vaults categorize SSH keys inconsistently: some items carry the proper
//! category, others are free-form entries with "ssh" in the title. The
//! category listing is tried first; only when it is empty are all items
//! listed and filtered by title.

use crate::error::VaultError;
use crate::vault::{KeyItem, VaultClient};
use tracing::debug;

/// Which pass produced the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryTier {
    Category,
    TitleFallback,
    /// Neither pass found anything
    Nothing,
}

#[derive(Debug, Clone)]
pub struct Discovery {
    pub items: Vec<KeyItem>,
    pub tier: DiscoveryTier,
}

/// Finds SSH key items using a category filter with a title fallback.
pub struct KeyItemDiscoverer<'a> {
    category: &'a str,
    title_filter: String,
}

impl<'a> KeyItemDiscoverer<'a> {
    pub fn new(category: &'a str, title_filter: &str) -> Self {
        Self {
            category,
            title_filter: title_filter.to_lowercase(),
        }
    }

    /// Discover key items of `account_id`.
    pub fn discover(
        &self,
        client: &dyn VaultClient,
        account_id: &str,
    ) -> Result<Discovery, VaultError> {
        let items = client.list_items(account_id, Some(self.category))?;
        if !items.is_empty() {
            debug!(
                "[Discover] {} '{}' items in {}",
                items.len(),
                self.category,
                account_id
            );
            return Ok(Discovery {
                items,
                tier: DiscoveryTier::Category,
            });
        }

        let items: Vec<KeyItem> = client
            .list_items(account_id, None)?
            .into_iter()
            .filter(|item| self.title_matches(&item.title))
            .collect();
        debug!(
            "[Discover] {} items matching '{}' by title in {}",
            items.len(),
            self.title_filter,
            account_id
        );

        let tier = if items.is_empty() {
            DiscoveryTier::Nothing
        } else {
            DiscoveryTier::TitleFallback
        };
        Ok(Discovery { items, tier })
    }

    fn title_matches(&self, title: &str) -> bool {
        title.to_lowercase().contains(&self.title_filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{Account, ItemDetail};
    use std::cell::RefCell;

    struct ListingVault {
        categorized: Vec<&'static str>,
        all: Vec<&'static str>,
        calls: RefCell<Vec<Option<String>>>,
    }

    impl ListingVault {
        fn items(titles: &[&str], account_id: &str) -> Vec<KeyItem> {
            titles
                .iter()
                .enumerate()
                .map(|(i, title)| KeyItem {
                    id: format!("item{}", i),
                    title: title.to_string(),
                    account_id: account_id.to_string(),
                })
                .collect()
        }
    }

    impl VaultClient for ListingVault {
        fn name(&self) -> &'static str {
            "listing"
        }

        fn list_accounts(&self) -> Result<Vec<Account>, VaultError> {
            Ok(Vec::new())
        }

        fn list_items(
            &self,
            account_id: &str,
            category: Option<&str>,
        ) -> Result<Vec<KeyItem>, VaultError> {
            self.calls.borrow_mut().push(category.map(str::to_string));
            match category {
                Some(_) => Ok(Self::items(&self.categorized, account_id)),
                None => Ok(Self::items(&self.all, account_id)),
            }
        }

        fn get_item_detail(
            &self,
            item_id: &str,
            account_id: &str,
        ) -> Result<ItemDetail, VaultError> {
            Err(VaultError::ItemNotFound {
                item_id: item_id.to_string(),
                account_id: account_id.to_string(),
            })
        }
    }

    fn vault(categorized: Vec<&'static str>, all: Vec<&'static str>) -> ListingVault {
        ListingVault {
            categorized,
            all,
            calls: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_category_pass_wins() {
        let vault = vault(vec!["GitHub"], vec!["GitHub", "my ssh box"]);
        let discovery = KeyItemDiscoverer::new("SSH Key", "ssh")
            .discover(&vault, "A1")
            .unwrap();

        assert_eq!(discovery.tier, DiscoveryTier::Category);
        assert_eq!(discovery.items.len(), 1);
        assert_eq!(discovery.items[0].title, "GitHub");
        assert_eq!(discovery.items[0].account_id, "A1");
        assert_eq!(*vault.calls.borrow(), vec![Some("SSH Key".to_string())]);
    }

    #[test]
    fn test_title_fallback_is_case_insensitive() {
        let vault = vault(vec![], vec!["Bank", "Server SSH", "ssh-deploy", "SsH", "Email"]);
        let discovery = KeyItemDiscoverer::new("SSH Key", "ssh")
            .discover(&vault, "A1")
            .unwrap();

        assert_eq!(discovery.tier, DiscoveryTier::TitleFallback);
        let titles: Vec<&str> = discovery.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Server SSH", "ssh-deploy", "SsH"]);
        assert_eq!(
            *vault.calls.borrow(),
            vec![Some("SSH Key".to_string()), None]
        );
    }

    #[test]
    fn test_nothing_found_is_not_an_error() {
        let vault = vault(vec![], vec!["Bank", "Email"]);
        let discovery = KeyItemDiscoverer::new("SSH Key", "SSH")
            .discover(&vault, "A1")
            .unwrap();

        assert_eq!(discovery.tier, DiscoveryTier::Nothing);
        assert!(discovery.items.is_empty());
    }
}
