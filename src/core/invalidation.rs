//! Cache invalidation fan-out
//!
//! Every cached read view is keyed by the account it belongs to. After a
//! commit the views of each affected account are deleted; a failure to delete
//! one key is logged and never fails the operation that triggered it.
//!
//! Each invalidation also bumps a per-account generation. A read-through that
//! loaded its value under an older generation must not leave that value in
//! the cache.

use crate::core::traits::ViewCache;
use crate::types::{AccountId, TransactionKind};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Cached read views derived from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheView {
    Balance,
    DailySummary,
    WeeklySummary,

    /// Only the first history page is cached
    HistoryFirstPage,
}

impl CacheView {
    /// Every view that depends on a wallet's ledger rows
    pub const ALL: [CacheView; 4] = [
        CacheView::Balance,
        CacheView::DailySummary,
        CacheView::WeeklySummary,
        CacheView::HistoryFirstPage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheView::Balance => "balance",
            CacheView::DailySummary => "summary-daily",
            CacheView::WeeklySummary => "summary-weekly",
            CacheView::HistoryFirstPage => "history-page-1",
        }
    }
}

impl fmt::Display for CacheView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the cache key of a view: `{namespace}-{view}-{account}`
pub fn cache_key(namespace: &str, view: CacheView, account: AccountId) -> String {
    format!("{}-{}-{}", namespace, view, account)
}

/// Accounts whose views a committed transaction invalidates
///
/// A transfer affects both wallets, a top-up only the receiving wallet.
pub fn affected_accounts(
    kind: TransactionKind,
    sender_account: Option<AccountId>,
    receiver_account: AccountId,
) -> Vec<AccountId> {
    match (kind, sender_account) {
        (TransactionKind::Transfer, Some(sender)) => vec![sender, receiver_account],
        _ => vec![receiver_account],
    }
}

/// Deletes cached views, best-effort
///
/// Clones share the generation counters.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn ViewCache>,
    namespace: String,
    generations: Arc<DashMap<AccountId, u64>>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn ViewCache>, namespace: impl Into<String>) -> Self {
        CacheInvalidator {
            cache,
            namespace: namespace.into(),
            generations: Arc::new(DashMap::new()),
        }
    }

    /// Number of invalidations seen for an account so far
    pub fn generation(&self, account: AccountId) -> u64 {
        self.generations.get(&account).map_or(0, |entry| *entry)
    }

    /// Key of a view in this invalidator's namespace
    pub fn key(&self, view: CacheView, account: AccountId) -> String {
        cache_key(&self.namespace, view, account)
    }

    /// Delete every view of every given account
    ///
    /// Returns the number of keys that could not be deleted.
    pub async fn invalidate_accounts(&self, accounts: &[AccountId]) -> usize {
        let mut failures = 0;
        for account in accounts {
            for view in CacheView::ALL {
                if !self.invalidate(view, *account).await {
                    failures += 1;
                }
            }
        }
        failures
    }

    /// Delete one view of one account; returns whether the deletion succeeded
    pub async fn invalidate(&self, view: CacheView, account: AccountId) -> bool {
        // bump before deleting so a racing read-through sees the change
        *self.generations.entry(account).or_insert(0) += 1;

        let key = self.key(view, account);
        match self.cache.invalidate(&key).await {
            Ok(()) => true,
            Err(error) => {
                warn!(key = %key, error = %error, "Failed to invalidate cached view");
                false
            }
        }
    }
}
