//! Wallet service
//!
//! Handler-facing operations composed from the ledger components:
//!
//! ```text
//! create_transaction
//!     ├── TransactionPlan      (request validation)
//!     ├── AuthorizationGate    (PIN check, transfers only)
//!     ├── TransactionLedger    (participant resolution + atomic unit)
//!     ├── CacheInvalidator     (best-effort, after commit)
//!     └── Notifier             (fire-and-forget, after commit)
//! ```
//!
//! Balance, summaries and the first history page are served through the view
//! cache; a cache failure degrades to a store read and is only logged.

use crate::config::LedgerConfig;
use crate::core::authorization::AuthorizationGate;
use crate::core::history::HistoryProjector;
use crate::core::invalidation::{affected_accounts, CacheInvalidator, CacheView};
use crate::core::ledger::{TransactionLedger, TransactionPlan};
use crate::core::notification::{NotificationDispatcher, NotificationHandle};
use crate::core::traits::{LedgerStore, Notifier, PinVerifier, ViewCache};
use crate::store::Backends;
use crate::types::{
    AccountId, Amount, CreateTransaction, DailySummary, HistoryPage, InternalAccount,
    InternalAccountId, LedgerError, ParticipantKind, Transaction, TransactionId, TransactionKind,
    WeeklySummary,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Entry point for every ledger operation
#[derive(Clone)]
pub struct WalletService {
    store: Arc<dyn LedgerStore>,
    ledger: TransactionLedger,
    projector: HistoryProjector,
    gate: AuthorizationGate,
    cache: Arc<dyn ViewCache>,
    invalidator: CacheInvalidator,
    notifier: Arc<dyn Notifier>,
    config: LedgerConfig,
}

impl WalletService {
    /// Create a new service
    ///
    /// # Arguments
    ///
    /// * `store` - Relational state (wallets, participants, ledger rows)
    /// * `cache` - Cache for read views
    /// * `notifier` - Delivery of user-facing messages
    /// * `verifier` - Credential layer consulted for transfer PINs
    /// * `config` - Page size, deadlines and cache settings
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<dyn ViewCache>,
        notifier: Arc<dyn Notifier>,
        verifier: Arc<dyn PinVerifier>,
        config: LedgerConfig,
    ) -> Self {
        WalletService {
            ledger: TransactionLedger::new(Arc::clone(&store), config.unit_timeout),
            projector: HistoryProjector::new(Arc::clone(&store)),
            gate: AuthorizationGate::new(verifier),
            invalidator: CacheInvalidator::new(Arc::clone(&cache), config.cache_namespace.clone()),
            store,
            cache,
            notifier,
            config,
        }
    }

    /// Build a service on the backends named by `config`
    ///
    /// Spawns a [`NotificationDispatcher`] whose queues hold
    /// `config.notification_buffer` messages and returns its handle next to
    /// the service, so connection handlers can register subscriptions. Must be
    /// called from within a tokio runtime.
    pub async fn connect(
        config: LedgerConfig,
        verifier: Arc<dyn PinVerifier>,
    ) -> Result<(Self, NotificationHandle), LedgerError> {
        let backends = Backends::from_config(&config).await?;
        let notifications = NotificationDispatcher::spawn(config.notification_buffer);

        let service = WalletService::new(
            backends.store,
            backends.cache,
            Arc::new(notifications.clone()),
            verifier,
            config,
        );
        Ok((service, notifications))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Validate, authorize and commit a transaction, then run its side effects
    ///
    /// On success the views of every affected wallet are invalidated and the
    /// credited wallet is notified. Neither side effect can fail the call. On
    /// error nothing was committed and no side effect ran.
    #[instrument(
        skip(self, request),
        fields(kind = %request.kind, account = request.acting_account, amount = request.amount)
    )]
    pub async fn create_transaction(
        &self,
        request: CreateTransaction,
    ) -> Result<Transaction, LedgerError> {
        let plan = TransactionPlan::from_request(&request)?;
        self.gate.authorize(&request).await?;

        let kind = plan.kind;
        let sender_wallet = (plan.sender.0 == ParticipantKind::Wallet).then_some(plan.sender.1);
        let internal_sender = plan.sender.1;
        let receiver_wallet = plan.receiver.1;

        let transaction = self.ledger.record_plan(plan, request.deadline).await?;

        let failures = self
            .invalidator
            .invalidate_accounts(&affected_accounts(kind, sender_wallet, receiver_wallet))
            .await;
        if failures > 0 {
            warn!(tx = transaction.id, failures, "Some cached views were not invalidated");
        }

        let message = match kind {
            TransactionKind::Transfer => format!(
                "You received a transfer of {} from account {}",
                transaction.amount, request.acting_account
            ),
            TransactionKind::TopUp => format!(
                "Top-up of {} received from {}",
                transaction.amount,
                self.internal_account_name(internal_sender).await
            ),
        };
        self.notifier.notify(receiver_wallet, message);

        Ok(transaction)
    }

    /// Current balance of a wallet
    #[instrument(skip(self))]
    pub async fn get_balance(&self, account: AccountId) -> Result<Amount, LedgerError> {
        self.cached(CacheView::Balance, account, || async move {
            let wallet = self
                .store
                .wallet(account)
                .await?
                .ok_or_else(|| LedgerError::wallet_not_found(account))?;
            Ok(wallet.balance)
        })
        .await
    }

    /// One page of a wallet's history, newest first, with the configured page size
    #[instrument(skip(self))]
    pub async fn get_history(
        &self,
        account: AccountId,
        page: u32,
    ) -> Result<HistoryPage, LedgerError> {
        let page_size = self.config.history_page_size;
        if page == 1 {
            return self
                .cached(CacheView::HistoryFirstPage, account, || {
                    self.projector.list_history(account, page, page_size)
                })
                .await;
        }
        self.projector.list_history(account, page, page_size).await
    }

    /// Hide a transaction from the acting account's history
    ///
    /// The counterparty keeps seeing it. Hiding an already hidden entry is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransactionNotFound`] if the transaction does not
    /// exist or the account is on neither side of it.
    #[instrument(skip(self))]
    pub async fn soft_delete_history_entry(
        &self,
        account: AccountId,
        tx: TransactionId,
    ) -> Result<(), LedgerError> {
        let participant = self
            .ledger
            .resolver()
            .lookup(ParticipantKind::Wallet, account)
            .await?
            .ok_or_else(|| LedgerError::transaction_not_found(tx, account))?;

        if !self.store.soft_delete(participant.id, tx, Utc::now()).await? {
            return Err(LedgerError::transaction_not_found(tx, account));
        }
        info!(tx, account, "Hid transaction from history");

        self.invalidator
            .invalidate(CacheView::HistoryFirstPage, account)
            .await;
        Ok(())
    }

    /// Expense and income of each of the last seven days
    #[instrument(skip(self))]
    pub async fn get_daily_summary(
        &self,
        account: AccountId,
    ) -> Result<Vec<DailySummary>, LedgerError> {
        let today = Utc::now().date_naive();
        self.cached(CacheView::DailySummary, account, || {
            self.projector.daily_summary(account, today)
        })
        .await
    }

    /// Expense and income per active week of the current month
    #[instrument(skip(self))]
    pub async fn get_weekly_summary(
        &self,
        account: AccountId,
    ) -> Result<Vec<WeeklySummary>, LedgerError> {
        let today = Utc::now().date_naive();
        self.cached(CacheView::WeeklySummary, account, || {
            self.projector.weekly_summary(account, today)
        })
        .await
    }

    /// Internal accounts available as top-up sources, ordered by id
    pub async fn list_internal_accounts(&self) -> Result<Vec<InternalAccount>, LedgerError> {
        self.store.internal_accounts().await
    }

    async fn internal_account_name(&self, id: InternalAccountId) -> String {
        match self.store.internal_account(id).await {
            Ok(Some(account)) => account.name,
            Ok(None) => format!("internal account {}", id),
            Err(error) => {
                warn!(internal_account = id, error = %error, "Could not load internal account name");
                format!("internal account {}", id)
            }
        }
    }

    /// Read-through lookup of a cached view
    ///
    /// A commit may invalidate the key while the value is being loaded. The
    /// account's invalidation generation is taken before the load; if it moved
    /// by the time the value is written back, the written key is deleted again
    /// so the stale value is not served until the TTL runs out.
    async fn cached<T, F, Fut>(
        &self,
        view: CacheView,
        account: AccountId,
        load: F,
    ) -> Result<T, LedgerError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let key = self.invalidator.key(view, account);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(error) => warn!(key = %key, error = %error, "Discarding unreadable cached view"),
            },
            Ok(None) => {}
            Err(error) => warn!(key = %key, error = %error, "Cache read failed"),
        }

        let generation = self.invalidator.generation(account);
        let value = load().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if self.invalidator.generation(account) != generation {
                    debug!(key = %key, "View changed while loading, not caching it");
                } else if let Err(error) = self.cache.set(&key, raw, self.config.cache_ttl).await {
                    warn!(key = %key, error = %error, "Cache write failed");
                } else if self.invalidator.generation(account) != generation {
                    self.invalidator.invalidate(view, account).await;
                }
            }
            Err(error) => warn!(key = %key, error = %error, "Could not serialize view"),
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::authorization::StaticPinVerifier;
    use crate::core::invalidation::cache_key;
    use crate::store::{InMemoryCache, InMemoryLedgerStore};
    use crate::types::{Direction, Profile};
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(AccountId, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, account: AccountId, message: String) {
            self.sent.lock().unwrap().push((account, message));
        }
    }

    struct Harness {
        store: Arc<InMemoryLedgerStore>,
        cache: Arc<InMemoryCache>,
        notifier: Arc<RecordingNotifier>,
        service: WalletService,
    }

    fn harness() -> Harness {
        harness_with_config(LedgerConfig::default())
    }

    fn harness_with_config(config: LedgerConfig) -> Harness {
        let store = Arc::new(InMemoryLedgerStore::new());
        for (account, name) in [(1, "Ana"), (2, "Budi")] {
            store
                .open_wallet(account, Profile::new("x@example.com", Some(name.to_string())))
                .unwrap();
        }
        store.add_internal_account(InternalAccount {
            id: 10,
            name: "Bank Transfer".to_string(),
            image: None,
            tax_rate: Decimal::ONE,
            created_at: Utc::now(),
        });

        let verifier = StaticPinVerifier::new();
        verifier.set_pin(1, "1234");

        let cache = Arc::new(InMemoryCache::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = WalletService::new(
            store.clone(),
            cache.clone(),
            notifier.clone(),
            Arc::new(verifier),
            config,
        );

        Harness {
            store,
            cache,
            notifier,
            service,
        }
    }

    #[tokio::test]
    async fn test_top_up_notifies_with_internal_account_name() {
        let h = harness();

        h.service
            .create_transaction(CreateTransaction::top_up(1, 10, 50_000, 50_500))
            .await
            .unwrap();

        assert_eq!(h.service.get_balance(1).await.unwrap(), 50_000);
        assert_eq!(
            h.notifier.sent.lock().unwrap().as_slice(),
            &[(1, "Top-up of 50000 received from Bank Transfer".to_string())]
        );
    }

    #[tokio::test]
    async fn test_transfer_notifies_receiver() {
        let h = harness();
        h.service
            .create_transaction(CreateTransaction::top_up(1, 10, 100_000, 100_000))
            .await
            .unwrap();

        h.service
            .create_transaction(CreateTransaction::transfer(1, 2, 30_000, 30_000, "1234"))
            .await
            .unwrap();

        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(
            sent.last().unwrap(),
            &(2, "You received a transfer of 30000 from account 1".to_string())
        );
    }

    #[tokio::test]
    async fn test_rejected_pin_has_no_effect() {
        let h = harness();
        h.service
            .create_transaction(CreateTransaction::top_up(1, 10, 100_000, 100_000))
            .await
            .unwrap();

        let result = h
            .service
            .create_transaction(CreateTransaction::transfer(1, 2, 30_000, 30_000, "9999"))
            .await;

        assert_eq!(result.unwrap_err(), LedgerError::pin_rejected(1));
        assert_eq!(h.store.balances().await, vec![(1, 100_000), (2, 0)]);
        assert_eq!(h.store.transaction_count(), 1);
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_invalidates_cached_balance() {
        let h = harness();
        assert_eq!(h.service.get_balance(1).await.unwrap(), 0);
        let key = cache_key("wallet", CacheView::Balance, 1);
        assert_eq!(h.cache.get(&key).await.unwrap().as_deref(), Some("0"));

        h.service
            .create_transaction(CreateTransaction::top_up(1, 10, 700, 707))
            .await
            .unwrap();

        assert_eq!(h.cache.get(&key).await.unwrap(), None);
        assert_eq!(h.service.get_balance(1).await.unwrap(), 700);
    }

    #[tokio::test]
    async fn test_commit_during_load_is_not_cached_stale() {
        let h = harness();
        let key = cache_key("wallet", CacheView::Balance, 1);

        // the load reads the old balance, then a commit lands before write-back
        let stale = h
            .service
            .cached(CacheView::Balance, 1, || async {
                let balance = h.store.balances().await[0].1;
                h.service
                    .create_transaction(CreateTransaction::top_up(1, 10, 700, 700))
                    .await?;
                Ok::<_, LedgerError>(balance)
            })
            .await
            .unwrap();

        assert_eq!(stale, 0);
        assert_eq!(h.cache.get(&key).await.unwrap(), None);
        assert_eq!(h.service.get_balance(1).await.unwrap(), 700);
        assert_eq!(h.cache.get(&key).await.unwrap().as_deref(), Some("700"));
    }

    #[tokio::test]
    async fn test_unbounded_cache_ttl_is_served() {
        let config = LedgerConfig::from_lookup(|name| {
            (name == "WALLET_LEDGER_CACHE_TTL_SECS").then(|| u64::MAX.to_string())
        });
        let h = harness_with_config(config);

        assert_eq!(h.service.get_balance(1).await.unwrap(), 0);
        assert_eq!(h.service.get_balance(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_wallet_balance() {
        let h = harness();

        assert_eq!(
            h.service.get_balance(99).await.unwrap_err(),
            LedgerError::wallet_not_found(99)
        );
    }

    #[tokio::test]
    async fn test_history_reports_direction_and_counterparty() {
        let h = harness();
        h.service
            .create_transaction(CreateTransaction::top_up(1, 10, 1_000, 1_010))
            .await
            .unwrap();
        h.service
            .create_transaction(
                CreateTransaction::transfer(1, 2, 400, 400, "1234").with_note("lunch"),
            )
            .await
            .unwrap();

        let page = h.service.get_history(1, 1).await.unwrap();

        assert_eq!(page.total_count, 2);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.entries[0].direction, Direction::Debit);
        assert_eq!(page.entries[0].counterparty.name.as_deref(), Some("Budi"));
        assert_eq!(page.entries[0].note.as_deref(), Some("lunch"));
        assert_eq!(page.entries[1].direction, Direction::Credit);
        assert_eq!(page.entries[1].counterparty.kind, ParticipantKind::Internal);
        assert_eq!(
            page.entries[1].counterparty.name.as_deref(),
            Some("Bank Transfer")
        );
    }

    #[tokio::test]
    async fn test_history_pages_past_the_first() {
        let h = harness();
        for amount in 1..=25 {
            h.service
                .create_transaction(CreateTransaction::top_up(1, 10, amount, amount))
                .await
                .unwrap();
        }

        let pages: Vec<HistoryPage> = futures::future::try_join_all(
            (1..=4).map(|page| h.service.get_history(1, page)),
        )
        .await
        .unwrap();

        for page in &pages {
            assert_eq!(page.total_count, 25);
            assert_eq!(page.total_pages, 3);
        }
        let amounts = |page: &HistoryPage| -> Vec<Amount> {
            page.entries.iter().map(|entry| entry.amount).collect()
        };
        // newest first
        assert_eq!(amounts(&pages[0]), (16..=25).rev().collect::<Vec<_>>());
        assert_eq!(amounts(&pages[1]), (6..=15).rev().collect::<Vec<_>>());
        assert_eq!(amounts(&pages[2]), (1..=5).rev().collect::<Vec<_>>());
        assert!(pages[3].entries.is_empty());
        assert_eq!(pages[1].page, 2);
    }

    #[tokio::test]
    async fn test_history_page_zero_is_invalid() {
        let h = harness();

        assert_eq!(
            h.service.get_history(1, 0).await.unwrap_err(),
            LedgerError::invalid_page(0)
        );
    }

    #[tokio::test]
    async fn test_history_of_idle_account_is_empty() {
        let h = harness();

        let page = h.service.get_history(2, 1).await.unwrap();

        assert!(page.entries.is_empty());
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_soft_delete_is_one_sided() {
        let h = harness();
        h.service
            .create_transaction(CreateTransaction::top_up(1, 10, 1_000, 1_000))
            .await
            .unwrap();
        let tx = h
            .service
            .create_transaction(CreateTransaction::transfer(1, 2, 400, 400, "1234"))
            .await
            .unwrap();
        // warm the cache so the delete has something to invalidate
        h.service.get_history(1, 1).await.unwrap();

        h.service.soft_delete_history_entry(1, tx.id).await.unwrap();

        let sender_view = h.service.get_history(1, 1).await.unwrap();
        let receiver_view = h.service.get_history(2, 1).await.unwrap();
        assert!(sender_view.entries.iter().all(|e| e.id != tx.id));
        assert!(receiver_view.entries.iter().any(|e| e.id == tx.id));
        assert_eq!(h.store.balances().await, vec![(1, 600), (2, 400)]);
    }

    #[tokio::test]
    async fn test_soft_delete_of_foreign_transaction() {
        let h = harness();
        let tx = h
            .service
            .create_transaction(CreateTransaction::top_up(1, 10, 1_000, 1_000))
            .await
            .unwrap();

        assert_eq!(
            h.service.soft_delete_history_entry(2, tx.id).await.unwrap_err(),
            LedgerError::transaction_not_found(tx.id, 2)
        );
    }

    #[tokio::test]
    async fn test_daily_summary_has_seven_days() {
        let h = harness();
        h.service
            .create_transaction(CreateTransaction::top_up(1, 10, 1_000, 1_010))
            .await
            .unwrap();

        let summary = h.service.get_daily_summary(1).await.unwrap();

        assert_eq!(summary.len(), 7);
        assert_eq!(summary[6].date, Utc::now().date_naive());
        assert_eq!(summary[6].total_income, 1_010);
    }

    #[tokio::test]
    async fn test_weekly_summary_counts_current_week() {
        let h = harness();
        h.service
            .create_transaction(CreateTransaction::top_up(1, 10, 1_000, 1_000))
            .await
            .unwrap();

        let summary = h.service.get_weekly_summary(1).await.unwrap();

        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_income, 1_000);
    }

    #[tokio::test]
    async fn test_connect_delivers_notifications_through_dispatcher() {
        let config = LedgerConfig::from_lookup(|name| {
            (name == "WALLET_LEDGER_NOTIFICATION_BUFFER").then(|| "4".to_string())
        });
        let (service, notifications) =
            WalletService::connect(config, Arc::new(StaticPinVerifier::new()))
                .await
                .unwrap();
        assert_eq!(service.config().notification_buffer, 4);

        let mut subscription = notifications.register(2).await;
        service.notifier.notify(2, "hello".to_string());

        let delivered = tokio::time::timeout(std::time::Duration::from_secs(1), subscription.recv())
            .await
            .unwrap();
        assert_eq!(delivered.as_deref(), Some("hello"));
        // no database_url, so the store starts out empty in memory
        assert!(service.list_internal_accounts().await.unwrap().is_empty());
        assert_eq!(
            service.get_balance(1).await.unwrap_err(),
            LedgerError::wallet_not_found(1)
        );
    }

    #[tokio::test]
    async fn test_list_internal_accounts() {
        let h = harness();

        let accounts = h.service.list_internal_accounts().await.unwrap();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Bank Transfer");
    }
}
