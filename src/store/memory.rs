//! Thread-safe in-memory ledger store
//!
//! This module provides the `InMemoryLedgerStore` struct, which keeps wallets,
//! participants and ledger rows in concurrent data structures.
//!
//! # Design
//!
//! All maps are `DashMap`s for fine-grained locking. Each wallet row
//! additionally sits behind its own `tokio::sync::Mutex`, which plays the role
//! of a row-level lock: an atomic unit acquires the rows it touches in
//! ascending account order and holds them for its whole duration, so two
//! units touching the same wallet serialize while disjoint units run in
//! parallel.
//!
//! # Atomicity
//!
//! A unit performs every check (existence, sufficiency, overflow) before the
//! first mutation, and the mutation section contains no suspension point.
//! Dropping the unit's future (for example on deadline expiry) therefore
//! leaves no partial state behind.

use crate::core::traits::LedgerStore;
use crate::types::{
    AccountId, ActivityRow, Amount, Counterparty, HistoryRow, InternalAccount, InternalAccountId,
    LedgerError, Participant, ParticipantId, ParticipantKind, Profile, ProfileUpdate, Transaction,
    TransactionDraft, TransactionId, Wallet,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-memory implementation of [`LedgerStore`]
///
/// Besides the trait operations it exposes the out-of-band operations the
/// ledger itself never performs: opening wallets, registering internal
/// accounts and updating profiles.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    /// Wallet rows, each behind its own row lock
    wallets: DashMap<AccountId, Arc<Mutex<Wallet>>>,

    profiles: DashMap<AccountId, Profile>,
    internal_accounts: DashMap<InternalAccountId, InternalAccount>,

    /// Participant mapping keyed by `(kind, external_ref)`
    participants: DashMap<(ParticipantKind, i64), Participant>,
    participants_by_id: DashMap<ParticipantId, Participant>,

    transactions: DashMap<TransactionId, Transaction>,

    next_participant_id: AtomicI64,
    next_transaction_id: AtomicI64,

    /// Fault injection: every operation fails as if the store were unreachable
    unavailable: AtomicBool,

    /// Fault injection: latency inside a unit, after the row locks are taken
    commit_latency_ms: AtomicU64,
}

impl InMemoryLedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a wallet with a zero balance for a new account
    ///
    /// Returns a conflict error if the account already has a wallet.
    pub fn open_wallet(&self, account: AccountId, profile: Profile) -> Result<(), LedgerError> {
        match self.wallets.entry(account) {
            Entry::Occupied(_) => Err(LedgerError::Conflict {
                message: format!("wallet {} already exists", account),
            }),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(Wallet::new(account))));
                self.profiles.insert(account, profile);
                Ok(())
            }
        }
    }

    /// Register an internal settlement account (replaces an existing one with the same id)
    pub fn add_internal_account(&self, account: InternalAccount) {
        self.internal_accounts.insert(account.id, account);
    }

    /// Get the profile of an account
    pub fn profile(&self, account: AccountId) -> Option<Profile> {
        self.profiles.get(&account).map(|entry| entry.value().clone())
    }

    /// Apply a partial update to a profile and return the stored result
    pub fn update_profile(
        &self,
        account: AccountId,
        update: &ProfileUpdate,
    ) -> Result<Profile, LedgerError> {
        let mut entry = self
            .profiles
            .get_mut(&account)
            .ok_or_else(|| LedgerError::wallet_not_found(account))?;
        let updated = update.apply(entry.value());
        *entry.value_mut() = updated.clone();
        Ok(updated)
    }

    /// Snapshot of every wallet balance, sorted by account
    pub async fn balances(&self) -> Vec<(AccountId, Amount)> {
        let rows: Vec<_> = self
            .wallets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut balances = Vec::with_capacity(rows.len());
        for row in rows {
            let wallet = row.lock().await;
            balances.push((wallet.account, wallet.balance));
        }
        balances.sort_by_key(|(account, _)| *account);
        balances
    }

    /// Number of stored participant mappings
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Number of committed ledger rows
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Make every operation fail with a transient store error (fault injection)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Add latency inside each atomic unit while its row locks are held (fault injection)
    pub fn set_commit_latency(&self, latency: Duration) {
        self.commit_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    fn check_available(&self, operation: &str) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::store_unavailable(operation, "connection refused"));
        }
        Ok(())
    }

    fn wallet_row(&self, account: AccountId) -> Result<Arc<Mutex<Wallet>>, LedgerError> {
        self.wallets
            .get(&account)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::wallet_not_found(account))
    }

    fn entity_exists(&self, kind: ParticipantKind, external_ref: i64) -> Result<(), LedgerError> {
        match kind {
            ParticipantKind::Wallet if !self.wallets.contains_key(&external_ref) => {
                Err(LedgerError::wallet_not_found(external_ref))
            }
            ParticipantKind::Internal if !self.internal_accounts.contains_key(&external_ref) => {
                Err(LedgerError::internal_account_not_found(external_ref))
            }
            _ => Ok(()),
        }
    }

    /// Resolve the display data of a participant
    fn counterparty(&self, participant: ParticipantId) -> Counterparty {
        let Some(participant) = self.participants_by_id.get(&participant).map(|p| *p.value())
        else {
            return Counterparty {
                kind: ParticipantKind::Wallet,
                name: None,
                image: None,
                phone: None,
            };
        };

        match participant.kind {
            ParticipantKind::Wallet => {
                let profile = self.profile(participant.external_ref).unwrap_or_default();
                Counterparty {
                    kind: ParticipantKind::Wallet,
                    name: profile.full_name,
                    image: profile.image,
                    phone: profile.phone,
                }
            }
            ParticipantKind::Internal => {
                let account = self
                    .internal_accounts
                    .get(&participant.external_ref)
                    .map(|entry| entry.value().clone());
                Counterparty {
                    kind: ParticipantKind::Internal,
                    name: account.as_ref().map(|a| a.name.clone()),
                    image: account.and_then(|a| a.image),
                    phone: None,
                }
            }
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn find_participant(
        &self,
        kind: ParticipantKind,
        external_ref: i64,
    ) -> Result<Option<Participant>, LedgerError> {
        self.check_available("find_participant")?;
        Ok(self
            .participants
            .get(&(kind, external_ref))
            .map(|entry| *entry.value()))
    }

    async fn upsert_participant(
        &self,
        kind: ParticipantKind,
        external_ref: i64,
    ) -> Result<Participant, LedgerError> {
        self.check_available("upsert_participant")?;
        self.entity_exists(kind, external_ref)?;

        // The entry lock makes the first insert win; racing callers read its row
        let participant = *self
            .participants
            .entry((kind, external_ref))
            .or_insert_with(|| Participant {
                id: self.next_participant_id.fetch_add(1, Ordering::SeqCst) + 1,
                kind,
                external_ref,
            })
            .value();

        self.participants_by_id
            .entry(participant.id)
            .or_insert(participant);

        Ok(participant)
    }

    async fn commit_transaction(
        &self,
        draft: TransactionDraft,
    ) -> Result<Transaction, LedgerError> {
        self.check_available("commit_transaction")?;

        let deltas = draft.balance_deltas()?;

        // 1. Take the row locks in ascending account order
        let mut rows: Vec<OwnedMutexGuard<Wallet>> = Vec::with_capacity(deltas.len());
        for (account, _) in &deltas {
            let row = self.wallet_row(*account)?;
            rows.push(row.lock_owned().await);
        }

        let latency = self.commit_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        // 2. Compute every resulting balance before touching any row
        let mut balances = Vec::with_capacity(rows.len());
        for (row, (account, delta)) in rows.iter().zip(&deltas) {
            if *delta < 0 && row.balance < -delta {
                return Err(LedgerError::insufficient_funds(*account, row.balance, -delta));
            }
            let operation = if *delta < 0 { "debit" } else { "credit" };
            let balance = row
                .balance
                .checked_add(*delta)
                .ok_or_else(|| LedgerError::arithmetic_overflow(operation, *account))?;
            balances.push(balance);
        }

        // 3. Apply; nothing below can fail or suspend
        let id = self.next_transaction_id.fetch_add(1, Ordering::SeqCst) + 1;
        for (row, balance) in rows.iter_mut().zip(balances) {
            row.balance = balance;
            row.updated_at = draft.created_at;
        }

        let transaction = Transaction {
            id,
            kind: draft.kind,
            amount: draft.amount,
            total: draft.total,
            note: draft.note,
            sender: draft.sender.id,
            receiver: draft.receiver.id,
            created_at: draft.created_at,
            deleted_by_sender: None,
            deleted_by_receiver: None,
        };
        self.transactions.insert(id, transaction.clone());

        Ok(transaction)
    }

    async fn wallet(&self, account: AccountId) -> Result<Option<Wallet>, LedgerError> {
        self.check_available("wallet")?;
        let Some(row) = self.wallets.get(&account).map(|e| Arc::clone(e.value())) else {
            return Ok(None);
        };
        let wallet = row.lock().await.clone();
        Ok(Some(wallet))
    }

    async fn internal_account(
        &self,
        id: InternalAccountId,
    ) -> Result<Option<InternalAccount>, LedgerError> {
        self.check_available("internal_account")?;
        Ok(self.internal_accounts.get(&id).map(|e| e.value().clone()))
    }

    async fn internal_accounts(&self) -> Result<Vec<InternalAccount>, LedgerError> {
        self.check_available("internal_accounts")?;
        let mut accounts: Vec<_> = self
            .internal_accounts
            .iter()
            .map(|e| e.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }

    async fn history(
        &self,
        participant: ParticipantId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<HistoryRow>, u64), LedgerError> {
        self.check_available("history")?;

        let mut visible: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|e| {
                let tx = e.value();
                (tx.sender == participant || tx.receiver == participant)
                    && !tx.is_hidden_for(participant)
            })
            .map(|e| e.value().clone())
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = visible.len() as u64;
        let rows = visible
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|transaction| {
                let other = if transaction.sender == participant {
                    transaction.receiver
                } else {
                    transaction.sender
                };
                HistoryRow {
                    counterparty: self.counterparty(other),
                    transaction,
                }
            })
            .collect();

        Ok((rows, total))
    }

    async fn activity(
        &self,
        participant: ParticipantId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ActivityRow>, LedgerError> {
        self.check_available("activity")?;
        Ok(self
            .transactions
            .iter()
            .map(|e| e.value().clone())
            .filter(|tx| tx.sender == participant || tx.receiver == participant)
            .filter(|tx| tx.created_at >= since && tx.created_at < until)
            .map(|tx| ActivityRow {
                sender: tx.sender,
                receiver: tx.receiver,
                total: tx.total,
                created_at: tx.created_at,
            })
            .collect())
    }

    async fn soft_delete(
        &self,
        participant: ParticipantId,
        tx: TransactionId,
        at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        self.check_available("soft_delete")?;
        let Some(mut entry) = self.transactions.get_mut(&tx) else {
            return Ok(false);
        };
        let transaction = entry.value_mut();

        let mut matched = false;
        if transaction.sender == participant {
            transaction.deleted_by_sender.get_or_insert(at);
            matched = true;
        }
        if transaction.receiver == participant {
            transaction.deleted_by_receiver.get_or_insert(at);
            matched = true;
        }
        Ok(matched)
    }
}
