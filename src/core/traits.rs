//! Core traits for the ledger's storage, caching and collaborator seams
//!
//! This module defines the trait abstractions that allow the in-memory and
//! Postgres stores, and the in-memory and Redis caches, to be used
//! interchangeably behind `Arc<dyn ...>`.

use crate::types::{
    AccountId, ActivityRow, CacheError, HistoryRow, InternalAccount, InternalAccountId,
    LedgerError, Participant, ParticipantId, ParticipantKind, Transaction, TransactionDraft,
    TransactionId, Wallet,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Trait for the relational state behind the ledger
///
/// Implementations own wallet balances, participant mappings and ledger rows.
/// Balances may only change through [`LedgerStore::commit_transaction`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Look up a participant without creating it
    async fn find_participant(
        &self,
        kind: ParticipantKind,
        external_ref: i64,
    ) -> Result<Option<Participant>, LedgerError>;

    /// Look up or create the participant for a `(kind, external_ref)` pair
    ///
    /// Must be idempotent under concurrency: racing first inserts resolve to the
    /// same row. Fails with a not-found error if the referenced wallet or
    /// internal account does not exist.
    async fn upsert_participant(
        &self,
        kind: ParticipantKind,
        external_ref: i64,
    ) -> Result<Participant, LedgerError>;

    /// Insert the ledger row and apply its balance deltas as one atomic unit
    ///
    /// Either everything commits or nothing is observable. Dropping the
    /// returned future before completion must leave no trace.
    async fn commit_transaction(&self, draft: TransactionDraft)
        -> Result<Transaction, LedgerError>;

    /// Get a wallet
    async fn wallet(&self, account: AccountId) -> Result<Option<Wallet>, LedgerError>;

    /// Get an internal account
    async fn internal_account(
        &self,
        id: InternalAccountId,
    ) -> Result<Option<InternalAccount>, LedgerError>;

    /// List internal accounts ordered by id
    async fn internal_accounts(&self) -> Result<Vec<InternalAccount>, LedgerError>;

    /// Page through the rows visible to a participant, newest first
    ///
    /// Returns the rows of the page and the number of visible rows overall.
    async fn history(
        &self,
        participant: ParticipantId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<HistoryRow>, u64), LedgerError>;

    /// Rows involving a participant created in `[since, until)`, soft deletes included
    async fn activity(
        &self,
        participant: ParticipantId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ActivityRow>, LedgerError>;

    /// Set the participant's soft-delete marker on a transaction
    ///
    /// Returns `false` if the transaction does not exist or the participant is
    /// on neither side of it.
    async fn soft_delete(
        &self,
        participant: ParticipantId,
        tx: TransactionId,
        at: DateTime<Utc>,
    ) -> Result<bool, LedgerError>;
}

/// Trait for the cache holding serialized read views
#[async_trait]
pub trait ViewCache: Send + Sync {
    /// Get a cached value
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value for `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a key (deleting a missing key is not an error)
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

/// Fire-and-forget delivery of user-facing messages
///
/// Must never block and never fail the caller.
pub trait Notifier: Send + Sync {
    /// Queue a message for every live connection of an account
    fn notify(&self, account: AccountId, message: String);
}

/// Credential layer consulted before transfers
#[async_trait]
pub trait PinVerifier: Send + Sync {
    /// Whether `submitted_pin` matches the PIN of `account`
    async fn pin_verified(&self, account: AccountId, submitted_pin: &str)
        -> Result<bool, LedgerError>;
}
