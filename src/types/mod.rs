//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: wallets, profiles and internal settlement accounts
//! - `participant`: the uniform counterparty handle
//! - `transaction`: ledger entries, drafts and requests
//! - `history`: read-side views (history pages and summaries)
//! - `error`: error types for the ledger

pub mod account;
pub mod error;
pub mod history;
pub mod participant;
pub mod transaction;

pub use account::{
    derive_verified, AccountId, Amount, InternalAccount, InternalAccountId, Profile,
    ProfileUpdate, Wallet,
};
pub use error::{CacheError, ErrorKind, LedgerError};
pub use history::{
    ActivityRow, Counterparty, DailySummary, Direction, HistoryEntry, HistoryPage, HistoryRow,
    WeeklySummary,
};
pub use participant::{Participant, ParticipantId, ParticipantKind};
pub use transaction::{
    CreateTransaction, Transaction, TransactionDraft, TransactionId, TransactionKind,
};
