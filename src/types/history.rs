//! Read-side views over the ledger: history entries and activity summaries

use super::account::Amount;
use super::participant::{ParticipantId, ParticipantKind};
use super::transaction::{Transaction, TransactionId, TransactionKind};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a transaction from one account's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The account's participant is the sender
    Debit,

    /// The account's participant is the receiver
    Credit,
}

/// Display data of the other side of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    pub kind: ParticipantKind,
    pub name: Option<String>,
    pub image: Option<String>,

    /// Only populated for wallet counterparties
    pub phone: Option<String>,
}

/// A ledger row joined with the display data of its counterparty
///
/// Produced by stores; the counterparty is the side opposite to the
/// participant the history was requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub transaction: Transaction,
    pub counterparty: Counterparty,
}

/// One entry of an account's transaction history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub direction: Direction,
    pub amount: Amount,
    pub total: Amount,
    pub note: Option<String>,
    pub counterparty: Counterparty,
    pub created_at: DateTime<Utc>,
}

/// A page of history entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// 1-indexed page number
    pub page: u32,
    pub page_size: u32,
    pub entries: Vec<HistoryEntry>,

    /// Number of visible entries across all pages
    pub total_count: u64,
    pub total_pages: u64,
}

/// Minimal ledger data needed for summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityRow {
    pub sender: ParticipantId,
    pub receiver: ParticipantId,
    pub total: Amount,
    pub created_at: DateTime<Utc>,
}

/// Expense and income of one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_expense: Amount,
    pub total_income: Amount,
}

/// Expense and income of one week (Monday to Sunday)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total_expense: Amount,
    pub total_income: Amount,
}
