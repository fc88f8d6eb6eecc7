//! Wallet Ledger Library
//!
//! # Overview
//!
//! A multi-party wallet ledger: wallets hold integer balances in minor units,
//! internal settlement accounts fund top-ups, and every money movement is one
//! atomic unit that debits, credits and records the ledger row together.
//!
//! # Architecture
//!
//! - [`types`] - Wallets, participants, transactions, history views and errors
//! - [`core`] - Ledger components:
//!   - [`core::participant`] - Resolving `(kind, ref)` pairs to participant ids
//!   - [`core::ledger`] - Request planning and the atomic commit unit
//!   - [`core::authorization`] - PIN gate in front of transfers
//!   - [`core::invalidation`] - Cache key layout and invalidation fan-out
//!   - [`core::history`] - History pages and daily/weekly summaries
//!   - [`core::notification`] - Per-account notification dispatch
//!   - [`core::service`] - Handler-facing operations
//! - [`store`] - In-memory store and cache; Postgres and Redis behind features
//! - [`config`] - Environment-driven settings
//! - [`logging`] - Tracing subscriber setup
//! - [`io`], [`strategy`], [`cli`] - CSV replay of ledger commands
//!
//! # Transaction Kinds
//!
//! - **Top-up**: an internal account credits a wallet
//! - **Transfer**: a wallet debits itself and credits another wallet, PIN required
//!
//! A rejected operation leaves no trace: no balance change, no ledger row and
//! no side effects. Cache invalidation and notification run only after a
//! commit and never fail it.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod store;
pub mod strategy;
pub mod types;

pub use config::LedgerConfig;
pub use crate::core::{LedgerStore, WalletService};
pub use io::write_balances_csv;
pub use store::{InMemoryCache, InMemoryLedgerStore};
pub use types::{
    AccountId, Amount, CreateTransaction, ErrorKind, LedgerError, Transaction, TransactionKind,
};
