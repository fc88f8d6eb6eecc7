//! Error types for the wallet ledger
//!
//! This module defines all error types that the ledger returns to its callers.
//! Every variant belongs to one [`ErrorKind`], which tells the handler layer how
//! to surface it and whether the operation may be retried.
//!
//! # Error Categories
//!
//! - **Validation**: malformed input or a violated business rule, no state mutated
//! - **Authorization**: failed PIN gate on a transfer, no state mutated
//! - **Not found**: unknown wallet, internal account or transaction
//! - **Conflict**: not expected in normal operation, including store rejections
//!   that no retry can fix
//! - **Transient store**: connectivity failure, serialization failure or
//!   deadline expiry, safe to retry

use super::account::{AccountId, Amount, InternalAccountId};
use super::transaction::{TransactionId, TransactionKind};
use thiserror::Error;

/// Classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Conflict,
    TransientStore,
}

/// Main error type for the ledger
///
/// Each variant includes the context needed to diagnose the rejection.
/// Failures of best-effort side effects (cache invalidation, notification)
/// never become a `LedgerError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Amount is zero or negative
    #[error("Invalid amount {amount}: must be positive")]
    InvalidAmount {
        /// The rejected amount
        amount: Amount,
    },

    /// Total is not positive or smaller than the amount
    #[error("Invalid total {total} for amount {amount}: must be positive and not below the amount")]
    InvalidTotal {
        /// Amount of the transaction
        amount: Amount,
        /// The rejected total
        total: Amount,
    },

    /// A counterparty reference required by the transaction kind is missing
    #[error("{kind} transaction requires {field}")]
    MissingCounterparty {
        /// Kind of the transaction
        kind: TransactionKind,
        /// Name of the missing reference
        field: &'static str,
    },

    /// Unknown transaction type
    #[error("Invalid transaction type '{tx_type}'")]
    InvalidTransactionType {
        /// The type string that was not recognized
        tx_type: String,
    },

    /// Sender and receiver are the same wallet
    #[error("Wallet {account} cannot transfer to itself")]
    SelfTransfer {
        /// The wallet on both sides
        account: AccountId,
    },

    /// The debit would leave the sender wallet negative
    #[error("Insufficient funds in wallet {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Sender wallet
        account: AccountId,
        /// Balance at the time of the check
        balance: Amount,
        /// Requested debit
        requested: Amount,
    },

    /// Balance arithmetic would overflow
    #[error("Arithmetic overflow in {operation} for wallet {account}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Affected wallet
        account: AccountId,
    },

    /// History pages are 1-indexed
    #[error("Invalid page {page}: pages start at 1")]
    InvalidPage {
        /// The rejected page number
        page: u32,
    },

    /// The PIN gate rejected a transfer
    #[error("PIN verification failed for account {account}")]
    PinRejected {
        /// Acting account
        account: AccountId,
    },

    /// Wallet does not exist
    #[error("Wallet {account} not found")]
    WalletNotFound {
        /// Requested wallet
        account: AccountId,
    },

    /// Internal account does not exist
    #[error("Internal account {id} not found")]
    InternalAccountNotFound {
        /// Requested internal account
        id: InternalAccountId,
    },

    /// Transaction does not exist or does not belong to the account
    #[error("Transaction {tx} not found for account {account}")]
    TransactionNotFound {
        /// Requested transaction
        tx: TransactionId,
        /// Account the lookup was made for
        account: AccountId,
    },

    /// Unexpected write conflict
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// The store refused a row that breaks a check or not-null constraint
    #[error("Constraint violated: {message}")]
    ConstraintViolated {
        /// Description reported by the store
        message: String,
    },

    /// A row referenced by the write does not exist in the store
    #[error("Referenced row missing: {message}")]
    ReferenceMissing {
        /// Description reported by the store
        message: String,
    },

    /// The store failed the operation in a way a retry will not fix
    #[error("Store rejected {operation}: {message}")]
    StoreRejected {
        /// Operation that failed
        operation: String,
        /// Description of the failure
        message: String,
    },

    /// Connectivity failure of the backing store
    #[error("Store unavailable during {operation}: {message}")]
    StoreUnavailable {
        /// Operation that failed
        operation: String,
        /// Description of the failure
        message: String,
    },

    /// The atomic unit did not finish before its deadline and was rolled back
    #[error("{operation} exceeded its deadline of {timeout_ms}ms and was rolled back")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Deadline in milliseconds
        timeout_ms: u64,
    },
}

impl LedgerError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidTotal { .. }
            | LedgerError::MissingCounterparty { .. }
            | LedgerError::InvalidTransactionType { .. }
            | LedgerError::SelfTransfer { .. }
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::ArithmeticOverflow { .. }
            | LedgerError::InvalidPage { .. }
            | LedgerError::ConstraintViolated { .. } => ErrorKind::Validation,
            LedgerError::PinRejected { .. } => ErrorKind::Authorization,
            LedgerError::WalletNotFound { .. }
            | LedgerError::InternalAccountNotFound { .. }
            | LedgerError::TransactionNotFound { .. }
            | LedgerError::ReferenceMissing { .. } => ErrorKind::NotFound,
            LedgerError::Conflict { .. } | LedgerError::StoreRejected { .. } => {
                ErrorKind::Conflict
            }
            LedgerError::StoreUnavailable { .. } | LedgerError::Timeout { .. } => {
                ErrorKind::TransientStore
            }
        }
    }

    /// Whether the whole operation may be retried from participant resolution onward
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientStore
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Amount) -> Self {
        LedgerError::InvalidAmount { amount }
    }

    /// Create an InvalidTotal error
    pub fn invalid_total(amount: Amount, total: Amount) -> Self {
        LedgerError::InvalidTotal { amount, total }
    }

    /// Create a MissingCounterparty error
    pub fn missing_counterparty(kind: TransactionKind, field: &'static str) -> Self {
        LedgerError::MissingCounterparty { kind, field }
    }

    /// Create an InvalidTransactionType error
    pub fn invalid_transaction_type(tx_type: &str) -> Self {
        LedgerError::InvalidTransactionType {
            tx_type: tx_type.to_string(),
        }
    }

    /// Create a SelfTransfer error
    pub fn self_transfer(account: AccountId) -> Self {
        LedgerError::SelfTransfer { account }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, balance: Amount, requested: Amount) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            requested,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Create an InvalidPage error
    pub fn invalid_page(page: u32) -> Self {
        LedgerError::InvalidPage { page }
    }

    /// Create a PinRejected error
    pub fn pin_rejected(account: AccountId) -> Self {
        LedgerError::PinRejected { account }
    }

    /// Create a WalletNotFound error
    pub fn wallet_not_found(account: AccountId) -> Self {
        LedgerError::WalletNotFound { account }
    }

    /// Create an InternalAccountNotFound error
    pub fn internal_account_not_found(id: InternalAccountId) -> Self {
        LedgerError::InternalAccountNotFound { id }
    }

    /// Create a TransactionNotFound error
    pub fn transaction_not_found(tx: TransactionId, account: AccountId) -> Self {
        LedgerError::TransactionNotFound { tx, account }
    }

    /// Create a StoreUnavailable error
    pub fn store_unavailable(operation: &str, message: impl Into<String>) -> Self {
        LedgerError::StoreUnavailable {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Create a Timeout error
    pub fn timeout(operation: &str, timeout_ms: u64) -> Self {
        LedgerError::Timeout {
            operation: operation.to_string(),
            timeout_ms,
        }
    }

    /// Create a StoreRejected error
    pub fn store_rejected(operation: &str, message: impl Into<String>) -> Self {
        LedgerError::StoreRejected {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Map a Postgres SQLSTATE code reported by the store
    ///
    /// Integrity violations are the caller's fault and keep their kind;
    /// serialization failures, deadlocks and connection or resource errors
    /// are transient. Anything else is a non-retryable store rejection.
    pub fn from_sqlstate(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "23503" => LedgerError::ReferenceMissing { message },
            "23502" | "23514" => LedgerError::ConstraintViolated { message },
            "23505" => LedgerError::Conflict { message },
            "40001" | "40P01" => LedgerError::store_unavailable("postgres", message),
            _ if code.starts_with("08") || code.starts_with("53") || code.starts_with("57P") => {
                LedgerError::store_unavailable("postgres", message)
            }
            _ => LedgerError::store_rejected("postgres", format!("SQLSTATE {}: {}", code, message)),
        }
    }
}

/// Failure of a read-view cache backend
///
/// Cache failures are logged by callers and never fail a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Backend could not be reached or rejected the command
    #[error("Cache backend error on key '{key}': {message}")]
    Backend {
        /// Key the command was issued for
        key: String,
        /// Description of the failure
        message: String,
    },

    /// Cached value could not be encoded or decoded
    #[error("Cache serialization error on key '{key}': {message}")]
    Serialization {
        /// Key the value belongs to
        key: String,
        /// Description of the failure
        message: String,
    },
}

impl CacheError {
    /// Create a Backend error
    pub fn backend(key: &str, message: impl Into<String>) -> Self {
        CacheError::Backend {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Create a Serialization error
    pub fn serialization(key: &str, message: impl Into<String>) -> Self {
        CacheError::Serialization {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for LedgerError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(db) => match db.code() {
                Some(code) => LedgerError::from_sqlstate(&code, db.message()),
                None => LedgerError::store_rejected("postgres", db.message()),
            },
            sqlx::Error::PoolTimedOut => LedgerError::timeout("acquire connection", 0),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Protocol(_) => {
                LedgerError::store_unavailable("postgres", error.to_string())
            }
            other => LedgerError::store_rejected("postgres", other.to_string()),
        }
    }
}
