//! Core ledger module
//!
//! This module contains the ledger components:
//! - `traits` - Seams for stores, caches, notification and PIN verification
//! - `participant` - Participant resolution
//! - `ledger` - Request planning and the atomic commit unit
//! - `authorization` - PIN gate in front of transfers
//! - `invalidation` - Best-effort cache invalidation fan-out
//! - `history` - History pages and activity summaries
//! - `notification` - Per-account notification dispatcher
//! - `service` - Handler-facing operations composed from the above

pub mod authorization;
pub mod history;
pub mod invalidation;
pub mod ledger;
pub mod notification;
pub mod participant;
pub mod service;
pub mod traits;

pub use authorization::{AuthorizationGate, StaticPinVerifier};
pub use history::HistoryProjector;
pub use invalidation::{cache_key, CacheInvalidator, CacheView};
pub use ledger::{TransactionLedger, TransactionPlan};
pub use notification::{NotificationDispatcher, NotificationHandle, Subscription};
pub use participant::ParticipantResolver;
pub use service::WalletService;
pub use traits::{LedgerStore, Notifier, PinVerifier, ViewCache};
