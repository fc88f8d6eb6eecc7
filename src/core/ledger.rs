//! Transaction ledger
//!
//! This module validates transaction requests, resolves their participants and
//! commits the ledger row together with its balance effects as one atomic unit
//! bounded by a deadline.
//!
//! # Transaction Types
//!
//! - **TopUp**: an internal account credits the acting wallet; only the
//!   receiver balance changes
//! - **Transfer**: the acting wallet pays another wallet; sender is debited and
//!   receiver credited by the same amount
//!
//! # Deadline
//!
//! The commit is wrapped in `tokio::time::timeout`. On expiry the commit future
//! is dropped, which rolls the unit back in every store, and the caller gets a
//! retryable [`LedgerError::Timeout`].

use crate::core::participant::ParticipantResolver;
use crate::core::traits::LedgerStore;
use crate::types::{
    Amount, CreateTransaction, LedgerError, Participant, ParticipantKind, Transaction,
    TransactionDraft, TransactionKind,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Sides of a request, before participant resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPlan {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub total: Amount,
    pub note: Option<String>,

    /// `(kind, external_ref)` of the sending side
    pub sender: (ParticipantKind, i64),

    /// `(kind, external_ref)` of the receiving side
    pub receiver: (ParticipantKind, i64),
}

impl TransactionPlan {
    /// Validate a request and work out which side is which
    ///
    /// # Errors
    ///
    /// Returns a validation error if the amount or total is invalid, the
    /// counterparty reference required by the kind is missing, or a transfer
    /// targets the acting wallet itself.
    pub fn from_request(request: &CreateTransaction) -> Result<Self, LedgerError> {
        validate_amounts(request.amount, request.total)?;

        let (sender, receiver) = match request.kind {
            TransactionKind::TopUp => {
                let internal = request.internal_account.ok_or_else(|| {
                    LedgerError::missing_counterparty(request.kind, "internal_account")
                })?;
                (
                    (ParticipantKind::Internal, internal),
                    (ParticipantKind::Wallet, request.acting_account),
                )
            }
            TransactionKind::Transfer => {
                let receiver = request.receiver_account.ok_or_else(|| {
                    LedgerError::missing_counterparty(request.kind, "receiver_account")
                })?;
                if receiver == request.acting_account {
                    return Err(LedgerError::self_transfer(receiver));
                }
                (
                    (ParticipantKind::Wallet, request.acting_account),
                    (ParticipantKind::Wallet, receiver),
                )
            }
        };

        Ok(TransactionPlan {
            kind: request.kind,
            amount: request.amount,
            total: request.total,
            note: request.note.clone(),
            sender,
            receiver,
        })
    }
}

fn validate_amounts(amount: Amount, total: Amount) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::invalid_amount(amount));
    }
    if total <= 0 || total < amount {
        return Err(LedgerError::invalid_total(amount, total));
    }
    Ok(())
}

/// Records money movement atomically
#[derive(Clone)]
pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
    resolver: ParticipantResolver,
    default_deadline: Duration,
}

impl TransactionLedger {
    /// Create a new ledger
    ///
    /// # Arguments
    ///
    /// * `store` - Store the atomic units are committed to
    /// * `default_deadline` - Deadline applied when a request carries none
    pub fn new(store: Arc<dyn LedgerStore>, default_deadline: Duration) -> Self {
        TransactionLedger {
            resolver: ParticipantResolver::new(Arc::clone(&store)),
            store,
            default_deadline,
        }
    }

    /// Participant resolver sharing this ledger's store
    pub fn resolver(&self) -> &ParticipantResolver {
        &self.resolver
    }

    /// Plan a request, resolve both participants and commit it
    pub async fn record(&self, request: &CreateTransaction) -> Result<Transaction, LedgerError> {
        let plan = TransactionPlan::from_request(request)?;
        self.record_plan(plan, request.deadline).await
    }

    /// Resolve both participants of an already validated plan and commit it
    ///
    /// Participant resolution happens before the atomic unit; it is idempotent
    /// so a failed commit leaves at most harmless participant rows behind.
    /// Without a `deadline` the ledger's default applies.
    pub async fn record_plan(
        &self,
        plan: TransactionPlan,
        deadline: Option<Duration>,
    ) -> Result<Transaction, LedgerError> {
        let sender = self.resolver.resolve(plan.sender.0, plan.sender.1).await?;
        let receiver = self
            .resolver
            .resolve(plan.receiver.0, plan.receiver.1)
            .await?;

        self.create_transaction(
            sender,
            receiver,
            plan.kind,
            plan.amount,
            plan.total,
            plan.note,
            deadline.unwrap_or(self.default_deadline),
        )
        .await
    }

    /// Commit one transaction between two resolved participants
    ///
    /// # Arguments
    ///
    /// * `sender` - Internal participant for top-ups, wallet participant for transfers
    /// * `receiver` - Wallet participant
    /// * `kind` - Transaction kind
    /// * `amount` - Amount moved between balances
    /// * `total` - Amount including fees, never below `amount`
    /// * `note` - Free text
    /// * `deadline` - Upper bound for the unit
    ///
    /// # Returns
    ///
    /// The committed transaction. On any error no row exists and no balance
    /// changed.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_transaction(
        &self,
        sender: Participant,
        receiver: Participant,
        kind: TransactionKind,
        amount: Amount,
        total: Amount,
        note: Option<String>,
        deadline: Duration,
    ) -> Result<Transaction, LedgerError> {
        validate_amounts(amount, total)?;

        if sender.id == receiver.id {
            return Err(LedgerError::self_transfer(sender.external_ref));
        }
        let expected_sender = match kind {
            TransactionKind::TopUp => (ParticipantKind::Internal, "internal_account"),
            TransactionKind::Transfer => (ParticipantKind::Wallet, "sender wallet"),
        };
        if sender.kind != expected_sender.0 {
            return Err(LedgerError::missing_counterparty(kind, expected_sender.1));
        }
        if receiver.kind != ParticipantKind::Wallet {
            return Err(LedgerError::missing_counterparty(kind, "receiver wallet"));
        }

        let draft = TransactionDraft {
            kind,
            amount,
            total,
            note,
            sender,
            receiver,
            created_at: Utc::now(),
        };

        let transaction = tokio::time::timeout(deadline, self.store.commit_transaction(draft))
            .await
            .map_err(|_| {
                LedgerError::timeout("create_transaction", deadline.as_millis() as u64)
            })??;

        info!(
            tx = transaction.id,
            kind = %transaction.kind,
            amount = transaction.amount,
            total = transaction.total,
            sender = transaction.sender,
            receiver = transaction.receiver,
            "Committed transaction"
        );
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLedgerStore;
    use crate::types::{InternalAccount, Profile};
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn setup() -> (Arc<InMemoryLedgerStore>, TransactionLedger) {
        let store = Arc::new(InMemoryLedgerStore::new());
        store.open_wallet(1, Profile::default()).unwrap();
        store.open_wallet(2, Profile::default()).unwrap();
        store.add_internal_account(InternalAccount {
            id: 10,
            name: "Bank Transfer".to_string(),
            image: None,
            tax_rate: Decimal::ZERO,
            created_at: Utc::now(),
        });
        let ledger = TransactionLedger::new(store.clone(), Duration::from_secs(5));
        (store, ledger)
    }

    #[rstest]
    #[case::zero_amount(CreateTransaction::top_up(1, 10, 0, 0), LedgerError::invalid_amount(0))]
    #[case::negative_amount(
        CreateTransaction::top_up(1, 10, -5, 10),
        LedgerError::invalid_amount(-5)
    )]
    #[case::total_below_amount(
        CreateTransaction::transfer(1, 2, 100, 99, "1234"),
        LedgerError::invalid_total(100, 99)
    )]
    #[case::self_transfer(
        CreateTransaction::transfer(1, 1, 100, 100, "1234"),
        LedgerError::self_transfer(1)
    )]
    fn test_plan_rejects(#[case] request: CreateTransaction, #[case] expected: LedgerError) {
        assert_eq!(TransactionPlan::from_request(&request).unwrap_err(), expected);
    }

    #[test]
    fn test_plan_requires_counterparty() {
        let mut top_up = CreateTransaction::top_up(1, 10, 100, 100);
        top_up.internal_account = None;
        let mut transfer = CreateTransaction::transfer(1, 2, 100, 100, "1234");
        transfer.receiver_account = None;

        assert_eq!(
            TransactionPlan::from_request(&top_up).unwrap_err(),
            LedgerError::missing_counterparty(TransactionKind::TopUp, "internal_account")
        );
        assert_eq!(
            TransactionPlan::from_request(&transfer).unwrap_err(),
            LedgerError::missing_counterparty(TransactionKind::Transfer, "receiver_account")
        );
    }

    #[test]
    fn test_plan_top_up_sides() {
        let plan =
            TransactionPlan::from_request(&CreateTransaction::top_up(1, 10, 500, 505)).unwrap();

        assert_eq!(plan.sender, (ParticipantKind::Internal, 10));
        assert_eq!(plan.receiver, (ParticipantKind::Wallet, 1));
    }

    #[tokio::test]
    async fn test_top_up_credits_receiver_only() {
        let (store, ledger) = setup();

        let tx = ledger
            .record(&CreateTransaction::top_up(1, 10, 50_000, 50_000))
            .await
            .unwrap();

        assert_eq!(tx.kind, TransactionKind::TopUp);
        assert_eq!(store.balances().await, vec![(1, 50_000), (2, 0)]);
    }

    #[tokio::test]
    async fn test_transfer_debits_and_credits() {
        let (store, ledger) = setup();
        ledger
            .record(&CreateTransaction::top_up(1, 10, 100_000, 100_000))
            .await
            .unwrap();

        ledger
            .record(&CreateTransaction::transfer(1, 2, 30_000, 30_000, "1234"))
            .await
            .unwrap();

        assert_eq!(store.balances().await, vec![(1, 70_000), (2, 30_000)]);
    }

    #[tokio::test]
    async fn test_rejects_wrong_participant_kinds() {
        let (_store, ledger) = setup();
        let wallet = ledger
            .resolver()
            .resolve(ParticipantKind::Wallet, 1)
            .await
            .unwrap();
        let internal = ledger
            .resolver()
            .resolve(ParticipantKind::Internal, 10)
            .await
            .unwrap();

        let result = ledger
            .create_transaction(
                wallet,
                internal,
                TransactionKind::Transfer,
                100,
                100,
                None,
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(
            result.unwrap_err(),
            LedgerError::missing_counterparty(TransactionKind::Transfer, "receiver wallet")
        );
    }

    #[tokio::test]
    async fn test_deadline_expiry_rolls_back() {
        let (store, ledger) = setup();
        ledger
            .record(&CreateTransaction::top_up(1, 10, 1_000, 1_000))
            .await
            .unwrap();
        store.set_commit_latency(Duration::from_millis(200));

        let result = ledger
            .record(
                &CreateTransaction::transfer(1, 2, 500, 500, "1234")
                    .with_deadline(Duration::from_millis(20)),
            )
            .await;

        let error = result.unwrap_err();
        assert_eq!(error, LedgerError::timeout("create_transaction", 20));
        assert!(error.is_retryable());
        assert_eq!(store.balances().await, vec![(1, 1_000), (2, 0)]);
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_record_plan_commits_validated_plan() {
        let (store, ledger) = setup();
        let request = CreateTransaction::top_up(2, 10, 750, 750).with_note("gift");
        let plan = TransactionPlan::from_request(&request).unwrap();

        let transaction = ledger.record_plan(plan, None).await.unwrap();

        assert_eq!(transaction.note.as_deref(), Some("gift"));
        assert_eq!(store.balances().await, vec![(1, 0), (2, 750)]);
    }
}
