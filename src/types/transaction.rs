//! Transaction-related types for the wallet ledger
//!
//! This module defines transaction kinds, the immutable ledger entry, the draft
//! handed to a store for commit, and the request accepted by the service.

use super::account::{AccountId, Amount, InternalAccountId};
use super::error::LedgerError;
use super::participant::{Participant, ParticipantId, ParticipantKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Transaction identifier
pub type TransactionId = i64;

/// Transaction kinds supported by the ledger
///
/// The kind determines which side must be an internal account and which side
/// must be a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Credit a wallet from an internal settlement account
    ///
    /// Only the receiver balance changes; the internal account has no balance.
    TopUp,

    /// Move funds from one wallet to another
    ///
    /// Debits the sender and credits the receiver by the same amount.
    /// Requires a verified PIN of the sender.
    Transfer,
}

impl TransactionKind {
    /// Stored tag of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::TopUp => "top_up",
            TransactionKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top_up" | "topup" => Ok(TransactionKind::TopUp),
            "transfer" => Ok(TransactionKind::Transfer),
            _ => Err(LedgerError::invalid_transaction_type(s)),
        }
    }
}

/// Immutable ledger entry
///
/// Created once inside an atomic unit together with its balance effects.
/// Only the per-side soft-delete markers are ever updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,

    /// Amount moved between balances
    pub amount: Amount,

    /// Amount plus any fee or tax (always >= amount)
    pub total: Amount,

    pub note: Option<String>,
    pub sender: ParticipantId,
    pub receiver: ParticipantId,
    pub created_at: DateTime<Utc>,

    /// Set when the sender hid this entry from their history
    pub deleted_by_sender: Option<DateTime<Utc>>,

    /// Set when the receiver hid this entry from their history
    pub deleted_by_receiver: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Whether the given participant hid this entry from their history
    pub fn is_hidden_for(&self, participant: ParticipantId) -> bool {
        (participant == self.sender && self.deleted_by_sender.is_some())
            || (participant == self.receiver && self.deleted_by_receiver.is_some())
    }
}

/// A validated transaction ready to be committed by a store
///
/// Both participants are already resolved. The store applies the balance
/// deltas implied by `kind` to the wallets behind the participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub total: Amount,
    pub note: Option<String>,
    pub sender: Participant,
    pub receiver: Participant,
    pub created_at: DateTime<Utc>,
}

impl TransactionDraft {
    /// Balance change of every wallet the draft touches, in ascending account order
    ///
    /// Stores lock the wallet rows in this order.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a side that must be a wallet is not one, or
    /// if a transfer names the same wallet on both sides.
    pub fn balance_deltas(&self) -> Result<Vec<(AccountId, Amount)>, LedgerError> {
        if self.receiver.kind != ParticipantKind::Wallet {
            return Err(LedgerError::missing_counterparty(self.kind, "receiver wallet"));
        }

        let mut deltas = match self.kind {
            TransactionKind::TopUp => vec![(self.receiver.external_ref, self.amount)],
            TransactionKind::Transfer => {
                if self.sender.kind != ParticipantKind::Wallet {
                    return Err(LedgerError::missing_counterparty(self.kind, "sender wallet"));
                }
                if self.sender.external_ref == self.receiver.external_ref {
                    return Err(LedgerError::self_transfer(self.sender.external_ref));
                }
                vec![
                    (self.sender.external_ref, -self.amount),
                    (self.receiver.external_ref, self.amount),
                ]
            }
        };
        deltas.sort_by_key(|(account, _)| *account);
        Ok(deltas)
    }
}

/// Request to create a transaction on behalf of an authenticated account
///
/// For `TopUp` the acting account is the receiving wallet and
/// `internal_account` names the source. For `Transfer` the acting account is
/// the sending wallet and `receiver_account` names the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub total: Amount,
    pub note: Option<String>,
    pub internal_account: Option<InternalAccountId>,
    pub receiver_account: Option<AccountId>,

    /// PIN submitted with the request; required for transfers
    pub pin: Option<String>,

    pub acting_account: AccountId,

    /// Upper bound for the atomic unit; the configured default applies when absent
    #[serde(skip)]
    pub deadline: Option<Duration>,
}

impl CreateTransaction {
    /// Build a top-up request
    pub fn top_up(
        acting_account: AccountId,
        internal_account: InternalAccountId,
        amount: Amount,
        total: Amount,
    ) -> Self {
        CreateTransaction {
            kind: TransactionKind::TopUp,
            amount,
            total,
            note: None,
            internal_account: Some(internal_account),
            receiver_account: None,
            pin: None,
            acting_account,
            deadline: None,
        }
    }

    /// Build a transfer request
    pub fn transfer(
        acting_account: AccountId,
        receiver_account: AccountId,
        amount: Amount,
        total: Amount,
        pin: impl Into<String>,
    ) -> Self {
        CreateTransaction {
            kind: TransactionKind::Transfer,
            amount,
            total,
            note: None,
            internal_account: None,
            receiver_account: Some(receiver_account),
            pin: Some(pin.into()),
            acting_account,
            deadline: None,
        }
    }

    /// Attach a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Bound the atomic unit by a deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("top_up", TransactionKind::TopUp)]
    #[case("TOP_UP", TransactionKind::TopUp)]
    #[case("transfer", TransactionKind::Transfer)]
    #[case(" Transfer ", TransactionKind::Transfer)]
    fn test_parse_kind(#[case] input: &str, #[case] expected: TransactionKind) {
        assert_eq!(input.parse::<TransactionKind>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_kind() {
        let result = "withdrawal".parse::<TransactionKind>();
        assert_eq!(
            result.unwrap_err(),
            LedgerError::invalid_transaction_type("withdrawal")
        );
    }

    #[test]
    fn test_kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&TransactionKind::TopUp).unwrap();
        assert_eq!(json, "\"top_up\"");
    }

    fn participant(id: ParticipantId, kind: ParticipantKind, external_ref: i64) -> Participant {
        Participant {
            id,
            kind,
            external_ref,
        }
    }

    fn draft(kind: TransactionKind, sender: Participant, receiver: Participant) -> TransactionDraft {
        TransactionDraft {
            kind,
            amount: 250,
            total: 250,
            note: None,
            sender,
            receiver,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transfer_deltas_are_sorted_by_account() {
        let draft = draft(
            TransactionKind::Transfer,
            participant(1, ParticipantKind::Wallet, 9),
            participant(2, ParticipantKind::Wallet, 3),
        );

        assert_eq!(draft.balance_deltas().unwrap(), vec![(3, 250), (9, -250)]);
    }

    #[test]
    fn test_top_up_touches_receiver_only() {
        let draft = draft(
            TransactionKind::TopUp,
            participant(1, ParticipantKind::Internal, 9),
            participant(2, ParticipantKind::Wallet, 9),
        );

        assert_eq!(draft.balance_deltas().unwrap(), vec![(9, 250)]);
    }

    #[test]
    fn test_transfer_to_same_wallet_is_rejected() {
        let draft = draft(
            TransactionKind::Transfer,
            participant(1, ParticipantKind::Wallet, 4),
            participant(1, ParticipantKind::Wallet, 4),
        );

        assert_eq!(
            draft.balance_deltas().unwrap_err(),
            LedgerError::self_transfer(4)
        );
    }

    #[test]
    fn test_hidden_only_for_deleting_side() {
        let tx = Transaction {
            id: 1,
            kind: TransactionKind::Transfer,
            amount: 100,
            total: 100,
            note: None,
            sender: 10,
            receiver: 20,
            created_at: Utc::now(),
            deleted_by_sender: Some(Utc::now()),
            deleted_by_receiver: None,
        };

        assert!(tx.is_hidden_for(10));
        assert!(!tx.is_hidden_for(20));
        assert!(!tx.is_hidden_for(30));
    }
}
