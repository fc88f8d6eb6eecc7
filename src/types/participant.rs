//! Participant types
//!
//! A participant is the ledger's uniform handle over a counterparty, whether it
//! is a user wallet or an internal settlement account.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Participant identifier
pub type ParticipantId = i64;

/// The kind of entity a participant refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    /// A user wallet; the external reference is the account id
    Wallet,

    /// An internal settlement account; the external reference is its id
    Internal,
}

impl ParticipantKind {
    /// Stored tag of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantKind::Wallet => "wallet",
            ParticipantKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet" => Ok(ParticipantKind::Wallet),
            "internal" => Ok(ParticipantKind::Internal),
            other => Err(format!("unknown participant kind '{}'", other)),
        }
    }
}

/// A resolved participant
///
/// The pair `(kind, external_ref)` maps to exactly one participant id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub kind: ParticipantKind,
    pub external_ref: i64,
}
