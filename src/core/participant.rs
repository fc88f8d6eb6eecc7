//! Participant resolution
//!
//! Maps a `(kind, external reference)` pair to the ledger's uniform participant
//! handle. Resolution creates the mapping on first use; lookups never create.

use crate::core::traits::LedgerStore;
use crate::types::{LedgerError, Participant, ParticipantKind};
use std::sync::Arc;
use tracing::debug;

/// Resolves wallets and internal accounts into participants
#[derive(Clone)]
pub struct ParticipantResolver {
    store: Arc<dyn LedgerStore>,
}

impl ParticipantResolver {
    /// Create a new resolver on top of a store
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        ParticipantResolver { store }
    }

    /// Look up or create the participant for `(kind, external_ref)`
    ///
    /// Idempotent: repeated and concurrent calls for the same pair return the
    /// same participant and leave exactly one mapping behind.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the referenced wallet or internal account
    /// does not exist, or a transient error if the store is unreachable.
    pub async fn resolve(
        &self,
        kind: ParticipantKind,
        external_ref: i64,
    ) -> Result<Participant, LedgerError> {
        if let Some(existing) = self.store.find_participant(kind, external_ref).await? {
            return Ok(existing);
        }

        let participant = self.store.upsert_participant(kind, external_ref).await?;
        debug!(
            participant = participant.id,
            kind = %kind,
            external_ref,
            "Resolved new participant"
        );
        Ok(participant)
    }

    /// Look up the participant for `(kind, external_ref)` without creating it
    pub async fn lookup(
        &self,
        kind: ParticipantKind,
        external_ref: i64,
    ) -> Result<Option<Participant>, LedgerError> {
        self.store.find_participant(kind, external_ref).await
    }
}
