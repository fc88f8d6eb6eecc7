//! PIN gate in front of transfers
//!
//! Every transfer must carry a PIN the credential layer confirms. Top-ups never
//! consult the gate.

use crate::core::traits::PinVerifier;
use crate::types::{AccountId, CreateTransaction, LedgerError, TransactionKind};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

/// Applies the PIN policy to transaction requests
#[derive(Clone)]
pub struct AuthorizationGate {
    verifier: Arc<dyn PinVerifier>,
}

impl AuthorizationGate {
    pub fn new(verifier: Arc<dyn PinVerifier>) -> Self {
        AuthorizationGate { verifier }
    }

    /// Check a request against the PIN policy
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PinRejected`] if a transfer has no PIN or the
    /// verifier does not confirm it. Verifier failures propagate unchanged.
    pub async fn authorize(&self, request: &CreateTransaction) -> Result<(), LedgerError> {
        if request.kind != TransactionKind::Transfer {
            return Ok(());
        }

        let account = request.acting_account;
        let Some(pin) = request.pin.as_deref().filter(|pin| !pin.is_empty()) else {
            warn!(account, "Transfer rejected: no PIN submitted");
            return Err(LedgerError::pin_rejected(account));
        };

        if self.verifier.pin_verified(account, pin).await? {
            Ok(())
        } else {
            warn!(account, "Transfer rejected: PIN mismatch");
            Err(LedgerError::pin_rejected(account))
        }
    }
}

/// [`PinVerifier`] over PINs held in memory
///
/// Stands in for the credential layer in the replay CLI and in tests. Accounts
/// without a PIN never verify.
#[derive(Debug, Default)]
pub struct StaticPinVerifier {
    pins: DashMap<AccountId, String>,
}

impl StaticPinVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace the PIN of an account
    pub fn set_pin(&self, account: AccountId, pin: impl Into<String>) {
        self.pins.insert(account, pin.into());
    }
}

#[async_trait]
impl PinVerifier for StaticPinVerifier {
    async fn pin_verified(
        &self,
        account: AccountId,
        submitted_pin: &str,
    ) -> Result<bool, LedgerError> {
        Ok(self
            .pins
            .get(&account)
            .is_some_and(|pin| pin.value() == submitted_pin))
    }
}
