//! Account-side types for the wallet ledger
//!
//! This module defines wallets, the profile data joined into history views,
//! and the internal settlement accounts that fund top-ups.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account identifier (shared by the account, its wallet and its profile)
pub type AccountId = i64;

/// Internal settlement account identifier
pub type InternalAccountId = i64;

/// Monetary amount in minor currency units
///
/// No floating point is used anywhere on the balance path.
pub type Amount = i64;

/// Wallet state
///
/// One wallet per account, created together with the account. The balance is
/// only ever mutated from inside a ledger atomic unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Owning account (the wallet id equals the account id)
    pub account: AccountId,

    /// Current balance in minor units, never negative after a commit
    pub balance: Amount,

    /// Last time the balance changed
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet for the given account
    pub fn new(account: AccountId) -> Self {
        Wallet {
            account,
            balance: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Display data of an account owner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub image: Option<String>,
    pub email: String,
    pub verified: bool,
}

impl Profile {
    /// Create an unverified profile with only an email and a display name
    pub fn new(email: impl Into<String>, full_name: Option<String>) -> Self {
        Profile {
            full_name,
            email: email.into(),
            ..Default::default()
        }
    }
}

/// Partial profile update
///
/// Each field is a recognized option with a fixed effect:
/// - `None` leaves the stored value untouched
/// - `Some("")` clears the stored value
/// - `Some(value)` replaces the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub image: Option<String>,
}

impl ProfileUpdate {
    /// Whether the update touches no field at all
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.phone.is_none() && self.image.is_none()
    }

    /// Apply the update to a profile and return the resulting profile
    ///
    /// The `verified` flag of the result is recomputed with [`derive_verified`]
    /// from the post-update field values.
    pub fn apply(&self, profile: &Profile) -> Profile {
        fn merge(current: &Option<String>, update: &Option<String>) -> Option<String> {
            match update {
                None => current.clone(),
                Some(value) if value.is_empty() => None,
                Some(value) => Some(value.clone()),
            }
        }

        let mut updated = Profile {
            full_name: merge(&profile.full_name, &self.full_name),
            phone: merge(&profile.phone, &self.phone),
            image: merge(&profile.image, &self.image),
            email: profile.email.clone(),
            verified: profile.verified,
        };
        updated.verified = derive_verified(&updated);
        updated
    }
}

/// Derive the verified flag of a profile from its field values
///
/// A profile becomes verified once name, phone and image are all present and
/// non-empty. An already verified profile stays verified.
pub fn derive_verified(profile: &Profile) -> bool {
    let filled = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());

    profile.verified
        || (filled(&profile.full_name) && filled(&profile.phone) && filled(&profile.image))
}

/// Non-user settlement source (e.g. a top-up provider)
///
/// Created out-of-band and read-only to the ledger. Internal accounts have no
/// balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalAccount {
    pub id: InternalAccountId,
    pub name: String,
    pub image: Option<String>,

    /// Fee charged on top of the amount, in percent
    pub tax_rate: Decimal,

    pub created_at: DateTime<Utc>,
}

impl InternalAccount {
    /// Fee-inclusive total for a top-up of `amount`
    ///
    /// The fee is `amount * tax_rate / 100`, rounded up to the next minor unit.
    /// Returns `None` if the computation does not fit in an [`Amount`].
    pub fn quote(&self, amount: Amount) -> Option<Amount> {
        let fee = (Decimal::from(amount) * self.tax_rate / Decimal::ONE_HUNDRED).ceil();
        amount.checked_add(fee.to_i64()?)
    }
}
