//! # Payment Hand-off
//!
//! The registry never holds value. When a purchase commits, the payment
//! attached by the buyer is handed to the seller through a
//! [`PaymentHandoff`], the one point where control leaves the registry.
//!
//! The hand-off receives the registry itself, so an implementation may call
//! back into it (a seller's receipt handler, for example). By the time the
//! hand-off runs, the purchase has already been committed to registry
//! state, including the cleared listing, and the registry refuses any
//! further change until the hand-off returns.
//!
//! Calling convention: `Ok(())` means the value reached the seller. `Err`
//! means it did not, and the implementation must not have moved any value.
//! The registry then rolls the purchase back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::registry::CertificateRegistry;
use crate::CertificateId;

/// Value moving from buyer to seller for one purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransfer {
    /// Certificate being paid for.
    pub certificate_id: CertificateId,
    /// Principal paying.
    pub buyer: String,
    /// Principal being paid.
    pub seller: String,
    /// Full attached amount, overpayment included.
    pub amount: u64,
}

/// Why a hand-off did not deliver the payment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    /// The recipient refused the payment.
    #[error("recipient {recipient} rejected the payment: {reason}")]
    Rejected {
        /// The recipient.
        recipient: String,
        /// Reason given by the recipient.
        reason: String,
    },

    /// Crediting the recipient would overflow its balance.
    #[error("balance overflow crediting {recipient}")]
    Overflow {
        /// The recipient.
        recipient: String,
    },
}

/// Delivers a purchase payment to the seller.
pub trait PaymentHandoff {
    /// Moves `transfer.amount` from the buyer to the seller.
    ///
    /// `registry` is the registry executing the purchase, already holding
    /// the committed purchase. It can be queried freely, but every mutating
    /// call made through it fails until this returns: a nested `buy_token`
    /// on the same certificate with `NotForSale`, anything else with
    /// `HandoffInProgress`.
    fn forward(
        &mut self,
        registry: &mut CertificateRegistry,
        transfer: &PaymentTransfer,
    ) -> Result<(), HandoffError>;
}

impl<F> PaymentHandoff for F
where
    F: FnMut(&mut CertificateRegistry, &PaymentTransfer) -> Result<(), HandoffError>,
{
    fn forward(
        &mut self,
        registry: &mut CertificateRegistry,
        transfer: &PaymentTransfer,
    ) -> Result<(), HandoffError> {
        self(registry, transfer)
    }
}

/// In-memory book of payments forwarded to sellers.
///
/// The attached payment is assumed to be escrowed by the wallet layer for
/// the duration of the call, so forwarding only credits the seller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutLedger {
    credits: BTreeMap<String, u64>,
}

impl PayoutLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total received by `principal` so far.
    pub fn balance_of(&self, principal: &str) -> u64 {
        self.credits.get(principal).copied().unwrap_or(0)
    }

    /// Sum of all credits.
    pub fn total_paid_out(&self) -> u64 {
        self.credits
            .values()
            .fold(0u64, |acc, v| acc.saturating_add(*v))
    }
}

impl PaymentHandoff for PayoutLedger {
    fn forward(
        &mut self,
        _registry: &mut CertificateRegistry,
        transfer: &PaymentTransfer,
    ) -> Result<(), HandoffError> {
        let current = self.balance_of(&transfer.seller);
        let updated = current
            .checked_add(transfer.amount)
            .ok_or_else(|| HandoffError::Overflow {
                recipient: transfer.seller.clone(),
            })?;
        self.credits.insert(transfer.seller.clone(), updated);
        Ok(())
    }
}
