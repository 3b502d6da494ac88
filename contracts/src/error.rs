//! Error types for the certificate registry.
//!
//! Every registry operation that can fail returns a [`RegistryError`]. A
//! failed operation never leaves partial state behind: the caller sees the
//! error and the registry is exactly as it was before the call.

use thiserror::Error;

use crate::roles::Role;
use crate::CertificateId;

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The caller lacks the role the operation requires.
    #[error("unauthorized: {principal} does not hold the {role} role")]
    Unauthorized {
        /// The principal that attempted the operation.
        principal: String,
        /// The role that was required.
        role: Role,
    },

    /// Certificates must carry a positive energy amount.
    #[error("invalid amount: energy amount must be greater than zero")]
    InvalidAmount,

    /// The delivery window is empty or inverted.
    #[error("invalid delivery window: start {start} must be before end {end}")]
    InvalidWindow {
        /// Requested start of delivery.
        start: u64,
        /// Requested end of delivery.
        end: u64,
    },

    /// No certificate was ever issued under this id.
    #[error("certificate not found: {0}")]
    NotFound(CertificateId),

    /// The certificate is not currently listed for sale.
    #[error("certificate {0} is not for sale")]
    NotForSale(CertificateId),

    /// The caller does not own the certificate.
    #[error("certificate {id} is not owned by {caller}")]
    NotOwner {
        /// The certificate in question.
        id: CertificateId,
        /// The principal that attempted the operation.
        caller: String,
    },

    /// The attached payment does not cover the listing price.
    #[error("insufficient payment: price is {price}, attached {offered}")]
    InsufficientPayment {
        /// The listing price.
        price: u64,
        /// The amount the buyer attached.
        offered: u64,
    },

    /// The certificate has already been retired.
    #[error("certificate {0} is already retired")]
    AlreadyRetired(CertificateId),

    /// The payment hand-off to the seller failed; the purchase was rolled back.
    #[error("payment hand-off failed: {0}")]
    PaymentFailed(String),

    /// A payment hand-off for `0` is still running; registry state cannot
    /// change until it returns.
    #[error("payment hand-off for certificate {0} in progress")]
    HandoffInProgress(CertificateId),

    /// The id counter cannot advance any further.
    #[error("certificate id space exhausted")]
    IdSpaceExhausted,
}

impl RegistryError {
    /// Short machine-readable name of the error kind, used as a metrics label
    /// and in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Unauthorized { .. } => "unauthorized",
            RegistryError::InvalidAmount => "invalid_amount",
            RegistryError::InvalidWindow { .. } => "invalid_window",
            RegistryError::NotFound(_) => "not_found",
            RegistryError::NotForSale(_) => "not_for_sale",
            RegistryError::NotOwner { .. } => "not_owner",
            RegistryError::InsufficientPayment { .. } => "insufficient_payment",
            RegistryError::AlreadyRetired(_) => "already_retired",
            RegistryError::PaymentFailed(_) => "payment_failed",
            RegistryError::HandoffInProgress(_) => "handoff_in_progress",
            RegistryError::IdSpaceExhausted => "id_space_exhausted",
        }
    }
}
