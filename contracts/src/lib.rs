// Copyright (c) 2026 GridCert Contributors. MIT License.
// See LICENSE for details.

//! # GridCert Contracts
//!
//! A permissioned registry for tokenized energy-delivery certificates. Each
//! certificate promises a quantity of energy over a delivery window; it can
//! be listed, bought for a payment, and finally retired by the consumer who
//! holds it.
//!
//! - **roles**: Admin / Provider / Consumer membership and the capability
//!   check every operation starts with.
//! - **certificates**: the certificate records and their single owner.
//! - **listings**: per-certificate sale status.
//! - **registry**: the lifecycle engine tying the above together.
//! - **payment**: the hand-off that pays the seller on purchase.
//! - **events**: the append-only notification log.
//! - **operation**: serializable calls for an external ordering substrate.
//!
//! ## Design Principles
//!
//! 1. Every operation commits fully or not at all.
//! 2. Internal effects are committed before control leaves the registry.
//!    The payment hand-off is always the last step of a purchase.
//! 3. Lifecycle states are explicit enum variants.
//! 4. All state is serializable (serde) as a single snapshot.

pub mod certificates;
pub mod config;
pub mod error;
pub mod events;
pub mod listings;
pub mod operation;
pub mod payment;
pub mod registry;
pub mod roles;

/// Certificate identifier, allocated from a monotonic counter.
pub type CertificateId = u64;

pub use certificates::{terms_digest, Certificate, CertificateTerms};
pub use error::RegistryError;
pub use events::{EventRecord, RegistryEvent};
pub use operation::{Operation, Receipt};
pub use payment::{HandoffError, PaymentHandoff, PaymentTransfer, PayoutLedger};
pub use registry::{CertificateRegistry, CertificateState};
pub use roles::Role;
