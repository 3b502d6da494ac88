//! # Registry Notifications
//!
//! Every committed state transition appends one [`EventRecord`] to the
//! registry's [`EventLog`]. The log is append-only from the outside; the
//! registry itself only ever rewinds it when a purchase is rolled back, so
//! observers never see a notification for a transition that did not stick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::certificates::Certificate;
use crate::config::EVENT_PAGE_LIMIT;
use crate::roles::Role;
use crate::CertificateId;

/// A state transition, carrying the post-transition data relevant to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A certificate was issued.
    Created {
        /// The full record as issued.
        certificate: Certificate,
    },
    /// A certificate was put up for sale.
    Listed {
        /// Certificate id.
        id: CertificateId,
        /// Owner who listed it.
        owner: String,
        /// Asking price.
        price: u64,
    },
    /// A listing was withdrawn by its owner.
    Withdrawn {
        /// Certificate id.
        id: CertificateId,
        /// Owner who withdrew it.
        owner: String,
    },
    /// A listed certificate changed hands.
    Purchased {
        /// Certificate id.
        id: CertificateId,
        /// Previous owner, who received the payment.
        seller: String,
        /// New owner.
        buyer: String,
        /// Listing price at the time of purchase.
        price: u64,
        /// Amount actually forwarded to the seller.
        payment: u64,
    },
    /// A certificate was retired by its owner.
    Retired {
        /// The full record after retirement.
        certificate: Certificate,
    },
    /// A role was granted to a principal.
    RoleGranted {
        /// The role granted.
        role: Role,
        /// The principal that received it.
        principal: String,
        /// The principal that granted it.
        granted_by: String,
    },
}

impl RegistryEvent {
    /// Short name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::Created { .. } => "created",
            RegistryEvent::Listed { .. } => "listed",
            RegistryEvent::Withdrawn { .. } => "withdrawn",
            RegistryEvent::Purchased { .. } => "purchased",
            RegistryEvent::Retired { .. } => "retired",
            RegistryEvent::RoleGranted { .. } => "role_granted",
        }
    }
}

/// A notification as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    /// Wall-clock time the transition was committed.
    pub recorded_at: DateTime<Utc>,
    /// The transition itself.
    pub event: RegistryEvent,
}

/// Ordered, append-only notification log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` and returns its sequence number.
    pub fn emit(&mut self, event: RegistryEvent) -> u64 {
        let sequence = self.records.len() as u64;
        self.records.push(EventRecord {
            sequence,
            recorded_at: Utc::now(),
            event,
        });
        sequence
    }

    /// All records in order.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Up to [`EVENT_PAGE_LIMIT`] records starting at `sequence`.
    pub fn since(&self, sequence: u64) -> &[EventRecord] {
        let start = usize::try_from(sequence)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        let end = start.saturating_add(EVENT_PAGE_LIMIT).min(self.records.len());
        &self.records[start..end]
    }

    /// The most recent record, if any.
    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    /// Drops every record from sequence `len` onwards.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// Number of records in the log.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
