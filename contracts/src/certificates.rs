//! # Certificate Store
//!
//! Holds every certificate ever issued, keyed by id. A certificate records
//! a promised quantity of energy delivered over a fixed window, who issued
//! it, and who holds it now.
//!
//! ## Invariants
//!
//! - Ids are allocated from a monotonic counter starting at
//!   [`FIRST_CERTIFICATE_ID`] and are never reused.
//! - Every certificate has exactly one owner. Ownership moves only through
//!   [`CertificateStore::transfer_owner`].
//! - `is_active` goes from `true` to `false` at most once. Retired records
//!   stay in the store.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::config::FIRST_CERTIFICATE_ID;
use crate::error::RegistryError;
use crate::CertificateId;

/// Hex-encoded SHA-256 digest of an off-record terms document, suitable for
/// [`CertificateTerms::contract_terms_hash`].
pub fn terms_digest(document: &[u8]) -> String {
    hex::encode(Sha256::digest(document))
}

/// Issuer-supplied terms of a new certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateTerms {
    /// Quantity of energy promised, in [`ENERGY_UNIT`](crate::config::ENERGY_UNIT).
    pub energy_amount: u64,
    /// Informational unit price quoted at issuance.
    pub price_per_unit: u64,
    /// Start of the delivery window (unix seconds).
    pub start_date: u64,
    /// End of the delivery window (unix seconds). Must be after `start_date`.
    pub end_date: u64,
    /// Generation source, e.g. "solar" or "wind".
    pub source_type: String,
    /// Grid location where the energy is delivered.
    pub delivery_point: String,
    /// Reference to the off-record contract terms.
    pub contract_terms_hash: String,
    /// Reference to off-record metadata (e.g. a document URI).
    #[serde(default)]
    pub metadata_ref: String,
}

impl CertificateTerms {
    /// Checks the amount and delivery window.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidWindow`] if `start_date >= end_date`
    /// and [`RegistryError::InvalidAmount`] if `energy_amount == 0`.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.start_date >= self.end_date {
            return Err(RegistryError::InvalidWindow {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.energy_amount == 0 {
            return Err(RegistryError::InvalidAmount);
        }
        Ok(())
    }
}

/// An issued energy-delivery certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Unique certificate id.
    pub id: CertificateId,
    /// Principal that issued the certificate.
    pub issuer: String,
    /// Current holder.
    pub owner: String,
    /// Quantity of energy promised.
    pub energy_amount: u64,
    /// Informational unit price quoted at issuance.
    pub price_per_unit: u64,
    /// Start of the delivery window (unix seconds).
    pub start_date: u64,
    /// End of the delivery window (unix seconds).
    pub end_date: u64,
    /// Generation source.
    pub source_type: String,
    /// Grid delivery location.
    pub delivery_point: String,
    /// `false` once the certificate has been retired.
    pub is_active: bool,
    /// Reference to the off-record contract terms.
    pub contract_terms_hash: String,
    /// Reference to off-record metadata.
    pub metadata_ref: String,
}

/// Certificate records keyed by id, plus the id counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateStore {
    records: BTreeMap<CertificateId, Certificate>,
    next_id: CertificateId,
}

impl CertificateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: FIRST_CERTIFICATE_ID,
        }
    }

    /// Issues a new active certificate owned by `issuer` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidWindow`] or
    /// [`RegistryError::InvalidAmount`] for malformed terms, and
    /// [`RegistryError::IdSpaceExhausted`] if the counter cannot advance.
    /// Nothing is allocated on failure.
    pub fn create(
        &mut self,
        issuer: &str,
        terms: CertificateTerms,
    ) -> Result<CertificateId, RegistryError> {
        terms.validate()?;

        let id = self.next_id;
        let next_id = id.checked_add(1).ok_or(RegistryError::IdSpaceExhausted)?;

        let certificate = Certificate {
            id,
            issuer: issuer.to_string(),
            owner: issuer.to_string(),
            energy_amount: terms.energy_amount,
            price_per_unit: terms.price_per_unit,
            start_date: terms.start_date,
            end_date: terms.end_date,
            source_type: terms.source_type,
            delivery_point: terms.delivery_point,
            is_active: true,
            contract_terms_hash: terms.contract_terms_hash,
            metadata_ref: terms.metadata_ref,
        };

        self.records.insert(id, certificate);
        self.next_id = next_id;
        Ok(id)
    }

    /// Returns the full record for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `id` was never issued.
    pub fn get(&self, id: CertificateId) -> Result<&Certificate, RegistryError> {
        self.records.get(&id).ok_or(RegistryError::NotFound(id))
    }

    /// Returns the current owner of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `id` was never issued.
    pub fn owner_of(&self, id: CertificateId) -> Result<&str, RegistryError> {
        self.get(id).map(|c| c.owner.as_str())
    }

    /// Fails with [`RegistryError::NotOwner`] unless `caller` owns `id`.
    pub fn require_owner(&self, id: CertificateId, caller: &str) -> Result<(), RegistryError> {
        if self.owner_of(id)? == caller {
            Ok(())
        } else {
            Err(RegistryError::NotOwner {
                id,
                caller: caller.to_string(),
            })
        }
    }

    /// Reassigns ownership of `id` from `from` to `to`.
    ///
    /// Transferring to the current owner is allowed and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown ids and
    /// [`RegistryError::NotOwner`] if `from` is not the current owner.
    pub fn transfer_owner(
        &mut self,
        id: CertificateId,
        from: &str,
        to: &str,
    ) -> Result<(), RegistryError> {
        let record = self.records.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        if record.owner != from {
            return Err(RegistryError::NotOwner {
                id,
                caller: from.to_string(),
            });
        }
        record.owner = to.to_string();
        Ok(())
    }

    /// Marks `id` as retired.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown ids and
    /// [`RegistryError::AlreadyRetired`] if the certificate is inactive.
    pub fn retire(&mut self, id: CertificateId) -> Result<(), RegistryError> {
        let record = self.records.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        if !record.is_active {
            return Err(RegistryError::AlreadyRetired(id));
        }
        record.is_active = false;
        Ok(())
    }

    /// Puts `certificate` back under its id, replacing the current record.
    pub(crate) fn restore(&mut self, certificate: Certificate) {
        self.records.insert(certificate.id, certificate);
    }

    /// Ids of every certificate currently held by `owner`, retired ones included.
    pub fn owned_by(&self, owner: &str) -> Vec<CertificateId> {
        self.records
            .values()
            .filter(|c| c.owner == owner)
            .map(|c| c.id)
            .collect()
    }

    /// Number of certificates ever issued.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// The id the next successful [`create`](Self::create) will return.
    pub fn next_id(&self) -> CertificateId {
        self.next_id
    }
}

impl Default for CertificateStore {
    fn default() -> Self {
        Self::new()
    }
}
