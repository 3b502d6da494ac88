//! # Sale Listing Store
//!
//! Per-certificate sale status. A listing record is created the first time
//! an owner lists a certificate and is kept afterwards; clearing a listing
//! only flips `is_for_sale` back to `false`.
//!
//! Listing and withdrawing are gated on ownership, checked against the
//! [`CertificateStore`] passed in by the caller. Purchases and retirements
//! clear the listing through [`ListingStore::clear`] so a stale listing can
//! never outlive the ownership it was created under.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::certificates::CertificateStore;
use crate::error::RegistryError;
use crate::CertificateId;

/// Sale status of one certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleListing {
    /// Whether the certificate can currently be bought.
    pub is_for_sale: bool,
    /// Asking price. Meaningful only while `is_for_sale` is set.
    pub price: u64,
}

/// Listing records keyed by certificate id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStore {
    listings: BTreeMap<CertificateId, SaleListing>,
}

impl ListingStore {
    /// Creates an empty listing store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists `id` for sale at `price` on behalf of its owner.
    ///
    /// Relisting an already listed certificate replaces the price.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown ids,
    /// [`RegistryError::NotOwner`] if `caller` does not own `id`, and
    /// [`RegistryError::AlreadyRetired`] for retired certificates.
    pub fn list(
        &mut self,
        certificates: &CertificateStore,
        id: CertificateId,
        price: u64,
        caller: &str,
    ) -> Result<SaleListing, RegistryError> {
        certificates.require_owner(id, caller)?;
        if !certificates.get(id)?.is_active {
            return Err(RegistryError::AlreadyRetired(id));
        }

        let listing = SaleListing {
            is_for_sale: true,
            price,
        };
        self.listings.insert(id, listing);
        Ok(listing)
    }

    /// Takes `id` off the market on behalf of its owner.
    ///
    /// Withdrawing a certificate that is not listed succeeds and changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown ids and
    /// [`RegistryError::NotOwner`] if `caller` does not own `id`.
    pub fn withdraw(
        &mut self,
        certificates: &CertificateStore,
        id: CertificateId,
        caller: &str,
    ) -> Result<(), RegistryError> {
        certificates.require_owner(id, caller)?;
        self.clear(id);
        Ok(())
    }

    /// Clears the sale flag of `id` without any ownership check. Returns the
    /// listing as it was before clearing.
    pub fn clear(&mut self, id: CertificateId) -> SaleListing {
        match self.listings.get_mut(&id) {
            Some(listing) => {
                let previous = *listing;
                listing.is_for_sale = false;
                previous
            }
            None => SaleListing::default(),
        }
    }

    pub(crate) fn restore(&mut self, id: CertificateId, listing: SaleListing) {
        self.listings.insert(id, listing);
    }

    /// Returns `(is_for_sale, price)` for `id`. Unknown and never-listed
    /// ids read as `(false, 0)`.
    pub fn is_listed(&self, id: CertificateId) -> (bool, u64) {
        let listing = self.get(id);
        (listing.is_for_sale, listing.price)
    }

    /// Returns the listing record for `id`, or the default unlisted record.
    pub fn get(&self, id: CertificateId) -> SaleListing {
        self.listings.get(&id).copied().unwrap_or_default()
    }

    /// Number of certificates currently for sale.
    pub fn listed_count(&self) -> usize {
        self.listings.values().filter(|l| l.is_for_sale).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::CertificateTerms;

    fn store_with_certificate(owner: &str) -> (CertificateStore, CertificateId) {
        let mut certificates = CertificateStore::new();
        let id = certificates
            .create(
                owner,
                CertificateTerms {
                    energy_amount: 100,
                    price_per_unit: 1,
                    start_date: 100,
                    end_date: 200,
                    source_type: "wind".into(),
                    delivery_point: "DE-50HZ".into(),
                    contract_terms_hash: "terms".into(),
                    metadata_ref: String::new(),
                },
            )
            .unwrap();
        (certificates, id)
    }

    #[test]
    fn list_by_owner_sets_price() {
        let (certificates, id) = store_with_certificate("plant");
        let mut listings = ListingStore::new();
        listings.list(&certificates, id, 50, "plant").unwrap();
        assert_eq!(listings.is_listed(id), (true, 50));
        assert_eq!(listings.listed_count(), 1);
    }

    #[test]
    fn list_by_non_owner_rejected() {
        let (certificates, id) = store_with_certificate("plant");
        let mut listings = ListingStore::new();
        let err = listings.list(&certificates, id, 50, "mallory").unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotOwner {
                id,
                caller: "mallory".into()
            }
        );
        assert_eq!(listings.is_listed(id), (false, 0));
    }

    #[test]
    fn list_retired_certificate_rejected() {
        let (mut certificates, id) = store_with_certificate("plant");
        certificates.retire(id).unwrap();
        let mut listings = ListingStore::new();
        assert_eq!(
            listings.list(&certificates, id, 50, "plant"),
            Err(RegistryError::AlreadyRetired(id))
        );
    }

    #[test]
    fn relisting_replaces_price() {
        let (certificates, id) = store_with_certificate("plant");
        let mut listings = ListingStore::new();
        listings.list(&certificates, id, 50, "plant").unwrap();
        listings.list(&certificates, id, 75, "plant").unwrap();
        assert_eq!(listings.is_listed(id), (true, 75));
    }

    #[test]
    fn withdraw_clears_sale_flag() {
        let (certificates, id) = store_with_certificate("plant");
        let mut listings = ListingStore::new();
        listings.list(&certificates, id, 50, "plant").unwrap();
        listings.withdraw(&certificates, id, "plant").unwrap();
        assert!(!listings.is_listed(id).0);
        assert_eq!(listings.listed_count(), 0);
    }

    #[test]
    fn withdraw_never_listed_is_noop() {
        let (certificates, id) = store_with_certificate("plant");
        let mut listings = ListingStore::new();
        listings.withdraw(&certificates, id, "plant").unwrap();
        listings.withdraw(&certificates, id, "plant").unwrap();
        assert_eq!(listings.is_listed(id), (false, 0));
    }

    #[test]
    fn withdraw_by_non_owner_rejected() {
        let (certificates, id) = store_with_certificate("plant");
        let mut listings = ListingStore::new();
        listings.list(&certificates, id, 50, "plant").unwrap();
        assert!(listings.withdraw(&certificates, id, "mallory").is_err());
        assert_eq!(listings.is_listed(id), (true, 50));
    }

    #[test]
    fn clear_returns_previous_listing() {
        let (certificates, id) = store_with_certificate("plant");
        let mut listings = ListingStore::new();
        listings.list(&certificates, id, 50, "plant").unwrap();
        let previous = listings.clear(id);
        assert_eq!(
            previous,
            SaleListing {
                is_for_sale: true,
                price: 50
            }
        );
        assert!(!listings.get(id).is_for_sale);
    }
}
