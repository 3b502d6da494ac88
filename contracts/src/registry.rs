//! # Certificate Registry: Lifecycle Engine
//!
//! Owns the role table, the certificate store, the listing store and the
//! notification log, and drives every certificate through its lifecycle:
//!
//! ```text
//! create ──► Active-Unlisted ──list──► Active-Listed
//!                 ▲   │                  │    │
//!                 │   │   withdraw / buy │    │
//!                 │   │ ◄────────────────┘    │
//!                 │   └──burn──► Retired ◄────┘ burn
//! ```
//!
//! `Retired` is terminal. Every operation checks its guards first and
//! either commits completely or returns an error with no state touched.
//!
//! ## Purchase ordering
//!
//! [`buy_token`](CertificateRegistry::buy_token) is the only operation that
//! hands control to outside code. It runs in three steps:
//!
//! 1. Validate: listed, payment covers the price.
//! 2. Commit: clear the listing, move ownership, emit `Purchased`.
//! 3. Hand the payment to the seller.
//!
//! The listing is already cleared when step 3 runs, so a seller re-entering
//! `buy_token` for the same certificate is refused with `NotForSale`. While
//! step 3 runs the registry is locked: every other mutating call fails with
//! `HandoffInProgress`, so no nested purchase can settle value of its own.
//! If step 3 fails, the certificate record, its listing and the `Purchased`
//! record are put back exactly as they were before step 2.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::certificates::{Certificate, CertificateStore, CertificateTerms};
use crate::error::RegistryError;
use crate::events::{EventLog, EventRecord, RegistryEvent};
use crate::listings::{ListingStore, SaleListing};
use crate::payment::{PaymentHandoff, PaymentTransfer};
use crate::roles::{Role, RoleRegistry};
use crate::CertificateId;

/// Lifecycle state of a single certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateState {
    /// Active and not for sale.
    ActiveUnlisted,
    /// Active and listed at `price`.
    ActiveListed {
        /// Asking price.
        price: u64,
    },
    /// Retired. Terminal.
    Retired,
}

impl std::fmt::Display for CertificateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateState::ActiveUnlisted => write!(f, "Active-Unlisted"),
            CertificateState::ActiveListed { price } => write!(f, "Active-Listed({})", price),
            CertificateState::Retired => write!(f, "Retired"),
        }
    }
}

/// The registry: all persistent state plus the lifecycle operations.
///
/// Operations take `&mut self` and are meant to be applied one at a time in
/// a single total order. Hosts sharing a registry across tasks wrap it in
/// one writer lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRegistry {
    roles: RoleRegistry,
    certificates: CertificateStore,
    listings: ListingStore,
    events: EventLog,
    /// Certificate whose payment hand-off is running, if any.
    #[serde(skip)]
    settling: Option<CertificateId>,
}

impl CertificateRegistry {
    /// Creates an empty registry administered by `admin`.
    pub fn new(admin: &str) -> Self {
        Self {
            roles: RoleRegistry::bootstrap(admin),
            certificates: CertificateStore::new(),
            listings: ListingStore::new(),
            events: EventLog::new(),
            settling: None,
        }
    }

    fn ensure_idle(&self) -> Result<(), RegistryError> {
        match self.settling {
            Some(id) => Err(RegistryError::HandoffInProgress(id)),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    /// Grants `role` to `principal` on behalf of `caller`.
    ///
    /// Emits `RoleGranted` when the role is new to `principal`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unauthorized`] if `caller` may not grant `role`.
    pub fn grant_role(
        &mut self,
        caller: &str,
        role: Role,
        principal: &str,
    ) -> Result<(), RegistryError> {
        self.ensure_idle()?;
        if self.roles.grant_role(caller, role, principal)? {
            self.events.emit(RegistryEvent::RoleGranted {
                role,
                principal: principal.to_string(),
                granted_by: caller.to_string(),
            });
            info!(%caller, %principal, %role, "role granted");
        }
        Ok(())
    }

    /// Registers `caller` as a Consumer. Open to everyone.
    pub fn register_as_consumer(&mut self, caller: &str) -> Result<(), RegistryError> {
        self.grant_role(caller, Role::Consumer, caller)
    }

    /// Grants the Provider role to `provider`. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unauthorized`] if `caller` is not an Admin.
    pub fn add_provider(&mut self, caller: &str, provider: &str) -> Result<(), RegistryError> {
        self.grant_role(caller, Role::Provider, provider)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Issues a new certificate owned by `caller` and returns its id.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Unauthorized`] if `caller` is not a Provider.
    /// - [`RegistryError::InvalidWindow`] if `start_date >= end_date`.
    /// - [`RegistryError::InvalidAmount`] if `energy_amount == 0`.
    pub fn create_token(
        &mut self,
        caller: &str,
        terms: CertificateTerms,
    ) -> Result<CertificateId, RegistryError> {
        self.ensure_idle()?;
        self.roles.require(caller, Role::Provider)?;
        let id = self.certificates.create(caller, terms)?;
        let certificate = self.certificates.get(id)?.clone();

        info!(
            certificate_id = id,
            issuer = %caller,
            energy_amount = certificate.energy_amount,
            "certificate created"
        );
        self.events.emit(RegistryEvent::Created { certificate });
        Ok(id)
    }

    /// Lists `id` for sale at `price`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] for unknown ids.
    /// - [`RegistryError::NotOwner`] if `caller` does not own `id`.
    /// - [`RegistryError::AlreadyRetired`] if `id` is retired.
    pub fn list_token_for_sale(
        &mut self,
        caller: &str,
        id: CertificateId,
        price: u64,
    ) -> Result<(), RegistryError> {
        self.ensure_idle()?;
        self.listings.list(&self.certificates, id, price, caller)?;

        info!(certificate_id = id, owner = %caller, price, "certificate listed");
        self.events.emit(RegistryEvent::Listed {
            id,
            owner: caller.to_string(),
            price,
        });
        Ok(())
    }

    /// Takes `id` off the market. Withdrawing an unlisted certificate is a
    /// no-op that still succeeds and still emits `Withdrawn`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] for unknown ids.
    /// - [`RegistryError::NotOwner`] if `caller` does not own `id`.
    pub fn withdraw_token_from_sale(
        &mut self,
        caller: &str,
        id: CertificateId,
    ) -> Result<(), RegistryError> {
        self.ensure_idle()?;
        self.listings.withdraw(&self.certificates, id, caller)?;

        info!(certificate_id = id, owner = %caller, "listing withdrawn");
        self.events.emit(RegistryEvent::Withdrawn {
            id,
            owner: caller.to_string(),
        });
        Ok(())
    }

    /// Buys listed certificate `id` for `caller`, paying `payment`.
    ///
    /// The whole attached payment goes to the seller, overpayment included.
    /// Ownership, the listing and the `Purchased` notification are committed
    /// before `handoff` runs; if `handoff` fails all of it is undone. Calls
    /// `handoff` makes into the registry cannot change any state.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] for unknown ids.
    /// - [`RegistryError::NotForSale`] if `id` is not listed.
    /// - [`RegistryError::InsufficientPayment`] if `payment` is below the price.
    /// - [`RegistryError::HandoffInProgress`] if called from inside another
    ///   purchase's hand-off.
    /// - [`RegistryError::PaymentFailed`] if the hand-off failed.
    pub fn buy_token(
        &mut self,
        caller: &str,
        id: CertificateId,
        payment: u64,
        handoff: &mut dyn PaymentHandoff,
    ) -> Result<(), RegistryError> {
        // 1. Validate.
        let seller = self.certificates.owner_of(id)?.to_string();
        let (is_for_sale, price) = self.listings.is_listed(id);
        if !is_for_sale {
            return Err(RegistryError::NotForSale(id));
        }
        if payment < price {
            return Err(RegistryError::InsufficientPayment {
                price,
                offered: payment,
            });
        }

        self.ensure_idle()?;

        // 2. Commit every internal effect before control leaves the registry.
        let previous_certificate = self.certificates.get(id)?.clone();
        let events_before = self.events.len();
        self.certificates.transfer_owner(id, &seller, caller)?;
        let previous_listing = self.listings.clear(id);
        self.events.emit(RegistryEvent::Purchased {
            id,
            seller: seller.clone(),
            buyer: caller.to_string(),
            price,
            payment,
        });

        // 3. Hand the payment to the seller.
        let transfer = PaymentTransfer {
            certificate_id: id,
            buyer: caller.to_string(),
            seller: seller.clone(),
            amount: payment,
        };
        self.settling = Some(id);
        let outcome = handoff.forward(self, &transfer);
        self.settling = None;

        if let Err(e) = outcome {
            self.certificates.restore(previous_certificate);
            self.listings.restore(id, previous_listing);
            self.events.truncate(events_before);
            warn!(
                certificate_id = id,
                %seller,
                buyer = %caller,
                error = %e,
                "payment hand-off failed, purchase rolled back"
            );
            return Err(RegistryError::PaymentFailed(e.to_string()));
        }

        info!(
            certificate_id = id,
            %seller,
            buyer = %caller,
            price,
            payment,
            "certificate purchased"
        );
        Ok(())
    }

    /// Retires `id`. The caller must be a Consumer and the current owner.
    /// Any open listing is cleared.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Unauthorized`] if `caller` is not a Consumer.
    /// - [`RegistryError::NotFound`] for unknown ids.
    /// - [`RegistryError::NotOwner`] if `caller` does not own `id`.
    /// - [`RegistryError::AlreadyRetired`] if `id` is already retired.
    pub fn burn_token(&mut self, caller: &str, id: CertificateId) -> Result<(), RegistryError> {
        self.ensure_idle()?;
        self.roles.require(caller, Role::Consumer)?;
        self.certificates.require_owner(id, caller)?;
        self.certificates.retire(id)?;
        self.listings.clear(id);

        let certificate = self.certificates.get(id)?.clone();
        info!(
            certificate_id = id,
            owner = %caller,
            energy_amount = certificate.energy_amount,
            "certificate retired"
        );
        self.events.emit(RegistryEvent::Retired { certificate });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current owner of `id`.
    pub fn owner_of(&self, id: CertificateId) -> Result<&str, RegistryError> {
        self.certificates.owner_of(id)
    }

    /// Full record of `id`.
    pub fn certificate(&self, id: CertificateId) -> Result<&Certificate, RegistryError> {
        self.certificates.get(id)
    }

    /// `(is_for_sale, price)` for `id`.
    pub fn is_listed(&self, id: CertificateId) -> (bool, u64) {
        self.listings.is_listed(id)
    }

    /// Listing record for `id`.
    pub fn listing(&self, id: CertificateId) -> SaleListing {
        self.listings.get(id)
    }

    /// Lifecycle state of `id`.
    pub fn state_of(&self, id: CertificateId) -> Result<CertificateState, RegistryError> {
        let certificate = self.certificates.get(id)?;
        if !certificate.is_active {
            return Ok(CertificateState::Retired);
        }
        Ok(match self.listings.is_listed(id) {
            (true, price) => CertificateState::ActiveListed { price },
            (false, _) => CertificateState::ActiveUnlisted,
        })
    }

    /// Whether `principal` holds `role`.
    pub fn has_role(&self, role: Role, principal: &str) -> bool {
        self.roles.has_role(role, principal)
    }

    /// Roles held by `principal`.
    pub fn roles_of(&self, principal: &str) -> Vec<Role> {
        self.roles.roles_of(principal)
    }

    /// Ids currently owned by `principal`.
    pub fn owned_by(&self, principal: &str) -> Vec<CertificateId> {
        self.certificates.owned_by(principal)
    }

    /// Number of certificates ever issued.
    pub fn certificate_count(&self) -> usize {
        self.certificates.count()
    }

    /// Number of certificates currently for sale.
    pub fn listed_count(&self) -> usize {
        self.listings.listed_count()
    }

    /// Every notification emitted so far.
    pub fn events(&self) -> &[EventRecord] {
        self.events.records()
    }

    /// A page of notifications starting at `sequence`.
    pub fn events_since(&self, sequence: u64) -> &[EventRecord] {
        self.events.since(sequence)
    }
}
