//! # Role Registry
//!
//! Tracks which principals hold which roles. Three roles exist:
//!
//! - **Admin**: granted to the initializer when the registry is created.
//!   Administers every role, itself included.
//! - **Provider**: may issue new certificates. Granted by an Admin.
//! - **Consumer**: may retire certificates it owns. Any principal may grant
//!   this role to itself.
//!
//! There is no revocation. Once granted, a role is held for the life of
//! the registry.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::RegistryError;

/// A named capability held by a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Bootstrap role. Administers all roles.
    Admin,
    /// Energy provider. May issue certificates.
    Provider,
    /// Energy consumer. May retire owned certificates.
    Consumer,
}

impl Role {
    /// The role whose holders may grant `self`.
    pub fn admin_role(self) -> Role {
        match self {
            Role::Admin | Role::Provider | Role::Consumer => Role::Admin,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::Provider => write!(f, "Provider"),
            Role::Consumer => write!(f, "Consumer"),
        }
    }
}

/// Role membership table keyed by principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistry {
    members: BTreeMap<String, BTreeSet<Role>>,
}

impl RoleRegistry {
    /// Creates a registry in which `admin` holds the Admin role.
    pub fn bootstrap(admin: &str) -> Self {
        let mut registry = Self::default();
        registry
            .members
            .entry(admin.to_string())
            .or_default()
            .insert(Role::Admin);
        registry
    }

    /// Grants `role` to `principal` on behalf of `caller`.
    ///
    /// Returns `Ok(true)` when the role was newly granted and `Ok(false)`
    /// when `principal` already held it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unauthorized`] unless `caller` holds the
    /// admin role of `role`, or the grant is a self-registration as Consumer.
    pub fn grant_role(
        &mut self,
        caller: &str,
        role: Role,
        principal: &str,
    ) -> Result<bool, RegistryError> {
        let self_registration = role == Role::Consumer && caller == principal;
        if !self_registration {
            self.require(caller, role.admin_role())?;
        }

        let newly_granted = self
            .members
            .entry(principal.to_string())
            .or_default()
            .insert(role);
        debug!(%caller, %principal, %role, newly_granted, "role grant");
        Ok(newly_granted)
    }

    /// Returns `true` if `principal` holds `role`.
    pub fn has_role(&self, role: Role, principal: &str) -> bool {
        self.members
            .get(principal)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    /// Capability check used at every operation's entry guard.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unauthorized`] if `principal` lacks `role`.
    pub fn require(&self, principal: &str, role: Role) -> Result<(), RegistryError> {
        if self.has_role(role, principal) {
            Ok(())
        } else {
            Err(RegistryError::Unauthorized {
                principal: principal.to_string(),
                role,
            })
        }
    }

    /// All roles held by `principal`, in declaration order.
    pub fn roles_of(&self, principal: &str) -> Vec<Role> {
        self.members
            .get(principal)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }
}
