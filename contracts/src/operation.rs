//! # Operations
//!
//! A serializable form of every mutating registry call, each tagged with the
//! principal making it. An ordering substrate (a log, a single-writer
//! service, a replay file) feeds these to
//! [`CertificateRegistry::apply`] one at a time.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::certificates::CertificateTerms;
use crate::error::RegistryError;
use crate::events::EventRecord;
use crate::payment::PaymentHandoff;
use crate::registry::CertificateRegistry;
use crate::roles::Role;
use crate::CertificateId;

/// One mutating call against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Caller grants itself the Consumer role.
    RegisterAsConsumer {
        /// Calling principal.
        caller: String,
    },
    /// Admin grants the Provider role.
    AddProvider {
        /// Calling principal.
        caller: String,
        /// Principal receiving the role.
        provider: String,
    },
    /// Admin grants an arbitrary role.
    GrantRole {
        /// Calling principal.
        caller: String,
        /// Role to grant.
        role: Role,
        /// Principal receiving the role.
        principal: String,
    },
    /// Provider issues a certificate.
    CreateToken {
        /// Calling principal, who becomes issuer and owner.
        caller: String,
        /// Certificate terms.
        terms: CertificateTerms,
    },
    /// Owner lists a certificate.
    ListTokenForSale {
        /// Calling principal.
        caller: String,
        /// Certificate id.
        id: CertificateId,
        /// Asking price.
        price: u64,
    },
    /// Owner withdraws a listing.
    WithdrawTokenFromSale {
        /// Calling principal.
        caller: String,
        /// Certificate id.
        id: CertificateId,
    },
    /// Buyer purchases a listed certificate with an attached payment.
    BuyToken {
        /// Calling principal.
        caller: String,
        /// Certificate id.
        id: CertificateId,
        /// Attached payment.
        payment: u64,
    },
    /// Owning Consumer retires a certificate.
    BurnToken {
        /// Calling principal.
        caller: String,
        /// Certificate id.
        id: CertificateId,
    },
}

impl Operation {
    /// The principal making the call.
    pub fn caller(&self) -> &str {
        match self {
            Operation::RegisterAsConsumer { caller }
            | Operation::AddProvider { caller, .. }
            | Operation::GrantRole { caller, .. }
            | Operation::CreateToken { caller, .. }
            | Operation::ListTokenForSale { caller, .. }
            | Operation::WithdrawTokenFromSale { caller, .. }
            | Operation::BuyToken { caller, .. }
            | Operation::BurnToken { caller, .. } => caller,
        }
    }

    /// Short name of the operation, matching its serialized tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::RegisterAsConsumer { .. } => "register_as_consumer",
            Operation::AddProvider { .. } => "add_provider",
            Operation::GrantRole { .. } => "grant_role",
            Operation::CreateToken { .. } => "create_token",
            Operation::ListTokenForSale { .. } => "list_token_for_sale",
            Operation::WithdrawTokenFromSale { .. } => "withdraw_token_from_sale",
            Operation::BuyToken { .. } => "buy_token",
            Operation::BurnToken { .. } => "burn_token",
        }
    }
}

/// What a successfully applied operation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Operation kind.
    pub operation: String,
    /// Certificate the operation acted on, or the id it issued.
    pub certificate_id: Option<CertificateId>,
    /// Notifications emitted by the operation, nested calls included.
    pub events: Vec<EventRecord>,
}

impl CertificateRegistry {
    /// Applies `op`, settling any purchase payment through `handoff`.
    ///
    /// # Errors
    ///
    /// Whatever the underlying operation returns; the registry is unchanged.
    pub fn apply(
        &mut self,
        op: Operation,
        handoff: &mut dyn PaymentHandoff,
    ) -> Result<Receipt, RegistryError> {
        let kind = op.kind();
        let first_event = self.events().len() as u64;

        let result = match op {
            Operation::RegisterAsConsumer { caller } => {
                self.register_as_consumer(&caller).map(|_| None)
            }
            Operation::AddProvider { caller, provider } => {
                self.add_provider(&caller, &provider).map(|_| None)
            }
            Operation::GrantRole {
                caller,
                role,
                principal,
            } => self.grant_role(&caller, role, &principal).map(|_| None),
            Operation::CreateToken { caller, terms } => {
                self.create_token(&caller, terms).map(Some)
            }
            Operation::ListTokenForSale { caller, id, price } => self
                .list_token_for_sale(&caller, id, price)
                .map(|_| Some(id)),
            Operation::WithdrawTokenFromSale { caller, id } => {
                self.withdraw_token_from_sale(&caller, id).map(|_| Some(id))
            }
            Operation::BuyToken {
                caller,
                id,
                payment,
            } => self
                .buy_token(&caller, id, payment, handoff)
                .map(|_| Some(id)),
            Operation::BurnToken { caller, id } => self.burn_token(&caller, id).map(|_| Some(id)),
        };

        match result {
            Ok(certificate_id) => Ok(Receipt {
                operation: kind.to_string(),
                certificate_id,
                events: self.events_since(first_event).to_vec(),
            }),
            Err(e) => {
                debug!(operation = kind, error = %e, "operation rejected");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PayoutLedger;

    fn create(caller: &str) -> Operation {
        Operation::CreateToken {
            caller: caller.into(),
            terms: CertificateTerms {
                energy_amount: 10,
                price_per_unit: 1,
                start_date: 1,
                end_date: 2,
                source_type: "solar".into(),
                delivery_point: "ES-1".into(),
                contract_terms_hash: "t".into(),
                metadata_ref: String::new(),
            },
        }
    }

    #[test]
    fn apply_returns_issued_id_and_events() {
        let mut registry = CertificateRegistry::new("root");
        let mut ledger = PayoutLedger::new();
        registry
            .apply(
                Operation::AddProvider {
                    caller: "root".into(),
                    provider: "plant".into(),
                },
                &mut ledger,
            )
            .unwrap();
        let receipt = registry.apply(create("plant"), &mut ledger).unwrap();
        assert_eq!(receipt.operation, "create_token");
        assert_eq!(receipt.certificate_id, Some(1));
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(receipt.events[0].event.kind(), "created");
    }

    #[test]
    fn apply_propagates_rejection() {
        let mut registry = CertificateRegistry::new("root");
        let mut ledger = PayoutLedger::new();
        let err = registry.apply(create("mallory"), &mut ledger).unwrap_err();
        assert_eq!(err.kind(), "unauthorized");
        assert!(registry.events().is_empty());
    }

    #[test]
    fn operations_parse_from_tagged_json() {
        let json = r#"[
            {"op": "register_as_consumer", "caller": "alice"},
            {"op": "buy_token", "caller": "alice", "id": 1, "payment": 60},
            {"op": "grant_role", "caller": "root", "role": "Provider", "principal": "plant"}
        ]"#;
        let ops: Vec<Operation> = serde_json::from_str(json).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1].kind(), "buy_token");
        assert_eq!(ops[1].caller(), "alice");
        assert_eq!(
            ops[2],
            Operation::GrantRole {
                caller: "root".into(),
                role: Role::Provider,
                principal: "plant".into()
            }
        );
    }
}
