//! Integration tests for the certificate lifecycle.
//!
//! These tests drive the registry through its public API the way an
//! external caller would: role setup, issuance, listing, purchase and
//! retirement, including the rejected paths and their lack of side effects.

use gridcert_contracts::{
    terms_digest, CertificateRegistry, CertificateState, CertificateTerms, PayoutLedger,
    RegistryError, RegistryEvent, Role,
};

/// Helper: terms for `amount` MWh delivered over `[start, end)`.
fn terms(amount: u64, start: u64, end: u64) -> CertificateTerms {
    CertificateTerms {
        energy_amount: amount,
        price_per_unit: 2,
        start_date: start,
        end_date: end,
        source_type: "solar".into(),
        delivery_point: "NL-TTF-01".into(),
        contract_terms_hash: terms_digest(b"power purchase agreement v1"),
        metadata_ref: "ipfs://bafy-cert".into(),
    }
}

/// Helper: registry with a provider `plant` and a consumer `alice`.
fn setup() -> CertificateRegistry {
    let mut registry = CertificateRegistry::new("admin");
    registry.add_provider("admin", "plant").unwrap();
    registry.register_as_consumer("alice").unwrap();
    registry
}

// ---------------------------------------------------------------------------
// Lifecycle Tests
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle_happy_path() {
    let mut registry = setup();
    let mut ledger = PayoutLedger::new();

    // 1. Create
    let id = registry.create_token("plant", terms(100, 100, 200)).unwrap();
    assert_eq!(id, 1);
    assert!(registry.certificate(id).unwrap().is_active);
    assert_eq!(registry.owner_of(id).unwrap(), "plant");

    // 2. List
    registry.list_token_for_sale("plant", id, 50).unwrap();
    assert_eq!(registry.is_listed(id), (true, 50));

    // 3. Buy with overpayment
    registry.buy_token("alice", id, 60, &mut ledger).unwrap();
    assert_eq!(registry.owner_of(id).unwrap(), "alice");
    assert!(!registry.is_listed(id).0);
    assert_eq!(ledger.balance_of("plant"), 60);

    // 4. Burn
    registry.burn_token("alice", id).unwrap();
    assert!(!registry.certificate(id).unwrap().is_active);
    assert_eq!(registry.state_of(id).unwrap(), CertificateState::Retired);

    // 5. Burn again
    assert_eq!(
        registry.burn_token("alice", id),
        Err(RegistryError::AlreadyRetired(id))
    );
    assert!(!registry.certificate(id).unwrap().is_active);
}

#[test]
fn notifications_follow_transitions_in_order() {
    let mut registry = setup();
    let mut ledger = PayoutLedger::new();
    let id = registry.create_token("plant", terms(100, 100, 200)).unwrap();
    registry.list_token_for_sale("plant", id, 50).unwrap();
    registry.withdraw_token_from_sale("plant", id).unwrap();
    registry.list_token_for_sale("plant", id, 40).unwrap();
    registry.buy_token("alice", id, 40, &mut ledger).unwrap();
    registry.burn_token("alice", id).unwrap();

    let kinds: Vec<&str> = registry.events().iter().map(|r| r.event.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "role_granted",
            "role_granted",
            "created",
            "listed",
            "withdrawn",
            "listed",
            "purchased",
            "retired",
        ]
    );

    let sequences: Vec<u64> = registry.events().iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, (0..8).collect::<Vec<u64>>());

    match &registry.events()[6].event {
        RegistryEvent::Purchased {
            seller,
            buyer,
            price,
            payment,
            ..
        } => {
            assert_eq!(seller, "plant");
            assert_eq!(buyer, "alice");
            assert_eq!(*price, 40);
            assert_eq!(*payment, 40);
        }
        other => panic!("expected purchase, got {:?}", other),
    }
    match &registry.events()[7].event {
        RegistryEvent::Retired { certificate } => {
            assert_eq!(certificate.owner, "alice");
            assert!(!certificate.is_active);
        }
        other => panic!("expected retirement, got {:?}", other),
    }
}

#[test]
fn ids_strictly_increase() {
    let mut registry = setup();
    let mut last = 0;
    for amount in 1..=5 {
        let id = registry.create_token("plant", terms(amount, 10, 20)).unwrap();
        assert!(id > last);
        last = id;
        let cert = registry.certificate(id).unwrap();
        assert_eq!(cert.owner, "plant");
        assert_eq!(cert.issuer, "plant");
        assert!(cert.is_active);
    }
    assert_eq!(registry.owned_by("plant"), vec![1, 2, 3, 4, 5]);
}

#[test]
fn resale_by_new_owner() {
    let mut registry = setup();
    registry.register_as_consumer("bob").unwrap();
    let mut ledger = PayoutLedger::new();
    let id = registry.create_token("plant", terms(100, 100, 200)).unwrap();

    registry.list_token_for_sale("plant", id, 50).unwrap();
    registry.buy_token("alice", id, 50, &mut ledger).unwrap();

    // Old owner can no longer list or withdraw.
    assert!(matches!(
        registry.list_token_for_sale("plant", id, 10),
        Err(RegistryError::NotOwner { .. })
    ));

    registry.list_token_for_sale("alice", id, 80).unwrap();
    registry.buy_token("bob", id, 80, &mut ledger).unwrap();
    assert_eq!(registry.owner_of(id).unwrap(), "bob");
    assert_eq!(ledger.balance_of("plant"), 50);
    assert_eq!(ledger.balance_of("alice"), 80);
}

// ---------------------------------------------------------------------------
// Error Cases
// ---------------------------------------------------------------------------

#[test]
fn invalid_creation_leaves_state_unchanged() {
    let mut registry = setup();
    let before = registry.clone();

    assert_eq!(
        registry.create_token("plant", terms(0, 100, 200)),
        Err(RegistryError::InvalidAmount)
    );
    assert_eq!(
        registry.create_token("plant", terms(10, 200, 100)),
        Err(RegistryError::InvalidWindow {
            start: 200,
            end: 100
        })
    );
    assert_eq!(
        registry.create_token("plant", terms(10, 150, 150)),
        Err(RegistryError::InvalidWindow {
            start: 150,
            end: 150
        })
    );
    assert_eq!(registry, before);

    // The next successful issuance still gets id 1.
    assert_eq!(registry.create_token("plant", terms(10, 1, 2)).unwrap(), 1);
}

#[test]
fn consumer_cannot_issue() {
    let mut registry = setup();
    assert_eq!(
        registry.create_token("alice", terms(10, 1, 2)),
        Err(RegistryError::Unauthorized {
            principal: "alice".into(),
            role: Role::Provider,
        })
    );
}

#[test]
fn only_admin_adds_providers() {
    let mut registry = setup();
    assert!(registry.add_provider("plant", "alice").is_err());
    assert!(!registry.has_role(Role::Provider, "alice"));
    registry.add_provider("admin", "alice").unwrap();
    assert!(registry.has_role(Role::Provider, "alice"));
}

#[test]
fn non_owner_cannot_list_or_withdraw() {
    let mut registry = setup();
    let id = registry.create_token("plant", terms(100, 100, 200)).unwrap();
    assert!(matches!(
        registry.list_token_for_sale("alice", id, 1),
        Err(RegistryError::NotOwner { .. })
    ));
    registry.list_token_for_sale("plant", id, 5).unwrap();
    assert!(matches!(
        registry.withdraw_token_from_sale("alice", id),
        Err(RegistryError::NotOwner { .. })
    ));
    assert_eq!(registry.is_listed(id), (true, 5));
}

#[test]
fn unknown_ids_are_not_found() {
    let mut registry = setup();
    let mut ledger = PayoutLedger::new();
    assert_eq!(registry.owner_of(42), Err(RegistryError::NotFound(42)));
    assert_eq!(
        registry.list_token_for_sale("plant", 42, 1),
        Err(RegistryError::NotFound(42))
    );
    assert_eq!(
        registry.buy_token("alice", 42, 1, &mut ledger),
        Err(RegistryError::NotFound(42))
    );
    assert_eq!(registry.burn_token("alice", 42), Err(RegistryError::NotFound(42)));
}

#[test]
fn failed_purchases_leave_owner_and_listing() {
    let mut registry = setup();
    let mut ledger = PayoutLedger::new();
    let id = registry.create_token("plant", terms(100, 100, 200)).unwrap();

    // Not listed yet.
    assert_eq!(
        registry.buy_token("alice", id, 100, &mut ledger),
        Err(RegistryError::NotForSale(id))
    );

    registry.list_token_for_sale("plant", id, 50).unwrap();
    let before = registry.clone();
    assert!(matches!(
        registry.buy_token("alice", id, 49, &mut ledger),
        Err(RegistryError::InsufficientPayment { .. })
    ));
    assert_eq!(registry, before);
    assert_eq!(registry.owner_of(id).unwrap(), "plant");
    assert_eq!(registry.is_listed(id), (true, 50));
    assert_eq!(ledger.total_paid_out(), 0);
}

#[test]
fn retired_certificate_cannot_be_listed() {
    let mut registry = setup();
    registry.register_as_consumer("plant").unwrap();
    let id = registry.create_token("plant", terms(100, 100, 200)).unwrap();
    registry.burn_token("plant", id).unwrap();
    assert_eq!(
        registry.list_token_for_sale("plant", id, 5),
        Err(RegistryError::AlreadyRetired(id))
    );
}
