//! # Operation Replay
//!
//! Applies a JSON array of [`Operation`]s to a fresh registry in file
//! order, the way an ordering substrate would feed them, and prints one
//! JSON line per operation followed by a summary line.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::Write;

use gridcert_contracts::{Operation, Receipt};

use crate::cli::ReplayArgs;
use crate::state::NodeLedger;

/// Result of one replayed operation.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplayOutcome {
    /// The operation was committed.
    Applied {
        /// Position in the input file.
        index: usize,
        /// The receipt.
        receipt: Receipt,
    },
    /// The operation was rejected.
    Rejected {
        /// Position in the input file.
        index: usize,
        /// Operation kind.
        operation: String,
        /// Error kind.
        kind: String,
        /// Error message.
        error: String,
    },
}

impl ReplayOutcome {
    fn is_rejected(&self) -> bool {
        matches!(self, ReplayOutcome::Rejected { .. })
    }
}

/// Final line printed after all outcomes.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    /// Operations committed.
    pub applied: usize,
    /// Operations rejected.
    pub rejected: usize,
    /// Certificates issued in total.
    pub certificates: usize,
    /// Notifications in the log.
    pub events: usize,
}

/// Applies `ops` in order. With `fail_fast`, stops after the first rejection.
pub fn replay(ledger: &mut NodeLedger, ops: Vec<Operation>, fail_fast: bool) -> Vec<ReplayOutcome> {
    let mut outcomes = Vec::with_capacity(ops.len());
    for (index, op) in ops.into_iter().enumerate() {
        let operation = op.kind().to_string();
        let outcome = match ledger.apply(op) {
            Ok(receipt) => ReplayOutcome::Applied { index, receipt },
            Err(e) => {
                tracing::warn!(index, %operation, error = %e, "operation rejected");
                ReplayOutcome::Rejected {
                    index,
                    operation,
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                }
            }
        };
        let stop = fail_fast && outcome.is_rejected();
        outcomes.push(outcome);
        if stop {
            break;
        }
    }
    outcomes
}

/// Entry point for `gridcert-node replay`.
pub fn run(args: ReplayArgs) -> Result<()> {
    let raw = std::fs::read(&args.operations)
        .with_context(|| format!("failed to read {}", args.operations.display()))?;
    let ops: Vec<Operation> = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse operations in {}", args.operations.display()))?;
    tracing::info!(count = ops.len(), "replaying operations");

    let mut ledger = NodeLedger::new(&args.admin);
    let outcomes = replay(&mut ledger, ops, args.fail_fast);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for outcome in &outcomes {
        serde_json::to_writer(&mut out, outcome)?;
        writeln!(out)?;
    }

    let rejected = outcomes.iter().filter(|o| o.is_rejected()).count();
    let summary = ReplaySummary {
        applied: outcomes.len() - rejected,
        rejected,
        certificates: ledger.registry.certificate_count(),
        events: ledger.registry.events().len(),
    };
    serde_json::to_writer(&mut out, &summary)?;
    writeln!(out)?;

    if let Some(path) = &args.snapshot_out {
        ledger.save(path)?;
    }

    if args.fail_fast && rejected > 0 {
        bail!("replay stopped at first rejected operation");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcert_contracts::CertificateTerms;

    fn ops() -> Vec<Operation> {
        vec![
            Operation::AddProvider {
                caller: "admin".into(),
                provider: "plant".into(),
            },
            Operation::RegisterAsConsumer {
                caller: "alice".into(),
            },
            Operation::CreateToken {
                caller: "plant".into(),
                terms: CertificateTerms {
                    energy_amount: 100,
                    price_per_unit: 1,
                    start_date: 100,
                    end_date: 200,
                    source_type: "solar".into(),
                    delivery_point: "NL".into(),
                    contract_terms_hash: "t".into(),
                    metadata_ref: String::new(),
                },
            },
            Operation::ListTokenForSale {
                caller: "plant".into(),
                id: 1,
                price: 50,
            },
            Operation::BuyToken {
                caller: "alice".into(),
                id: 1,
                payment: 60,
            },
            Operation::BurnToken {
                caller: "alice".into(),
                id: 1,
            },
            Operation::BurnToken {
                caller: "alice".into(),
                id: 1,
            },
        ]
    }

    #[test]
    fn replay_applies_in_order_and_reports_rejections() {
        let mut ledger = NodeLedger::new("admin");
        let outcomes = replay(&mut ledger, ops(), false);

        assert_eq!(outcomes.len(), 7);
        assert!(outcomes[..6].iter().all(|o| !o.is_rejected()));
        match &outcomes[6] {
            ReplayOutcome::Rejected { kind, index, .. } => {
                assert_eq!(kind, "already_retired");
                assert_eq!(*index, 6);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(ledger.payouts.balance_of("plant"), 60);
        assert!(!ledger.registry.certificate(1).unwrap().is_active);
    }

    #[test]
    fn fail_fast_stops_at_first_rejection() {
        let mut ledger = NodeLedger::new("admin");
        let mut input = ops();
        input.insert(
            0,
            Operation::BurnToken {
                caller: "alice".into(),
                id: 1,
            },
        );
        let outcomes = replay(&mut ledger, input, true);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_rejected());
        assert_eq!(ledger.registry.certificate_count(), 0);
    }

    #[test]
    fn run_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let ops_path = dir.path().join("ops.json");
        let snapshot = dir.path().join("snapshot.json");
        std::fs::write(&ops_path, serde_json::to_vec(&ops()).unwrap()).unwrap();

        run(ReplayArgs {
            operations: ops_path,
            admin: "admin".into(),
            snapshot_out: Some(snapshot.clone()),
            fail_fast: false,
        })
        .unwrap();

        let restored = NodeLedger::load_or_new(&snapshot, "admin").unwrap();
        assert_eq!(restored.registry.certificate_count(), 1);
        assert_eq!(restored.registry.owner_of(1).unwrap(), "alice");
    }
}
