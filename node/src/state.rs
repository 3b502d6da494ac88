//! # Node Ledger State
//!
//! Everything the node persists: the certificate registry and the payout
//! book that purchase payments are forwarded into. Both are saved together
//! as one JSON snapshot so they can never drift apart on disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use gridcert_contracts::{CertificateRegistry, Operation, PayoutLedger, Receipt, RegistryError};

/// Registry plus payout book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLedger {
    /// The certificate registry.
    pub registry: CertificateRegistry,
    /// Payments forwarded to sellers.
    pub payouts: PayoutLedger,
}

impl NodeLedger {
    /// A fresh ledger administered by `admin`.
    pub fn new(admin: &str) -> Self {
        Self {
            registry: CertificateRegistry::new(admin),
            payouts: PayoutLedger::new(),
        }
    }

    /// Applies `op`, settling purchases into the payout book.
    pub fn apply(&mut self, op: Operation) -> Result<Receipt, RegistryError> {
        self.registry.apply(op, &mut self.payouts)
    }

    /// Loads a snapshot from `path`, or starts fresh with `admin` if the file
    /// does not exist yet.
    pub fn load_or_new(path: &Path, admin: &str) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no snapshot found, starting fresh registry");
            return Ok(Self::new(admin));
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let ledger: NodeLedger = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            certificates = ledger.registry.certificate_count(),
            events = ledger.registry.events().len(),
            "snapshot loaded"
        );
        Ok(ledger)
    }

    /// Writes the snapshot to `path`, replacing it atomically via a
    /// temporary sibling file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).context("failed to serialize snapshot")?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)
            .with_context(|| format!("failed to write snapshot {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to move snapshot into {}", path.display()))?;
        tracing::info!(path = %path.display(), "snapshot saved");
        Ok(())
    }
}
