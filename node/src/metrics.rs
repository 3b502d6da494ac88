//! # Prometheus Metrics
//!
//! Exposes registry activity to Prometheus at the `/metrics` HTTP endpoint
//! on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use gridcert_contracts::{CertificateRegistry, RegistryError, RegistryEvent};

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are reference counted) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Operations committed, by operation kind.
    pub operations_applied_total: IntCounterVec,
    /// Operations rejected, by operation kind and error kind.
    pub operations_rejected_total: IntCounterVec,
    /// Certificates issued.
    pub certificates_created_total: IntCounter,
    /// Certificates retired.
    pub certificates_retired_total: IntCounter,
    /// Completed purchases.
    pub purchases_total: IntCounter,
    /// Sum of payments forwarded to sellers.
    pub purchase_volume_total: IntCounter,
    /// Certificates currently listed for sale.
    pub certificates_listed: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("gridcert".into()), None)
            .expect("failed to create prometheus registry");

        let operations_applied_total = IntCounterVec::new(
            Opts::new(
                "operations_applied_total",
                "Total number of registry operations committed",
            ),
            &["operation"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(operations_applied_total.clone()))
            .expect("metric registration");

        let operations_rejected_total = IntCounterVec::new(
            Opts::new(
                "operations_rejected_total",
                "Total number of registry operations rejected",
            ),
            &["operation", "error"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(operations_rejected_total.clone()))
            .expect("metric registration");

        let certificates_created_total =
            IntCounter::new("certificates_created_total", "Total certificates issued")
                .expect("metric creation");
        registry
            .register(Box::new(certificates_created_total.clone()))
            .expect("metric registration");

        let certificates_retired_total =
            IntCounter::new("certificates_retired_total", "Total certificates retired")
                .expect("metric creation");
        registry
            .register(Box::new(certificates_retired_total.clone()))
            .expect("metric registration");

        let purchases_total = IntCounter::new("purchases_total", "Total completed purchases")
            .expect("metric creation");
        registry
            .register(Box::new(purchases_total.clone()))
            .expect("metric registration");

        let purchase_volume_total = IntCounter::new(
            "purchase_volume_total",
            "Sum of all payments forwarded to sellers",
        )
        .expect("metric creation");
        registry
            .register(Box::new(purchase_volume_total.clone()))
            .expect("metric registration");

        let certificates_listed = IntGauge::new(
            "certificates_listed",
            "Number of certificates currently listed for sale",
        )
        .expect("metric creation");
        registry
            .register(Box::new(certificates_listed.clone()))
            .expect("metric registration");

        Self {
            registry,
            operations_applied_total,
            operations_rejected_total,
            certificates_created_total,
            certificates_retired_total,
            purchases_total,
            purchase_volume_total,
            certificates_listed,
        }
    }

    /// Records a committed operation and the notifications it produced.
    pub fn record_applied(
        &self,
        operation: &str,
        events: &[RegistryEvent],
        registry: &CertificateRegistry,
    ) {
        self.operations_applied_total
            .with_label_values(&[operation])
            .inc();
        for event in events {
            match event {
                RegistryEvent::Created { .. } => self.certificates_created_total.inc(),
                RegistryEvent::Retired { .. } => self.certificates_retired_total.inc(),
                RegistryEvent::Purchased { payment, .. } => {
                    self.purchases_total.inc();
                    self.purchase_volume_total.inc_by(*payment);
                }
                _ => {}
            }
        }
        self.certificates_listed.set(registry.listed_count() as i64);
    }

    /// Records a rejected operation.
    pub fn record_rejected(&self, operation: &str, error: &RegistryError) {
        self.operations_rejected_total
            .with_label_values(&[operation, error.kind()])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
