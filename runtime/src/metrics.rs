//! Prometheus metrics for the allocation core.
//!
//! Recording goes through the `metrics` facade, so it is a no-op until a recorder
//! is installed. The server installs the Prometheus recorder once at startup with
//! [`install_recorder`] and serves [`PrometheusHandle::render`] on `/metrics`.

use flashsale_core::ActivityId;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Describe all metrics and install the global Prometheus recorder.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built or a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "flashsale_requests_total",
        "Flash-sale requests by outcome"
    );
    describe_counter!(
        "flashsale_orders_created_total",
        "Orders durably created"
    );
    describe_counter!(
        "flashsale_compensations_total",
        "Reservations rolled back after a persistence failure"
    );
    describe_counter!(
        "flashsale_compensation_failures_total",
        "Compensations that left stock or marks leaked (manual reconciliation)"
    );
    describe_counter!(
        "flashsale_ledger_warmups_total",
        "Stock ledger entries seeded from the durable counter"
    );
    describe_counter!(
        "flashsale_store_conflicts_total",
        "Durable order writes refused by a stock or uniqueness check"
    );
    describe_histogram!(
        "flashsale_admission_duration_seconds",
        "Time taken by the combined admission decision"
    );
    describe_histogram!(
        "flashsale_persist_duration_seconds",
        "Time taken by the durable order write"
    );
    describe_gauge!(
        "flashsale_stock_remaining",
        "Remaining units in the stock ledger"
    );
}

/// Flash-sale metrics recorder.
pub struct FlashSaleMetrics;

impl FlashSaleMetrics {
    /// Record a finished `ExecuteFlashSale` call.
    pub fn record_request(outcome: &'static str) {
        counter!("flashsale_requests_total", "outcome" => outcome).increment(1);
    }

    /// Record an admission decision.
    pub fn record_admission(duration: Duration) {
        histogram!("flashsale_admission_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record the durable write, successful or not.
    pub fn record_persist(duration: Duration) {
        histogram!("flashsale_persist_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a created order.
    pub fn record_order_created() {
        counter!("flashsale_orders_created_total").increment(1);
    }

    /// Record a compensation run.
    pub fn record_compensation() {
        counter!("flashsale_compensations_total").increment(1);
    }

    /// Record a compensation that could not fully undo a reservation.
    pub fn record_compensation_failure() {
        counter!("flashsale_compensation_failures_total").increment(1);
    }

    /// Record a ledger warm-up.
    pub fn record_warmup() {
        counter!("flashsale_ledger_warmups_total").increment(1);
    }

    /// Publish the ledger's remaining stock for an activity.
    pub fn record_stock(activity_id: ActivityId, remaining: u32) {
        gauge!("flashsale_stock_remaining", "activity_id" => activity_id.to_string())
            .set(f64::from(remaining));
    }
}
