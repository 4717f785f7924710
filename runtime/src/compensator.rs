//! Reversal of a reservation whose durable order could not be written.
//!
//! Steps run in a fixed order and each is attempted regardless of the others:
//!
//! 1. delete the partially written order by its actual order number
//! 2. return one unit to the stock ledger
//! 3. clear the requester's participation mark
//!
//! Failures are collected into a [`CompensationFailure`], logged at `error` and
//! counted. The caller of the flash sale never sees them.

use crate::metrics::FlashSaleMetrics;
use flashsale_core::environment::Clock;
use flashsale_core::{
    ActivityId, AdmissionGate, CompensationFailure, CompensationStep, OrderNumber,
    OrderRecorder, RequesterId,
};
use std::sync::Arc;

/// A granted reservation, as carried from admission to persistence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    /// Activity the unit came from
    pub activity_id: ActivityId,
    /// Requester holding the unit
    pub requester_id: RequesterId,
    /// Order number generated for this reservation
    pub order_number: OrderNumber,
}

/// Undoes reservations.
#[derive(Clone)]
pub struct Compensator {
    orders: Arc<dyn OrderRecorder>,
    gate: Arc<dyn AdmissionGate>,
    clock: Arc<dyn Clock>,
}

impl Compensator {
    /// Create a compensator over the recorder and gate the reservation touched.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderRecorder>,
        gate: Arc<dyn AdmissionGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            gate,
            clock,
        }
    }

    /// Undo `reservation`.
    ///
    /// # Errors
    ///
    /// Returns a [`CompensationFailure`] listing every step that failed. The
    /// failure has already been logged and counted when this returns.
    #[tracing::instrument(
        skip(self, reservation),
        fields(
            activity_id = %reservation.activity_id,
            requester_id = %reservation.requester_id,
            order_number = %reservation.order_number,
        )
    )]
    pub async fn compensate(&self, reservation: &Reservation) -> Result<(), CompensationFailure> {
        FlashSaleMetrics::record_compensation();
        let mut failures = Vec::new();

        let now = self.clock.now();
        match self
            .orders
            .delete_by_number(&reservation.order_number, now)
            .await
        {
            Ok(true) => tracing::warn!("Removed partially written order"),
            Ok(false) => tracing::debug!("No partial order to remove"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to remove partial order");
                failures.push((CompensationStep::DeleteOrder, e));
            }
        }

        match self.gate.restore(reservation.activity_id, 1).await {
            Ok(Some(remaining)) => {
                tracing::debug!(remaining, "Returned unit to stock ledger");
                FlashSaleMetrics::record_stock(reservation.activity_id, remaining);
            }
            Ok(None) => {
                tracing::warn!("Stock ledger entry missing; next warm-up re-seeds it");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to return unit to stock ledger");
                failures.push((CompensationStep::RestoreStock, e));
            }
        }

        match self
            .gate
            .unmark(reservation.activity_id, reservation.requester_id)
            .await
        {
            Ok(existed) => tracing::debug!(existed, "Cleared participation mark"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to clear participation mark");
                failures.push((CompensationStep::Unmark, e));
            }
        }

        if failures.is_empty() {
            tracing::info!("Reservation compensated");
            return Ok(());
        }

        let failure = CompensationFailure {
            activity_id: reservation.activity_id,
            requester_id: reservation.requester_id,
            order_number: reservation.order_number.clone(),
            failures,
        };
        FlashSaleMetrics::record_compensation_failure();
        tracing::error!(
            failure = %failure,
            "Compensation incomplete, manual reconciliation required"
        );
        Err(failure)
    }
}

impl std::fmt::Debug for Compensator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compensator").finish_non_exhaustive()
    }
}
