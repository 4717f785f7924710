//! Reservation coordinator: the `ExecuteFlashSale` algorithm.
//!
//! Each step is a hard gate:
//!
//! 1. the activity exists and `now` is inside its window
//! 2. the requester holds no live durable order for it
//! 3. one combined admission decision takes a unit and marks the requester
//! 4. the order is written durably, with the durable counter, under a deadline
//!
//! Steps 1 to 3 reject without side effects. A failure in step 4 is never
//! retried; the reservation is compensated and the caller told to retry.

use crate::compensator::{Compensator, Reservation};
use crate::environment::FlashSaleEnvironment;
use crate::metrics::FlashSaleMetrics;
use flashsale_core::{
    Activity, ActivityId, Admission, FlashSaleError, FlashSaleOrder, NewOrder, PaymentMethod,
    RequesterId, SaleWindow,
};
use std::time::{Duration, Instant};

/// Drives a single flash-sale attempt from validation to durable order.
#[derive(Debug, Clone)]
pub struct ReservationCoordinator {
    env: FlashSaleEnvironment,
    compensator: Compensator,
}

impl ReservationCoordinator {
    /// Create a coordinator over the given environment.
    #[must_use]
    pub fn new(env: FlashSaleEnvironment) -> Self {
        let compensator =
            Compensator::new(env.orders.clone(), env.gate.clone(), env.clock.clone());
        Self { env, compensator }
    }

    /// Attempt to win one unit of `activity_id` for `requester`.
    ///
    /// # Errors
    ///
    /// - `ActivityNotFound`, `ActivityNotYetOpen`, `ActivityClosed`: validation
    /// - `AlreadyParticipated`, `OutOfStock`: admission
    /// - `PersistenceFailure`: a store failed; any reservation was compensated
    #[tracing::instrument(skip_all, fields(requester_id = %requester, activity_id = %activity_id))]
    pub async fn execute(
        &self,
        requester: RequesterId,
        activity_id: ActivityId,
        payment_method: PaymentMethod,
    ) -> Result<FlashSaleOrder, FlashSaleError> {
        let result = self.run(requester, activity_id, payment_method).await;
        match &result {
            Ok(order) => {
                FlashSaleMetrics::record_request("ordered");
                tracing::info!(order_number = %order.order_number, "Flash sale order created");
            }
            Err(e) if e.is_rejection() => {
                FlashSaleMetrics::record_request(e.outcome());
                tracing::debug!(outcome = e.outcome(), "Flash sale rejected");
            }
            Err(e) => {
                FlashSaleMetrics::record_request(e.outcome());
                tracing::warn!(error = ?e, "Flash sale failed");
            }
        }
        result
    }

    async fn run(
        &self,
        requester: RequesterId,
        activity_id: ActivityId,
        payment_method: PaymentMethod,
    ) -> Result<FlashSaleOrder, FlashSaleError> {
        let now = self.env.clock.now();

        let activity = self
            .env
            .activities
            .get(activity_id)
            .await?
            .ok_or(FlashSaleError::ActivityNotFound)?;
        match activity.window_at(now) {
            SaleWindow::NotYetOpen { wait_millis } => {
                return Err(FlashSaleError::ActivityNotYetOpen { wait_millis });
            }
            SaleWindow::Closed => return Err(FlashSaleError::ActivityClosed),
            SaleWindow::Open => {}
        }

        // Independent of the guard: covers expired or never-written marks.
        if self
            .env
            .orders
            .find_live_order(requester, activity_id)
            .await?
            .is_some()
        {
            return Err(FlashSaleError::AlreadyParticipated);
        }

        let ttl = activity.ledger_ttl(now, self.env.settings.expiry_margin);
        let remaining = self.admit(&activity, requester, ttl).await?;
        FlashSaleMetrics::record_stock(activity_id, remaining);

        let reservation = Reservation {
            activity_id,
            requester_id: requester,
            order_number: self.env.order_numbers.next(now),
        };
        tracing::debug!(
            order_number = %reservation.order_number,
            remaining,
            "Reservation granted"
        );

        self.persist(reservation, payment_method, now).await
    }

    /// Combined admission, seeding the ledger from the durable counter once if it
    /// has no entry.
    async fn admit(
        &self,
        activity: &Activity,
        requester: RequesterId,
        ttl: Duration,
    ) -> Result<u32, FlashSaleError> {
        let gate = &self.env.gate;
        let started = Instant::now();

        let mut admission = gate.admit(activity.id, requester, 1, ttl).await?;
        if admission == Admission::NotInitialized {
            let seeded = gate
                .seed_if_absent(activity.id, activity.remaining_stock, ttl)
                .await?;
            if seeded {
                FlashSaleMetrics::record_warmup();
                tracing::info!(
                    remaining_stock = activity.remaining_stock,
                    "Seeded stock ledger from durable counter"
                );
            }
            admission = gate.admit(activity.id, requester, 1, ttl).await?;
        }
        FlashSaleMetrics::record_admission(started.elapsed());

        match admission {
            Admission::Admitted { remaining } => Ok(remaining),
            Admission::OutOfStock => Err(FlashSaleError::OutOfStock),
            Admission::AlreadyParticipated => Err(FlashSaleError::AlreadyParticipated),
            Admission::NotInitialized => Err(FlashSaleError::PersistenceFailure {
                reason: "stock ledger entry vanished during warm-up".to_string(),
            }),
        }
    }

    async fn persist(
        &self,
        reservation: Reservation,
        payment_method: PaymentMethod,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<FlashSaleOrder, FlashSaleError> {
        let new_order = NewOrder {
            order_number: reservation.order_number.clone(),
            requester_id: reservation.requester_id,
            activity_id: reservation.activity_id,
            payment_method,
            created_at: now,
        };

        let started = Instant::now();
        let written = tokio::time::timeout(
            self.env.settings.persist_timeout,
            self.env.orders.create_order(new_order),
        )
        .await;
        FlashSaleMetrics::record_persist(started.elapsed());

        let reason = match written {
            Ok(Ok(order)) => {
                FlashSaleMetrics::record_order_created();
                return Ok(order);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "order write exceeded {} ms",
                self.env.settings.persist_timeout.as_millis()
            ),
        };

        tracing::warn!(
            order_number = %reservation.order_number,
            reason = %reason,
            "Order persistence failed, compensating"
        );
        // Compensation failures are escalated by the compensator, never returned.
        if self.compensator.compensate(&reservation).await.is_err() {
            tracing::debug!(order_number = %reservation.order_number, "Reservation left leaked");
        }
        Err(FlashSaleError::PersistenceFailure { reason })
    }
}
