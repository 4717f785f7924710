//! Activity administration: create, update, stock adjustment and delete.
//!
//! Every write that changes stock pushes the change into the stock ledger and
//! refreshes its expiry. The ledger is only ever moved by deltas or an atomic
//! swap, so reservations racing with an admin write are never erased.

use crate::environment::FlashSaleEnvironment;
use crate::metrics::FlashSaleMetrics;
use chrono::{DateTime, Utc};
use flashsale_core::{
    Activity, ActivityId, ActivitySpec, FlashSaleError, StockDelta, StoreError,
};

/// Optimistic attempts `update` makes before reporting `ConcurrentUpdate`.
const MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Administrative operations on activities.
#[derive(Debug, Clone)]
pub struct ActivityAdmin {
    env: FlashSaleEnvironment,
}

fn not_found_as(kind: FlashSaleError) -> impl FnOnce(StoreError) -> FlashSaleError {
    move |e| match e {
        StoreError::NotFound(_) => kind,
        other => other.into(),
    }
}

impl ActivityAdmin {
    /// Create an admin over the given environment.
    #[must_use]
    pub const fn new(env: FlashSaleEnvironment) -> Self {
        Self { env }
    }

    async fn validate(&self, spec: &ActivitySpec) -> Result<(), FlashSaleError> {
        spec.validate()
            .map_err(|reason| FlashSaleError::InvalidActivity { reason })?;
        self.env
            .catalog
            .product(spec.product_id)
            .await?
            .ok_or(FlashSaleError::ProductNotFound)?;
        Ok(())
    }

    /// Create an activity and seed its stock ledger entry.
    ///
    /// # Errors
    ///
    /// `InvalidActivity`, `ProductNotFound`, or `PersistenceFailure` if the durable
    /// insert fails.
    pub async fn create(&self, spec: ActivitySpec) -> Result<Activity, FlashSaleError> {
        self.validate(&spec).await?;

        let now = self.env.clock.now();
        let activity = self
            .env
            .activities
            .insert(Activity::from_spec(ActivityId::new(), &spec, now))
            .await?;

        let ttl = activity.ledger_ttl(now, self.env.settings.expiry_margin);
        match self
            .env
            .gate
            .set_remaining(activity.id, activity.remaining_stock, ttl)
            .await
        {
            Ok(_) => FlashSaleMetrics::record_stock(activity.id, activity.remaining_stock),
            // A missing entry is seeded from the durable counter on first admission.
            Err(e) => tracing::warn!(
                activity_id = %activity.id,
                error = %e,
                "Stock ledger not seeded at creation"
            ),
        }

        tracing::info!(
            activity_id = %activity.id,
            product_id = %activity.product_id,
            total_stock = activity.total_stock,
            "Activity created"
        );
        Ok(activity)
    }

    /// Replace an activity's description. A change of `total_stock` moves the
    /// ledger and both durable counters by the same delta.
    ///
    /// A decrease is taken out of the ledger before the durable write, so units
    /// already reserved by in-flight requests are never counted as removed. The
    /// durable write only lands if `total_stock` is unchanged since it was read;
    /// a lost race is undone and retried.
    ///
    /// # Errors
    ///
    /// `ActivityNotFound`, `InvalidActivity` (including a total below the units
    /// sold or reserved), `ProductNotFound`, `ConcurrentUpdate` if every attempt
    /// lost a race, or `PersistenceFailure`.
    pub async fn update(
        &self,
        id: ActivityId,
        spec: ActivitySpec,
    ) -> Result<Activity, FlashSaleError> {
        self.validate(&spec).await?;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let existing = self
                .env
                .activities
                .get(id)
                .await?
                .ok_or(FlashSaleError::ActivityNotFound)?;

            let sold = self.env.orders.count_for_activity(id).await?;
            if u64::from(spec.total_stock) < sold {
                return Err(FlashSaleError::InvalidActivity {
                    reason: format!(
                        "total stock {} is below the {sold} units already sold",
                        spec.total_stock
                    ),
                });
            }

            if let Some(activity) = self.try_update(&existing, &spec).await? {
                let ttl = activity
                    .ledger_ttl(self.env.clock.now(), self.env.settings.expiry_margin);
                if let Err(e) = self.env.gate.refresh_expiry(id, ttl).await {
                    tracing::warn!(
                        activity_id = %id,
                        error = %e,
                        "Stock ledger expiry not refreshed"
                    );
                }
                tracing::info!(
                    activity_id = %id,
                    total_stock = activity.total_stock,
                    remaining_stock = activity.remaining_stock,
                    "Activity updated"
                );
                return Ok(activity);
            }
            tracing::debug!(
                activity_id = %id,
                attempt,
                "Activity stock changed underneath update, retrying"
            );
        }

        tracing::warn!(activity_id = %id, "Activity update kept losing races");
        Err(FlashSaleError::ConcurrentUpdate)
    }

    /// One optimistic attempt. `Ok(None)` means another writer moved `total_stock`
    /// first; any ledger change made here has been put back.
    async fn try_update(
        &self,
        existing: &Activity,
        spec: &ActivitySpec,
    ) -> Result<Option<Activity>, FlashSaleError> {
        let id = existing.id;
        let now = self.env.clock.now();
        let delta = i64::from(spec.total_stock) - i64::from(existing.total_stock);
        let units = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);

        if delta < 0 {
            self.withdraw_exact(existing, units, now).await?;
        }

        let written = self
            .env
            .activities
            .update_details(id, spec, existing.total_stock, delta, now)
            .await;

        match written {
            Ok(activity) => {
                if delta > 0 {
                    self.return_to_ledger(id, units).await;
                }
                Ok(Some(activity))
            }
            Err(e) => {
                if delta < 0 {
                    self.return_to_ledger(id, units).await;
                }
                match e {
                    StoreError::Conflict(_) => Ok(None),
                    StoreError::NotFound(_) => Err(FlashSaleError::ActivityNotFound),
                    other => Err(other.into()),
                }
            }
        }
    }

    /// Take exactly `units` out of the ledger, or nothing at all.
    ///
    /// A missing entry is seeded from the durable counter first.
    async fn withdraw_exact(
        &self,
        existing: &Activity,
        units: u32,
        now: DateTime<Utc>,
    ) -> Result<(), FlashSaleError> {
        let gate = &self.env.gate;
        let id = existing.id;

        let mut removed = gate.withdraw(id, units).await?;
        if removed.is_none() {
            let ttl = existing.ledger_ttl(now, self.env.settings.expiry_margin);
            if gate.seed_if_absent(id, existing.remaining_stock, ttl).await? {
                FlashSaleMetrics::record_warmup();
            }
            removed = gate.withdraw(id, units).await?;
        }
        let removed = removed.ok_or_else(|| FlashSaleError::PersistenceFailure {
            reason: "stock ledger entry vanished during update".to_string(),
        })?;

        if removed < units {
            if removed > 0 {
                self.return_to_ledger(id, removed).await;
            }
            return Err(FlashSaleError::InvalidActivity {
                reason: format!(
                    "cannot remove {units} units, only {removed} are neither sold nor reserved"
                ),
            });
        }
        Ok(())
    }

    /// Put `units` back on the ledger. A failure leaves the ledger short and is
    /// escalated for reconciliation.
    async fn return_to_ledger(&self, id: ActivityId, units: u32) {
        match self.env.gate.restore(id, units).await {
            Ok(Some(remaining)) => FlashSaleMetrics::record_stock(id, remaining),
            Ok(None) => {}
            Err(e) => {
                FlashSaleMetrics::record_compensation_failure();
                tracing::error!(
                    activity_id = %id,
                    units,
                    error = %e,
                    "Stock ledger not restored, manual reconciliation required"
                );
            }
        }
    }

    /// Set the remaining stock to `new_stock`.
    ///
    /// The ledger value is swapped atomically; reservations before the swap are
    /// superseded and reservations after it decrement from `new_stock`. The durable
    /// counters move by the same delta, so in-flight order commits still land.
    ///
    /// # Errors
    ///
    /// `ActivityNotFound` or `PersistenceFailure`.
    pub async fn adjust_stock(
        &self,
        id: ActivityId,
        new_stock: u32,
    ) -> Result<Activity, FlashSaleError> {
        let activity = self
            .env
            .activities
            .get(id)
            .await?
            .ok_or(FlashSaleError::ActivityNotFound)?;

        let now = self.env.clock.now();
        let ttl = activity.ledger_ttl(now, self.env.settings.expiry_margin);
        let previous = self.env.gate.set_remaining(id, new_stock, ttl).await?;
        self.env.gate.refresh_expiry(id, ttl).await?;
        FlashSaleMetrics::record_stock(id, new_stock);

        let baseline = previous.unwrap_or(activity.remaining_stock);
        let delta = i64::from(new_stock) - i64::from(baseline);
        let activity = if delta == 0 {
            activity
        } else {
            self.env
                .activities
                .apply_stock_delta(id, StockDelta::uniform(delta), now)
                .await
                .map_err(not_found_as(FlashSaleError::ActivityNotFound))?
        };

        tracing::info!(
            activity_id = %id,
            new_stock,
            previous = ?previous,
            delta,
            "Stock adjusted"
        );
        Ok(activity)
    }

    /// Delete an activity with its orders and drop its fast-store entries.
    ///
    /// # Errors
    ///
    /// `ActivityNotFound` or `PersistenceFailure`.
    pub async fn delete(&self, id: ActivityId) -> Result<(), FlashSaleError> {
        if !self.env.activities.delete_with_orders(id).await? {
            return Err(FlashSaleError::ActivityNotFound);
        }

        let stock = self.env.gate.clear_stock(id).await;
        let marks = self.env.gate.clear_marks(id).await;
        tracing::info!(activity_id = %id, "Activity deleted");
        stock?;
        marks?;
        Ok(())
    }
}
