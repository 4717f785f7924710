//! Durable activity storage.

use crate::StoreFuture;
use crate::types::{Activity, ActivityId, ActivitySpec};
use chrono::{DateTime, Duration, Utc};

/// Signed adjustment to an activity's durable stock counters.
///
/// Both fields are applied in one statement and each counter is clamped at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StockDelta {
    /// Change to `total_stock`
    pub total: i64,
    /// Change to `remaining_stock`
    pub remaining: i64,
}

impl StockDelta {
    /// Move both counters by the same amount
    #[must_use]
    pub const fn uniform(delta: i64) -> Self {
        Self {
            total: delta,
            remaining: delta,
        }
    }

    /// Whether applying this delta changes nothing
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.total == 0 && self.remaining == 0
    }
}

/// Durable store of flash-sale activities.
///
/// The durable `remaining_stock` column mirrors the fast stock ledger; it is only
/// ever moved by deltas (here, or inside the order recorder's transactions) so that
/// concurrent order commits are never overwritten.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the store can be held as `Arc<dyn ActivityStore>`.
pub trait ActivityStore: Send + Sync {
    /// Fetch one activity.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn get(&self, id: ActivityId) -> StoreFuture<'_, Option<Activity>>;

    /// Activities with `active AND start_time <= now <= end_time`, ordered by start time.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn list_active(&self, now: DateTime<Utc>) -> StoreFuture<'_, Vec<Activity>>;

    /// Activities with `active AND now < start_time < now + horizon`, ordered by start time.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn list_upcoming(&self, now: DateTime<Utc>, horizon: Duration)
    -> StoreFuture<'_, Vec<Activity>>;

    /// Persist a new activity.
    ///
    /// # Errors
    ///
    /// `Conflict` if the id already exists, or any backend failure.
    fn insert(&self, activity: Activity) -> StoreFuture<'_, Activity>;

    /// Overwrite the descriptive fields (product, price, window, active flag) and
    /// move `total_stock` to `spec.total_stock`, adding `remaining_delta` to
    /// `remaining_stock` (clamped at zero), all in one statement.
    ///
    /// The write only applies while `total_stock` still equals `expected_total`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the activity does not exist
    /// - `Conflict` if `total_stock` no longer equals `expected_total`
    /// - any backend failure
    fn update_details(
        &self,
        id: ActivityId,
        spec: &ActivitySpec,
        expected_total: u32,
        remaining_delta: i64,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Activity>;

    /// Atomically add `delta` to the stock counters and return the updated row.
    ///
    /// # Errors
    ///
    /// `NotFound` if the activity does not exist, or any backend failure.
    fn apply_stock_delta(
        &self,
        id: ActivityId,
        delta: StockDelta,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Activity>;

    /// Delete the activity and every order referencing it in one transaction.
    ///
    /// Returns `false` when the activity did not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn delete_with_orders(&self, id: ActivityId) -> StoreFuture<'_, bool>;
}
