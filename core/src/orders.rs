//! Durable order recording and order-number generation.

use crate::StoreFuture;
use crate::types::{ActivityId, FlashSaleOrder, NewOrder, OrderNumber, RequesterId};
use chrono::{DateTime, Utc};

/// Durable recorder of flash-sale orders.
///
/// Every write that changes whether an order holds a unit of stock also moves the
/// activity's durable `remaining_stock` in the same transaction.
pub trait OrderRecorder: Send + Sync {
    /// The requester's order for this activity that still holds stock, if any.
    ///
    /// Cancelled orders are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn find_live_order(
        &self,
        requester: RequesterId,
        activity: ActivityId,
    ) -> StoreFuture<'_, Option<FlashSaleOrder>>;

    /// Look an order up by its number.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn find_by_number(&self, number: &OrderNumber) -> StoreFuture<'_, Option<FlashSaleOrder>>;

    /// Insert a pending order and decrement the durable counter, all or nothing.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the activity vanished
    /// - `Conflict` if the durable counter is already zero, the order number is taken,
    ///   or the requester already holds a live order for the activity
    /// - any backend failure
    fn create_order(&self, order: NewOrder) -> StoreFuture<'_, FlashSaleOrder>;

    /// Remove an order written by a failed reservation. If it held stock, the durable
    /// counter is incremented in the same transaction, stamped with `now`. Returns
    /// whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn delete_by_number(&self, number: &OrderNumber, now: DateTime<Utc>)
    -> StoreFuture<'_, bool>;

    /// Move a pending order to cancelled and return its unit to the durable counter.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such order exists
    /// - `Conflict` if the order is not pending
    /// - any backend failure
    fn cancel_order(
        &self,
        number: &OrderNumber,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, FlashSaleOrder>;

    /// Number of orders for the activity that still hold stock.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::StoreError) if the backend fails.
    fn count_for_activity(&self, activity: ActivityId) -> StoreFuture<'_, u64>;
}

/// Source of globally unique order numbers.
pub trait OrderNumberGenerator: Send + Sync {
    /// Produce the next order number.
    fn next(&self, now: DateTime<Utc>) -> OrderNumber;
}
