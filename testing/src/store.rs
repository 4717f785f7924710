//! In-memory durable store for activities and orders.
//!
//! One mutex guards both tables, so every write is a transaction in the same
//! sense as the Postgres implementation: the order insert and the durable
//! decrement land together or not at all.

use chrono::{DateTime, Utc};
use flashsale_core::{
    Activity, ActivityId, ActivitySpec, ActivityStore, FlashSaleOrder, NewOrder, OrderId,
    OrderNumber, OrderRecorder, OrderStatus, RequesterId, StockDelta, StoreError, StoreFuture,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Failure injected into [`OrderRecorder::create_order`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CreateFault {
    /// Behave normally
    #[default]
    None,
    /// Fail without writing anything
    FailBeforeCommit,
    /// Commit the order, then report a failure (lost acknowledgement)
    FailAfterCommit,
    /// Commit the order, then take this long to answer
    StallAfterCommit(Duration),
    /// Take this long before writing anything
    StallBeforeCommit(Duration),
}

#[derive(Debug, Default)]
struct Tables {
    activities: HashMap<ActivityId, Activity>,
    orders: HashMap<OrderNumber, FlashSaleOrder>,
}

#[derive(Debug, Default)]
struct Faults {
    create: CreateFault,
    fail_deletes: bool,
    fail_reads: bool,
}

/// In-memory [`ActivityStore`] and [`OrderRecorder`] with failure injection.
///
/// Clones share the same tables.
#[derive(Clone, Debug, Default)]
pub struct InMemoryFlashSaleStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
}

fn injected(what: &str) -> StoreError {
    StoreError::Database(format!("injected failure: {what}"))
}

fn shift(value: u32, delta: i64) -> u32 {
    u32::try_from((i64::from(value) + delta).max(0)).unwrap_or(u32::MAX)
}

impl InMemoryFlashSaleStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject `fault` into every subsequent `create_order` until cleared
    pub fn fail_creates(&self, fault: CreateFault) {
        self.faults.lock().unwrap().create = fault;
    }

    /// Make `delete_by_number` fail
    pub fn fail_deletes(&self, fail: bool) {
        self.faults.lock().unwrap().fail_deletes = fail;
    }

    /// Make reads (`get`, `find_live_order`) fail
    pub fn fail_reads(&self, fail: bool) {
        self.faults.lock().unwrap().fail_reads = fail;
    }

    /// Remove every injected fault
    pub fn clear_faults(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    /// Snapshot of an activity
    #[must_use]
    pub fn activity(&self, id: ActivityId) -> Option<Activity> {
        self.tables.lock().unwrap().activities.get(&id).cloned()
    }

    /// Every order for the activity, in any status
    #[must_use]
    pub fn orders_for(&self, id: ActivityId) -> Vec<FlashSaleOrder> {
        self.tables
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|order| order.activity_id == id)
            .cloned()
            .collect()
    }

    /// Total number of stored orders
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.tables.lock().unwrap().orders.len()
    }

    fn reads_fail(&self) -> bool {
        self.faults.lock().unwrap().fail_reads
    }

    fn commit_order(&self, order: NewOrder) -> Result<FlashSaleOrder, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.orders.contains_key(&order.order_number) {
            return Err(StoreError::Conflict(format!(
                "order number {} already exists",
                order.order_number
            )));
        }
        if tables.orders.values().any(|existing| {
            existing.activity_id == order.activity_id
                && existing.requester_id == order.requester_id
                && existing.status.holds_stock()
        }) {
            return Err(StoreError::Conflict(
                "requester already holds an order for this activity".into(),
            ));
        }
        let activity = tables
            .activities
            .get_mut(&order.activity_id)
            .ok_or_else(|| StoreError::NotFound(format!("activity {}", order.activity_id)))?;
        if activity.remaining_stock == 0 {
            return Err(StoreError::Conflict("durable stock exhausted".into()));
        }
        activity.remaining_stock -= 1;
        activity.updated_at = order.created_at;

        let order = order.into_order(OrderId::new());
        tables
            .orders
            .insert(order.order_number.clone(), order.clone());
        Ok(order)
    }
}

impl ActivityStore for InMemoryFlashSaleStore {
    fn get(&self, id: ActivityId) -> StoreFuture<'_, Option<Activity>> {
        Box::pin(async move {
            if self.reads_fail() {
                return Err(injected("get activity"));
            }
            Ok(self.activity(id))
        })
    }

    fn list_active(&self, now: DateTime<Utc>) -> StoreFuture<'_, Vec<Activity>> {
        Box::pin(async move {
            let tables = self.tables.lock().unwrap();
            let mut live: Vec<Activity> = tables
                .activities
                .values()
                .filter(|activity| activity.is_live_at(now))
                .cloned()
                .collect();
            live.sort_by_key(|activity| activity.start_time);
            Ok(live)
        })
    }

    fn list_upcoming(
        &self,
        now: DateTime<Utc>,
        horizon: chrono::Duration,
    ) -> StoreFuture<'_, Vec<Activity>> {
        Box::pin(async move {
            let tables = self.tables.lock().unwrap();
            let mut upcoming: Vec<Activity> = tables
                .activities
                .values()
                .filter(|activity| activity.is_upcoming(now, horizon))
                .cloned()
                .collect();
            upcoming.sort_by_key(|activity| activity.start_time);
            Ok(upcoming)
        })
    }

    fn insert(&self, activity: Activity) -> StoreFuture<'_, Activity> {
        Box::pin(async move {
            let mut tables = self.tables.lock().unwrap();
            if tables.activities.contains_key(&activity.id) {
                return Err(StoreError::Conflict(format!("activity {}", activity.id)));
            }
            tables.activities.insert(activity.id, activity.clone());
            Ok(activity)
        })
    }

    fn update_details(
        &self,
        id: ActivityId,
        spec: &ActivitySpec,
        expected_total: u32,
        remaining_delta: i64,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Activity> {
        let spec = spec.clone();
        Box::pin(async move {
            let mut tables = self.tables.lock().unwrap();
            let activity = tables
                .activities
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("activity {id}")))?;
            if activity.total_stock != expected_total {
                return Err(StoreError::Conflict(format!(
                    "activity {id} total stock is {}, expected {expected_total}",
                    activity.total_stock
                )));
            }
            activity.total_stock = spec.total_stock;
            activity.remaining_stock = shift(activity.remaining_stock, remaining_delta);
            activity.product_id = spec.product_id;
            activity.sale_price = spec.sale_price;
            activity.start_time = spec.start_time;
            activity.end_time = spec.end_time;
            activity.active = spec.active;
            activity.updated_at = now;
            Ok(activity.clone())
        })
    }

    fn apply_stock_delta(
        &self,
        id: ActivityId,
        delta: StockDelta,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Activity> {
        Box::pin(async move {
            let mut tables = self.tables.lock().unwrap();
            let activity = tables
                .activities
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("activity {id}")))?;
            activity.total_stock = shift(activity.total_stock, delta.total);
            activity.remaining_stock = shift(activity.remaining_stock, delta.remaining);
            activity.updated_at = now;
            Ok(activity.clone())
        })
    }

    fn delete_with_orders(&self, id: ActivityId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut tables = self.tables.lock().unwrap();
            if !tables.activities.contains_key(&id) {
                return Ok(false);
            }
            tables.orders.retain(|_, order| order.activity_id != id);
            tables.activities.remove(&id);
            Ok(true)
        })
    }
}

impl OrderRecorder for InMemoryFlashSaleStore {
    fn find_live_order(
        &self,
        requester: RequesterId,
        activity: ActivityId,
    ) -> StoreFuture<'_, Option<FlashSaleOrder>> {
        Box::pin(async move {
            if self.reads_fail() {
                return Err(injected("find live order"));
            }
            let tables = self.tables.lock().unwrap();
            Ok(tables
                .orders
                .values()
                .find(|order| {
                    order.requester_id == requester
                        && order.activity_id == activity
                        && order.status.holds_stock()
                })
                .cloned())
        })
    }

    fn find_by_number(&self, number: &OrderNumber) -> StoreFuture<'_, Option<FlashSaleOrder>> {
        let number = number.clone();
        Box::pin(async move { Ok(self.tables.lock().unwrap().orders.get(&number).cloned()) })
    }

    fn create_order(&self, order: NewOrder) -> StoreFuture<'_, FlashSaleOrder> {
        Box::pin(async move {
            let fault = self.faults.lock().unwrap().create;
            match fault {
                CreateFault::None => self.commit_order(order),
                CreateFault::FailBeforeCommit => Err(injected("create order")),
                CreateFault::FailAfterCommit => {
                    self.commit_order(order)?;
                    Err(injected("acknowledgement lost after commit"))
                }
                CreateFault::StallAfterCommit(delay) => {
                    let created = self.commit_order(order);
                    tokio::time::sleep(delay).await;
                    created
                }
                CreateFault::StallBeforeCommit(delay) => {
                    tokio::time::sleep(delay).await;
                    self.commit_order(order)
                }
            }
        })
    }

    fn delete_by_number(
        &self,
        number: &OrderNumber,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        let number = number.clone();
        Box::pin(async move {
            if self.faults.lock().unwrap().fail_deletes {
                return Err(injected("delete order"));
            }
            let mut tables = self.tables.lock().unwrap();
            let Some(order) = tables.orders.remove(&number) else {
                return Ok(false);
            };
            if order.status.holds_stock() {
                if let Some(activity) = tables.activities.get_mut(&order.activity_id) {
                    activity.remaining_stock = activity.remaining_stock.saturating_add(1);
                    activity.updated_at = now;
                }
            }
            Ok(true)
        })
    }

    fn cancel_order(
        &self,
        number: &OrderNumber,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, FlashSaleOrder> {
        let number = number.clone();
        Box::pin(async move {
            let mut tables = self.tables.lock().unwrap();
            let order = tables
                .orders
                .get_mut(&number)
                .ok_or_else(|| StoreError::NotFound(format!("order {number}")))?;
            if order.status != OrderStatus::Pending {
                return Err(StoreError::Conflict(format!(
                    "order {number} is {:?}",
                    order.status
                )));
            }
            order.status = OrderStatus::Cancelled;
            order.updated_at = now;
            let cancelled = order.clone();
            if let Some(activity) = tables.activities.get_mut(&cancelled.activity_id) {
                activity.remaining_stock = activity.remaining_stock.saturating_add(1);
                activity.updated_at = now;
            }
            Ok(cancelled)
        })
    }

    fn count_for_activity(&self, activity: ActivityId) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let tables = self.tables.lock().unwrap();
            Ok(tables
                .orders
                .values()
                .filter(|order| order.activity_id == activity && order.status.holds_stock())
                .count() as u64)
        })
    }
}
