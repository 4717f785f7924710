//! Caller-facing facade over the coordinator, admin and read paths.

use crate::admin::ActivityAdmin;
use crate::coordinator::ReservationCoordinator;
use crate::environment::FlashSaleEnvironment;
use crate::metrics::FlashSaleMetrics;
use flashsale_core::{
    Activity, ActivityId, ActivitySpec, ActivitySummary, FlashSaleError, FlashSaleOrder,
    FlashSaleResult, OrderNumber, OrderStatus, PaymentMethod, RequesterId, StoreError,
};

/// The flash-sale allocation core as one service.
#[derive(Debug, Clone)]
pub struct FlashSaleService {
    env: FlashSaleEnvironment,
    coordinator: ReservationCoordinator,
    admin: ActivityAdmin,
}

impl FlashSaleService {
    /// Build the service from its environment.
    #[must_use]
    pub fn new(env: FlashSaleEnvironment) -> Self {
        Self {
            coordinator: ReservationCoordinator::new(env.clone()),
            admin: ActivityAdmin::new(env.clone()),
            env,
        }
    }

    /// Injected collaborators.
    #[must_use]
    pub const fn environment(&self) -> &FlashSaleEnvironment {
        &self.env
    }

    /// `ExecuteFlashSale`, reported as the caller envelope.
    pub async fn execute_flash_sale(
        &self,
        requester: RequesterId,
        activity_id: ActivityId,
        payment_method: PaymentMethod,
    ) -> FlashSaleResult {
        self.place_order(requester, activity_id, payment_method)
            .await
            .into()
    }

    /// `ExecuteFlashSale`, returning the created order.
    ///
    /// # Errors
    ///
    /// See [`ReservationCoordinator::execute`].
    pub async fn place_order(
        &self,
        requester: RequesterId,
        activity_id: ActivityId,
        payment_method: PaymentMethod,
    ) -> Result<FlashSaleOrder, FlashSaleError> {
        self.coordinator
            .execute(requester, activity_id, payment_method)
            .await
    }

    /// Live activities with their products.
    ///
    /// # Errors
    ///
    /// `PersistenceFailure` if a store fails.
    pub async fn list_active(&self) -> Result<Vec<ActivitySummary>, FlashSaleError> {
        let now = self.env.clock.now();
        let activities = self.env.activities.list_active(now).await?;
        self.summarize(activities).await
    }

    /// Activities opening within the configured horizon.
    ///
    /// # Errors
    ///
    /// `PersistenceFailure` if a store fails.
    pub async fn list_upcoming(&self) -> Result<Vec<ActivitySummary>, FlashSaleError> {
        let now = self.env.clock.now();
        let activities = self
            .env
            .activities
            .list_upcoming(now, self.env.settings.upcoming_horizon)
            .await?;
        self.summarize(activities).await
    }

    async fn summarize(
        &self,
        activities: Vec<Activity>,
    ) -> Result<Vec<ActivitySummary>, FlashSaleError> {
        let mut summaries = Vec::with_capacity(activities.len());
        for activity in activities {
            match self.env.catalog.product(activity.product_id).await? {
                Some(product) => summaries.push(ActivitySummary::new(&activity, product)),
                None => tracing::debug!(
                    activity_id = %activity.id,
                    product_id = %activity.product_id,
                    "Skipping activity with unresolved product"
                ),
            }
        }
        Ok(summaries)
    }

    /// Fetch an activity.
    ///
    /// # Errors
    ///
    /// `ActivityNotFound` or `PersistenceFailure`.
    pub async fn get_activity(&self, id: ActivityId) -> Result<Activity, FlashSaleError> {
        self.env
            .activities
            .get(id)
            .await?
            .ok_or(FlashSaleError::ActivityNotFound)
    }

    /// Fetch an order by number.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` or `PersistenceFailure`.
    pub async fn get_order(&self, number: &OrderNumber) -> Result<FlashSaleOrder, FlashSaleError> {
        self.env
            .orders
            .find_by_number(number)
            .await?
            .ok_or(FlashSaleError::OrderNotFound)
    }

    /// Cancel a pending order and give its unit and the requester's mark back.
    ///
    /// The durable side commits first; the ledger restore and unmark follow. If
    /// those fail the cancellation stands and the leak is escalated like a failed
    /// compensation.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` (also when the order belongs to someone else),
    /// `OrderNotCancellable`, or `PersistenceFailure`.
    #[tracing::instrument(skip_all, fields(requester_id = %requester, order_number = %number))]
    pub async fn cancel_order(
        &self,
        requester: RequesterId,
        number: &OrderNumber,
    ) -> Result<FlashSaleOrder, FlashSaleError> {
        let order = self.get_order(number).await?;
        if order.requester_id != requester {
            return Err(FlashSaleError::OrderNotFound);
        }
        if order.status != OrderStatus::Pending {
            return Err(FlashSaleError::OrderNotCancellable);
        }

        let now = self.env.clock.now();
        let cancelled = self
            .env
            .orders
            .cancel_order(number, now)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => FlashSaleError::OrderNotFound,
                StoreError::Conflict(_) => FlashSaleError::OrderNotCancellable,
                other => other.into(),
            })?;

        let restored = self.env.gate.restore(order.activity_id, 1).await;
        let unmarked = self.env.gate.unmark(order.activity_id, requester).await;
        match (&restored, &unmarked) {
            (Ok(remaining), Ok(_)) => {
                if let Some(remaining) = remaining {
                    FlashSaleMetrics::record_stock(order.activity_id, *remaining);
                }
                tracing::info!(activity_id = %order.activity_id, "Order cancelled");
            }
            _ => {
                FlashSaleMetrics::record_compensation_failure();
                tracing::error!(
                    activity_id = %order.activity_id,
                    restore = ?restored.as_ref().err(),
                    unmark = ?unmarked.as_ref().err(),
                    "Order cancelled but fast store not updated, manual reconciliation required"
                );
            }
        }
        Ok(cancelled)
    }

    /// See [`ActivityAdmin::create`].
    ///
    /// # Errors
    ///
    /// See [`ActivityAdmin::create`].
    pub async fn create_activity(&self, spec: ActivitySpec) -> Result<Activity, FlashSaleError> {
        self.admin.create(spec).await
    }

    /// See [`ActivityAdmin::update`].
    ///
    /// # Errors
    ///
    /// See [`ActivityAdmin::update`].
    pub async fn update_activity(
        &self,
        id: ActivityId,
        spec: ActivitySpec,
    ) -> Result<Activity, FlashSaleError> {
        self.admin.update(id, spec).await
    }

    /// See [`ActivityAdmin::adjust_stock`].
    ///
    /// # Errors
    ///
    /// See [`ActivityAdmin::adjust_stock`].
    pub async fn adjust_stock(
        &self,
        id: ActivityId,
        new_stock: u32,
    ) -> Result<Activity, FlashSaleError> {
        self.admin.adjust_stock(id, new_stock).await
    }

    /// See [`ActivityAdmin::delete`].
    ///
    /// # Errors
    ///
    /// See [`ActivityAdmin::delete`].
    pub async fn delete_activity(&self, id: ActivityId) -> Result<(), FlashSaleError> {
        self.admin.delete(id).await
    }
}
