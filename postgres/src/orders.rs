//! `PostgreSQL` implementation of [`OrderRecorder`].
//!
//! Every statement that changes whether an order holds stock moves
//! `flash_sale_activities.remaining_stock` inside the same transaction, so the
//! durable counter always equals `total_stock` minus live orders (modulo
//! administrative adjustments).

use crate::rows::{ORDER_COLUMNS, OrderRow, db_error};
use chrono::{DateTime, Utc};
use flashsale_core::{
    ActivityId, FlashSaleOrder, NewOrder, OrderId, OrderNumber, OrderRecorder, OrderStatus,
    RequesterId, StoreError, StoreFuture,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

const CANCELLED: i16 = OrderStatus::Cancelled.code();
const PENDING: i16 = OrderStatus::Pending.code();

/// Order rows in the `flash_sale_orders` table.
#[derive(Clone, Debug)]
pub struct PostgresOrderRecorder {
    pool: PgPool,
}

impl PostgresOrderRecorder {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn release_unit(
        tx: &mut Transaction<'_, Postgres>,
        activity: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE flash_sale_activities
            SET remaining_stock = remaining_stock + 1, updated_at = $2
            WHERE id = $1
            ",
        )
        .bind(activity)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(db_error("release unit"))?;
        Ok(())
    }

    async fn create(&self, order: NewOrder) -> Result<FlashSaleOrder, StoreError> {
        let activity = order.activity_id;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin create order"))?;

        let decremented: Option<(Uuid,)> = sqlx::query_as(
            r"
            UPDATE flash_sale_activities
            SET remaining_stock = remaining_stock - 1, updated_at = $2
            WHERE id = $1 AND remaining_stock > 0
            RETURNING id
            ",
        )
        .bind(activity.as_uuid())
        .bind(order.created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("decrement stock"))?;

        if decremented.is_none() {
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM flash_sale_activities WHERE id = $1")
                    .bind(activity.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_error("check activity"))?;
            return Err(match exists {
                Some(_) => {
                    record_conflict("sold_out");
                    StoreError::Conflict(format!("activity {activity} has no durable stock"))
                }
                None => StoreError::NotFound(format!("activity {activity}")),
            });
        }

        let id = OrderId::new();
        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO flash_sale_orders ( \
                 id, order_number, requester_id, activity_id, status, payment_method, \
                 created_at, updated_at \
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.requester_id.as_uuid())
        .bind(activity.as_uuid())
        .bind(PENDING)
        .bind(order.payment_method.code())
        .bind(order.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("insert order"))
        .inspect_err(|e| {
            if matches!(e, StoreError::Conflict(_)) {
                record_conflict("duplicate");
            }
        })?;

        tx.commit().await.map_err(db_error("commit create order"))?;
        FlashSaleOrder::try_from(row)
    }

    async fn delete(&self, number: String, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin delete order"))?;

        let removed: Option<(Uuid, i16)> = sqlx::query_as(
            "DELETE FROM flash_sale_orders WHERE order_number = $1 RETURNING activity_id, status",
        )
        .bind(&number)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("delete order"))?;

        let Some((activity, status)) = removed else {
            return Ok(false);
        };
        if status != CANCELLED {
            Self::release_unit(&mut tx, activity, now).await?;
        }
        tx.commit().await.map_err(db_error("commit delete order"))?;

        tracing::debug!(order_number = %number, "Order removed");
        Ok(true)
    }

    async fn cancel(&self, number: String, now: DateTime<Utc>) -> Result<FlashSaleOrder, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin cancel order"))?;

        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE flash_sale_orders SET status = $2, updated_at = $3 \
             WHERE order_number = $1 AND status = $4 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&number)
        .bind(CANCELLED)
        .bind(now)
        .bind(PENDING)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("cancel order"))?;

        let Some(row) = row else {
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM flash_sale_orders WHERE order_number = $1")
                    .bind(&number)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_error("check order"))?;
            return Err(match exists {
                Some(_) => StoreError::Conflict(format!("order {number} is not pending")),
                None => StoreError::NotFound(format!("order {number}")),
            });
        };

        let order = FlashSaleOrder::try_from(row)?;
        Self::release_unit(&mut tx, *order.activity_id.as_uuid(), now).await?;
        tx.commit().await.map_err(db_error("commit cancel order"))?;
        Ok(order)
    }
}

fn record_conflict(kind: &'static str) {
    metrics::counter!("flashsale_store_conflicts_total", "kind" => kind).increment(1);
}

impl OrderRecorder for PostgresOrderRecorder {
    fn find_live_order(
        &self,
        requester: RequesterId,
        activity: ActivityId,
    ) -> StoreFuture<'_, Option<FlashSaleOrder>> {
        Box::pin(async move {
            let row: Option<OrderRow> = sqlx::query_as(&format!(
                "SELECT {ORDER_COLUMNS} FROM flash_sale_orders \
                 WHERE requester_id = $1 AND activity_id = $2 AND status <> $3 \
                 LIMIT 1"
            ))
            .bind(requester.as_uuid())
            .bind(activity.as_uuid())
            .bind(CANCELLED)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find live order"))?;

            row.map(FlashSaleOrder::try_from).transpose()
        })
    }

    fn find_by_number(&self, number: &OrderNumber) -> StoreFuture<'_, Option<FlashSaleOrder>> {
        let number = number.as_str().to_owned();
        Box::pin(async move {
            let row: Option<OrderRow> = sqlx::query_as(&format!(
                "SELECT {ORDER_COLUMNS} FROM flash_sale_orders WHERE order_number = $1"
            ))
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find order"))?;

            row.map(FlashSaleOrder::try_from).transpose()
        })
    }

    fn create_order(&self, order: NewOrder) -> StoreFuture<'_, FlashSaleOrder> {
        Box::pin(self.create(order))
    }

    fn delete_by_number(
        &self,
        number: &OrderNumber,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        Box::pin(self.delete(number.as_str().to_owned(), now))
    }

    fn cancel_order(
        &self,
        number: &OrderNumber,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, FlashSaleOrder> {
        Box::pin(self.cancel(number.as_str().to_owned(), now))
    }

    fn count_for_activity(&self, activity: ActivityId) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM flash_sale_orders WHERE activity_id = $1 AND status <> $2",
            )
            .bind(activity.as_uuid())
            .bind(CANCELLED)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count orders"))?;

            u64::try_from(count).map_err(|_| StoreError::Corrupt(format!("order count {count}")))
        })
    }
}
