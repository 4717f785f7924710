//! `PostgreSQL` implementation of [`ActivityStore`].

use crate::rows::{ACTIVITY_COLUMNS, ActivityRow, db_error, to_i32, to_i64};
use chrono::{DateTime, Duration, Utc};
use flashsale_core::{
    Activity, ActivityId, ActivitySpec, ActivityStore, StockDelta, StoreError, StoreFuture,
};
use sqlx::PgPool;

/// Activity rows in the `flash_sale_activities` table.
#[derive(Clone, Debug)]
pub struct PostgresActivityStore {
    pool: PgPool,
}

impl PostgresActivityStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: ActivityId) -> Result<Option<Activity>, StoreError> {
        let row: Option<ActivityRow> = sqlx::query_as(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM flash_sale_activities WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get activity"))?;

        row.map(Activity::try_from).transpose()
    }

    async fn list_between(
        &self,
        query: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Activity>, StoreError> {
        let rows: Vec<ActivityRow> = sqlx::query_as(query)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list activities"))?;

        rows.into_iter().map(Activity::try_from).collect()
    }
}

impl ActivityStore for PostgresActivityStore {
    fn get(&self, id: ActivityId) -> StoreFuture<'_, Option<Activity>> {
        Box::pin(self.fetch(id))
    }

    fn list_active(&self, now: DateTime<Utc>) -> StoreFuture<'_, Vec<Activity>> {
        Box::pin(async move {
            let query = format!(
                "SELECT {ACTIVITY_COLUMNS} FROM flash_sale_activities \
                 WHERE active AND start_time <= $1 AND end_time >= $2 \
                 ORDER BY start_time"
            );
            self.list_between(&query, now, now).await
        })
    }

    fn list_upcoming(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> StoreFuture<'_, Vec<Activity>> {
        Box::pin(async move {
            let query = format!(
                "SELECT {ACTIVITY_COLUMNS} FROM flash_sale_activities \
                 WHERE active AND start_time > $1 AND start_time < $2 \
                 ORDER BY start_time"
            );
            self.list_between(&query, now, now + horizon).await
        })
    }

    fn insert(&self, activity: Activity) -> StoreFuture<'_, Activity> {
        Box::pin(async move {
            let row: ActivityRow = sqlx::query_as(&format!(
                "INSERT INTO flash_sale_activities ( \
                     id, product_id, sale_price_cents, total_stock, remaining_stock, \
                     start_time, end_time, active, created_at, updated_at \
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 RETURNING {ACTIVITY_COLUMNS}"
            ))
            .bind(activity.id.as_uuid())
            .bind(activity.product_id.as_uuid())
            .bind(to_i64(activity.sale_price.cents(), "sale_price")?)
            .bind(to_i32(activity.total_stock, "total_stock")?)
            .bind(to_i32(activity.remaining_stock, "remaining_stock")?)
            .bind(activity.start_time)
            .bind(activity.end_time)
            .bind(activity.active)
            .bind(activity.created_at)
            .bind(activity.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("insert activity"))?;

            tracing::info!(activity_id = %activity.id, total_stock = activity.total_stock, "Activity inserted");
            Activity::try_from(row)
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
            let row: Option<ActivityRow> = sqlx::query_as(&format!(
                "UPDATE flash_sale_activities \
                 SET product_id = $2, sale_price_cents = $3, start_time = $4, \
                     end_time = $5, active = $6, updated_at = $7, \
                     total_stock = $8, \
                     remaining_stock = GREATEST(remaining_stock + $9, 0) \
                 WHERE id = $1 AND total_stock = $10 \
                 RETURNING {ACTIVITY_COLUMNS}"
            ))
            .bind(id.as_uuid())
            .bind(spec.product_id.as_uuid())
            .bind(to_i64(spec.sale_price.cents(), "sale_price")?)
            .bind(spec.start_time)
            .bind(spec.end_time)
            .bind(spec.active)
            .bind(now)
            .bind(to_i32(spec.total_stock, "total_stock")?)
            .bind(remaining_delta)
            .bind(to_i32(expected_total, "expected_total")?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("update activity"))?;

            if let Some(row) = row {
                return Activity::try_from(row);
            }
            Err(match self.fetch(id).await? {
                Some(current) => StoreError::Conflict(format!(
                    "activity {id} total stock is {}, expected {expected_total}",
                    current.total_stock
                )),
                None => StoreError::NotFound(format!("activity {id}")),
            })
        })
    }

    fn apply_stock_delta(
        &self,
        id: ActivityId,
        delta: StockDelta,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Activity> {
        Box::pin(async move {
            let row: Option<ActivityRow> = sqlx::query_as(&format!(
                "UPDATE flash_sale_activities \
                 SET total_stock = GREATEST(total_stock + $2, 0), \
                     remaining_stock = GREATEST(remaining_stock + $3, 0), \
                     updated_at = $4 \
                 WHERE id = $1 \
                 RETURNING {ACTIVITY_COLUMNS}"
            ))
            .bind(id.as_uuid())
            .bind(delta.total)
            .bind(delta.remaining)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("apply stock delta"))?;

            let activity = row
                .map(Activity::try_from)
                .transpose()?
                .ok_or_else(|| StoreError::NotFound(format!("activity {id}")))?;

            tracing::debug!(
                activity_id = %id,
                total_delta = delta.total,
                remaining_delta = delta.remaining,
                remaining = activity.remaining_stock,
                "Durable stock adjusted"
            );
            Ok(activity)
        })
    }

    fn delete_with_orders(&self, id: ActivityId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(db_error("begin delete activity"))?;

            let orders = sqlx::query("DELETE FROM flash_sale_orders WHERE activity_id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(db_error("delete activity orders"))?;

            let activity = sqlx::query("DELETE FROM flash_sale_activities WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(db_error("delete activity"))?;

            tx.commit()
                .await
                .map_err(db_error("commit delete activity"))?;

            let deleted = activity.rows_affected() > 0;
            if deleted {
                tracing::info!(
                    activity_id = %id,
                    orders_removed = orders.rows_affected(),
                    "Activity deleted"
                );
            }
            Ok(deleted)
        })
    }
}
