//! Row types and error mapping shared by the Postgres stores.

use chrono::{DateTime, Utc};
use flashsale_core::{
    Activity, ActivityId, FlashSaleOrder, Money, OrderId, OrderNumber, OrderStatus,
    PaymentMethod, ProductId, ProductSummary, RequesterId, StoreError,
};
use uuid::Uuid;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Column list matching [`ActivityRow`].
pub(crate) const ACTIVITY_COLUMNS: &str = "id, product_id, sale_price_cents, total_stock, \
     remaining_stock, start_time, end_time, active, created_at, updated_at";

/// Column list matching [`OrderRow`].
pub(crate) const ORDER_COLUMNS: &str =
    "id, order_number, requester_id, activity_id, status, payment_method, created_at, updated_at";

/// Map a sqlx error, turning unique violations into `Conflict`.
pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict(format!("{context}: {}", db.message()))
        }
        _ => StoreError::Database(format!("{context}: {e}")),
    }
}

fn corrupt(what: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what} out of range: {value}"))
}

pub(crate) fn to_i32(value: u32, what: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| corrupt(what, value))
}

pub(crate) fn to_i64(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| corrupt(what, value))
}

/// `flash_sale_activities` row.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ActivityRow {
    id: Uuid,
    product_id: Uuid,
    sale_price_cents: i64,
    total_stock: i32,
    remaining_stock: i32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = StoreError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ActivityId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            sale_price: Money::from_cents(
                u64::try_from(row.sale_price_cents)
                    .map_err(|_| corrupt("sale_price_cents", row.sale_price_cents))?,
            ),
            total_stock: u32::try_from(row.total_stock)
                .map_err(|_| corrupt("total_stock", row.total_stock))?,
            remaining_stock: u32::try_from(row.remaining_stock)
                .map_err(|_| corrupt("remaining_stock", row.remaining_stock))?,
            start_time: row.start_time,
            end_time: row.end_time,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `flash_sale_orders` row.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OrderRow {
    id: Uuid,
    order_number: String,
    requester_id: Uuid,
    activity_id: Uuid,
    status: i16,
    payment_method: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for FlashSaleOrder {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::from_uuid(row.id),
            order_number: OrderNumber::new(row.order_number),
            requester_id: RequesterId::from_uuid(row.requester_id),
            activity_id: ActivityId::from_uuid(row.activity_id),
            status: OrderStatus::from_code(row.status)
                .ok_or_else(|| corrupt("status", row.status))?,
            payment_method: PaymentMethod::from_code(row.payment_method)
                .ok_or_else(|| corrupt("payment_method", row.payment_method))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `products` row.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: Uuid,
    name: String,
    list_price_cents: i64,
}

impl TryFrom<ProductRow> for ProductSummary {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            list_price: Money::from_cents(
                u64::try_from(row.list_price_cents)
                    .map_err(|_| corrupt("list_price_cents", row.list_price_cents))?,
            ),
        })
    }
}
