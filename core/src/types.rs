//! Domain types for the flash-sale allocation core.
//!
//! Value objects (identifiers, money, order numbers), the durable `Activity` and
//! `FlashSaleOrder` records, and the request/response shapes exchanged with callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a flash-sale activity
    ActivityId
);
uuid_id!(
    /// Unique identifier for the party competing for stock (a shopper)
    RequesterId
);
uuid_id!(
    /// Reference to a product owned by the external catalog
    ProductId
);
uuid_id!(
    /// Surrogate key of a persisted flash-sale order
    OrderId
);

/// Globally unique, human-facing order number.
///
/// Generated once per reservation and carried unchanged through persistence and,
/// on failure, compensation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Wrap an already generated order number
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the order number as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Monetary amount in the smallest currency unit (cents).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Payment method chosen by the requester when competing.
///
/// Capture happens elsewhere; the method is only recorded on the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Alipay wallet
    Alipay,
    /// WeChat Pay wallet
    WechatPay,
    /// Bank transfer
    BankTransfer,
    /// Cash on delivery
    CashOnDelivery,
}

impl PaymentMethod {
    /// Stable integer code used by the durable store
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Alipay => 1,
            Self::WechatPay => 2,
            Self::BankTransfer => 3,
            Self::CashOnDelivery => 4,
        }
    }

    /// Parse a stored code
    #[must_use]
    pub const fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::Alipay),
            2 => Some(Self::WechatPay),
            3 => Some(Self::BankTransfer),
            4 => Some(Self::CashOnDelivery),
            _ => None,
        }
    }
}

/// Lifecycle status of a flash-sale order.
///
/// This core creates orders as `Pending` and only ever performs
/// `Pending → Cancelled`; the remaining transitions belong to the surrounding
/// order lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment
    Pending,
    /// Payment captured
    Paid,
    /// Handed to the carrier
    Shipped,
    /// Delivered and closed
    Completed,
    /// Cancelled before payment; stock returned
    Cancelled,
    /// Refund in progress
    Refunding,
    /// Refund settled
    Refunded,
}

impl OrderStatus {
    /// Stable integer code used by the durable store
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Paid => 1,
            Self::Shipped => 2,
            Self::Completed => 3,
            Self::Cancelled => 4,
            Self::Refunding => 5,
            Self::Refunded => 6,
        }
    }

    /// Parse a stored code
    #[must_use]
    pub const fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Paid),
            2 => Some(Self::Shipped),
            3 => Some(Self::Completed),
            4 => Some(Self::Cancelled),
            5 => Some(Self::Refunding),
            6 => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Whether an order in this status still holds its unit of stock
    #[must_use]
    pub const fn holds_stock(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

// ============================================================================
// Activity
// ============================================================================

/// Where `now` falls relative to an activity's sale window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaleWindow {
    /// The sale opens in `wait_millis` milliseconds
    NotYetOpen {
        /// Milliseconds until `start_time`, never less than 1
        wait_millis: i64,
    },
    /// The sale is live
    Open,
    /// The sale is over or disabled
    Closed,
}

/// A time-boxed, limited-stock sale of one product at a special price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity identifier
    pub id: ActivityId,
    /// Product on sale
    pub product_id: ProductId,
    /// Flash-sale price
    pub sale_price: Money,
    /// Advertised stock
    pub total_stock: u32,
    /// Durable mirror of the fast stock ledger
    pub remaining_stock: u32,
    /// Sale opens (inclusive)
    pub start_time: DateTime<Utc>,
    /// Sale closes (inclusive)
    pub end_time: DateTime<Utc>,
    /// Administrative on/off switch
    pub active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// Build a fresh activity from an administrative spec.
    ///
    /// The durable counter starts equal to the advertised stock.
    #[must_use]
    pub fn from_spec(id: ActivityId, spec: &ActivitySpec, now: DateTime<Utc>) -> Self {
        Self {
            id,
            product_id: spec.product_id,
            sale_price: spec.sale_price,
            total_stock: spec.total_stock,
            remaining_stock: spec.total_stock,
            start_time: spec.start_time,
            end_time: spec.end_time,
            active: spec.active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Classify `now` against the sale window.
    ///
    /// A disabled activity is always `Closed`, whatever its window says.
    #[must_use]
    pub fn window_at(&self, now: DateTime<Utc>) -> SaleWindow {
        if !self.active || now > self.end_time {
            SaleWindow::Closed
        } else if now < self.start_time {
            SaleWindow::NotYetOpen {
                wait_millis: (self.start_time - now).num_milliseconds().max(1),
            }
        } else {
            SaleWindow::Open
        }
    }

    /// `active AND start_time <= now <= end_time`
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.window_at(now) == SaleWindow::Open
    }

    /// `active AND now < start_time < now + horizon`
    #[must_use]
    pub fn is_upcoming(&self, now: DateTime<Utc>, horizon: chrono::Duration) -> bool {
        self.active && self.start_time > now && self.start_time < now + horizon
    }

    /// Lifetime of the fast-store entries for this activity: until `end_time + margin`.
    ///
    /// When that instant has already passed, the margin itself is used so that a
    /// freshly written entry never expires immediately.
    #[must_use]
    pub fn ledger_ttl(&self, now: DateTime<Utc>, margin: std::time::Duration) -> std::time::Duration {
        let margin_delta = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::hours(24));
        (self.end_time + margin_delta - now)
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or(margin)
    }
}

/// Administrative description of an activity (create and update input).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySpec {
    /// Product on sale
    pub product_id: ProductId,
    /// Flash-sale price
    pub sale_price: Money,
    /// Advertised stock
    pub total_stock: u32,
    /// Sale opens
    pub start_time: DateTime<Utc>,
    /// Sale closes
    pub end_time: DateTime<Utc>,
    /// Administrative on/off switch
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl ActivitySpec {
    /// Validates invariants that do not need any collaborator.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when `end_time <= start_time`.
    pub fn validate(&self) -> Result<(), String> {
        if self.end_time <= self.start_time {
            return Err(format!(
                "end time {} must be after start time {}",
                self.end_time, self.start_time
            ));
        }
        Ok(())
    }
}

/// Read-only product data resolved through the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    /// Product identifier
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Regular list price
    pub list_price: Money,
}

/// Activity joined with its product, as shown in listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    /// Activity identifier
    pub id: ActivityId,
    /// Flash-sale price
    pub sale_price: Money,
    /// Advertised stock
    pub total_stock: u32,
    /// Durable remaining count
    pub remaining_stock: u32,
    /// Sale opens
    pub start_time: DateTime<Utc>,
    /// Sale closes
    pub end_time: DateTime<Utc>,
    /// Administrative on/off switch
    pub active: bool,
    /// Product on sale
    pub product: ProductSummary,
}

impl ActivitySummary {
    /// Join an activity with its resolved product
    #[must_use]
    pub fn new(activity: &Activity, product: ProductSummary) -> Self {
        Self {
            id: activity.id,
            sale_price: activity.sale_price,
            total_stock: activity.total_stock,
            remaining_stock: activity.remaining_stock,
            start_time: activity.start_time,
            end_time: activity.end_time,
            active: activity.active,
            product,
        }
    }
}

// ============================================================================
// Orders
// ============================================================================

/// A persisted flash-sale order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSaleOrder {
    /// Surrogate key
    pub id: OrderId,
    /// Unique order number
    pub order_number: OrderNumber,
    /// Who won the unit
    pub requester_id: RequesterId,
    /// Which activity the unit came from
    pub activity_id: ActivityId,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Chosen payment method
    pub payment_method: PaymentMethod,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Everything the recorder needs to persist an order after a successful admission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrder {
    /// Pre-generated order number, kept for compensation
    pub order_number: OrderNumber,
    /// Winner
    pub requester_id: RequesterId,
    /// Activity
    pub activity_id: ActivityId,
    /// Chosen payment method
    pub payment_method: PaymentMethod,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Materialise the pending order this request describes
    #[must_use]
    pub fn into_order(self, id: OrderId) -> FlashSaleOrder {
        FlashSaleOrder {
            id,
            order_number: self.order_number,
            requester_id: self.requester_id,
            activity_id: self.activity_id,
            status: OrderStatus::Pending,
            payment_method: self.payment_method,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Caller-facing outcome of `ExecuteFlashSale`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashSaleResult {
    /// Whether an order was created
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Order number on success
    pub order_number: Option<OrderNumber>,
    /// Milliseconds until the sale opens; non-zero only for "not yet open"
    pub wait_millis: i64,
}

impl FlashSaleResult {
    /// Successful outcome carrying the created order's number
    #[must_use]
    pub fn ordered(order_number: OrderNumber) -> Self {
        Self {
            success: true,
            message: "Flash sale order created".to_string(),
            order_number: Some(order_number),
            wait_millis: 0,
        }
    }
}

impl From<Result<FlashSaleOrder, crate::error::FlashSaleError>> for FlashSaleResult {
    fn from(result: Result<FlashSaleOrder, crate::error::FlashSaleError>) -> Self {
        match result {
            Ok(order) => Self::ordered(order.order_number),
            Err(error) => Self {
                success: false,
                message: error.to_string(),
                order_number: None,
                wait_millis: error.wait_millis(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn activity(start: DateTime<Utc>, end: DateTime<Utc>) -> Activity {
        let spec = ActivitySpec {
            product_id: ProductId::new(),
            sale_price: Money::from_cents(999),
            total_stock: 5,
            start_time: start,
            end_time: end,
            active: true,
        };
        Activity::from_spec(ActivityId::new(), &spec, start)
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 11, 0, 0).unwrap();
        let a = activity(t0, t1);

        assert_eq!(a.window_at(t0), SaleWindow::Open);
        assert_eq!(a.window_at(t1), SaleWindow::Open);
        assert_eq!(
            a.window_at(t0 - chrono::Duration::seconds(1)),
            SaleWindow::NotYetOpen { wait_millis: 1000 }
        );
        assert_eq!(a.window_at(t1 + chrono::Duration::seconds(1)), SaleWindow::Closed);
    }

    #[test]
    fn test_sub_millisecond_wait_still_reports_a_wait() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let a = activity(t0, t0 + chrono::Duration::hours(1));

        assert_eq!(
            a.window_at(t0 - chrono::Duration::microseconds(500)),
            SaleWindow::NotYetOpen { wait_millis: 1 }
        );
    }

    #[test]
    fn test_disabled_activity_is_closed() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let mut a = activity(t0, t0 + chrono::Duration::hours(1));
        a.active = false;
        assert_eq!(a.window_at(t0 - chrono::Duration::minutes(5)), SaleWindow::Closed);
        assert!(!a.is_live_at(t0));
    }

    #[test]
    fn test_upcoming_respects_horizon() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let soon = activity(now + chrono::Duration::hours(2), now + chrono::Duration::hours(3));
        let later = activity(now + chrono::Duration::hours(30), now + chrono::Duration::hours(31));
        let horizon = chrono::Duration::hours(24);

        assert!(soon.is_upcoming(now, horizon));
        assert!(!later.is_upcoming(now, horizon));
        assert!(!soon.is_upcoming(soon.start_time, horizon));
    }

    #[test]
    fn test_ledger_ttl_extends_past_end() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let a = activity(now, now + chrono::Duration::hours(1));
        let margin = std::time::Duration::from_secs(24 * 3600);
        assert_eq!(a.ledger_ttl(now, margin).as_secs(), 25 * 3600);

        // Already past end + margin: fall back to the margin itself
        let old = activity(now - chrono::Duration::days(10), now - chrono::Duration::days(9));
        assert_eq!(old.ledger_ttl(now, margin), margin);
    }

    #[test]
    fn test_spec_rejects_inverted_window() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let spec = ActivitySpec {
            product_id: ProductId::new(),
            sale_price: Money::from_cents(100),
            total_stock: 1,
            start_time: now,
            end_time: now,
            active: true,
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_status_and_payment_codes() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Refunding,
            OrderStatus::Refunded,
        ] {
            assert_eq!(OrderStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(OrderStatus::from_code(42), None);
        assert_eq!(PaymentMethod::from_code(2), Some(PaymentMethod::WechatPay));
        assert_eq!(PaymentMethod::from_code(0), None);
        assert!(!OrderStatus::Cancelled.holds_stock());
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = FlashSaleResult::ordered(OrderNumber::new("20250101000000000000001"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["orderNumber"], "20250101000000000000001");
        assert_eq!(json["waitMillis"], 0);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(129_900).to_string(), "1299.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
    }
}
