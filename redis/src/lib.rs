//! Redis-backed fast path for the flash-sale core.
//!
//! [`RedisAdmissionGate`] implements the stock ledger, the participation guard and
//! the combined admission decision on a shared Redis instance.
//!
//! # Keys
//!
//! - `flashsale:{<activity>}:stock`: integer remaining units
//! - `flashsale:{<activity>}:participants`: set of requester ids holding a reservation
//!
//! Both keys share a hash tag so the admission script can touch them together on a
//! cluster.
//!
//! # Atomicity
//!
//! Every read-modify-write runs as a Lua script, which Redis executes without
//! interleaving. No operation reads a value on the client and writes it back.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use flashsale_core::{
    ActivityId, Admission, AdmissionGate, MarkOutcome, ParticipationGuard, RequesterId,
    ReserveOutcome, StockLedger, StoreError, StoreFuture,
};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use std::sync::LazyLock;
use std::time::Duration;

/// Mark wins over stock; a missing stock key reports "not initialized".
///
/// Returns `{code, remaining}` with code 1 admitted, 0 out of stock,
/// 2 already participated, 3 not initialized.
static ADMIT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        if redis.call('SISMEMBER', KEYS[2], ARGV[1]) == 1 then
            return {2, 0}
        end
        local stock = redis.call('GET', KEYS[1])
        if not stock then
            return {3, 0}
        end
        stock = tonumber(stock)
        local quantity = tonumber(ARGV[2])
        if stock < quantity then
            return {0, stock}
        end
        local remaining = redis.call('DECRBY', KEYS[1], quantity)
        redis.call('SADD', KEYS[2], ARGV[1])
        redis.call('PEXPIRE', KEYS[2], ARGV[3])
        return {1, remaining}
        ",
    )
});

/// Remaining after the decrement, or -1 when there is not enough stock.
static RESERVE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local stock = redis.call('GET', KEYS[1])
        if not stock or tonumber(stock) < tonumber(ARGV[1]) then
            return -1
        end
        return redis.call('DECRBY', KEYS[1], ARGV[1])
        ",
    )
});

/// New value, or -1 when the key is absent.
static RESTORE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        if redis.call('EXISTS', KEYS[1]) == 0 then
            return -1
        end
        return redis.call('INCRBY', KEYS[1], ARGV[1])
        ",
    )
});

/// Units removed (clamped at zero remaining), or -1 when the key is absent.
static WITHDRAW: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local stock = redis.call('GET', KEYS[1])
        if not stock then
            return -1
        end
        local taken = math.min(tonumber(stock), tonumber(ARGV[1]))
        if taken > 0 then
            redis.call('DECRBY', KEYS[1], taken)
        end
        return taken
        ",
    )
});

fn cache_error(context: &'static str) -> impl Fn(RedisError) -> StoreError {
    move |e| StoreError::Cache(format!("{context}: {e}"))
}

fn count(value: i64, what: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{what} out of range: {value}")))
}

/// Milliseconds for `PX`/`PEXPIRE`, at least one.
#[allow(clippy::cast_possible_truncation)] // Ledger TTLs are days, far below u64::MAX ms
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

/// `Redis` implementation of [`AdmissionGate`].
///
/// # Example
///
/// ```no_run
/// use flashsale_redis::RedisAdmissionGate;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gate = RedisAdmissionGate::new("redis://127.0.0.1:6379").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisAdmissionGate {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl std::fmt::Debug for RedisAdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisAdmissionGate").finish_non_exhaustive()
    }
}

impl RedisAdmissionGate {
    /// Connect to `Redis`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Cache`] if the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(cache_error("open redis client"))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(cache_error("create redis connection manager"))?;

        tracing::info!("Connected to Redis");
        Ok(Self { conn_manager })
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn stock_key(id: ActivityId) -> String {
        format!("flashsale:{{{id}}}:stock")
    }

    fn participants_key(id: ActivityId) -> String {
        format!("flashsale:{{{id}}}:participants")
    }
}

impl StockLedger for RedisAdmissionGate {
    fn try_reserve(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, ReserveOutcome> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let remaining: i64 = RESERVE
                .key(Self::stock_key(id))
                .arg(quantity)
                .invoke_async(&mut conn)
                .await
                .map_err(cache_error("reserve stock"))?;

            if remaining < 0 {
                return Ok(ReserveOutcome::InsufficientStock);
            }
            Ok(ReserveOutcome::Reserved {
                remaining: count(remaining, "stock")?,
            })
        })
    }

    fn restore(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, Option<u32>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let value: i64 = RESTORE
                .key(Self::stock_key(id))
                .arg(quantity)
                .invoke_async(&mut conn)
                .await
                .map_err(cache_error("restore stock"))?;

            if value < 0 {
                return Ok(None);
            }
            count(value, "stock").map(Some)
        })
    }

    fn withdraw(&self, id: ActivityId, quantity: u32) -> StoreFuture<'_, Option<u32>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let taken: i64 = WITHDRAW
                .key(Self::stock_key(id))
                .arg(quantity)
                .invoke_async(&mut conn)
                .await
                .map_err(cache_error("withdraw stock"))?;

            if taken < 0 {
                return Ok(None);
            }
            count(taken, "withdrawn").map(Some)
        })
    }

    fn set_remaining(
        &self,
        id: ActivityId,
        value: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, Option<u32>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            // SET .. GET swaps in one command (Redis 6.2+)
            let previous: Option<i64> = redis::cmd("SET")
                .arg(Self::stock_key(id))
                .arg(value)
                .arg("PX")
                .arg(ttl_millis(ttl))
                .arg("GET")
                .query_async(&mut conn)
                .await
                .map_err(cache_error("set stock"))?;

            tracing::debug!(activity_id = %id, value, ?previous, "Stock ledger replaced");
            previous.map(|p| count(p, "stock")).transpose()
        })
    }

    fn seed_if_absent(&self, id: ActivityId, value: u32, ttl: Duration) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let written: Option<String> = redis::cmd("SET")
                .arg(Self::stock_key(id))
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(cache_error("seed stock"))?;

            Ok(written.is_some())
        })
    }

    fn remaining(&self, id: ActivityId) -> StoreFuture<'_, Option<u32>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let value: Option<i64> = conn
                .get(Self::stock_key(id))
                .await
                .map_err(cache_error("read stock"))?;

            value.map(|v| count(v, "stock")).transpose()
        })
    }

    fn refresh_expiry(&self, id: ActivityId, ttl: Duration) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let millis = ttl_millis(ttl);
            let _: () = redis::pipe()
                .atomic()
                .cmd("PEXPIRE")
                .arg(Self::stock_key(id))
                .arg(millis)
                .ignore()
                .cmd("PEXPIRE")
                .arg(Self::participants_key(id))
                .arg(millis)
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(cache_error("refresh expiry"))?;
            Ok(())
        })
    }

    fn clear_stock(&self, id: ActivityId) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = conn
                .del(Self::stock_key(id))
                .await
                .map_err(cache_error("clear stock"))?;
            Ok(())
        })
    }
}

impl ParticipationGuard for RedisAdmissionGate {
    fn try_mark(
        &self,
        id: ActivityId,
        requester: RequesterId,
        ttl: Duration,
    ) -> StoreFuture<'_, MarkOutcome> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let key = Self::participants_key(id);
            let (added,): (i64,) = redis::pipe()
                .atomic()
                .sadd(&key, requester.to_string())
                .cmd("PEXPIRE")
                .arg(&key)
                .arg(ttl_millis(ttl))
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(cache_error("mark requester"))?;

            Ok(if added == 1 {
                MarkOutcome::Marked
            } else {
                MarkOutcome::AlreadyMarked
            })
        })
    }

    fn unmark(&self, id: ActivityId, requester: RequesterId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let removed: i64 = conn
                .srem(Self::participants_key(id), requester.to_string())
                .await
                .map_err(cache_error("unmark requester"))?;
            Ok(removed > 0)
        })
    }

    fn is_marked(&self, id: ActivityId, requester: RequesterId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let marked: bool = conn
                .sismember(Self::participants_key(id), requester.to_string())
                .await
                .map_err(cache_error("check mark"))?;
            Ok(marked)
        })
    }

    fn clear_marks(&self, id: ActivityId) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = conn
                .del(Self::participants_key(id))
                .await
                .map_err(cache_error("clear marks"))?;
            Ok(())
        })
    }
}

impl AdmissionGate for RedisAdmissionGate {
    fn admit(
        &self,
        id: ActivityId,
        requester: RequesterId,
        quantity: u32,
        ttl: Duration,
    ) -> StoreFuture<'_, Admission> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let (code, remaining): (i64, i64) = ADMIT
                .key(Self::stock_key(id))
                .key(Self::participants_key(id))
                .arg(requester.to_string())
                .arg(quantity)
                .arg(ttl_millis(ttl))
                .invoke_async(&mut conn)
                .await
                .map_err(cache_error("admit"))?;

            match code {
                1 => Ok(Admission::Admitted {
                    remaining: count(remaining, "stock")?,
                }),
                0 => Ok(Admission::OutOfStock),
                2 => Ok(Admission::AlreadyParticipated),
                3 => Ok(Admission::NotInitialized),
                other => Err(StoreError::Corrupt(format!("unknown admission code {other}"))),
            }
        })
    }
}
