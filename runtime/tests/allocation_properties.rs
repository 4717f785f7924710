//! Property tests: stock and per-requester uniqueness over arbitrary request mixes.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use flashsale_core::{FlashSaleError, RequesterId, StockLedger};
use flashsale_testing::properties::{payment_method, request_burst};
use flashsale_testing::{CreateFault, TestBed};
use proptest::prelude::*;
use std::collections::HashMap;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Orders never exceed stock, each requester wins at most once, and the ledger
    /// plus created orders always add up to the initial stock.
    #[test]
    fn prop_stock_and_uniqueness_hold(
        stock in 0u32..20,
        requesters in 1usize..30,
        burst in request_burst(30, 120),
        method in payment_method(),
    ) {
        runtime().block_on(async {
            let bed = TestBed::new();
            let activity = bed.open_activity(stock).await;
            let pool: Vec<RequesterId> = (0..requesters).map(|_| RequesterId::new()).collect();

            let handles: Vec<_> = burst
                .iter()
                .map(|index| {
                    let service = bed.service.clone();
                    let requester = pool[index % pool.len()];
                    tokio::spawn(async move {
                        service.place_order(requester, activity.id, method).await
                    })
                })
                .collect();

            let mut wins: HashMap<RequesterId, u32> = HashMap::new();
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(order) => *wins.entry(order.requester_id).or_default() += 1,
                    Err(e) => {
                        let rejected = matches!(
                            e,
                            FlashSaleError::OutOfStock | FlashSaleError::AlreadyParticipated
                        );
                        prop_assert!(rejected, "unexpected error {:?}", e);
                    }
                }
            }

            let orders = bed.store.orders_for(activity.id);
            let created = u32::try_from(orders.len()).unwrap();
            prop_assert!(created <= stock);
            prop_assert!(wins.values().all(|count| *count == 1));
            prop_assert_eq!(created, u32::try_from(wins.len()).unwrap());

            let ledger = bed.ledger.remaining(activity.id).await.unwrap().unwrap();
            prop_assert_eq!(ledger + created, stock);
            prop_assert_eq!(bed.store.activity(activity.id).unwrap().remaining_stock, ledger);
            Ok(())
        })?;
    }

    /// With every durable write failing, compensation returns all stock and marks.
    #[test]
    fn prop_failed_writes_leave_no_trace(
        stock in 1u32..10,
        burst in request_burst(10, 40),
    ) {
        runtime().block_on(async {
            let bed = TestBed::new();
            let activity = bed.open_activity(stock).await;
            bed.store.fail_creates(CreateFault::FailAfterCommit);
            let pool: Vec<RequesterId> = (0..10).map(|_| RequesterId::new()).collect();

            for index in &burst {
                let result = bed.service.place_order(pool[*index], activity.id, method_for(*index)).await;
                let is_failure = matches!(result, Err(FlashSaleError::PersistenceFailure { .. }));
                prop_assert!(is_failure);
            }

            prop_assert_eq!(bed.store.order_count(), 0);
            prop_assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(stock));
            prop_assert_eq!(bed.store.activity(activity.id).unwrap().remaining_stock, stock);
            Ok(())
        })?;
    }
}

fn method_for(index: usize) -> flashsale_core::PaymentMethod {
    use flashsale_core::PaymentMethod;
    match index % 4 {
        0 => PaymentMethod::Alipay,
        1 => PaymentMethod::WechatPay,
        2 => PaymentMethod::BankTransfer,
        _ => PaymentMethod::CashOnDelivery,
    }
}
