//! Activity administration and its interaction with live reservations.
//!
//! Run with: `cargo test -p flashsale-runtime --test activity_admin`

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use flashsale_core::environment::Clock;
use flashsale_core::{
    ActivityId, FlashSaleError, Money, ParticipationGuard, PaymentMethod, ProductId, RequesterId,
    StockLedger,
};
use flashsale_testing::{CreateFault, TestBed};
use std::time::Duration;

const PAY: PaymentMethod = PaymentMethod::CashOnDelivery;

#[tokio::test]
async fn test_create_seeds_ledger() {
    let bed = TestBed::new();
    let activity = bed.open_activity(7).await;
    assert_eq!(activity.total_stock, 7);
    assert_eq!(activity.remaining_stock, 7);
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(7));
}

#[tokio::test]
async fn test_create_validates_window_and_product() {
    let bed = TestBed::new();
    let product = bed.product();

    let mut inverted = bed.live_spec(&product, 1);
    inverted.end_time = inverted.start_time;
    assert!(matches!(
        bed.service.create_activity(inverted).await,
        Err(FlashSaleError::InvalidActivity { .. })
    ));

    let mut unknown = bed.live_spec(&product, 1);
    unknown.product_id = ProductId::new();
    assert_eq!(
        bed.service.create_activity(unknown).await,
        Err(FlashSaleError::ProductNotFound)
    );
}

#[tokio::test]
async fn test_update_raises_stock_by_delta() {
    let bed = TestBed::new();
    let activity = bed.open_activity(5).await;
    bed.service
        .place_order(RequesterId::new(), activity.id, PAY)
        .await
        .unwrap();

    let product = bed.product();
    let mut spec = bed.live_spec(&product, 8);
    spec.sale_price = Money::from_cents(7_900);
    let updated = bed.service.update_activity(activity.id, spec).await.unwrap();

    assert_eq!(updated.total_stock, 8);
    assert_eq!(updated.remaining_stock, 7);
    assert_eq!(updated.sale_price, Money::from_cents(7_900));
    assert_eq!(updated.product_id, product.id);
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(7));
}

#[tokio::test]
async fn test_update_lowers_stock_without_touching_sold_units() {
    let bed = TestBed::new();
    let activity = bed.open_activity(5).await;
    bed.service
        .place_order(RequesterId::new(), activity.id, PAY)
        .await
        .unwrap();

    let product = bed.product();
    let updated = bed
        .service
        .update_activity(activity.id, bed.live_spec(&product, 2))
        .await
        .unwrap();
    assert_eq!(updated.total_stock, 2);
    assert_eq!(updated.remaining_stock, 1);
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(1));

    let below_sold = bed
        .service
        .update_activity(activity.id, bed.live_spec(&product, 0))
        .await;
    assert!(matches!(
        below_sold,
        Err(FlashSaleError::InvalidActivity { .. })
    ));
}

#[tokio::test]
async fn test_update_missing_activity() {
    let bed = TestBed::new();
    let product = bed.product();
    assert_eq!(
        bed.service
            .update_activity(ActivityId::new(), bed.live_spec(&product, 1))
            .await,
        Err(FlashSaleError::ActivityNotFound)
    );
}

/// Shrinking the total while two orders are still being written: only units
/// that are neither sold nor reserved may be removed.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_update_never_removes_reserved_units() {
    let bed = TestBed::new();
    let activity = bed.open_activity(3).await;
    let product = bed.product();
    bed.store
        .fail_creates(CreateFault::StallBeforeCommit(Duration::from_millis(300)));

    let in_flight: Vec<_> = (0..2)
        .map(|_| {
            let service = bed.service.clone();
            tokio::spawn(async move {
                service.place_order(RequesterId::new(), activity.id, PAY).await
            })
        })
        .collect();
    for _ in 0..100 {
        if bed.ledger.remaining(activity.id).await.unwrap() == Some(1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(1));
    assert_eq!(bed.store.order_count(), 0);

    // Two units are reserved but not yet written; only one can go
    let too_far = bed
        .service
        .update_activity(activity.id, bed.live_spec(&product, 1))
        .await;
    assert!(matches!(too_far, Err(FlashSaleError::InvalidActivity { .. })));
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(1));
    assert_eq!(bed.store.activity(activity.id).unwrap().total_stock, 3);

    let shrunk = bed
        .service
        .update_activity(activity.id, bed.live_spec(&product, 2))
        .await
        .unwrap();
    assert_eq!(shrunk.total_stock, 2);
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(0));

    for handle in in_flight {
        handle.await.unwrap().unwrap();
    }
    let durable = bed.store.activity(activity.id).unwrap();
    let orders = bed.store.orders_for(activity.id).len();
    assert_eq!(orders, 2);
    assert!(orders <= durable.total_stock as usize);
    assert_eq!(durable.remaining_stock, 0);
}

/// Two updates computed from the same total: each delta lands against the total
/// it was computed from, never both against the original.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_do_not_stack() {
    for _ in 0..25 {
        let bed = TestBed::new();
        let activity = bed.open_activity(5).await;
        let product = bed.product();

        let (a, b) = tokio::join!(
            {
                let service = bed.service.clone();
                let spec = bed.live_spec(&product, 8);
                tokio::spawn(async move { service.update_activity(activity.id, spec).await })
            },
            {
                let service = bed.service.clone();
                let spec = bed.live_spec(&product, 12);
                tokio::spawn(async move { service.update_activity(activity.id, spec).await })
            }
        );
        a.unwrap().unwrap();
        b.unwrap().unwrap();

        let durable = bed.store.activity(activity.id).unwrap();
        assert!(
            durable.total_stock == 8 || durable.total_stock == 12,
            "total {}",
            durable.total_stock
        );
        assert_eq!(durable.remaining_stock, durable.total_stock);
        assert_eq!(
            bed.ledger.remaining(activity.id).await.unwrap(),
            Some(durable.total_stock)
        );
    }
}

#[tokio::test]
async fn test_adjust_stock_sets_remaining_and_moves_total() {
    let bed = TestBed::new();
    let activity = bed.open_activity(5).await;
    bed.service
        .place_order(RequesterId::new(), activity.id, PAY)
        .await
        .unwrap();

    let adjusted = bed.service.adjust_stock(activity.id, 10).await.unwrap();
    assert_eq!(adjusted.remaining_stock, 10);
    assert_eq!(adjusted.total_stock, 11);
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(10));

    for _ in 0..2 {
        bed.service
            .place_order(RequesterId::new(), activity.id, PAY)
            .await
            .unwrap();
    }
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(8));
    assert_eq!(bed.store.activity(activity.id).unwrap().remaining_stock, 8);
}

#[tokio::test]
async fn test_adjust_stock_reseeds_missing_ledger() {
    let bed = TestBed::new();
    let activity = bed.open_activity(5).await;
    bed.ledger.clear_stock(activity.id).await.unwrap();

    let adjusted = bed.service.adjust_stock(activity.id, 3).await.unwrap();
    assert_eq!(adjusted.remaining_stock, 3);
    assert_eq!(adjusted.total_stock, 3);
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(3));
}

/// Scenario D: an adjustment racing three reservations never erases the ones
/// that land after it.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_adjust_stock_races_reservations() {
    for _ in 0..25 {
        let bed = TestBed::new();
        let activity = bed.open_activity(5).await;

        let reservations: Vec<_> = (0..3)
            .map(|_| {
                let service = bed.service.clone();
                tokio::spawn(async move {
                    service.place_order(RequesterId::new(), activity.id, PAY).await
                })
            })
            .collect();
        let admin = {
            let service = bed.service.clone();
            tokio::spawn(async move { service.adjust_stock(activity.id, 10).await })
        };

        admin.await.unwrap().unwrap();
        let mut committed = 0;
        for handle in reservations {
            handle.await.unwrap().unwrap();
            committed += 1;
        }
        assert_eq!(committed, 3);

        // Before the swap the ledger counts down from 5 (values <= 4); after it,
        // from 10 (values >= 7).
        let orders = bed.store.orders_for(activity.id);
        assert_eq!(orders.len(), 3);
        let ledger = bed.ledger.remaining(activity.id).await.unwrap().unwrap();
        assert!((7..=10).contains(&ledger), "ledger {ledger}");
        let durable = bed.store.activity(activity.id).unwrap();
        assert_eq!(durable.remaining_stock, ledger);
    }
}

#[tokio::test]
async fn test_adjust_missing_activity() {
    let bed = TestBed::new();
    assert_eq!(
        bed.service.adjust_stock(ActivityId::new(), 3).await,
        Err(FlashSaleError::ActivityNotFound)
    );
}

#[tokio::test]
async fn test_delete_removes_orders_and_fast_state() {
    let bed = TestBed::new();
    let activity = bed.open_activity(5).await;
    let requester = RequesterId::new();
    bed.service.place_order(requester, activity.id, PAY).await.unwrap();

    bed.service.delete_activity(activity.id).await.unwrap();

    assert!(bed.store.activity(activity.id).is_none());
    assert!(bed.store.orders_for(activity.id).is_empty());
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), None);
    assert!(!bed.ledger.is_marked(activity.id, requester).await.unwrap());
    assert_eq!(
        bed.service.delete_activity(activity.id).await,
        Err(FlashSaleError::ActivityNotFound)
    );
    assert_eq!(
        bed.service.get_activity(activity.id).await,
        Err(FlashSaleError::ActivityNotFound)
    );
}

#[tokio::test]
async fn test_ledger_expires_after_activity_end_plus_margin() {
    let bed = TestBed::new();
    let activity = bed.open_activity(2).await;

    bed.clock
        .set(activity.end_time + chrono::Duration::hours(23));
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), Some(2));

    bed.clock
        .set(activity.end_time + chrono::Duration::hours(25));
    assert!(bed.clock.now() > activity.end_time);
    assert_eq!(bed.ledger.remaining(activity.id).await.unwrap(), None);
}
