//! Integration tests for the order, payment and loyalty services.
//!
//! These run against the in-memory datastore seeded with the demo catalog and
//! cover the full lifecycle, rollback on failure and concurrent completion.

use std::time::Duration;

use common::{
    BranchId, CurrencyId, CustomerId, DrinkOptionId, EmployeeId, EmployeeRole, ExtraId, MenuId,
    OrderId, OrderStatus, PaymentMethod,
};
use datastore::{Customer, Datastore, FailPoint, MemoryDatastore, MenuItem};
use domain::{
    CafeError, Caller, CartItem, ErrorKind, LoyaltyLedger, OrderLifecycle, OrderStore,
    PaymentRecorder, PaymentRequest, PricingSource, TransitionPolicy,
};
use rust_decimal::Decimal;

struct Services {
    store: MemoryDatastore,
    orders: OrderStore<MemoryDatastore>,
    lifecycle: OrderLifecycle<MemoryDatastore>,
    payments: PaymentRecorder<MemoryDatastore>,
    loyalty: LoyaltyLedger<MemoryDatastore>,
}

/// Helper to create services over a seeded in-memory datastore
async fn create_services(policy: TransitionPolicy, pricing: PricingSource) -> Services {
    let store = MemoryDatastore::new();
    store.seed_demo().await;
    store
        .insert_customer(Customer {
            id: CustomerId::new(2),
            name: "Other Customer".to_string(),
            email: "other@example.com".to_string(),
            phone_num: None,
        })
        .await;

    Services {
        orders: OrderStore::new(store.clone()).with_pricing(pricing),
        lifecycle: OrderLifecycle::new(store.clone()).with_policy(policy),
        payments: PaymentRecorder::new(store.clone()),
        loyalty: LoyaltyLedger::new(store.clone()),
        store,
    }
}

async fn client_priced() -> Services {
    create_services(TransitionPolicy::Strict, PricingSource::Client).await
}

fn customer() -> Caller {
    Caller::customer(CustomerId::new(1))
}

fn staff() -> Caller {
    Caller::employee(
        EmployeeId::new(3),
        EmployeeRole::Staff,
        Some(BranchId::new(1)),
    )
}

fn priced_item(price: i64, quantity: i32) -> CartItem {
    CartItem::new(MenuId::new(1), quantity).with_price(Decimal::from(price))
}

async fn place(services: &Services, total: i64) -> OrderId {
    services
        .orders
        .create(&customer(), BranchId::new(1), &[priced_item(total, 1)])
        .await
        .unwrap()
        .order_id
}

fn payment(order_id: OrderId, currency: i64, method: &str, amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        order_id,
        currency_id: CurrencyId::new(currency),
        payment_method: method.to_string(),
        amount_paid: amount,
    }
}

async fn enroll_with_points(services: &Services, points: i64) -> common::LoyaltyId {
    let card = services.loyalty.enroll(&customer()).await.unwrap().card;
    if points > 0 {
        let earned = services
            .loyalty
            .earn(card.id, Decimal::from(points * 50))
            .await
            .unwrap();
        assert_eq!(earned, points);
    }
    card.id
}

mod order_creation {
    use super::*;

    #[tokio::test]
    async fn total_is_sum_of_price_times_quantity() {
        let services = client_priced().await;

        let placed = services
            .orders
            .create(
                &customer(),
                BranchId::new(1),
                &[priced_item(120, 2), priced_item(95, 1)],
            )
            .await
            .unwrap();

        assert_eq!(placed.total_amount, Decimal::from(335));
        assert_eq!(placed.status, OrderStatus::Pending);
        assert_eq!(placed.loyalty_id, None);

        let order = services.store.order(placed.order_id).await.unwrap();
        assert_eq!(order.total_amount, Decimal::from(335));
        assert_eq!(services.store.order_items(placed.order_id).await.len(), 2);

        let history = services.store.history(placed.order_id).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Pending);
        assert_eq!(history[0].employee_id, None);
        assert_eq!(history[0].remarks, "Order created by customer");
    }

    #[tokio::test]
    async fn active_card_is_snapshotted_onto_order() {
        let services = client_priced().await;
        let loyalty_id = enroll_with_points(&services, 0).await;

        let order_id = place(&services, 300).await;
        let order = services.store.order(order_id).await.unwrap();
        assert_eq!(order.loyalty_id, Some(loyalty_id));
    }

    #[tokio::test]
    async fn catalog_pricing_ignores_client_price() {
        let services = create_services(TransitionPolicy::Strict, PricingSource::Catalog).await;

        // Iced Cafe Latte (150 + 20) with two extra shots (2 × 30)
        let item = CartItem::new(MenuId::new(2), 2)
            .with_price(Decimal::ONE)
            .with_drink_option(DrinkOptionId::new(4))
            .with_extra(ExtraId::new(1), 2);

        let placed = services
            .orders
            .create(&customer(), BranchId::new(1), &[item])
            .await
            .unwrap();

        assert_eq!(placed.total_amount, Decimal::from(460));
        let items = services.store.order_items(placed.order_id).await;
        assert_eq!(items[0].price, Decimal::from(230));
        assert_eq!(items[0].drink_option_id, Some(DrinkOptionId::new(4)));
    }

    #[tokio::test]
    async fn catalog_pricing_rejects_foreign_drink_option() {
        let services = create_services(TransitionPolicy::Strict, PricingSource::Catalog).await;

        // Option 4 belongs to the latte, not the americano
        let item = CartItem::new(MenuId::new(1), 1).with_drink_option(DrinkOptionId::new(4));
        let err = services
            .orders
            .create(&customer(), BranchId::new(1), &[item])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(services.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn catalog_pricing_rejects_unknown_or_unavailable_items() {
        let services = create_services(TransitionPolicy::Strict, PricingSource::Catalog).await;
        services
            .store
            .insert_menu_item(MenuItem {
                id: MenuId::new(50),
                name: "Seasonal Cake".to_string(),
                description: None,
                price: Decimal::from(180),
                is_available: false,
            })
            .await;

        for menu_id in [99, 50] {
            let err = services
                .orders
                .create(
                    &customer(),
                    BranchId::new(1),
                    &[CartItem::new(MenuId::new(menu_id), 1)],
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let err = services
            .orders
            .create(
                &customer(),
                BranchId::new(1),
                &[CartItem::new(MenuId::new(1), 1).with_extra(ExtraId::new(77), 1)],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(services.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn malformed_carts_are_rejected() {
        let services = client_priced().await;

        let err = services
            .orders
            .create(&customer(), BranchId::new(1), &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Order must contain at least one item");

        let err = services
            .orders
            .create(&customer(), BranchId::new(1), &[priced_item(100, 0)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = services
            .orders
            .create(
                &customer(),
                BranchId::new(1),
                &[CartItem::new(MenuId::new(1), 1)],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn unknown_branch_is_not_found() {
        let services = client_priced().await;
        let err = services
            .orders
            .create(&customer(), BranchId::new(9), &[priced_item(100, 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn only_customers_may_order() {
        let services = client_priced().await;

        let err = services
            .orders
            .create(&Caller::Anonymous, BranchId::new(1), &[priced_item(100, 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let err = services
            .orders
            .create(&staff(), BranchId::new(1), &[priced_item(100, 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn failed_insert_leaves_no_partial_order() {
        let services = client_priced().await;
        services.store.fail_on(FailPoint::InsertOrderItemExtra);

        let item = priced_item(150, 1).with_extra(ExtraId::new(1), 1);
        let err = services
            .orders
            .create(&customer(), BranchId::new(1), &[item])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.is_retryable());
        assert_eq!(services.store.order_count().await, 0);
        assert!(
            services
                .store
                .list_orders(datastore::OrderScope::All)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn failed_history_insert_rolls_back_order() {
        let services = client_priced().await;
        services.store.fail_on(FailPoint::AppendHistory);

        assert!(
            services
                .orders
                .create(&customer(), BranchId::new(1), &[priced_item(150, 1)])
                .await
                .is_err()
        );
        assert_eq!(services.store.order_count().await, 0);

        services.store.clear_fail_points();
        place(&services, 150).await;
        assert_eq!(services.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn busy_datastore_reports_retryable_error() {
        let store = MemoryDatastore::new().with_lock_timeout(Duration::from_millis(50));
        store.seed_demo().await;
        let orders = OrderStore::new(store.clone()).with_pricing(PricingSource::Client);

        let held = store.begin().await.unwrap();
        let err = orders
            .create(&customer(), BranchId::new(1), &[priced_item(100, 1)])
            .await
            .unwrap_err();
        drop(held);

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.is_retryable());
    }
}

mod payments {
    use super::*;

    #[tokio::test]
    async fn gcash_payment_confirms_pending_order() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;

        let receipt = services
            .payments
            .record(
                &customer(),
                payment(order_id, 1, "gcash", Decimal::from(300)),
            )
            .await
            .unwrap();

        assert_eq!(receipt.payment_method, PaymentMethod::BankTransfer);
        assert_eq!(receipt.order_status, OrderStatus::Confirmed);
        assert_eq!(receipt.amount_php, Decimal::from(300));

        let order = services.store.order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);

        let transactions = services.store.transactions(order_id).await;
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].payment_method, PaymentMethod::BankTransfer);
        assert_eq!(transactions[0].exchange_rate, Decimal::ONE);

        let history = services.store.history(order_id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, OrderStatus::Confirmed);
        assert_eq!(history[1].remarks, "Payment received");
        assert_eq!(history[1].employee_id, None);
    }

    #[tokio::test]
    async fn employee_payment_is_attributed() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;

        services
            .payments
            .record(&staff(), payment(order_id, 1, "cash", Decimal::from(300)))
            .await
            .unwrap();

        let history = services.store.history(order_id).await;
        assert_eq!(history[1].employee_id, Some(EmployeeId::new(3)));
    }

    #[tokio::test]
    async fn second_payment_is_rejected_without_new_row() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;
        let request = payment(order_id, 1, "cash", Decimal::from(300));

        services
            .payments
            .record(&customer(), request.clone())
            .await
            .unwrap();
        let err = services
            .payments
            .record(&customer(), request)
            .await
            .unwrap_err();

        assert!(matches!(err, CafeError::AlreadyPaid));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(services.store.transactions(order_id).await.len(), 1);
        assert_eq!(services.store.history(order_id).await.len(), 2);
    }

    #[tokio::test]
    async fn converted_mismatch_is_rejected_with_both_amounts() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;

        // 5.391 USD at 0.018 is 299.50 PHP
        let err = services
            .payments
            .record(
                &customer(),
                payment(order_id, 2, "card", Decimal::new(5391, 3)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "Payment amount mismatch. Expected: ₱300.00, Received: ₱299.50"
        );
        assert!(services.store.transactions(order_id).await.is_empty());
        let order = services.store.order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn foreign_currency_payment_within_tolerance() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;

        let receipt = services
            .payments
            .record(&customer(), payment(order_id, 2, "card", Decimal::new(540, 2)))
            .await
            .unwrap();

        assert_eq!(receipt.amount_paid, Decimal::new(540, 2));
        assert_eq!(receipt.amount_php, Decimal::from(300));
        assert_eq!(receipt.exchange_rate, Decimal::new(180, 4));
    }

    #[tokio::test]
    async fn paying_confirmed_order_keeps_status() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;
        services
            .lifecycle
            .transition(&staff(), order_id, "confirmed", None)
            .await
            .unwrap();

        let receipt = services
            .payments
            .record(&customer(), payment(order_id, 1, "cash", Decimal::from(300)))
            .await
            .unwrap();

        assert_eq!(receipt.order_status, OrderStatus::Confirmed);
        assert_eq!(services.store.history(order_id).await.len(), 2);
    }

    #[tokio::test]
    async fn missing_order_currency_or_method() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;

        let err = services
            .payments
            .record(
                &customer(),
                payment(OrderId::new(999), 1, "cash", Decimal::from(300)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Order not found");

        let err = services
            .payments
            .record(&customer(), payment(order_id, 42, "cash", Decimal::from(300)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Currency not found");

        let err = services
            .payments
            .record(&customer(), payment(order_id, 1, "barter", Decimal::from(300)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid payment method");
    }

    #[tokio::test]
    async fn failed_status_update_discards_transaction() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;
        services.store.fail_on(FailPoint::UpdateOrderStatus);

        let err = services
            .payments
            .record(&customer(), payment(order_id, 1, "cash", Decimal::from(300)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(services.store.transactions(order_id).await.is_empty());
        assert_eq!(
            services.store.order(order_id).await.unwrap().status,
            OrderStatus::Pending
        );
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn completion_earns_floor_of_total_over_fifty() {
        let services = client_priced().await;
        let loyalty_id = enroll_with_points(&services, 0).await;
        let order_id = place(&services, 550).await;

        services
            .lifecycle
            .transition(&staff(), order_id, "confirmed", None)
            .await
            .unwrap();
        let outcome = services
            .lifecycle
            .transition(&staff(), order_id, "completed", Some("Served"))
            .await
            .unwrap();

        assert_eq!(outcome.points_earned, 11);
        assert_eq!(outcome.previous_status, OrderStatus::Confirmed);

        let order = services.store.order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.earned_points, 11);

        let card = services.store.loyalty_card(loyalty_id).await.unwrap();
        assert_eq!(card.points, 11);
        assert_eq!(card.last_redeemed, None);

        let history = services.store.history(order_id).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].remarks, "Served");
        assert_eq!(history[2].employee_id, Some(EmployeeId::new(3)));
    }

    #[tokio::test]
    async fn reaching_threshold_stamps_last_redeemed() {
        let services = client_priced().await;
        let loyalty_id = enroll_with_points(&services, 95).await;
        let order_id = place(&services, 300).await;

        services
            .lifecycle
            .transition(&staff(), order_id, "confirmed", None)
            .await
            .unwrap();
        services
            .lifecycle
            .transition(&staff(), order_id, "completed", None)
            .await
            .unwrap();

        let card = services.store.loyalty_card(loyalty_id).await.unwrap();
        assert_eq!(card.points, 101);
        assert!(card.last_redeemed.is_some());
    }

    #[tokio::test]
    async fn order_without_card_earns_nothing() {
        let services = client_priced().await;
        let order_id = place(&services, 550).await;
        // Card issued after the order was placed is not used
        let loyalty_id = enroll_with_points(&services, 0).await;

        services
            .lifecycle
            .transition(&staff(), order_id, "confirmed", None)
            .await
            .unwrap();
        let outcome = services
            .lifecycle
            .transition(&staff(), order_id, "completed", None)
            .await
            .unwrap();

        assert_eq!(outcome.points_earned, 0);
        let card = services.store.loyalty_card(loyalty_id).await.unwrap();
        assert_eq!(card.points, 0);
    }

    #[tokio::test]
    async fn default_remarks_name_the_status() {
        let services = client_priced().await;
        let order_id = place(&services, 100).await;

        services
            .lifecycle
            .transition(&staff(), order_id, "cancelled", Some("  "))
            .await
            .unwrap();

        let history = services.store.history(order_id).await;
        assert_eq!(history[1].remarks, "Status updated to cancelled");
    }

    #[tokio::test]
    async fn strict_policy_rejects_illegal_moves() {
        let services = client_priced().await;
        let order_id = place(&services, 100).await;

        let err = services
            .lifecycle
            .transition(&staff(), order_id, "completed", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CafeError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Completed
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(services.store.history(order_id).await.len(), 1);

        services
            .lifecycle
            .transition(&staff(), order_id, "cancelled", None)
            .await
            .unwrap();
        let err = services
            .lifecycle
            .transition(&staff(), order_id, "pending", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn permissive_policy_accepts_any_status_but_earns_once() {
        let services = create_services(TransitionPolicy::Permissive, PricingSource::Client).await;
        let loyalty_id = enroll_with_points(&services, 0).await;
        let order_id = place(&services, 550).await;

        let first = services
            .lifecycle
            .transition(&staff(), order_id, "completed", None)
            .await
            .unwrap();
        let second = services
            .lifecycle
            .transition(&staff(), order_id, "completed", None)
            .await
            .unwrap();

        assert_eq!(first.points_earned, 11);
        assert_eq!(second.points_earned, 0);
        assert_eq!(
            services.store.loyalty_card(loyalty_id).await.unwrap().points,
            11
        );
        assert_eq!(services.store.order(order_id).await.unwrap().earned_points, 11);

        let back = services
            .lifecycle
            .transition(&staff(), order_id, "pending", None)
            .await
            .unwrap();
        assert_eq!(back.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn invalid_status_and_missing_order() {
        let services = client_priced().await;

        let err = services
            .lifecycle
            .transition(&staff(), OrderId::new(1), "shipped", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = services
            .lifecycle
            .transition(&staff(), OrderId::new(404), "confirmed", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn only_employees_may_transition() {
        let services = client_priced().await;
        let order_id = place(&services, 100).await;

        let err = services
            .lifecycle
            .transition(&customer(), order_id, "confirmed", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = services
            .lifecycle
            .transition(&Caller::Anonymous, order_id, "confirmed", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn failed_earned_points_update_rolls_back_everything() {
        let services = client_priced().await;
        let loyalty_id = enroll_with_points(&services, 0).await;
        let order_id = place(&services, 550).await;
        services
            .lifecycle
            .transition(&staff(), order_id, "confirmed", None)
            .await
            .unwrap();

        services.store.fail_on(FailPoint::UpdateEarnedPoints);
        let err = services
            .lifecycle
            .transition(&staff(), order_id, "completed", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);

        let order = services.store.order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.earned_points, 0);
        assert_eq!(
            services.store.loyalty_card(loyalty_id).await.unwrap().points,
            0
        );
        assert_eq!(services.store.history(order_id).await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_completions_credit_once() {
        for policy in [TransitionPolicy::Strict, TransitionPolicy::Permissive] {
            let services = create_services(policy, PricingSource::Client).await;
            let loyalty_id = enroll_with_points(&services, 0).await;
            let order_id = place(&services, 550).await;
            services
                .lifecycle
                .transition(&staff(), order_id, "confirmed", None)
                .await
                .unwrap();

            let a = services.lifecycle.clone();
            let b = services.lifecycle.clone();
            let (first, second) = tokio::join!(
                tokio::spawn(async move {
                    a.transition(&staff(), order_id, "completed", None).await
                }),
                tokio::spawn(async move {
                    b.transition(&staff(), order_id, "completed", None).await
                }),
            );
            let results = [first.unwrap(), second.unwrap()];

            let credited: i64 = results
                .iter()
                .filter_map(|r| r.as_ref().ok())
                .map(|o| o.points_earned)
                .sum();
            assert_eq!(credited, 11);
            assert_eq!(
                services.store.loyalty_card(loyalty_id).await.unwrap().points,
                11
            );
            assert_eq!(services.store.order(order_id).await.unwrap().earned_points, 11);

            if policy == TransitionPolicy::Strict {
                assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
            }
        }
    }
}

mod loyalty {
    use super::*;

    #[tokio::test]
    async fn redeem_below_threshold_states_balance() {
        let services = client_priced().await;
        let loyalty_id = enroll_with_points(&services, 80).await;

        let err = services.loyalty.redeem(&customer()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient points. You have 80 points. Need 100 points to redeem."
        );
        assert_eq!(
            services.store.loyalty_card(loyalty_id).await.unwrap().points,
            80
        );
    }

    #[tokio::test]
    async fn redeem_subtracts_exactly_one_hundred() {
        let services = client_priced().await;
        let loyalty_id = enroll_with_points(&services, 130).await;

        let redemption = services.loyalty.redeem(&customer()).await.unwrap();
        assert_eq!(redemption.loyalty_id, loyalty_id);
        assert_eq!(redemption.points_redeemed, 100);
        assert_eq!(redemption.points_remaining, 30);

        let card = services.store.loyalty_card(loyalty_id).await.unwrap();
        assert_eq!(card.points, 30);
        assert_eq!(card.last_redeemed, Some(redemption.redeemed_at));

        assert!(services.loyalty.redeem(&customer()).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_redemptions_never_go_negative() {
        let services = client_priced().await;
        let loyalty_id = enroll_with_points(&services, 150).await;

        let a = services.loyalty.clone();
        let b = services.loyalty.clone();
        let (first, second) = tokio::join!(
            tokio::spawn(async move { a.redeem(&customer()).await }),
            tokio::spawn(async move { b.redeem(&customer()).await }),
        );
        let succeeded = [first.unwrap(), second.unwrap()]
            .iter()
            .filter(|r| r.is_ok())
            .count();

        assert_eq!(succeeded, 1);
        assert_eq!(
            services.store.loyalty_card(loyalty_id).await.unwrap().points,
            50
        );
    }

    #[tokio::test]
    async fn redeem_without_card_is_not_found() {
        let services = client_priced().await;
        let err = services.loyalty.redeem(&customer()).await.unwrap_err();
        assert_eq!(err.to_string(), "Loyalty card not found");
    }

    #[tokio::test]
    async fn failed_balance_update_keeps_points() {
        let services = client_priced().await;
        let loyalty_id = enroll_with_points(&services, 120).await;
        services.store.fail_on(FailPoint::UpdateLoyaltyBalance);

        assert!(services.loyalty.redeem(&customer()).await.is_err());
        let card = services.store.loyalty_card(loyalty_id).await.unwrap();
        assert_eq!(card.points, 120);
        assert_eq!(card.last_redeemed, None);
    }

    #[tokio::test]
    async fn enroll_is_idempotent() {
        let services = client_priced().await;

        let first = services.loyalty.enroll(&customer()).await.unwrap();
        assert!(first.created);
        assert_eq!(first.card.card_number, "LC-000001");
        assert_eq!(first.card.points, 0);

        let second = services.loyalty.enroll(&customer()).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.card.id, first.card.id);
    }

    #[tokio::test]
    async fn card_view_reports_redeemability() {
        let services = client_priced().await;
        let err = services.loyalty.card(&customer()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        enroll_with_points(&services, 99).await;
        assert!(!services.loyalty.card(&customer()).await.unwrap().can_redeem);

        let loyalty_id = services.loyalty.card(&customer()).await.unwrap().card.id;
        services.loyalty.earn(loyalty_id, Decimal::from(50)).await.unwrap();
        assert!(services.loyalty.card(&customer()).await.unwrap().can_redeem);
    }
}

mod reads {
    use super::*;

    #[tokio::test]
    async fn listing_is_scoped_by_caller() {
        let services = client_priced().await;
        let first = place(&services, 100).await;
        let second = place(&services, 200).await;

        let mine = services.orders.list(&customer()).await.unwrap();
        assert_eq!(
            mine.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![second, first]
        );

        let other = Caller::customer(CustomerId::new(2));
        assert!(services.orders.list(&other).await.unwrap().is_empty());

        let admin = Caller::employee(EmployeeId::new(1), EmployeeRole::Admin, None);
        assert_eq!(services.orders.list(&admin).await.unwrap().len(), 2);

        assert_eq!(services.orders.list(&staff()).await.unwrap().len(), 2);

        let elsewhere = Caller::employee(
            EmployeeId::new(3),
            EmployeeRole::Manager,
            Some(BranchId::new(2)),
        );
        assert!(services.orders.list(&elsewhere).await.unwrap().is_empty());

        let no_branch = Caller::employee(EmployeeId::new(3), EmployeeRole::Staff, None);
        let err = services.orders.list(&no_branch).await.unwrap_err();
        assert_eq!(err.to_string(), "Branch ID not found");

        let err = services.orders.list(&Caller::Anonymous).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn details_include_items_history_and_payment() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;
        services
            .payments
            .record(&staff(), payment(order_id, 1, "cash", Decimal::from(300)))
            .await
            .unwrap();

        let details = services.orders.details(&customer(), order_id).await.unwrap();
        assert_eq!(details.order.status, OrderStatus::Confirmed);
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].menu_name.as_deref(), Some("Americano"));
        assert_eq!(details.history.len(), 2);
        assert_eq!(
            details.history[1].employee_name.as_deref(),
            Some("Barista")
        );
        let transaction = details.transaction.unwrap();
        assert_eq!(transaction.currency_code, "PHP");

        let staff_view = services.orders.details(&staff(), order_id).await;
        assert!(staff_view.is_ok());
    }

    #[tokio::test]
    async fn details_are_private_to_the_owner() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;

        let other = Caller::customer(CustomerId::new(2));
        let err = services.orders.details(&other, order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = services
            .orders
            .details(&Caller::Anonymous, order_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let err = services
            .orders
            .details(&customer(), OrderId::new(999))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn quote_converts_without_touching_stored_total() {
        let services = client_priced().await;
        let order_id = place(&services, 300).await;

        let quote = services
            .orders
            .quote(&customer(), order_id, CurrencyId::new(2))
            .await
            .unwrap();

        assert_eq!(quote.currency.code, "USD");
        assert_eq!(quote.total_amount, Decimal::from(300));
        assert_eq!(quote.converted_total, Decimal::new(540, 2));
        assert_eq!(quote.lines.len(), 1);
        assert_eq!(quote.lines[0].converted_line_total, Decimal::new(540, 2));

        let order = services.store.order(order_id).await.unwrap();
        assert_eq!(order.total_amount, Decimal::from(300));

        let err = services
            .orders
            .quote(&customer(), order_id, CurrencyId::new(77))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Currency not found");
    }
}
