//! Order partition and revenue behavior over a seeded order book.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{Decimal, dec};

use driftwood_admin::{AdminConsole, AdminSession};
use driftwood_backend::testing::InMemoryBackend;
use driftwood_core::types::{OrderId, OrderStatus, UserId};
use driftwood_core::{Customer, Order};

fn order(total: Decimal, status: OrderStatus) -> Order {
    Order {
        id: OrderId::random(),
        customer: Customer {
            name: "Omar Nassar".to_owned(),
            email: "omar@example.com".to_owned(),
            phone: "+962791111111".to_owned(),
            address: "4 Paris St, Amman".to_owned(),
        },
        total,
        status,
        created_at: Utc::now(),
    }
}

async fn console_with_orders(
    orders: Vec<Order>,
) -> (Arc<InMemoryBackend>, AdminConsole<InMemoryBackend>) {
    let backend = Arc::new(InMemoryBackend::new());
    for o in orders {
        backend.seed_order(o);
    }
    let console = AdminConsole::new(
        Arc::clone(&backend),
        AdminSession {
            user_id: UserId::random(),
            is_admin: true,
        },
    );
    console.refresh().await.expect("refresh");
    (backend, console)
}

#[tokio::test]
async fn partitions_cover_every_order_exactly_once() {
    let statuses = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];
    let (_, console) =
        console_with_orders(statuses.iter().map(|s| order(dec!(10.00), *s)).collect()).await;

    let pending = console.pending_orders();
    let completed = console.completed_orders();

    assert_eq!(pending.len(), 2);
    assert_eq!(completed.len(), 3);
    assert_eq!(pending.len() + completed.len(), console.orders().len());

    // Disjoint: no order id appears in both partitions.
    for p in &pending {
        assert!(completed.iter().all(|c| c.id != p.id));
    }

    // Pending side is exactly pending + processing.
    assert!(
        pending
            .iter()
            .all(|o| matches!(o.status, OrderStatus::Pending | OrderStatus::Processing))
    );
}

#[tokio::test]
async fn active_revenue_excludes_cancelled() {
    let (_, console) = console_with_orders(vec![
        order(dec!(10.00), OrderStatus::Pending),
        order(dec!(20.00), OrderStatus::Cancelled),
        order(dec!(5.00), OrderStatus::Delivered),
    ])
    .await;

    assert_eq!(console.active_revenue(), dec!(15.00));
}

#[tokio::test]
async fn cancelling_an_order_moves_it_between_partitions() {
    let pending = order(dec!(30.00), OrderStatus::Pending);
    let id = pending.id;
    let (_, console) = console_with_orders(vec![pending]).await;

    assert_eq!(console.pending_orders().len(), 1);
    assert_eq!(console.active_revenue(), dec!(30.00));

    console
        .update_order_status(id, OrderStatus::Cancelled)
        .await
        .expect("cancel");

    assert!(console.pending_orders().is_empty());
    assert_eq!(console.completed_orders().len(), 1);
    assert_eq!(console.active_revenue(), Decimal::ZERO);
}

#[tokio::test]
async fn empty_order_book() {
    let (_, console) = console_with_orders(vec![]).await;

    assert!(console.pending_orders().is_empty());
    assert!(console.completed_orders().is_empty());
    assert_eq!(console.active_revenue(), Decimal::ZERO);
}
