//! Integration tests for the cart to order lifecycle, without a store.

use std::collections::HashMap;

use chrono::Utc;
use common::{Money, ProductId, UserId};
use domain::{Cart, DomainError, OrderNumber, OrderStatus, Product, plan_fulfillment};

fn product(owner: UserId, cents: i64, stock: i64) -> Product {
    Product::list(owner, "Widget", "", Money::from_cents(cents), stock, Utc::now()).unwrap()
}

fn catalog(products: &[&Product]) -> HashMap<ProductId, Product> {
    products.iter().map(|p| (p.id, (*p).clone())).collect()
}

#[test]
fn test_cart_becomes_order_and_walks_lifecycle() {
    let seller = UserId::new();
    let shopper = UserId::new();
    let a = product(seller, 1000, 10);
    let b = product(seller, 500, 1);

    let cart = Cart::open(shopper, Utc::now());
    let line_a = cart.add_item(None, &a, 1, Utc::now()).unwrap();
    let line_a = cart.add_item(Some(line_a), &a, 1, Utc::now()).unwrap();
    let line_b = cart.add_item(None, &b, 1, Utc::now()).unwrap();
    assert_eq!(line_a.quantity, 2);
    assert_eq!(line_a.line_price, Money::from_cents(2000));

    let mut products = catalog(&[&a, &b]);
    let plan = plan_fulfillment(
        shopper,
        OrderNumber::generate(),
        &[line_a, line_b],
        &mut products,
        Utc::now(),
    )
    .unwrap();

    assert_eq!(plan.order.total_price, Money::from_cents(2500));
    assert_eq!(plan.items.len(), 2);
    assert_eq!(products[&a.id].stock, 8);
    assert_eq!(products[&b.id].stock, 0);
    assert!(!products[&b.id].available);
    assert_eq!(plan.oversold().count(), 0);

    let mut order = plan.order;
    assert_eq!(order.status, OrderStatus::Pending);
    for next in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        order.advance_to(next, Utc::now()).unwrap();
    }

    let result = order.cancel(shopper, Utc::now());
    assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
    assert_eq!(order.status, OrderStatus::Delivered);

    let result = order.advance_to(OrderStatus::Processing, Utc::now());
    assert!(matches!(result, Err(DomainError::ImmutableOrder { .. })));
}

#[test]
fn test_update_quantity_above_stock_keeps_line() {
    let shopper = UserId::new();
    let widget = product(UserId::new(), 1000, 3);
    let cart = Cart::open(shopper, Utc::now());
    let mut item = cart.add_item(None, &widget, 2, Utc::now()).unwrap();

    let result = item.set_quantity(&widget, 4);

    assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
    assert_eq!(item.quantity, 2);
    assert_eq!(item.line_price, Money::from_cents(2000));
}

#[test]
fn test_stock_never_goes_negative() {
    let shopper = UserId::new();
    let scarce = product(UserId::new(), 100, 1);
    let cart = Cart::open(shopper, Utc::now());
    let line = cart.add_item(None, &scarce, 4, Utc::now()).unwrap();

    let mut products = catalog(&[&scarce]);
    let plan = plan_fulfillment(
        shopper,
        OrderNumber::generate(),
        &[line],
        &mut products,
        Utc::now(),
    )
    .unwrap();

    assert_eq!(products[&scarce.id].stock, 0);
    let oversold: Vec<_> = plan.oversold().collect();
    assert_eq!(oversold.len(), 1);
    assert_eq!(oversold[0].shortfall(), 3);
}

#[test]
fn test_non_owner_cannot_cancel() {
    let shopper = UserId::new();
    let widget = product(UserId::new(), 100, 5);
    let cart = Cart::open(shopper, Utc::now());
    let line = cart.add_item(None, &widget, 1, Utc::now()).unwrap();
    let mut products = catalog(&[&widget]);
    let mut order = plan_fulfillment(
        shopper,
        OrderNumber::generate(),
        &[line],
        &mut products,
        Utc::now(),
    )
    .unwrap()
    .order;

    let result = order.cancel(UserId::new(), Utc::now());
    assert!(matches!(result, Err(DomainError::Forbidden(_))));
    assert_eq!(order.status, OrderStatus::Pending);

    order.cancel(shopper, Utc::now()).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
}
