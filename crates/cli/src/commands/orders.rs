//! Checkout, payment and order commands.

#![allow(clippy::print_stdout)]

use duka_client::ClientError;
use duka_client::api::Order;
use duka_core::{OrderId, Price};
use rust_decimal::Decimal;

use super::App;

/// Create an order from the cart. The cart is kept until the order is paid.
pub async fn checkout(app: &App, address: &str) -> Result<(), ClientError> {
    let order = app.checkout(address).await?;
    print_order(&order);
    println!();
    println!(
        "Pay with: duka pay {} --phone <number> --amount {}",
        order.id, order.amount_remaining
    );
    Ok(())
}

/// Pay towards an order, clearing the cart once the order created from it
/// is settled.
pub async fn pay(app: &App, order: i64, phone: &str, amount: Decimal) -> Result<(), ClientError> {
    let mut order = app.orders().order_detail(OrderId::new(order)).await?;
    let receipt = app.pay(&mut order, phone, amount).await?;

    println!(
        "Payment of {} accepted{}.",
        Price::tsh(amount),
        receipt
            .transaction_id
            .as_deref()
            .map(|tx| format!(" (transaction {tx})"))
            .unwrap_or_default()
    );
    if let Some(message) = &receipt.message {
        println!("{message}");
    }
    println!("Status:    {}", receipt.payment_status);
    println!("Paid:      {}", Price::tsh(receipt.amount_paid));
    println!("Remaining: {}", Price::tsh(receipt.amount_remaining));

    if receipt.is_settled() {
        println!("Order #{} is fully paid. Asante!", order.id);
        if app.complete_checkout_for(order.id).await? {
            println!("Cart cleared.");
        }
    }
    Ok(())
}

pub async fn list(app: &App) -> Result<(), ClientError> {
    let orders = app.orders().list_orders().await?;
    if orders.is_empty() {
        println!("No orders yet.");
        return Ok(());
    }

    for order in &orders {
        println!(
            "#{:<6} {:<12} {:<15} {:>14} remaining {:>14}",
            order.id,
            order.status.to_string(),
            order.payment_status.to_string(),
            Price::tsh(order.amount).to_string(),
            Price::tsh(order.amount_remaining).to_string(),
        );
    }
    Ok(())
}

pub async fn show(app: &App, id: i64) -> Result<(), ClientError> {
    let order = app.orders().order_detail(OrderId::new(id)).await?;
    print_order(&order);
    Ok(())
}

fn print_order(order: &Order) {
    println!("Order #{}", order.id);
    println!("Status:    {} / {}", order.status, order.payment_status);
    if !order.shipping_address.is_empty() {
        println!("Ship to:   {}", order.shipping_address);
    }
    if let Some(tracking) = &order.tracking_number {
        println!("Tracking:  {tracking}");
    }
    for line in &order.items {
        let name = line
            .product_name
            .clone()
            .unwrap_or_else(|| format!("Product {}", line.product));
        println!("  {:>3} x {name}", line.quantity);
    }
    println!("Amount:    {}", Price::tsh(order.amount));
    println!("Paid:      {}", Price::tsh(order.amount_paid));
    println!("Remaining: {}", Price::tsh(order.amount_remaining));
}
