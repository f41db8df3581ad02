//! Cart commands.

#![allow(clippy::print_stdout)]

use duka_client::{CartAction, CartState, ClientError};
use duka_core::{Price, ProductId};
use tracing::info;

use super::App;

pub async fn show(app: &App) {
    print_cart(app, &app.cart().await).await;
}

/// Add a catalog product to the cart.
pub async fn add(app: &App, slug: &str, quantity: u32) -> Result<(), ClientError> {
    let product = app.api().get_product(slug).await?;
    if product.is_sold_out() {
        info!(slug, "Adding sold-out product to cart");
    }

    let cart = app
        .dispatch(CartAction::AddToCart(product.to_cart_item(quantity)))
        .await?;
    print_cart(app, &cart).await;
    Ok(())
}

pub async fn set(app: &App, product: i64, quantity: u32) -> Result<(), ClientError> {
    let cart = app
        .dispatch(CartAction::UpdateQuantity {
            id: ProductId::new(product),
            quantity,
        })
        .await?;
    print_cart(app, &cart).await;
    Ok(())
}

pub async fn remove(app: &App, product: i64) -> Result<(), ClientError> {
    let cart = app
        .dispatch(CartAction::RemoveFromCart(ProductId::new(product)))
        .await?;
    print_cart(app, &cart).await;
    Ok(())
}

pub async fn clear(app: &App) -> Result<(), ClientError> {
    app.complete_checkout().await?;
    println!("Cart cleared.");
    Ok(())
}

async fn print_cart(app: &App, cart: &CartState) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for item in cart.items() {
        println!(
            "{:>5}  {:<32} {:>3} x {:>12} = {:>14}",
            item.id,
            item.name,
            item.quantity,
            Price::tsh(item.unit_price).to_string(),
            Price::tsh(item.line_total()).to_string(),
        );
    }

    let totals = app.cart_totals().await;
    println!();
    println!("Subtotal:  {}", Price::tsh(totals.subtotal));
    println!("Delivery:  {}", Price::tsh(totals.delivery_fee));
    println!("Total:     {}", Price::tsh(totals.total));
}
