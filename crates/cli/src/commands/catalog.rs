//! Catalog commands.

#![allow(clippy::print_stdout)]

use duka_client::ClientError;
use duka_core::Price;

use super::App;

/// List products on the first catalog page.
pub async fn list(app: &App) -> Result<(), ClientError> {
    let products = app.api().list_products().await?;
    if products.is_empty() {
        println!("No products.");
        return Ok(());
    }

    for product in &products {
        let stock = if product.is_sold_out() { "  (sold out)" } else { "" };
        println!(
            "{:>5}  {:<32} {:>14}  {}{stock}",
            product.id,
            product.name,
            Price::tsh(product.price).to_string(),
            product.slug,
        );
    }
    Ok(())
}

/// Show one product by slug.
pub async fn show(app: &App, slug: &str) -> Result<(), ClientError> {
    let product = app.api().get_product(slug).await?;

    println!("{} (#{})", product.name, product.id);
    println!("Price:   {}", Price::tsh(product.price));
    if !product.vendor_name.is_empty() {
        println!("Vendor:  {}", product.vendor_name);
    }
    if let Some(category) = &product.category {
        println!("Category: {category}");
    }
    match product.stock {
        Some(stock) if stock > 0 => println!("Stock:   {stock}"),
        Some(_) => println!("Stock:   sold out"),
        None => {}
    }
    if !product.description.is_empty() {
        println!();
        println!("{}", product.description);
    }
    Ok(())
}
