// Human-readable and JSON renderings of combined products
use crate::model::{CombinedProduct, OutputError};
use std::path::Path;

/// One product card as a log-friendly block, cheapest store first.
pub fn render_product(product: &CombinedProduct) -> String {
    let mut out = String::new();
    let size = product.size.as_deref().unwrap_or("-");
    let brand = product.brand.as_deref().unwrap_or("-");
    out.push_str(&format!("📦 {} | {} | {}\n", product.name, brand, size));

    for (rank, priced) in product.listings.iter().enumerate() {
        let marker = if rank == 0 && product.listings.len() > 1 { "🏷️ best" } else { "" };
        let promo = match priced.listing.as_promotion() {
            Some(p) => format!(" (promo, was {:.2})", p.previous_price),
            None if priced.is_promotion => " (promo)".to_string(),
            None => String::new(),
        };
        out.push_str(&format!(
            "   {:<20} {:>8.2}{} {}\n",
            priced.listing.store(),
            priced.effective_price,
            promo,
            marker
        ));
    }

    if product.store_count() > 1 {
        out.push_str(&format!("   spread: {:.2}\n", product.price_spread()));
    }
    out
}

/// Writes the product cards as pretty-printed JSON.
pub async fn write_json(path: &Path, products: &[CombinedProduct]) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(products)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
