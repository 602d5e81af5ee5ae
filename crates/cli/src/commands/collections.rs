//! Cart, wishlist and comparison list commands.
//!
//! Outcome messages come from the storefront's notification sink; these
//! commands only print the resulting snapshot.

use clap::Subcommand;
use souq_core::{CollectionItem, CollectionSnapshot, ProductId};
use souq_storefront::{RemoteCollectionCache, Storefront};

use super::CliError;

#[derive(Subcommand)]
pub enum CartAction {
    /// List cart lines
    Show,
    /// Add a product
    Add {
        product_id: String,
        #[arg(short, long)]
        quantity: Option<u32>,
    },
    /// Set a line quantity
    Update { product_id: String, quantity: u32 },
    /// Remove a product
    Remove { product_id: String },
    /// Remove everything
    Clear,
}

#[derive(Subcommand)]
pub enum SavedAction {
    /// List saved products
    Show,
    /// Save a product
    Add { product_id: String },
    /// Remove a product
    Remove { product_id: String },
    /// Remove everything
    Clear,
}

/// Run a cart command.
///
/// # Errors
///
/// Returns `CliError` when signed out or when the remote call fails.
pub async fn cart(storefront: &Storefront, action: CartAction) -> Result<(), CliError> {
    require_session(storefront)?;
    let cart = storefront.cart();

    let snapshot = match action {
        CartAction::Show => cart.refresh().await?,
        CartAction::Add {
            product_id,
            quantity,
        } => cart.add(&ProductId::new(product_id), quantity).await?,
        CartAction::Update {
            product_id,
            quantity,
        } => cart.update(&ProductId::new(product_id), quantity).await?,
        CartAction::Remove { product_id } => cart.remove(&ProductId::new(product_id)).await?,
        CartAction::Clear => cart.clear().await?,
    };

    render(cart.endpoints().noun, &snapshot);
    Ok(())
}

/// Run a wishlist or comparison list command.
///
/// # Errors
///
/// Returns `CliError` when signed out or when the remote call fails.
pub async fn saved<T: CollectionItem>(
    storefront: &Storefront,
    cache: &RemoteCollectionCache<T>,
    action: SavedAction,
) -> Result<(), CliError> {
    require_session(storefront)?;

    let snapshot = match action {
        SavedAction::Show => cache.refresh().await?,
        SavedAction::Add { product_id } => cache.add(&ProductId::new(product_id), None).await?,
        SavedAction::Remove { product_id } => cache.remove(&ProductId::new(product_id)).await?,
        SavedAction::Clear => cache.clear().await?,
    };

    render(cache.endpoints().noun, &snapshot);
    Ok(())
}

fn require_session(storefront: &Storefront) -> Result<(), CliError> {
    if storefront.session().is_authenticated() {
        Ok(())
    } else {
        Err(CliError::NotSignedIn)
    }
}

#[allow(clippy::print_stdout)]
fn render<T: CollectionItem>(noun: &str, snapshot: &CollectionSnapshot<T>) {
    if snapshot.is_empty() {
        println!("Your {noun} is empty");
        return;
    }

    for item in &snapshot.items {
        let product = item.product();
        println!(
            "{:>3} x {} ({}) @ {} = {}",
            item.quantity(),
            product.name,
            item.product_id(),
            product.price,
            item.line_total()
                .map_or_else(|| "n/a".to_string(), |total| total.to_string())
        );
    }
    println!("{} item(s), {}", snapshot.count, snapshot.aggregate);
}
