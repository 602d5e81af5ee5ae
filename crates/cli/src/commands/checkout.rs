//! Checkout and totals.

use souq_core::{CheckoutDraft, CheckoutStep, Totals};
use souq_storefront::{Storefront, Transition};
use tracing::{debug, info};

use super::CliError;

/// Shipping details given on the command line.
#[derive(Debug, Default)]
pub struct ShippingDetails {
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

impl ShippingDetails {
    /// Overlay the given fields on a draft, keeping the draft's other fields.
    fn apply_to(self, mut draft: CheckoutDraft) -> CheckoutDraft {
        if let Some(full_name) = self.full_name {
            draft.full_name = full_name;
        }
        if let Some(address) = self.address {
            draft.address = address;
        }
        if let Some(city) = self.city {
            draft.city = city;
        }
        draft
    }
}

/// Drive the checkout wizard to a placed order.
///
/// Details given on the command line override a draft saved by an earlier
/// attempt; omitted ones are taken from it.
///
/// # Errors
///
/// Returns `CliError::LoginRequired` at the authentication gate,
/// `CliError::Blocked` when a step cannot advance, or the placement failure.
pub async fn place_order(storefront: &Storefront, details: ShippingDetails) -> Result<(), CliError> {
    // Entry is judged on the live cart; without a credential this is a no-op
    storefront.cart().refresh().await?;
    let checkout = storefront.checkout()?;
    if checkout.step() != CheckoutStep::ReviewCart {
        info!(step = %checkout.step(), "Resuming saved checkout");
    }
    checkout.set_draft(details.apply_to(checkout.draft()));
    print_step(checkout.step());

    while checkout.step() != CheckoutStep::Payment {
        match checkout.next() {
            Transition::Moved(step) => print_step(step),
            Transition::LoginRequired { return_to } => {
                return Err(CliError::LoginRequired(return_to));
            }
            Transition::Blocked { step, reason } => {
                return Err(CliError::Blocked {
                    step: step.to_string(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    print_totals(&checkout.totals()?);
    let order = checkout.submit().await?;
    print_step(checkout.step());

    info!(
        order_id = %order.order_id,
        total_price = %order.total_price,
        "Order confirmed"
    );
    Ok(())
}

/// Print totals for the current cart.
///
/// # Errors
///
/// Returns `CliError` when signed out or when the cart cannot be loaded.
pub async fn totals(storefront: &Storefront) -> Result<(), CliError> {
    if !storefront.session().is_authenticated() {
        return Err(CliError::NotSignedIn);
    }
    storefront.cart().refresh().await?;
    print_totals(&storefront.totals()?);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_step(step: CheckoutStep) {
    let last = CheckoutStep::Confirmed.number();
    println!("[{}/{last}] {}", step.number(), step.title());
    debug!(step = %step, "Checkout advanced");
}

#[allow(clippy::print_stdout)]
fn print_totals(totals: &Totals) {
    println!("Subtotal: {:>10}", totals.subtotal.to_string());
    println!("Shipping: {:>10}", totals.shipping.to_string());
    println!("Total:    {:>10}", totals.total.to_string());
}
