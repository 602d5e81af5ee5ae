//! Sign-in and sign-out.

use souq_core::Credential;
use souq_storefront::Storefront;
use tracing::{info, warn};

use super::CliError;

/// Store the token and warm the three collections.
///
/// # Errors
///
/// Returns `CliError::InvalidToken` for a blank token, or a storage error if
/// the token cannot be saved.
pub async fn login(storefront: &Storefront, token: &str) -> Result<(), CliError> {
    let credential = Credential::new(token).ok_or(CliError::InvalidToken)?;
    storefront.sign_in(credential)?;

    let outcome = storefront.refresh_all().await;
    if outcome.is_ok() {
        info!(
            cart = storefront.cart().snapshot().count,
            wishlist = storefront.wishlist().snapshot().count,
            compare = storefront.compare().snapshot().count,
            "Signed in"
        );
    } else {
        warn!("Signed in, but some collections could not be loaded");
    }
    Ok(())
}

/// Forget the token and any saved checkout details.
///
/// # Errors
///
/// Returns a storage error if local state cannot be deleted.
pub fn logout(storefront: &Storefront) -> Result<(), CliError> {
    storefront.sign_out()?;
    storefront.drafts().discard()?;
    info!("Signed out");
    Ok(())
}
