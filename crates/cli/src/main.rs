//! Souq CLI - Shopper tools against a live commerce API.
//!
//! # Usage
//!
//! ```bash
//! # Store a bearer token
//! souq login --token "$TOKEN"
//!
//! # Inspect and edit collections
//! souq cart show
//! souq cart add 64f1c0ffee --quantity 2
//! souq cart update 64f1c0ffee 3
//! souq wishlist add 64f1c0ffee
//! souq compare clear
//!
//! # Place an order for the current cart
//! souq checkout --full-name "Jane" --address "1 Nile St" --city "Cairo"
//!
//! # Resume after signing in; the saved shipping details are reused
//! souq checkout
//! ```
//!
//! # Environment Variables
//!
//! - `SOUQ_API_BASE_URL` - Base URL of the commerce API (required)
//! - `SOUQ_REQUEST_TIMEOUT_SECS` - Per-request timeout (default 10)
//! - `SOUQ_SHIPPING_FEE` - Flat shipping fee (default 60.00)
//! - `SOUQ_STATE_DIR` - Where the credential and checkout draft are kept
//! - `SOUQ_API_TOKEN` - Pre-issued bearer token
//! - `SENTRY_DSN` - Error tracking

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use souq_storefront::{Storefront, StorefrontConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;
use commands::collections::{CartAction, SavedAction};

#[derive(Parser)]
#[command(name = "souq")]
#[command(author, version, about = "Souq storefront shopper tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a bearer token
    Login {
        /// Token issued by the commerce API
        #[arg(short, long)]
        token: String,
    },
    /// Forget the stored token and any pending checkout
    Logout,
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: SavedAction,
    },
    /// Manage the comparison list
    Compare {
        #[command(subcommand)]
        action: SavedAction,
    },
    /// Place an order for the current cart
    ///
    /// Omitted shipping details are taken from a draft saved by an earlier
    /// attempt that stopped at sign-in.
    Checkout {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        city: Option<String>,
    },
    /// Show cart subtotal, shipping and total
    Totals,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration is needed before tracing so Sentry can be initialized first
    let config = StorefrontConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "souq=info,souq_storefront=info,souq_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(CliError::from(e)),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CliError> {
    let storefront = Storefront::new(config)?;

    match cli.command {
        Commands::Login { token } => commands::session::login(&storefront, &token).await,
        Commands::Logout => commands::session::logout(&storefront),
        Commands::Cart { action } => commands::collections::cart(&storefront, action).await,
        Commands::Wishlist { action } => {
            commands::collections::saved(&storefront, storefront.wishlist(), action).await
        }
        Commands::Compare { action } => {
            commands::collections::saved(&storefront, storefront.compare(), action).await
        }
        Commands::Checkout {
            full_name,
            address,
            city,
        } => {
            let details = commands::checkout::ShippingDetails {
                full_name,
                address,
                city,
            };
            commands::checkout::place_order(&storefront, details).await
        }
        Commands::Totals => commands::checkout::totals(&storefront).await,
    }
}
