//! Checkout workflow records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::collection::{CartItem, CollectionItem};
use super::id::OrderId;
use super::price::{AmountOverflow, Price};

/// Steps of the checkout wizard, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    ReviewCart,
    Shipping,
    Payment,
    Confirmed,
}

impl CheckoutStep {
    /// One-based step number shown in the progress indicator.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::ReviewCart => 1,
            Self::Shipping => 2,
            Self::Payment => 3,
            Self::Confirmed => 4,
        }
    }

    /// Short human-readable title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::ReviewCart => "Review cart",
            Self::Shipping => "Shipping details",
            Self::Payment => "Payment",
            Self::Confirmed => "Confirmed",
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Shipping form fields that gate the `Shipping -> Payment` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    FullName,
    Address,
    City,
}

impl DraftField {
    /// Field label used in validation messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FullName => "full name",
            Self::Address => "address",
            Self::City => "city",
        }
    }
}

/// In-progress shipping information captured during checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDraft {
    pub full_name: String,
    pub address: String,
    pub city: String,
}

impl CheckoutDraft {
    /// Create a draft from its three fields.
    #[must_use]
    pub fn new(
        full_name: impl Into<String>,
        address: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            address: address.into(),
            city: city.into(),
        }
    }

    /// Fields that are empty or whitespace-only, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<DraftField> {
        [
            (DraftField::FullName, &self.full_name),
            (DraftField::Address, &self.address),
            (DraftField::City, &self.city),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// Whether every required field is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Result of a successful order placement. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub order_id: OrderId,
    pub total_price: Price,
    pub message: String,
    /// Local time the acknowledgment was received.
    pub placed_at: DateTime<Utc>,
}

/// Order figures derived from the live cart.
///
/// Never cached: recompute from the current snapshot on every render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Price,
    pub shipping: Price,
    pub total: Price,
}

impl Totals {
    /// Compute totals for a set of cart lines.
    ///
    /// `subtotal` is the sum of `price * quantity`; shipping is the flat fee
    /// when there is at least one line and zero otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` when any figure leaves the decimal range.
    pub fn for_cart(items: &[CartItem], shipping_fee: Price) -> Result<Self, AmountOverflow> {
        let subtotal = Price::try_sum(items.iter().map(CollectionItem::line_total))?;
        let shipping = if items.is_empty() {
            Price::ZERO
        } else {
            shipping_fee
        };
        let total = subtotal.checked_add(shipping).ok_or(AmountOverflow)?;
        Ok(Self {
            subtotal,
            shipping,
            total,
        })
    }
}
