//! Collection item and snapshot types.
//!
//! The cart, wishlist and comparison set are server-owned collections of
//! product references. Each item carries a denormalized product summary so
//! the view layer can render it without another catalog lookup.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, StoreId};
use super::price::{AmountOverflow, Price};

/// Denormalized product fields returned alongside every collection item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Primary image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Selling store, when the catalog is a marketplace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreId>,
}

/// Behaviour shared by every collection item shape.
pub trait CollectionItem:
    Clone + std::fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Identifier that is unique within one collection.
    fn product_id(&self) -> &ProductId;

    /// Denormalized product fields.
    fn product(&self) -> &ProductSummary;

    /// Line quantity. Collections without quantities hold one of each item.
    fn quantity(&self) -> u32 {
        1
    }

    /// Unit price times quantity, `None` when it overflows.
    fn line_total(&self) -> Option<Price> {
        self.product().price.checked_times(self.quantity())
    }
}

/// A cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub product: ProductSummary,
}

impl CollectionItem for CartItem {
    fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    fn product(&self) -> &ProductSummary {
        &self.product
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// A wishlist or comparison-set entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItem {
    pub product_id: ProductId,
    pub product: ProductSummary,
}

impl CollectionItem for SavedItem {
    fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    fn product(&self) -> &ProductSummary {
        &self.product
    }
}

/// The complete local representation of one collection.
///
/// Always replaced wholesale; `count` and `aggregate` are never patched
/// independently of `items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSnapshot<T> {
    /// Items in server order.
    pub items: Vec<T>,
    /// Server-reported item count.
    pub count: u32,
    /// Server-reported aggregate (subtotal for the cart).
    pub aggregate: Price,
}

impl<T> CollectionSnapshot<T> {
    /// The canonical empty snapshot.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            aggregate: Price::ZERO,
        }
    }

    /// Whether the collection holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: CollectionItem> CollectionSnapshot<T> {
    /// Build a snapshot whose derived fields are computed from `items`.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` when a line total or the aggregate does not
    /// fit in a `Decimal`.
    pub fn from_items(items: Vec<T>) -> Result<Self, AmountOverflow> {
        let count = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let aggregate = Price::try_sum(items.iter().map(CollectionItem::line_total))?;
        Ok(Self {
            items,
            count,
            aggregate,
        })
    }

    /// Look up an item by product.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&T> {
        self.items.iter().find(|item| item.product_id() == product_id)
    }

    /// Whether the collection holds the given product.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.get(product_id).is_some()
    }
}

impl<T> Default for CollectionSnapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_item(id: &str, quantity: u32, minor: i64) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            quantity,
            product: ProductSummary {
                name: format!("Product {id}"),
                price: Price::from_minor(minor),
                image: None,
                store: None,
            },
        }
    }

    #[test]
    fn test_from_items_derives_count_and_aggregate() {
        let snapshot =
            CollectionSnapshot::from_items(vec![cart_item("A", 2, 1000), cart_item("B", 1, 500)])
                .expect("in range");
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.aggregate, Price::from_minor(2500));
        assert!(snapshot.contains(&ProductId::new("A")));
        assert!(!snapshot.contains(&ProductId::new("C")));
    }

    #[test]
    fn test_from_items_rejects_overflowing_lines() {
        let mut line = cart_item("A", 2, 0);
        line.product.price = Price::new(rust_decimal::Decimal::MAX);
        assert_eq!(
            CollectionSnapshot::from_items(vec![line]),
            Err(AmountOverflow)
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot: CollectionSnapshot<SavedItem> = CollectionSnapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.count, 0);
        assert!(snapshot.aggregate.is_zero());
    }

    #[test]
    fn test_cart_item_wire_shape() {
        let json = serde_json::json!({
            "productId": "A",
            "quantity": 2,
            "product": { "name": "Dates", "price": 10.0, "store": "nile-market" }
        });
        let item: CartItem = serde_json::from_value(json).expect("deserialize");
        assert_eq!(item.product_id.as_str(), "A");
        assert_eq!(item.line_total(), Some(Price::from_minor(2000)));
        assert_eq!(item.product.store, Some(StoreId::new("nile-market")));
    }

    #[test]
    fn test_saved_item_has_unit_quantity() {
        let json = serde_json::json!({
            "productId": "B",
            "product": { "name": "Tea", "price": "5.00" }
        });
        let item: SavedItem = serde_json::from_value(json).expect("deserialize");
        assert_eq!(item.quantity(), 1);
        assert_eq!(item.line_total(), Some(Price::from_minor(500)));
    }
}
