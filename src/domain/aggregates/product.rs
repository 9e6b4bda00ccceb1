//! Product Aggregate

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::cart::CartItem;
use crate::domain::aggregates::variation::ProductVariation;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

/// Sellable product with the base price its variations adjust.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub base_price: Money,
    pub stock: u32,
    pub status: ProductStatus,
}

impl Product {
    pub fn new(store_id: Uuid, name: impl Into<String>, base_price: Money) -> Self {
        Self { id: Uuid::now_v7(), store_id, name: name.into(), base_price, stock: 0, status: ProductStatus::Active }
    }

    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }

    pub fn price_for(&self, variation: Option<&ProductVariation>) -> Money {
        match variation {
            Some(v) => self.base_price.adjust(v.price_adjustment),
            None => self.base_price.clone(),
        }
    }

    /// Builds a cart line, checking the product or variation can be sold in that quantity.
    pub fn line(&self, variation: Option<&ProductVariation>, quantity: u32) -> Result<CartItem, ProductError> {
        if !self.is_active() { return Err(ProductError::Unavailable); }
        if quantity == 0 { return Err(ProductError::InvalidQuantity); }
        let available = match variation {
            Some(v) if v.product_id.is_some_and(|p| p != self.id) => return Err(ProductError::ForeignVariation),
            Some(v) if !v.active => return Err(ProductError::Unavailable),
            Some(v) => v.stock,
            None => self.stock,
        };
        if quantity > available { return Err(ProductError::InsufficientInventory { available }); }
        Ok(CartItem {
            product_id: self.id,
            variation_id: variation.map(|v| v.id.uuid()),
            name: self.name.clone(),
            variation_label: variation.map(ProductVariation::label),
            sku: variation.and_then(|v| v.sku.as_ref()).map(|s| s.to_string()),
            quantity,
            unit_price: self.price_for(variation),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { Unavailable, ForeignVariation, InvalidQuantity, InsufficientInventory { available: u32 } }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Product unavailable"),
            Self::ForeignVariation => write!(f, "Variation belongs to another product"),
            Self::InvalidQuantity => write!(f, "Invalid quantity"),
            Self::InsufficientInventory { available } => write!(f, "Insufficient inventory ({available} available)"),
        }
    }
}
