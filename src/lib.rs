//! OpenSASE Catalog
//!
//! Product variation configurator and checkout for small storefronts.
//!
//! ## Features
//! - Attribute catalog (colour, size, material, grade and custom axes)
//! - Automatic cross-product or manual combination generation
//! - Reconciliation that keeps stock, price, SKU and images across regenerations
//! - Grade bundles (pair counts per size) per colour
//! - Checkout with order confirmation message

pub mod api;
pub mod config;
pub mod domain;
pub mod service;
pub mod store;

use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::{CartError, EditorError, OrderError, ProductError, SelectionError, AttributeError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    DuplicateValue(String),

    #[error("{0}")]
    DuplicateCombination(String),

    #[error("{0}")]
    InvalidCombination(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Attribute group {0} not found")]
    GroupNotFound(Uuid),

    #[error("Attribute value {0} not found")]
    ValueNotFound(Uuid),

    #[error("Variation {0} not found")]
    VariationNotFound(Uuid),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Result discarded: session closed")]
    Stale,

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    /// Validation problems are recovered locally and shown inline; everything else is a notification.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::DuplicateValue(_) | Self::DuplicateCombination(_) | Self::InvalidCombination(_) | Self::EmptyCart)
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound("Record".into()),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CatalogError {
    fn from(e: sqlx::migrate::MigrateError) -> Self { Self::Storage(e.to_string()) }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

impl From<SelectionError> for CatalogError {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::GroupNotFound(id) => Self::GroupNotFound(id),
            SelectionError::ValueNotFound(id) => Self::ValueNotFound(id),
        }
    }
}

impl From<EditorError> for CatalogError {
    fn from(e: EditorError) -> Self {
        match e {
            EditorError::Selection(e) => e.into(),
            EditorError::Attribute(e @ AttributeError::DuplicateValue { .. }) => Self::DuplicateValue(e.to_string()),
            EditorError::Attribute(e) => Self::Validation(e.to_string()),
            EditorError::Sku(e) => Self::Validation(e.to_string()),
            EditorError::MissingAxis(key) => Self::NotFound(format!("{key} attribute group")),
            EditorError::VariationNotFound(id) => Self::VariationNotFound(id),
            e @ EditorError::DuplicateCombination(_) => Self::DuplicateCombination(e.to_string()),
            e @ EditorError::InvalidCombination(_) => Self::InvalidCombination(e.to_string()),
        }
    }
}

impl From<ProductError> for CatalogError {
    fn from(e: ProductError) -> Self { Self::Validation(e.to_string()) }
}

impl From<CartError> for CatalogError {
    fn from(e: CartError) -> Self { Self::Validation(e.to_string()) }
}

impl From<OrderError> for CatalogError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoItems => Self::EmptyCart,
            other => Self::Validation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
