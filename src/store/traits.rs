use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::{AttributeGroup, AttributeValue, Order, Product, ProductVariation};
use crate::{CatalogError, Result};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Image file sent by the operator for one variation.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let content_type = content_type.into().trim().to_lowercase();
        if !content_type.starts_with("image/") {
            return Err(CatalogError::Upload(format!("unsupported content type {content_type}")));
        }
        if bytes.is_empty() { return Err(CatalogError::Upload("empty file".into())); }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(CatalogError::Upload(format!("file larger than {} MiB", MAX_IMAGE_BYTES / (1024 * 1024))));
        }
        Ok(Self { file_name: file_name.into(), content_type, bytes })
    }
}

#[derive(Clone, Debug)]
pub struct StoredImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Identity the backend gave a saved variation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SavedVariation {
    pub submitted: Uuid,
    pub stored: Uuid,
}

/// Identity the backend gave a created order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub id: Uuid,
    pub order_number: String,
}

/// Everything the catalog needs from its backend.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Active attribute groups of a store, without values
    async fn fetch_groups(&self, store_id: Uuid) -> Result<Vec<AttributeGroup>>;
    /// Active values belonging to the given groups
    async fn fetch_values(&self, group_ids: &[Uuid]) -> Result<Vec<AttributeValue>>;
    /// Persists an operator-typed value; a label already in the group is a `DuplicateValue`
    async fn insert_value(&self, value: &AttributeValue) -> Result<()>;
    async fn fetch_product(&self, product_id: Uuid) -> Result<Option<Product>>;
    async fn fetch_variations(&self, product_id: Uuid) -> Result<Vec<ProductVariation>>;
    /// Inserts drafts and updates stored variations in one unit
    async fn save_variations(&self, product_id: Uuid, variations: &[ProductVariation]) -> Result<Vec<SavedVariation>>;
    async fn delete_variation(&self, id: Uuid) -> Result<()>;
    /// Stores the image and returns its public URL
    async fn upload_image(&self, variation_id: Uuid, upload: ImageUpload) -> Result<String>;
    async fn fetch_image(&self, image_id: Uuid) -> Result<Option<StoredImage>>;
    async fn create_order(&self, order: &Order) -> Result<OrderReceipt>;
}
