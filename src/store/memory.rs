//! In-process store used by tests and local demos.

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;
use crate::domain::aggregates::{AttributeGroup, AttributeValue, Order, Product, ProductVariation, VariationId};
use crate::store::traits::{CatalogStore, ImageUpload, OrderReceipt, SavedVariation, StoredImage};
use crate::{CatalogError, Result};

/// Remote operations that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp { Fetch, InsertValue, Save, Delete, Upload, CreateOrder }

#[derive(Default)]
struct State {
    groups: HashMap<Uuid, AttributeGroup>,
    values: HashMap<Uuid, AttributeValue>,
    products: HashMap<Uuid, Product>,
    variations: HashMap<Uuid, ProductVariation>,
    images: HashMap<Uuid, StoredImage>,
    orders: Vec<Order>,
    failing: HashSet<StoreOp>,
    calls: Vec<(StoreOp, Uuid)>,
    latency: Option<Duration>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Seeds a group together with its values.
    pub async fn insert_group(&self, mut group: AttributeGroup) {
        let mut state = self.state.write().await;
        for value in group.values.drain(..) { state.values.insert(value.id, value); }
        state.groups.insert(group.id, group);
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.write().await.products.insert(product.id, product);
    }

    /// Seeds a persisted variation; drafts are promoted to stored ids.
    pub async fn insert_variation(&self, mut variation: ProductVariation) -> Uuid {
        let id = variation.id.uuid();
        variation.id = VariationId::Stored(id);
        self.state.write().await.variations.insert(id, variation);
        id
    }

    pub async fn set_failing(&self, op: StoreOp, failing: bool) {
        let mut state = self.state.write().await;
        if failing { state.failing.insert(op); } else { state.failing.remove(&op); }
    }

    /// Delay applied to every remote call.
    pub async fn set_latency(&self, latency: Option<Duration>) { self.state.write().await.latency = latency; }

    pub async fn calls(&self, op: StoreOp) -> Vec<Uuid> {
        self.state.read().await.calls.iter().filter(|(o, _)| *o == op).map(|(_, id)| *id).collect()
    }

    pub async fn variation(&self, id: Uuid) -> Option<ProductVariation> { self.state.read().await.variations.get(&id).cloned() }
    pub async fn orders(&self) -> Vec<Order> { self.state.read().await.orders.clone() }

    async fn enter(&self, op: StoreOp, id: Uuid) -> Result<()> {
        let latency = {
            let mut state = self.state.write().await;
            state.calls.push((op, id));
            if state.failing.contains(&op) {
                return Err(CatalogError::Storage(format!("{op:?} unavailable")));
            }
            state.latency
        };
        if let Some(latency) = latency { tokio::time::sleep(latency).await; }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn fetch_groups(&self, store_id: Uuid) -> Result<Vec<AttributeGroup>> {
        self.enter(StoreOp::Fetch, store_id).await?;
        let state = self.state.read().await;
        Ok(state.groups.values().filter(|g| g.store_id == store_id && g.active).cloned().collect())
    }

    async fn fetch_values(&self, group_ids: &[Uuid]) -> Result<Vec<AttributeValue>> {
        self.enter(StoreOp::Fetch, Uuid::nil()).await?;
        let state = self.state.read().await;
        Ok(state.values.values().filter(|v| v.active && group_ids.contains(&v.group_id)).cloned().collect())
    }

    async fn insert_value(&self, value: &AttributeValue) -> Result<()> {
        self.enter(StoreOp::InsertValue, value.id).await?;
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&value.group_id) { return Err(CatalogError::GroupNotFound(value.group_id)); }
        if state.values.values().any(|v| v.group_id == value.group_id && v.label == value.label) {
            return Err(CatalogError::DuplicateValue(format!("\"{}\" already exists", value.label)));
        }
        state.values.insert(value.id, value.clone());
        Ok(())
    }

    async fn fetch_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        self.enter(StoreOp::Fetch, product_id).await?;
        Ok(self.state.read().await.products.get(&product_id).cloned())
    }

    async fn fetch_variations(&self, product_id: Uuid) -> Result<Vec<ProductVariation>> {
        self.enter(StoreOp::Fetch, product_id).await?;
        let state = self.state.read().await;
        let mut variations: Vec<ProductVariation> = state.variations.values().filter(|v| v.product_id == Some(product_id)).cloned().collect();
        variations.sort_by_key(|v| v.label());
        Ok(variations)
    }

    async fn save_variations(&self, product_id: Uuid, variations: &[ProductVariation]) -> Result<Vec<SavedVariation>> {
        self.enter(StoreOp::Save, product_id).await?;
        let mut state = self.state.write().await;
        if let Some(missing) = variations.iter().find(|v| v.id.is_stored() && !state.variations.contains_key(&v.id.uuid())) {
            return Err(CatalogError::VariationNotFound(missing.id.uuid()));
        }
        let mut saved = Vec::with_capacity(variations.len());
        for variation in variations {
            let submitted = variation.id.uuid();
            let stored = match variation.id {
                VariationId::Stored(id) => id,
                VariationId::Draft(_) => Uuid::now_v7(),
            };
            let mut record = variation.clone();
            record.id = VariationId::Stored(stored);
            record.product_id = Some(product_id);
            state.variations.insert(stored, record);
            saved.push(SavedVariation { submitted, stored });
        }
        Ok(saved)
    }

    async fn delete_variation(&self, id: Uuid) -> Result<()> {
        self.enter(StoreOp::Delete, id).await?;
        self.state.write().await.variations.remove(&id);
        Ok(())
    }

    async fn upload_image(&self, variation_id: Uuid, upload: ImageUpload) -> Result<String> {
        self.enter(StoreOp::Upload, variation_id).await?;
        let mut state = self.state.write().await;
        let image_id = Uuid::now_v7();
        let url = format!("memory://images/{image_id}");
        state.images.insert(image_id, StoredImage { content_type: upload.content_type, bytes: upload.bytes });
        if let Some(variation) = state.variations.get_mut(&variation_id) {
            variation.image_url = Some(url.clone());
        }
        Ok(url)
    }

    async fn fetch_image(&self, image_id: Uuid) -> Result<Option<StoredImage>> {
        self.enter(StoreOp::Fetch, image_id).await?;
        Ok(self.state.read().await.images.get(&image_id).cloned())
    }

    async fn create_order(&self, order: &Order) -> Result<OrderReceipt> {
        self.enter(StoreOp::CreateOrder, order.id()).await?;
        let mut state = self.state.write().await;
        let order_number = format!("{}", 1000 + state.orders.len() + 1);
        state.orders.push(order.clone());
        Ok(OrderReceipt { id: order.id(), order_number })
    }
}
