//! Application services: orchestrate the editor, the store and the message bus.

pub mod session;

pub use session::{Debouncer, EditorSession, SessionGuard, SessionRegistry, SessionTicket, SessionView};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;
use crate::config::StorefrontConfig;
use crate::domain::aggregates::{Cart, Catalog, EditorCommand, GenerationMode, Order, ProductVariation, VariationEditor};
use crate::domain::checkout::{CheckoutForm, OrderConfirmation};
use crate::domain::events::DomainEvent;
use crate::store::{CatalogStore, ImageUpload};
use crate::{CatalogError, Result};

pub const ORDER_EVENTS_SUBJECT: &str = "orders.created";

#[derive(Clone, Debug, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub quantity: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlaceOrder {
    pub items: Vec<OrderLine>,
    pub checkout: CheckoutForm,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub confirmation: OrderConfirmation,
}

#[derive(Clone)]
pub struct VariationService {
    store: Arc<dyn CatalogStore>,
    nats: Option<async_nats::Client>,
    storefront: StorefrontConfig,
    debounce: Duration,
}

impl VariationService {
    pub fn new(store: Arc<dyn CatalogStore>, storefront: StorefrontConfig, debounce: Duration) -> Self {
        Self { store, nats: None, storefront, debounce }
    }

    pub fn with_nats(mut self, client: async_nats::Client) -> Self {
        self.nats = Some(client);
        self
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> { &self.store }

    /// Loads the active groups of a store with their active values.
    pub async fn load_catalog(&self, store_id: Uuid) -> Result<Catalog> {
        let groups = self.store.fetch_groups(store_id).await?;
        let group_ids: Vec<Uuid> = groups.iter().map(|g| g.id).collect();
        let values = if group_ids.is_empty() { vec![] } else { self.store.fetch_values(&group_ids).await? };
        Ok(Catalog::assemble(groups, values))
    }

    async fn load_editor(&self, store_id: Uuid, product_id: Option<Uuid>, mode: GenerationMode) -> Result<VariationEditor> {
        let catalog = self.load_catalog(store_id).await?;
        let existing = match product_id {
            Some(id) => {
                let product = self.store.fetch_product(id).await?.ok_or_else(|| CatalogError::NotFound(format!("Product {id}")))?;
                if product.store_id != store_id {
                    return Err(CatalogError::NotFound(format!("Product {id}")));
                }
                self.store.fetch_variations(id).await?
            }
            None => vec![],
        };
        Ok(VariationEditor::new(product_id, catalog, existing, mode))
    }

    /// Opens a configuration session for a new product (`product_id` absent) or an existing one.
    pub async fn open_session(&self, store_id: Uuid, product_id: Option<Uuid>, mode: GenerationMode) -> Result<EditorSession> {
        let editor = self.load_editor(store_id, product_id, mode).await?;
        info!("Opened variation session for store {} product {:?}", store_id, product_id);
        Ok(EditorSession::new(store_id, editor, self.debounce))
    }

    /// Reloads catalog and stored variations. Discarded if the session closes meanwhile.
    pub async fn refresh(&self, session: &EditorSession) -> Result<()> {
        let ticket = session.ticket();
        let (product_id, mode) = {
            let editor = session.editor().await;
            (editor.product_id(), editor.mode())
        };
        let fresh = self.load_editor(session.store_id(), product_id, mode).await?;
        ticket.check()?;
        session.replace_editor(fresh).await
    }

    /// Applies an editor command to a session. Custom values are stored before the session sees them.
    pub async fn apply(&self, session: &EditorSession, command: EditorCommand) -> Result<Vec<DomainEvent>> {
        match command {
            EditorCommand::AddCustomValue { group_id, label } => {
                let value = session.editor().await.draft_custom_value(group_id, &label)?;
                self.store.insert_value(&value).await.map_err(|e| {
                    warn!("Failed to store value {:?} in group {}: {}", value.label, group_id, e);
                    e
                })?;
                info!("Added value {:?} to group {}", value.label, group_id);
                session.update(true, move |editor| {
                    editor.insert_custom_value(value)?;
                    Ok(editor.take_events())
                }).await
            }
            command => session.apply(command).await,
        }
    }

    /// Deletes a variation. Stored ones are deleted remotely first and stay in place if that fails.
    pub async fn delete_variation(&self, session: &EditorSession, id: Uuid) -> Result<Vec<DomainEvent>> {
        let ticket = session.ticket();
        let mut editor = session.editor().await;
        let variation = editor.find(id).cloned().ok_or(CatalogError::VariationNotFound(id))?;
        if variation.id.is_stored() {
            if let Err(e) = self.store.delete_variation(id).await {
                warn!("Failed to delete variation {}: {}", id, e);
                editor.record_delete_failure(variation.id, e.to_string());
                return Err(e);
            }
        }
        ticket.check()?;
        editor.remove(id)?;
        Ok(editor.take_events())
    }

    /// Persists the session: removes detached rows, then upserts every variation.
    pub async fn save(&self, session: &EditorSession) -> Result<Vec<ProductVariation>> {
        let ticket = session.ticket();
        let mut editor = session.editor().await;
        let product_id = editor.product_id().ok_or_else(|| CatalogError::Validation("product must be saved before its variations".into()))?;

        let detached: Vec<ProductVariation> = editor.detached().to_vec();
        for variation in detached.iter().filter(|v| v.id.is_stored()) {
            let id = variation.id.uuid();
            if let Err(e) = self.store.delete_variation(id).await {
                warn!("Failed to delete detached variation {}: {}", id, e);
                editor.record_delete_failure(variation.id, e.to_string());
                return Err(e);
            }
            editor.forget_detached(id);
        }
        for variation in detached.iter().filter(|v| !v.id.is_stored()) {
            editor.forget_detached(variation.id.uuid());
        }

        let saved = self.store.save_variations(product_id, editor.variations()).await.map_err(|e| {
            error!("Failed to save variations of product {}: {}", product_id, e);
            e
        })?;
        ticket.check()?;
        for record in &saved {
            editor.mark_stored(record.submitted, record.stored)?;
        }
        info!("Saved {} variations of product {}", saved.len(), product_id);
        Ok(editor.variations().to_vec())
    }

    /// Uploads a variation image; the URL is attached only once the upload succeeds.
    /// The editor stays locked for the whole upload.
    pub async fn upload_image(&self, session: &EditorSession, id: Uuid, upload: ImageUpload) -> Result<String> {
        let ticket = session.ticket();
        let mut editor = session.editor().await;
        ticket.check()?;
        if editor.find(id).is_none() {
            return Err(CatalogError::VariationNotFound(id));
        }
        let url = self.store.upload_image(id, upload).await.map_err(|e| {
            warn!("Image upload for variation {} failed: {}", id, e);
            e
        })?;
        if let Err(e) = ticket.check() {
            warn!("Discarding image {} uploaded for variation {}: session closed", url, id);
            return Err(e);
        }
        editor.set_image(id, Some(url.clone()))?;
        Ok(url)
    }

    pub async fn product_variations(&self, product_id: Uuid) -> Result<Vec<ProductVariation>> {
        self.store.fetch_product(product_id).await?.ok_or_else(|| CatalogError::NotFound(format!("Product {product_id}")))?;
        self.store.fetch_variations(product_id).await
    }

    /// Prices the requested lines server-side, records the order and renders the confirmation.
    pub async fn place_order(&self, request: PlaceOrder) -> Result<PlacedOrder> {
        request.checkout.validate()?;
        if request.items.is_empty() { return Err(CatalogError::EmptyCart); }

        let mut cart = Cart::new(&self.storefront.currency);
        let mut variations: HashMap<Uuid, Vec<ProductVariation>> = HashMap::new();
        for line in merge_lines(&request.items) {
            let product = self.store.fetch_product(line.product_id).await?
                .ok_or_else(|| CatalogError::NotFound(format!("Product {}", line.product_id)))?;
            let variation = match line.variation_id {
                Some(variation_id) => {
                    if !variations.contains_key(&product.id) {
                        variations.insert(product.id, self.store.fetch_variations(product.id).await?);
                    }
                    let found = variations.get(&product.id).and_then(|vs| vs.iter().find(|v| v.id.uuid() == variation_id));
                    Some(found.cloned().ok_or(CatalogError::VariationNotFound(variation_id))?)
                }
                None => None,
            };
            cart.add_item(product.line(variation.as_ref(), line.quantity)?)?;
        }

        let mut order = Order::place(&cart, &request.checkout, self.storefront.delivery_fee)?;
        let receipt = self.store.create_order(&order).await.map_err(|e| {
            error!("Failed to create order: {}", e);
            e
        })?;
        order.confirm(Some(receipt.order_number));
        info!("Order {} placed, total {}", order.order_number(), order.total());
        self.publish(order.take_events()).await;

        let confirmation = OrderConfirmation::render(&self.storefront.name, &order, self.storefront.whatsapp_number.as_deref());
        Ok(PlacedOrder { order, confirmation })
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        let Some(client) = &self.nats else { return };
        for event in events {
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => { warn!("Failed to encode event: {}", e); continue; }
            };
            if let Err(e) = client.publish(ORDER_EVENTS_SUBJECT.to_string(), payload.into()).await {
                warn!("Failed to publish order event: {}", e);
            }
        }
    }
}

/// Sums the quantities of repeated (product, variation) lines, in first-seen order.
fn merge_lines(items: &[OrderLine]) -> Vec<OrderLine> {
    let mut merged: Vec<OrderLine> = Vec::with_capacity(items.len());
    for line in items {
        match merged.iter_mut().find(|m| m.product_id == line.product_id && m.variation_id == line.variation_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line.clone()),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{AttributeGroup, AttributeKey, AttributeValue, GradeBundle, GradeSize, Product, VariationKind};
    use crate::domain::checkout::{DeliveryMethod, PaymentMethod};
    use crate::domain::value_objects::Money;
    use crate::store::{MemoryStore, StoreOp};
    use rust_decimal::Decimal;

    struct Fixture {
        service: VariationService,
        store: Arc<MemoryStore>,
        store_id: Uuid,
        product: Product,
        color: AttributeGroup,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let store_id = Uuid::new_v4();
        let mut color = AttributeGroup::new(store_id, AttributeKey::Color, "Color", 0);
        color.push_value("Black");
        color.push_value("White");
        store.insert_group(color.clone()).await;
        let mut product = Product::new(store_id, "Sneaker", Money::brl(Decimal::from(100)));
        product.stock = 5;
        store.insert_product(product.clone()).await;
        let storefront = StorefrontConfig { name: "Loja".into(), currency: "BRL".into(), whatsapp_number: Some("5511999990000".into()), delivery_fee: Decimal::from(8) };
        let service = VariationService::new(store.clone(), storefront, Duration::from_millis(0));
        Fixture { service, store, store_id, product, color }
    }

    async fn reopen(f: &Fixture) -> EditorSession {
        f.service.open_session(f.store_id, Some(f.product.id), GenerationMode::Automatic).await.unwrap()
    }

    fn toggle(group: &AttributeGroup, index: usize) -> EditorCommand {
        EditorCommand::ToggleValue { group_id: group.id, value_id: group.values[index].id }
    }

    async fn stored(f: &Fixture) -> Vec<(String, u32)> {
        f.service.product_variations(f.product.id).await.unwrap().iter().map(|v| (v.label(), v.stock)).collect()
    }

    async fn saved_session(f: &Fixture) -> EditorSession {
        let session = reopen(f).await;
        for value in &f.color.values {
            session.apply(EditorCommand::ToggleValue { group_id: f.color.id, value_id: value.id }).await.unwrap();
        }
        f.service.save(&session).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_save_marks_variations_stored() {
        let f = fixture().await;
        let session = saved_session(&f).await;
        let view = session.view().await;
        assert_eq!(view.variations.len(), 2);
        assert!(view.variations.iter().all(|v| v.id.is_stored()));
        assert_eq!(f.service.product_variations(f.product.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_remote_delete_keeps_variation() {
        let f = fixture().await;
        let session = saved_session(&f).await;
        let id = session.view().await.variations[0].id.uuid();
        f.store.set_failing(StoreOp::Delete, true).await;

        assert!(matches!(f.service.delete_variation(&session, id).await, Err(CatalogError::Storage(_))));
        assert!(session.editor().await.find(id).is_some());
        assert!(f.store.variation(id).await.is_some());

        f.store.set_failing(StoreOp::Delete, false).await;
        f.service.delete_variation(&session, id).await.unwrap();
        assert!(session.editor().await.find(id).is_none());
        assert!(f.store.variation(id).await.is_none());
    }

    #[tokio::test]
    async fn test_draft_delete_is_local() {
        let f = fixture().await;
        let session = f.service.open_session(f.store_id, Some(f.product.id), GenerationMode::Automatic).await.unwrap();
        session.apply(EditorCommand::ToggleValue { group_id: f.color.id, value_id: f.color.values[0].id }).await.unwrap();
        let id = session.view().await.variations[0].id.uuid();
        f.service.delete_variation(&session, id).await.unwrap();
        assert!(f.store.calls(StoreOp::Delete).await.is_empty());
    }

    #[tokio::test]
    async fn test_save_deletes_detached_variations() {
        let f = fixture().await;
        let session = saved_session(&f).await;
        session.apply(EditorCommand::ToggleValue { group_id: f.color.id, value_id: f.color.values[1].id }).await.unwrap();
        assert_eq!(session.view().await.pending_deletes, 1);
        f.service.save(&session).await.unwrap();
        assert_eq!(f.store.calls(StoreOp::Delete).await.len(), 1);
        assert_eq!(session.view().await.pending_deletes, 0);
        assert_eq!(f.service.product_variations(f.product.id).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_result_after_close_is_discarded() {
        let f = fixture().await;
        let session = Arc::new(saved_session(&f).await);
        let id = session.view().await.variations[0].id.uuid();
        f.store.set_latency(Some(Duration::from_millis(200))).await;
        let pending = tokio::spawn({
            let (service, session) = (f.service.clone(), session.clone());
            async move {
                let upload = ImageUpload::new("a.png", "image/png", vec![1, 2, 3]).unwrap();
                service.upload_image(&session, id, upload).await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.close();
        assert!(matches!(pending.await.unwrap(), Err(CatalogError::Stale)));
        assert!(session.editor().await.find(id).unwrap().image_url.is_none());
    }

    #[tokio::test]
    async fn test_upload_sets_image_url() {
        let f = fixture().await;
        let session = saved_session(&f).await;
        let id = session.view().await.variations[0].id.uuid();
        let url = f.service.upload_image(&session, id, ImageUpload::new("a.png", "image/png", vec![1]).unwrap()).await.unwrap();
        assert_eq!(session.editor().await.find(id).unwrap().image_url.as_deref(), Some(url.as_str()));

        f.store.set_failing(StoreOp::Upload, true).await;
        let other = session.view().await.variations[1].id.uuid();
        assert!(f.service.upload_image(&session, other, ImageUpload::new("b.png", "image/png", vec![1]).unwrap()).await.is_err());
        assert!(session.editor().await.find(other).unwrap().image_url.is_none());
    }

    #[tokio::test]
    async fn test_open_session_restores_selection() {
        let f = fixture().await;
        let _ = saved_session(&f).await;
        let session = f.service.open_session(f.store_id, Some(f.product.id), GenerationMode::Automatic).await.unwrap();
        let view = session.view().await;
        assert_eq!(view.variations.len(), 2);
        assert_eq!(view.selection.selected_values(f.color.id).len(), 2);
    }

    #[tokio::test]
    async fn test_reopened_session_keeps_non_standard_axis() {
        let f = fixture().await;
        let mut voltage = AttributeGroup::new(f.store_id, AttributeKey::Other("voltage".into()), "Voltage", 1);
        voltage.push_value("220V");
        f.store.insert_group(voltage.clone()).await;

        let session = reopen(&f).await;
        session.apply(toggle(&f.color, 0)).await.unwrap();
        session.apply(toggle(&voltage, 0)).await.unwrap();
        let id = session.view().await.variations[0].id.uuid();
        session.apply(EditorCommand::UpdateStock { id, stock: 42 }).await.unwrap();
        f.service.save(&session).await.unwrap();

        let session = reopen(&f).await;
        session.apply(toggle(&f.color, 1)).await.unwrap();
        assert_eq!(session.view().await.pending_deletes, 0);
        f.service.save(&session).await.unwrap();
        assert_eq!(stored(&f).await, [("Black / 220V".to_string(), 42), ("White / 220V".to_string(), 0)]);
        assert!(f.store.calls(StoreOp::Delete).await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_value_is_stored_and_survives_reopen() {
        let f = fixture().await;
        let session = reopen(&f).await;
        f.service.apply(&session, EditorCommand::AddCustomValue { group_id: f.color.id, label: " Navy ".into() }).await.unwrap();
        let id = session.view().await.variations[0].id.uuid();
        session.apply(EditorCommand::UpdateStock { id, stock: 9 }).await.unwrap();
        f.service.save(&session).await.unwrap();
        assert_eq!(f.store.calls(StoreOp::InsertValue).await.len(), 1);

        let session = reopen(&f).await;
        session.apply(toggle(&f.color, 0)).await.unwrap();
        assert_eq!(session.view().await.pending_deletes, 0);
        f.service.save(&session).await.unwrap();
        assert_eq!(stored(&f).await, [("Black".to_string(), 0), ("Navy".to_string(), 9)]);

        f.store.set_failing(StoreOp::InsertValue, true).await;
        let failed = f.service.apply(&session, EditorCommand::AddCustomValue { group_id: f.color.id, label: "Teal".into() }).await;
        assert!(matches!(failed, Err(CatalogError::Storage(_))));
        assert!(session.editor().await.catalog().group(f.color.id).unwrap().values.iter().all(|v| v.label != "Teal"));
    }

    #[tokio::test]
    async fn test_grade_variations_survive_reopen() {
        let f = fixture().await;
        let mut grade = AttributeGroup::new(f.store_id, AttributeKey::Grade, "Grade", 1);
        let kids = AttributeValue::new(grade.id, "Kids", 0).with_grade(GradeBundle { sizes: vec![GradeSize { size: "28".into(), pairs: 3 }] });
        grade.values.push(kids.clone());
        f.store.insert_group(grade).await;

        let session = reopen(&f).await;
        session.apply(EditorCommand::GenerateGrades { colors: vec![f.color.values[0].id], grades: vec![kids.id] }).await.unwrap();
        f.service.save(&session).await.unwrap();

        let session = reopen(&f).await;
        session.apply(toggle(&f.color, 1)).await.unwrap();
        assert_eq!(session.view().await.pending_deletes, 0);
        f.service.save(&session).await.unwrap();

        let variations = f.service.product_variations(f.product.id).await.unwrap();
        assert_eq!(variations.len(), 2);
        assert!(variations.iter().all(|v| matches!(&v.kind, VariationKind::Grade(g) if g.grade == "Kids" && g.pairs == [3])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_waits_for_running_upload() {
        let f = fixture().await;
        let session = Arc::new(reopen(&f).await);
        session.apply(toggle(&f.color, 0)).await.unwrap();
        let id = session.view().await.variations[0].id.uuid();
        f.store.set_latency(Some(Duration::from_millis(200))).await;
        let pending = tokio::spawn({
            let (service, session) = (f.service.clone(), session.clone());
            async move { service.upload_image(&session, id, ImageUpload::new("a.png", "image/png", vec![1]).unwrap()).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        f.service.delete_variation(&session, id).await.unwrap();
        assert!(pending.await.unwrap().unwrap().starts_with("memory://images/"));
        assert!(session.view().await.variations.is_empty());

        session.close();
        let late = f.service.upload_image(&session, id, ImageUpload::new("b.png", "image/png", vec![1]).unwrap()).await;
        assert!(matches!(late, Err(CatalogError::Stale)));
        assert_eq!(f.store.calls(StoreOp::Upload).await.len(), 1);
    }

    fn checkout(delivery: DeliveryMethod) -> CheckoutForm {
        CheckoutForm {
            customer_name: "Ana".into(), phone: "+55 11 99999-0000".into(), email: None, delivery,
            address: None, payment: PaymentMethod::Pix, change_for: None, notes: None,
        }
    }

    #[tokio::test]
    async fn test_place_order_prices_variation() {
        let f = fixture().await;
        let session = saved_session(&f).await;
        let mut variation = session.view().await.variations[0].clone();
        variation.price_adjustment = Decimal::from(15);
        variation.stock = 10;
        f.store.insert_variation(variation.clone()).await;

        let placed = f.service.place_order(PlaceOrder {
            items: vec![OrderLine { product_id: f.product.id, variation_id: Some(variation.id.uuid()), quantity: 2 }],
            checkout: checkout(DeliveryMethod::Pickup),
        }).await.unwrap();
        assert_eq!(placed.order.total().amount(), Decimal::from(230));
        assert_eq!(placed.order.order_number(), "1001");
        assert!(placed.confirmation.whatsapp_url.is_some());
        assert_eq!(f.store.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_rejects_invalid_requests() {
        let f = fixture().await;
        let empty = f.service.place_order(PlaceOrder { items: vec![], checkout: checkout(DeliveryMethod::Pickup) }).await;
        assert!(matches!(empty, Err(CatalogError::EmptyCart)));

        let no_address = f.service.place_order(PlaceOrder {
            items: vec![OrderLine { product_id: f.product.id, variation_id: None, quantity: 1 }],
            checkout: checkout(DeliveryMethod::Delivery),
        }).await;
        assert!(matches!(no_address, Err(CatalogError::Validation(_))));

        let too_many = f.service.place_order(PlaceOrder {
            items: vec![OrderLine { product_id: f.product.id, variation_id: None, quantity: 6 }],
            checkout: checkout(DeliveryMethod::Pickup),
        }).await;
        assert!(matches!(too_many, Err(CatalogError::Validation(_))));
        assert!(f.store.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_place_order_checks_stock_of_merged_lines() {
        let f = fixture().await;
        let line = |quantity| OrderLine { product_id: f.product.id, variation_id: None, quantity };
        let doubled = f.service.place_order(PlaceOrder { items: vec![line(5), line(5)], checkout: checkout(DeliveryMethod::Pickup) }).await;
        assert!(matches!(doubled, Err(CatalogError::Validation(_))));
        assert!(f.store.orders().await.is_empty());

        let placed = f.service.place_order(PlaceOrder { items: vec![line(2), line(3)], checkout: checkout(DeliveryMethod::Pickup) }).await.unwrap();
        assert_eq!(placed.order.items().len(), 1);
        assert_eq!(placed.order.items()[0].quantity, 5);
        assert_eq!(placed.order.total().amount(), Decimal::from(500));
    }
}
