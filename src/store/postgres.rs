use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use uuid::Uuid;
use crate::config::DatabaseConfig;
use crate::domain::aggregates::{
    AttributeGroup, AttributeKey, AttributeValue, Combination, GradeBundle, GradeVariation, Order, Product,
    ProductStatus, ProductVariation, VariationId, VariationKind,
};
use crate::domain::value_objects::{Money, Sku, Swatch};
use crate::store::traits::{CatalogStore, ImageUpload, OrderReceipt, SavedVariation, StoredImage};
use crate::{CatalogError, Result};

/// Postgres-backed store. Images live in `variation_images` and are served by the API.
pub struct PgStore {
    pool: PgPool,
    public_url: String,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig, public_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(config.max_connections).connect(&config.url).await?;
        Ok(Self::with_pool(pool, public_url))
    }

    pub fn with_pool(pool: PgPool, public_url: &str) -> Self {
        Self { pool, public_url: public_url.trim_end_matches('/').to_string() }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn image_url(&self, image_id: Uuid) -> String { format!("{}/api/v1/images/{}", self.public_url, image_id) }
}

#[derive(sqlx::FromRow)]
struct GroupRow { id: Uuid, store_id: Uuid, axis_key: String, name: String, position: i32, active: bool }

impl From<GroupRow> for AttributeGroup {
    fn from(r: GroupRow) -> Self {
        Self { id: r.id, store_id: r.store_id, key: AttributeKey::parse(&r.axis_key), name: r.name, position: r.position, active: r.active, values: vec![] }
    }
}

#[derive(sqlx::FromRow)]
struct ValueRow { id: Uuid, group_id: Uuid, label: String, swatch: Option<String>, position: i32, active: bool, grade: Option<Json<GradeBundle>> }

impl From<ValueRow> for AttributeValue {
    fn from(r: ValueRow) -> Self {
        let swatch = r.swatch.and_then(|s| match Swatch::new(s.as_str()) {
            Ok(swatch) => Some(swatch),
            Err(_) => { tracing::warn!(value_id = %r.id, swatch = %s, "ignoring malformed swatch"); None }
        });
        Self { id: r.id, group_id: r.group_id, label: r.label, swatch, position: r.position, active: r.active, grade: r.grade.map(|g| g.0) }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow { id: Uuid, store_id: Uuid, name: String, base_price: Decimal, currency: String, stock: i32, status: String }

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        let status = match r.status.as_str() { "active" => ProductStatus::Active, "archived" => ProductStatus::Archived, _ => ProductStatus::Draft };
        Self { id: r.id, store_id: r.store_id, name: r.name, base_price: Money::new(r.base_price, &r.currency), stock: r.stock.max(0) as u32, status }
    }
}

#[derive(sqlx::FromRow)]
struct VariationRow {
    id: Uuid,
    product_id: Uuid,
    kind: String,
    color: Option<String>,
    size: Option<String>,
    material: Option<String>,
    extra: Vec<String>,
    grade: Option<String>,
    grade_sizes: Vec<String>,
    grade_pairs: Vec<i32>,
    sku: Option<String>,
    stock: i32,
    price_adjustment: Decimal,
    active: bool,
    image_url: Option<String>,
}

impl TryFrom<VariationRow> for ProductVariation {
    type Error = CatalogError;

    fn try_from(r: VariationRow) -> Result<Self> {
        let kind = match r.kind.as_str() {
            "grade" => VariationKind::Grade(GradeVariation {
                color: r.color.ok_or_else(|| CatalogError::Storage(format!("grade variation {} has no color", r.id)))?,
                grade: r.grade.ok_or_else(|| CatalogError::Storage(format!("grade variation {} has no grade", r.id)))?,
                sizes: r.grade_sizes,
                pairs: r.grade_pairs.into_iter().map(|p| p.max(0) as u32).collect(),
            }),
            _ => VariationKind::Simple(Combination { color: r.color, size: r.size, material: r.material, extra: r.extra }),
        };
        let sku = match r.sku.as_deref().map(Sku::parse_optional) {
            Some(Ok(sku)) => sku,
            Some(Err(e)) => { tracing::warn!(variation_id = %r.id, error = %e, "dropping invalid sku"); None }
            None => None,
        };
        Ok(Self {
            id: VariationId::Stored(r.id), product_id: Some(r.product_id), kind, sku,
            stock: r.stock.max(0) as u32, price_adjustment: r.price_adjustment, active: r.active, image_url: r.image_url,
        })
    }
}

/// Column values of a variation as stored in `product_variations`.
struct VariationColumns<'a> {
    kind: &'static str,
    color: Option<&'a str>,
    size: Option<&'a str>,
    material: Option<&'a str>,
    extra: &'a [String],
    grade: Option<&'a str>,
    grade_sizes: &'a [String],
    grade_pairs: Vec<i32>,
}

impl<'a> From<&'a VariationKind> for VariationColumns<'a> {
    fn from(kind: &'a VariationKind) -> Self {
        match kind {
            VariationKind::Simple(c) => Self {
                kind: "simple", color: c.color.as_deref(), size: c.size.as_deref(), material: c.material.as_deref(),
                extra: &c.extra, grade: None, grade_sizes: &[], grade_pairs: vec![],
            },
            VariationKind::Grade(g) => Self {
                kind: "grade", color: Some(&g.color), size: None, material: None, extra: &[],
                grade: Some(&g.grade), grade_sizes: &g.sizes,
                grade_pairs: g.pairs.iter().map(|p| i32::try_from(*p).unwrap_or(i32::MAX)).collect(),
            },
        }
    }
}

const VARIATION_COLUMNS: &str = "id, product_id, kind, color, size, material, extra, grade, grade_sizes, grade_pairs, sku, stock, price_adjustment, active, image_url";

#[async_trait::async_trait]
impl CatalogStore for PgStore {
    async fn fetch_groups(&self, store_id: Uuid) -> Result<Vec<AttributeGroup>> {
        let rows = sqlx::query_as::<_, GroupRow>("SELECT id, store_id, axis_key, name, position, active FROM attribute_groups WHERE store_id = $1 AND active ORDER BY position, name")
            .bind(store_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(AttributeGroup::from).collect())
    }

    async fn fetch_values(&self, group_ids: &[Uuid]) -> Result<Vec<AttributeValue>> {
        if group_ids.is_empty() { return Ok(vec![]); }
        let rows = sqlx::query_as::<_, ValueRow>("SELECT id, group_id, label, swatch, position, active, grade FROM attribute_values WHERE group_id = ANY($1) AND active ORDER BY position, label")
            .bind(group_ids).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(AttributeValue::from).collect())
    }

    async fn insert_value(&self, value: &AttributeValue) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO attribute_values (id, group_id, label, swatch, position, active, grade) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (group_id, label) DO NOTHING")
            .bind(value.id).bind(value.group_id).bind(&value.label).bind(value.swatch.as_ref().map(Swatch::as_str))
            .bind(value.position).bind(value.active).bind(value.grade.as_ref().map(Json))
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::DuplicateValue(format!("\"{}\" already exists", value.label)));
        }
        tracing::info!(group_id = %value.group_id, label = %value.label, "attribute value added");
        Ok(())
    }

    async fn fetch_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT id, store_id, name, base_price, currency, stock, status FROM products WHERE id = $1")
            .bind(product_id).fetch_optional(&self.pool).await?;
        Ok(row.map(Product::from))
    }

    async fn fetch_variations(&self, product_id: Uuid) -> Result<Vec<ProductVariation>> {
        let rows = sqlx::query_as::<_, VariationRow>(&format!("SELECT {VARIATION_COLUMNS} FROM product_variations WHERE product_id = $1 ORDER BY created_at, id"))
            .bind(product_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(ProductVariation::try_from).collect()
    }

    async fn save_variations(&self, product_id: Uuid, variations: &[ProductVariation]) -> Result<Vec<SavedVariation>> {
        let sql = format!(
            "INSERT INTO product_variations ({VARIATION_COLUMNS}, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW(), NOW()) \
             ON CONFLICT (id) DO UPDATE SET kind = EXCLUDED.kind, color = EXCLUDED.color, size = EXCLUDED.size, \
             material = EXCLUDED.material, extra = EXCLUDED.extra, grade = EXCLUDED.grade, grade_sizes = EXCLUDED.grade_sizes, \
             grade_pairs = EXCLUDED.grade_pairs, sku = EXCLUDED.sku, stock = EXCLUDED.stock, \
             price_adjustment = EXCLUDED.price_adjustment, active = EXCLUDED.active, image_url = EXCLUDED.image_url, updated_at = NOW() \
             WHERE product_variations.product_id = EXCLUDED.product_id \
             RETURNING id"
        );
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(variations.len());
        for variation in variations {
            let stored = match variation.id { VariationId::Stored(id) => id, VariationId::Draft(_) => Uuid::now_v7() };
            let cols = VariationColumns::from(&variation.kind);
            let stock = i32::try_from(variation.stock).map_err(|_| CatalogError::Validation(format!("stock {} out of range", variation.stock)))?;
            let returned: Option<Uuid> = sqlx::query_scalar(&sql)
                .bind(stored).bind(product_id).bind(cols.kind).bind(cols.color).bind(cols.size).bind(cols.material)
                .bind(cols.extra).bind(cols.grade).bind(cols.grade_sizes).bind(&cols.grade_pairs)
                .bind(variation.sku.as_ref().map(Sku::as_str)).bind(stock).bind(variation.price_adjustment)
                .bind(variation.active).bind(variation.image_url.as_deref())
                .fetch_optional(&mut *tx).await?;
            let stored = returned.ok_or(CatalogError::VariationNotFound(stored))?;
            saved.push(SavedVariation { submitted: variation.id.uuid(), stored });
        }
        tx.commit().await?;
        tracing::info!(%product_id, count = saved.len(), "variations saved");
        Ok(saved)
    }

    async fn delete_variation(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM product_variations WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            tracing::warn!(variation_id = %id, "variation already absent");
        }
        Ok(())
    }

    async fn upload_image(&self, variation_id: Uuid, upload: ImageUpload) -> Result<String> {
        let image_id = Uuid::now_v7();
        let url = self.image_url(image_id);
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO variation_images (id, variation_id, file_name, content_type, data, created_at) VALUES ($1, $2, $3, $4, $5, NOW())")
            .bind(image_id).bind(variation_id).bind(&upload.file_name).bind(&upload.content_type).bind(&upload.bytes)
            .execute(&mut *tx).await
            .map_err(|e| CatalogError::Upload(e.to_string()))?;
        sqlx::query("UPDATE product_variations SET image_url = $2, updated_at = NOW() WHERE id = $1")
            .bind(variation_id).bind(&url).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(url)
    }

    async fn fetch_image(&self, image_id: Uuid) -> Result<Option<StoredImage>> {
        let row: Option<(String, Vec<u8>)> = sqlx::query_as("SELECT content_type, data FROM variation_images WHERE id = $1")
            .bind(image_id).fetch_optional(&self.pool).await?;
        Ok(row.map(|(content_type, bytes)| StoredImage { content_type, bytes }))
    }

    async fn create_order(&self, order: &Order) -> Result<OrderReceipt> {
        let mut tx = self.pool.begin().await?;
        let order_number: String = sqlx::query_scalar(
            "INSERT INTO orders (id, order_number, customer_name, phone, email, delivery, address, payment, change_for, notes, subtotal, delivery_fee, total, currency, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING order_number")
            .bind(order.id()).bind(order.order_number()).bind(&order.customer().name).bind(&order.customer().phone)
            .bind(order.customer().email.as_deref()).bind(order.delivery().label().to_lowercase()).bind(order.address().map(Json))
            .bind(order.payment().label().to_lowercase()).bind(order.change_for().map(Money::amount)).bind(order.notes())
            .bind(order.subtotal().amount()).bind(order.delivery_fee().amount()).bind(order.total().amount())
            .bind(order.total().currency()).bind(order.status().as_str()).bind(order.created_at())
            .fetch_one(&mut *tx).await?;
        for item in order.items() {
            sqlx::query("INSERT INTO order_items (id, order_id, product_id, variation_id, title, sku, quantity, unit_price, total) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
                .bind(Uuid::now_v7()).bind(order.id()).bind(item.product_id).bind(item.variation_id).bind(&item.title)
                .bind(item.sku.as_deref()).bind(i32::try_from(item.quantity).unwrap_or(i32::MAX))
                .bind(item.unit_price.amount()).bind(item.total.amount())
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(OrderReceipt { id: order.id(), order_number })
    }
}
