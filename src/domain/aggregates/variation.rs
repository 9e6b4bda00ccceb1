//! Product variation records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use crate::domain::aggregates::attribute::AttributeKey;
use crate::domain::value_objects::Sku;

/// Identity of a variation. `Stored` ids are backed by a persisted record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum VariationId {
    Draft(Uuid),
    Stored(Uuid),
}

impl VariationId {
    pub fn draft() -> Self { Self::Draft(Uuid::new_v4()) }
    pub fn uuid(&self) -> Uuid { match self { Self::Draft(id) | Self::Stored(id) => *id } }
    pub fn is_stored(&self) -> bool { matches!(self, Self::Stored(_)) }
}

impl fmt::Display for VariationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.uuid()) }
}

/// One value per standard axis plus any non-standard axis values, in group order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub color: Option<String>,
    pub size: Option<String>,
    pub material: Option<String>,
    #[serde(default)]
    pub extra: Vec<String>,
}

impl Combination {
    /// Maps tuple positions back onto semantic fields using the originating group keys.
    /// A standard axis is filled once; repeats and non-standard keys land in `extra`.
    pub fn from_tuple(keys: &[AttributeKey], tuple: &[String]) -> Self {
        let mut combination = Self::default();
        for (key, value) in keys.iter().zip(tuple) {
            let value = value.trim().to_string();
            let slot = match key {
                AttributeKey::Color => &mut combination.color,
                AttributeKey::Size => &mut combination.size,
                AttributeKey::Material => &mut combination.material,
                AttributeKey::Grade | AttributeKey::Other(_) => { combination.extra.push(value); continue; }
            };
            if slot.is_none() { *slot = Some(value); } else { combination.extra.push(value); }
        }
        combination
    }

    pub fn label(&self) -> String {
        [&self.color, &self.size, &self.material].into_iter().flatten().chain(&self.extra).cloned().collect::<Vec<_>>().join(" / ")
    }
}

/// A (colour, grade) pairing with the per-size pair counts of the grade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeVariation {
    pub color: String,
    pub grade: String,
    pub sizes: Vec<String>,
    pub pairs: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariationKind {
    Simple(Combination),
    Grade(GradeVariation),
}

/// Natural key of a variation; unique within a product's variation list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariationKey {
    Simple { color: Option<String>, size: Option<String>, material: Option<String>, extra: Vec<String> },
    Grade { color: String, grade: String },
}

impl fmt::Display for VariationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple { color, size, material, extra } => {
                let parts: Vec<&str> = [color, size, material].into_iter().flatten().map(String::as_str).chain(extra.iter().map(String::as_str)).collect();
                write!(f, "{}", parts.join(" / "))
            }
            Self::Grade { color, grade } => write!(f, "{color} / {grade}"),
        }
    }
}

impl VariationKind {
    pub fn key(&self) -> VariationKey {
        match self {
            Self::Simple(c) => VariationKey::Simple { color: c.color.clone(), size: c.size.clone(), material: c.material.clone(), extra: c.extra.clone() },
            Self::Grade(g) => VariationKey::Grade { color: g.color.clone(), grade: g.grade.clone() },
        }
    }
}

/// Stock and price defaults given to newly generated combinations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationDefaults {
    pub stock: u32,
    pub price_adjustment: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductVariation {
    pub id: VariationId,
    pub product_id: Option<Uuid>,
    #[serde(flatten)]
    pub kind: VariationKind,
    pub sku: Option<Sku>,
    pub stock: u32,
    pub price_adjustment: Decimal,
    pub active: bool,
    pub image_url: Option<String>,
}

impl ProductVariation {
    pub fn draft(product_id: Option<Uuid>, kind: VariationKind, defaults: VariationDefaults) -> Self {
        Self {
            id: VariationId::draft(), product_id, kind, sku: None,
            stock: defaults.stock, price_adjustment: defaults.price_adjustment, active: true, image_url: None,
        }
    }

    pub fn key(&self) -> VariationKey { self.kind.key() }
    pub fn label(&self) -> String { self.key().to_string() }

    /// Carries operator-entered data over from the record this one replaces.
    pub fn inherit(&mut self, previous: &ProductVariation) {
        self.id = previous.id;
        self.product_id = previous.product_id.or(self.product_id);
        self.sku = previous.sku.clone();
        self.stock = previous.stock;
        self.price_adjustment = previous.price_adjustment;
        self.active = previous.active;
        self.image_url = previous.image_url.clone();
    }
}
