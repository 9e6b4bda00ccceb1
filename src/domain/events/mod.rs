//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::editor::GenerationMode;
use crate::domain::aggregates::variation::{VariationId, VariationKey};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Variation(VariationEvent),
    Order(OrderEvent),
}

/// Field touched by an in-place variation edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationField { Stock, PriceAdjustment, Sku, Active, Image }

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariationEvent {
    ModeChanged { mode: GenerationMode },
    GroupToggled { group_id: Uuid, selected: bool },
    ValueToggled { group_id: Uuid, value_id: Uuid, selected: bool },
    CustomValueAdded { group_id: Uuid, value_id: Uuid, label: String },
    Regenerated { added: Vec<VariationKey>, kept: usize, removed: Vec<VariationKey> },
    Cleared { removed: usize },
    CombinationAdded { id: VariationId, key: VariationKey },
    GradeUnconfigured { grade: String },
    DefaultsApplied { count: usize },
    Updated { id: VariationId, field: VariationField },
    Removed { id: VariationId, key: VariationKey },
    Stored { draft: VariationId, stored: VariationId },
    DeleteFailed { id: VariationId, reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: String, order_number: String, total: Decimal },
    Confirmed { order_id: String, total: Decimal },
}
