//! Variation Editor Aggregate
//!
//! Owns one product's configuration session: the attribute catalog, the
//! operator's selection, and the variation list. In automatic mode every
//! selection change regenerates the full cross product; in manual mode the
//! operator adds combinations one at a time. All transitions raise events.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use crate::domain::aggregates::attribute::{AttributeError, AttributeGroup, AttributeKey, AttributeValue, Catalog};
use crate::domain::aggregates::selection::{SelectionError, VariationSelection};
use crate::domain::aggregates::variation::{Combination, ProductVariation, VariationDefaults, VariationId, VariationKey, VariationKind};
use crate::domain::combinations::{self, Reconciled};
use crate::domain::events::{DomainEvent, VariationEvent, VariationField};
use crate::domain::value_objects::{Sku, SkuError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Automatic,
    Manual,
}

#[derive(Clone, Debug)]
pub struct VariationEditor {
    product_id: Option<Uuid>,
    catalog: Catalog,
    selection: VariationSelection,
    mode: GenerationMode,
    defaults: VariationDefaults,
    variations: Vec<ProductVariation>,
    /// Stored variations dropped by a regeneration, awaiting remote deletion on save.
    detached: Vec<ProductVariation>,
    /// Selection changes leave regeneration to the caller (debounced sessions).
    deferred: bool,
    events: Vec<DomainEvent>,
}

/// Serializable editor action; `VariationEditor::apply` reduces it into state changes and events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditorCommand {
    ToggleGroup { group_id: Uuid },
    ToggleValue { group_id: Uuid, value_id: Uuid },
    AddCustomValue { group_id: Uuid, label: String },
    SetMode { mode: GenerationMode },
    SetDefaults { stock: u32, price_adjustment: Decimal },
    ApplyDefaults,
    Regenerate,
    AddCombination { picks: Vec<Pick> },
    GenerateGrades { colors: Vec<Uuid>, grades: Vec<Uuid> },
    UpdateStock { id: Uuid, stock: u32 },
    UpdatePriceAdjustment { id: Uuid, price_adjustment: Decimal },
    UpdateSku { id: Uuid, sku: String },
    SetActive { id: Uuid, active: bool },
}

impl EditorCommand {
    /// Commands after which automatic mode regenerates the cross product.
    pub fn triggers_regeneration(&self) -> bool {
        matches!(self, Self::ToggleGroup { .. } | Self::ToggleValue { .. } | Self::AddCustomValue { .. } | Self::SetMode { mode: GenerationMode::Automatic })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick { pub group_id: Uuid, pub value_id: Uuid }

impl VariationEditor {
    /// Opens a session over `existing` variations and pre-selects the catalog values they use.
    pub fn new(product_id: Option<Uuid>, catalog: Catalog, existing: Vec<ProductVariation>, mode: GenerationMode) -> Self {
        let selection = restore_selection(&catalog, &existing);
        Self {
            product_id, catalog, selection, mode, defaults: VariationDefaults::default(),
            variations: existing, detached: vec![], deferred: false, events: vec![],
        }
    }

    pub fn product_id(&self) -> Option<Uuid> { self.product_id }
    pub fn catalog(&self) -> &Catalog { &self.catalog }
    pub fn selection(&self) -> &VariationSelection { &self.selection }
    pub fn mode(&self) -> GenerationMode { self.mode }
    pub fn defaults(&self) -> VariationDefaults { self.defaults }
    pub fn variations(&self) -> &[ProductVariation] { &self.variations }
    pub fn detached(&self) -> &[ProductVariation] { &self.detached }
    pub fn find(&self, id: Uuid) -> Option<&ProductVariation> { self.variations.iter().find(|v| v.id.uuid() == id) }

    /// Applies one command and returns the events it raised. On error no events are returned.
    pub fn apply(&mut self, command: EditorCommand) -> Result<Vec<DomainEvent>, EditorError> {
        let outcome = match command {
            EditorCommand::ToggleGroup { group_id } => self.toggle_group(group_id),
            EditorCommand::ToggleValue { group_id, value_id } => self.toggle_value(group_id, value_id),
            EditorCommand::AddCustomValue { group_id, label } => self.add_custom_value(group_id, &label).map(|_| ()),
            EditorCommand::SetMode { mode } => self.set_mode(mode),
            EditorCommand::SetDefaults { stock, price_adjustment } => { self.set_defaults(VariationDefaults { stock, price_adjustment }); Ok(()) }
            EditorCommand::ApplyDefaults => { self.apply_defaults_to_all(); Ok(()) }
            EditorCommand::Regenerate => self.regenerate(),
            EditorCommand::AddCombination { picks } => {
                let picks: Vec<(Uuid, Uuid)> = picks.iter().map(|p| (p.group_id, p.value_id)).collect();
                self.add_combination(&picks).map(|_| ())
            }
            EditorCommand::GenerateGrades { colors, grades } => self.generate_grades(&colors, &grades),
            EditorCommand::UpdateStock { id, stock } => self.update_stock(id, stock),
            EditorCommand::UpdatePriceAdjustment { id, price_adjustment } => self.update_price_adjustment(id, price_adjustment),
            EditorCommand::UpdateSku { id, sku } => self.update_sku(id, &sku),
            EditorCommand::SetActive { id, active } => self.set_active(id, active),
        };
        match outcome {
            Ok(()) => Ok(self.take_events()),
            Err(e) => { self.events.clear(); Err(e) }
        }
    }

    pub fn defer_regeneration(&mut self, deferred: bool) { self.deferred = deferred; }

    pub fn set_mode(&mut self, mode: GenerationMode) -> Result<(), EditorError> {
        if self.mode == mode { return Ok(()); }
        self.mode = mode;
        self.raise(VariationEvent::ModeChanged { mode });
        self.after_selection_change()
    }

    pub fn set_defaults(&mut self, defaults: VariationDefaults) { self.defaults = defaults; }

    /// Bulk-applies the current defaults to every variation.
    pub fn apply_defaults_to_all(&mut self) {
        for variation in &mut self.variations {
            variation.stock = self.defaults.stock;
            variation.price_adjustment = self.defaults.price_adjustment;
        }
        self.raise(VariationEvent::DefaultsApplied { count: self.variations.len() });
    }

    pub fn toggle_group(&mut self, group_id: Uuid) -> Result<(), EditorError> {
        self.catalog.group(group_id).ok_or(EditorError::Selection(SelectionError::GroupNotFound(group_id)))?;
        let selected = self.selection.toggle_group(group_id);
        self.raise(VariationEvent::GroupToggled { group_id, selected });
        self.after_selection_change()
    }

    pub fn toggle_value(&mut self, group_id: Uuid, value_id: Uuid) -> Result<(), EditorError> {
        let group = self.catalog.group(group_id).ok_or(EditorError::Selection(SelectionError::GroupNotFound(group_id)))?;
        group.value(value_id).ok_or(EditorError::Selection(SelectionError::ValueNotFound(value_id)))?;
        let selected = self.selection.toggle_value(group_id, value_id);
        self.raise(VariationEvent::ValueToggled { group_id, value_id, selected });
        self.after_selection_change()
    }

    /// Adds an operator-typed value to a group and selects it.
    pub fn add_custom_value(&mut self, group_id: Uuid, label: &str) -> Result<Uuid, EditorError> {
        let value = self.draft_custom_value(group_id, label)?;
        self.insert_custom_value(value)
    }

    /// Validates a custom value without adding it to the catalog.
    pub fn draft_custom_value(&self, group_id: Uuid, label: &str) -> Result<AttributeValue, EditorError> {
        let group = self.catalog.group(group_id).ok_or(EditorError::Selection(SelectionError::GroupNotFound(group_id)))?;
        Ok(group.draft_value(label)?)
    }

    /// Adds a drafted custom value to its group and selects it.
    pub fn insert_custom_value(&mut self, value: AttributeValue) -> Result<Uuid, EditorError> {
        let group_id = value.group_id;
        let group = self.catalog.group_mut(group_id).ok_or(EditorError::Selection(SelectionError::GroupNotFound(group_id)))?;
        let value = group.insert_value(value)?;
        let (value_id, label) = (value.id, value.label.clone());
        self.selection.select_value(group_id, value_id);
        self.raise(VariationEvent::CustomValueAdded { group_id, value_id, label });
        self.after_selection_change()?;
        Ok(value_id)
    }

    /// Rebuilds the list as the full cross product of the current selection.
    /// A grade list is rebuilt as colour x grade from the selected values instead.
    pub fn regenerate(&mut self) -> Result<(), EditorError> {
        if self.holds_grades() { return self.regenerate_grades(); }
        let axes: Vec<(AttributeKey, Vec<String>)> = self.selection.resolve(&self.catalog)?
            .iter()
            .map(|axis| (axis.key.clone(), axis.labels()))
            .collect();
        if axes.is_empty() {
            let cleared = std::mem::take(&mut self.variations);
            let removed = cleared.len();
            self.detach(cleared);
            self.raise(VariationEvent::Cleared { removed });
            return Ok(());
        }
        let existing = self.reconcilable();
        let outcome = combinations::generate(self.product_id, &axes, &existing, self.defaults);
        self.install(outcome);
        Ok(())
    }

    /// Manual mode: adds one combination, picking exactly one value for every selected group.
    pub fn add_combination(&mut self, picks: &[(Uuid, Uuid)]) -> Result<VariationId, EditorError> {
        let selected: Vec<Uuid> = self.selection.groups().iter().map(|g| g.group_id).collect();
        if selected.is_empty() { return Err(EditorError::InvalidCombination("no attribute group selected".into())); }
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(picks.len());
        for (group_id, value_id) in picks {
            if !selected.contains(group_id) { return Err(EditorError::InvalidCombination(format!("group {group_id} is not selected"))); }
            if !seen.insert(*group_id) { return Err(EditorError::InvalidCombination(format!("group {group_id} picked twice"))); }
            let group = self.catalog.group(*group_id).ok_or(EditorError::Selection(SelectionError::GroupNotFound(*group_id)))?;
            let value = group.value(*value_id).ok_or(EditorError::Selection(SelectionError::ValueNotFound(*value_id)))?;
            resolved.push((self.catalog.position_of(*group_id), group.key.clone(), value.label.clone()));
        }
        if let Some(missing) = selected.iter().find(|g| !seen.contains(*g)) {
            return Err(EditorError::InvalidCombination(format!("no value picked for group {missing}")));
        }
        resolved.sort_by_key(|(position, _, _)| *position);
        let (keys, tuple): (Vec<AttributeKey>, Vec<String>) = resolved.into_iter().map(|(_, key, label)| (key, label)).unzip();
        let kind = VariationKind::Simple(Combination::from_tuple(&keys, &tuple));
        let key = kind.key();
        if self.variations.iter().any(|v| v.key() == key) { return Err(EditorError::DuplicateCombination(key)); }
        let mut variation = ProductVariation::draft(self.product_id, kind, self.defaults);
        if let Some(pos) = self.detached.iter().position(|v| v.key() == key) {
            variation.inherit(&self.detached.remove(pos));
        }
        let id = variation.id;
        self.variations.push(variation);
        self.raise(VariationEvent::CombinationAdded { id, key });
        Ok(id)
    }

    /// Grade variant: one variation per (colour, grade) pair, replacing the current list.
    pub fn generate_grades(&mut self, color_ids: &[Uuid], grade_ids: &[Uuid]) -> Result<(), EditorError> {
        let color_group = self.catalog.group_by_key(&AttributeKey::Color).ok_or(EditorError::MissingAxis(AttributeKey::Color))?;
        let grade_group = self.catalog.group_by_key(&AttributeKey::Grade).ok_or(EditorError::MissingAxis(AttributeKey::Grade))?;
        let (color_group_id, grade_group_id) = (color_group.id, grade_group.id);
        let colors = color_ids.iter()
            .map(|id| color_group.value(*id).ok_or(EditorError::Selection(SelectionError::ValueNotFound(*id))))
            .collect::<Result<Vec<_>, _>>()?;
        let grades = grade_ids.iter()
            .map(|id| grade_group.value(*id).ok_or(EditorError::Selection(SelectionError::ValueNotFound(*id))))
            .collect::<Result<Vec<_>, _>>()?;
        let existing = self.reconcilable();
        let outcome = combinations::generate_grades(self.product_id, &colors, &grades, &existing, self.defaults);

        for id in color_ids { self.selection.select_value(color_group_id, *id); }
        for id in grade_ids { self.selection.select_value(grade_group_id, *id); }
        for grade in outcome.unconfigured {
            self.raise(VariationEvent::GradeUnconfigured { grade });
        }
        self.install(outcome.reconciled);
        Ok(())
    }

    pub fn update_stock(&mut self, id: Uuid, stock: u32) -> Result<(), EditorError> {
        self.edit(id, VariationField::Stock, |v| { v.stock = stock; Ok(()) })
    }

    pub fn update_price_adjustment(&mut self, id: Uuid, delta: Decimal) -> Result<(), EditorError> {
        self.edit(id, VariationField::PriceAdjustment, |v| { v.price_adjustment = delta; Ok(()) })
    }

    pub fn update_sku(&mut self, id: Uuid, sku: &str) -> Result<(), EditorError> {
        let sku = Sku::parse_optional(sku)?;
        self.edit(id, VariationField::Sku, |v| { v.sku = sku; Ok(()) })
    }

    pub fn set_active(&mut self, id: Uuid, active: bool) -> Result<(), EditorError> {
        self.edit(id, VariationField::Active, |v| { v.active = active; Ok(()) })
    }

    pub fn set_image(&mut self, id: Uuid, url: Option<String>) -> Result<(), EditorError> {
        self.edit(id, VariationField::Image, |v| { v.image_url = url; Ok(()) })
    }

    /// Local removal only. Stored variations must be deleted remotely first.
    pub fn remove(&mut self, id: Uuid) -> Result<ProductVariation, EditorError> {
        let pos = self.variations.iter().position(|v| v.id.uuid() == id).ok_or(EditorError::VariationNotFound(id))?;
        let removed = self.variations.remove(pos);
        self.raise(VariationEvent::Removed { id: removed.id, key: removed.key() });
        Ok(removed)
    }

    pub fn record_delete_failure(&mut self, id: VariationId, reason: impl Into<String>) {
        self.raise(VariationEvent::DeleteFailed { id, reason: reason.into() });
    }

    /// Drops a detached record once its backing row is gone.
    pub fn forget_detached(&mut self, id: Uuid) { self.detached.retain(|v| v.id.uuid() != id); }

    pub fn mark_stored(&mut self, draft: Uuid, stored: Uuid) -> Result<(), EditorError> {
        let variation = self.variations.iter_mut().find(|v| v.id.uuid() == draft).ok_or(EditorError::VariationNotFound(draft))?;
        let previous = variation.id;
        variation.id = VariationId::Stored(stored);
        if previous != variation.id {
            self.raise(VariationEvent::Stored { draft: previous, stored: VariationId::Stored(stored) });
        }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn after_selection_change(&mut self) -> Result<(), EditorError> {
        if self.deferred { return Ok(()); }
        match self.mode {
            GenerationMode::Automatic => self.regenerate(),
            GenerationMode::Manual => Ok(()),
        }
    }

    fn holds_grades(&self) -> bool {
        self.variations.iter().chain(&self.detached).any(|v| matches!(v.kind, VariationKind::Grade(_)))
    }

    fn regenerate_grades(&mut self) -> Result<(), EditorError> {
        let selected = |key: AttributeKey| -> Vec<Uuid> {
            let Some(group) = self.catalog.group_by_key(&key) else { return vec![] };
            let ids = self.selection.selected_values(group.id);
            group.values.iter().filter(|v| ids.contains(&v.id)).map(|v| v.id).collect()
        };
        let (colors, grades) = (selected(AttributeKey::Color), selected(AttributeKey::Grade));
        self.generate_grades(&colors, &grades)
    }

    fn reconcilable(&self) -> Vec<ProductVariation> {
        self.variations.iter().chain(&self.detached).cloned().collect()
    }

    fn install(&mut self, outcome: Reconciled) {
        let current: HashSet<VariationKey> = self.variations.iter().map(ProductVariation::key).collect();
        let removed_keys = outcome.removed.iter().map(ProductVariation::key).filter(|k| current.contains(k)).collect();
        self.variations = outcome.variations;
        self.detached.clear();
        self.detach(outcome.removed);
        self.raise(VariationEvent::Regenerated { added: outcome.added, kept: outcome.kept.len(), removed: removed_keys });
    }

    fn detach(&mut self, dropped: Vec<ProductVariation>) {
        self.detached.extend(dropped.into_iter().filter(|v| v.id.is_stored()));
    }

    fn edit(&mut self, id: Uuid, field: VariationField, f: impl FnOnce(&mut ProductVariation) -> Result<(), EditorError>) -> Result<(), EditorError> {
        let variation = self.variations.iter_mut().find(|v| v.id.uuid() == id).ok_or(EditorError::VariationNotFound(id))?;
        f(variation)?;
        let id = variation.id;
        self.raise(VariationEvent::Updated { id, field });
        Ok(())
    }

    fn raise(&mut self, e: VariationEvent) { self.events.push(DomainEvent::Variation(e)); }
}

/// Selects every catalog value referenced by an existing variation.
fn restore_selection(catalog: &Catalog, existing: &[ProductVariation]) -> VariationSelection {
    let mut selection = VariationSelection::new();
    for variation in existing {
        let picks = match &variation.kind {
            VariationKind::Simple(c) => locate(catalog, c),
            VariationKind::Grade(g) => [(AttributeKey::Color, &g.color), (AttributeKey::Grade, &g.grade)].into_iter()
                .filter_map(|(key, label)| catalog.group_by_key(&key).and_then(|group| find_label(group, label)))
                .collect(),
        };
        for (group_id, value_id) in picks { selection.select_value(group_id, value_id); }
    }
    selection
}

/// Walks the groups in catalog order the way `Combination::from_tuple` fills fields:
/// the first group of a standard key owns that field, every other group takes the next `extra` label.
fn locate(catalog: &Catalog, combination: &Combination) -> Vec<(Uuid, Uuid)> {
    let mut picks = Vec::new();
    let mut claimed: Vec<&AttributeKey> = Vec::new();
    let mut extra = combination.extra.iter().peekable();
    for group in catalog.groups() {
        let field = match &group.key {
            AttributeKey::Color => Some(&combination.color),
            AttributeKey::Size => Some(&combination.size),
            AttributeKey::Material => Some(&combination.material),
            AttributeKey::Grade | AttributeKey::Other(_) => None,
        };
        match field {
            Some(field) if !claimed.contains(&&group.key) => {
                if let Some(pick) = field.as_deref().and_then(|label| find_label(group, label)) {
                    claimed.push(&group.key);
                    picks.push(pick);
                }
            }
            _ => {
                if let Some(pick) = extra.peek().and_then(|label| find_label(group, label)) {
                    extra.next();
                    picks.push(pick);
                }
            }
        }
    }
    picks
}

fn find_label(group: &AttributeGroup, label: &str) -> Option<(Uuid, Uuid)> {
    group.values.iter().find(|v| v.label.trim() == label).map(|v| (group.id, v.id))
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorError {
    Selection(SelectionError),
    Attribute(AttributeError),
    Sku(SkuError),
    MissingAxis(AttributeKey),
    VariationNotFound(Uuid),
    DuplicateCombination(VariationKey),
    InvalidCombination(String),
}

impl std::error::Error for EditorError {}
impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Selection(e) => write!(f, "{e}"),
            Self::Attribute(e) => write!(f, "{e}"),
            Self::Sku(e) => write!(f, "{e}"),
            Self::MissingAxis(key) => write!(f, "Catalog has no {key} group"),
            Self::VariationNotFound(id) => write!(f, "Variation {id} not found"),
            Self::DuplicateCombination(key) => write!(f, "Combination {key} already exists"),
            Self::InvalidCombination(reason) => write!(f, "Invalid combination: {reason}"),
        }
    }
}

impl From<SelectionError> for EditorError { fn from(e: SelectionError) -> Self { Self::Selection(e) } }
impl From<AttributeError> for EditorError { fn from(e: AttributeError) -> Self { Self::Attribute(e) } }
impl From<SkuError> for EditorError { fn from(e: SkuError) -> Self { Self::Sku(e) } }
