//! Attribute catalog: groups of variation values (colour, size, material, grade...)

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use crate::domain::value_objects::Swatch;

/// Semantic axis a group maps onto.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKey {
    Color,
    Size,
    Material,
    Grade,
    Other(String),
}

impl AttributeKey {
    pub fn parse(key: &str) -> Self {
        match key.trim().to_lowercase().as_str() {
            "color" | "colour" | "cor" => Self::Color,
            "size" | "tamanho" => Self::Size,
            "material" => Self::Material,
            "grade" => Self::Grade,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Color => "color",
            Self::Size => "size",
            Self::Material => "material",
            Self::Grade => "grade",
            Self::Other(key) => key,
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One size of a grade together with the number of pairs it contributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeSize { pub size: String, pub pairs: u32 }

/// Pre-defined bundle of sizes sold together.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeBundle { pub sizes: Vec<GradeSize> }

impl GradeBundle {
    pub fn is_configured(&self) -> bool { !self.sizes.is_empty() }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub id: Uuid,
    pub group_id: Uuid,
    pub label: String,
    pub swatch: Option<Swatch>,
    pub position: i32,
    pub active: bool,
    pub grade: Option<GradeBundle>,
}

impl AttributeValue {
    pub fn new(group_id: Uuid, label: impl Into<String>, position: i32) -> Self {
        Self { id: Uuid::new_v4(), group_id, label: label.into(), swatch: None, position, active: true, grade: None }
    }

    pub fn with_grade(mut self, grade: GradeBundle) -> Self { self.grade = Some(grade); self }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeGroup {
    pub id: Uuid,
    pub store_id: Uuid,
    pub key: AttributeKey,
    pub name: String,
    pub position: i32,
    pub active: bool,
    pub values: Vec<AttributeValue>,
}

impl AttributeGroup {
    pub fn new(store_id: Uuid, key: AttributeKey, name: impl Into<String>, position: i32) -> Self {
        Self { id: Uuid::new_v4(), store_id, key, name: name.into(), position, active: true, values: vec![] }
    }

    pub fn value(&self, value_id: Uuid) -> Option<&AttributeValue> { self.values.iter().find(|v| v.id == value_id) }

    pub fn push_value(&mut self, label: impl Into<String>) -> &AttributeValue {
        let value = AttributeValue::new(self.id, label, self.next_position());
        self.values.push(value);
        &self.values[self.values.len() - 1]
    }

    /// Builds an operator-typed value without adding it. Labels are compared trimmed and case-insensitively.
    pub fn draft_value(&self, label: &str) -> Result<AttributeValue, AttributeError> {
        let label = label.trim();
        if label.is_empty() { return Err(AttributeError::EmptyLabel); }
        self.ensure_unique(label)?;
        Ok(AttributeValue::new(self.id, label, self.next_position()))
    }

    /// Adds a drafted value, checking uniqueness again.
    pub fn insert_value(&mut self, value: AttributeValue) -> Result<&AttributeValue, AttributeError> {
        self.ensure_unique(&value.label)?;
        self.values.push(value);
        Ok(&self.values[self.values.len() - 1])
    }

    fn ensure_unique(&self, label: &str) -> Result<(), AttributeError> {
        let folded = label.trim().to_lowercase();
        if self.values.iter().any(|v| v.label.trim().to_lowercase() == folded) {
            return Err(AttributeError::DuplicateValue { group: self.name.clone(), label: label.trim().to_string() });
        }
        Ok(())
    }

    fn next_position(&self) -> i32 { self.values.iter().map(|v| v.position + 1).max().unwrap_or(0) }

    fn sort_values(&mut self) {
        self.values.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.label.cmp(&b.label)));
    }
}

/// Active attribute groups of one store, with their active values, in display order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog { groups: Vec<AttributeGroup> }

impl Catalog {
    /// Builds the catalog from the rows returned by the backend, dropping inactive entries.
    pub fn assemble(groups: Vec<AttributeGroup>, values: Vec<AttributeValue>) -> Self {
        let mut groups: Vec<AttributeGroup> = groups.into_iter().filter(|g| g.active).collect();
        for value in values.into_iter().filter(|v| v.active) {
            if let Some(group) = groups.iter_mut().find(|g| g.id == value.group_id) {
                group.values.push(value);
            }
        }
        groups.iter_mut().for_each(AttributeGroup::sort_values);
        groups.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        Self { groups }
    }

    pub fn groups(&self) -> &[AttributeGroup] { &self.groups }
    pub fn group(&self, group_id: Uuid) -> Option<&AttributeGroup> { self.groups.iter().find(|g| g.id == group_id) }
    pub fn group_mut(&mut self, group_id: Uuid) -> Option<&mut AttributeGroup> { self.groups.iter_mut().find(|g| g.id == group_id) }
    pub fn group_by_key(&self, key: &AttributeKey) -> Option<&AttributeGroup> { self.groups.iter().find(|g| &g.key == key) }

    /// Index of a group in display order, used to order selections.
    pub fn position_of(&self, group_id: Uuid) -> Option<usize> { self.groups.iter().position(|g| g.id == group_id) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeError { EmptyLabel, DuplicateValue { group: String, label: String } }
impl std::error::Error for AttributeError {}
impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyLabel => write!(f, "Value label is empty"),
            Self::DuplicateValue { group, label } => write!(f, "\"{label}\" already exists in {group}"),
        }
    }
}
