//! Operator's current choice of groups and values

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::attribute::{AttributeKey, AttributeValue, Catalog};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSelection {
    pub group_id: Uuid,
    #[serde(default)]
    pub value_ids: Vec<Uuid>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariationSelection { groups: Vec<GroupSelection> }

/// A selected group resolved against the catalog: its key and chosen values in catalog order.
#[derive(Clone, Debug, PartialEq)]
pub struct Axis<'a> {
    pub group_id: Uuid,
    pub key: &'a AttributeKey,
    pub values: Vec<&'a AttributeValue>,
}

impl<'a> Axis<'a> {
    pub fn labels(&self) -> Vec<String> { self.values.iter().map(|v| v.label.clone()).collect() }
}

impl VariationSelection {
    pub fn new() -> Self { Self::default() }

    pub fn groups(&self) -> &[GroupSelection] { &self.groups }
    pub fn is_empty(&self) -> bool { self.groups.is_empty() }
    pub fn is_group_selected(&self, group_id: Uuid) -> bool { self.groups.iter().any(|g| g.group_id == group_id) }
    pub fn selected_values(&self, group_id: Uuid) -> &[Uuid] {
        self.groups.iter().find(|g| g.group_id == group_id).map(|g| g.value_ids.as_slice()).unwrap_or(&[])
    }

    /// Returns whether the group is selected after the toggle.
    pub fn toggle_group(&mut self, group_id: Uuid) -> bool {
        if self.is_group_selected(group_id) {
            self.groups.retain(|g| g.group_id != group_id);
            false
        } else {
            self.groups.push(GroupSelection { group_id, value_ids: vec![] });
            true
        }
    }

    /// Selecting a value implicitly selects its group. Returns whether the value is selected after the toggle.
    pub fn toggle_value(&mut self, group_id: Uuid, value_id: Uuid) -> bool {
        let group = self.group_entry(group_id);
        if let Some(pos) = group.value_ids.iter().position(|v| *v == value_id) {
            group.value_ids.remove(pos);
            false
        } else {
            group.value_ids.push(value_id);
            true
        }
    }

    pub fn select_value(&mut self, group_id: Uuid, value_id: Uuid) {
        let group = self.group_entry(group_id);
        if !group.value_ids.contains(&value_id) { group.value_ids.push(value_id); }
    }

    pub fn clear(&mut self) { self.groups.clear(); }

    fn group_entry(&mut self, group_id: Uuid) -> &mut GroupSelection {
        let index = match self.groups.iter().position(|g| g.group_id == group_id) {
            Some(index) => index,
            None => { self.groups.push(GroupSelection { group_id, value_ids: vec![] }); self.groups.len() - 1 }
        };
        &mut self.groups[index]
    }

    /// Resolves the selection into axes in catalog group order. Groups with no selected values are skipped.
    pub fn resolve<'a>(&self, catalog: &'a Catalog) -> Result<Vec<Axis<'a>>, SelectionError> {
        let mut axes = Vec::with_capacity(self.groups.len());
        for selected in &self.groups {
            let group = catalog.group(selected.group_id).ok_or(SelectionError::GroupNotFound(selected.group_id))?;
            let mut values = Vec::with_capacity(selected.value_ids.len());
            for value_id in &selected.value_ids {
                values.push(group.value(*value_id).ok_or(SelectionError::ValueNotFound(*value_id))?);
            }
            if values.is_empty() { continue; }
            values.sort_by_key(|v| group.values.iter().position(|c| c.id == v.id));
            axes.push(Axis { group_id: group.id, key: &group.key, values });
        }
        axes.sort_by_key(|a| catalog.position_of(a.group_id));
        Ok(axes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError { GroupNotFound(Uuid), ValueNotFound(Uuid) }
impl std::error::Error for SelectionError {}
impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroupNotFound(id) => write!(f, "Attribute group {id} not found"),
            Self::ValueNotFound(id) => write!(f, "Attribute value {id} not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::attribute::AttributeGroup;

    fn catalog() -> Catalog {
        let store = Uuid::new_v4();
        let mut color = AttributeGroup::new(store, AttributeKey::Color, "Color", 0);
        let mut size = AttributeGroup::new(store, AttributeKey::Size, "Size", 1);
        color.push_value("Black");
        color.push_value("White");
        size.push_value("P");
        size.push_value("M");
        let values = color.values.drain(..).chain(size.values.drain(..)).collect();
        Catalog::assemble(vec![color, size], values)
    }

    #[test]
    fn test_resolve_uses_catalog_order() {
        let catalog = catalog();
        let (color, size) = (&catalog.groups()[0], &catalog.groups()[1]);
        let mut selection = VariationSelection::new();
        selection.toggle_value(size.id, size.values[1].id);
        selection.toggle_value(size.id, size.values[0].id);
        selection.toggle_value(color.id, color.values[0].id);
        let axes = selection.resolve(&catalog).unwrap();
        assert_eq!(axes.len(), 2);
        assert_eq!(axes[0].key, &AttributeKey::Color);
        assert_eq!(axes[1].labels(), ["P", "M"]);
    }

    #[test]
    fn test_empty_groups_are_skipped() {
        let catalog = catalog();
        let mut selection = VariationSelection::new();
        assert!(selection.toggle_group(catalog.groups()[0].id));
        assert!(selection.resolve(&catalog).unwrap().is_empty());
        assert!(!selection.toggle_group(catalog.groups()[0].id));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_unknown_ids() {
        let catalog = catalog();
        let mut selection = VariationSelection::new();
        let ghost = Uuid::new_v4();
        selection.toggle_value(catalog.groups()[0].id, ghost);
        assert_eq!(selection.resolve(&catalog).unwrap_err(), SelectionError::ValueNotFound(ghost));
    }
}
