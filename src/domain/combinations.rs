//! Combination generator
//!
//! Turns resolved selection axes into variation records. Generation is a plain
//! cartesian product; reconciliation matches every produced tuple against the
//! current list by natural key so that stock, price, SKU, active flag and image
//! entered for an existing combination survive a regeneration.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use crate::domain::aggregates::attribute::{AttributeKey, AttributeValue};
use crate::domain::aggregates::variation::{Combination, GradeVariation, ProductVariation, VariationDefaults, VariationKey, VariationKind};

/// Cartesian product across axes, first axis varying slowest.
/// Empty axes are ignored; no axes at all yields no tuples.
pub fn cartesian_product(axes: &[Vec<String>]) -> Vec<Vec<String>> {
    let axes: Vec<&Vec<String>> = axes.iter().filter(|a| !a.is_empty()).collect();
    let Some((first, rest)) = axes.split_first() else { return vec![] };
    let mut tuples: Vec<Vec<String>> = first.iter().map(|v| vec![v.clone()]).collect();
    for axis in rest {
        let mut next = Vec::with_capacity(tuples.len() * axis.len());
        for prefix in &tuples {
            for value in axis.iter() {
                let mut tuple = Vec::with_capacity(prefix.len() + 1);
                tuple.extend_from_slice(prefix);
                tuple.push(value.clone());
                next.push(tuple);
            }
        }
        tuples = next;
    }
    tuples
}

/// Outcome of reconciling a generated set against the previous list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reconciled {
    pub variations: Vec<ProductVariation>,
    pub added: Vec<VariationKey>,
    pub kept: Vec<VariationKey>,
    pub removed: Vec<ProductVariation>,
}

/// Materialises one variation per kind, inheriting data from `existing` records with the same key.
/// Repeated keys in `kinds` collapse onto the first occurrence.
pub fn reconcile(product_id: Option<Uuid>, kinds: Vec<VariationKind>, existing: &[ProductVariation], defaults: VariationDefaults) -> Reconciled {
    let previous: HashMap<VariationKey, &ProductVariation> = existing.iter().map(|v| (v.key(), v)).collect();
    let mut seen = HashSet::with_capacity(kinds.len());
    let mut out = Reconciled::default();
    for kind in kinds {
        let key = kind.key();
        if !seen.insert(key.clone()) { continue; }
        let mut variation = ProductVariation::draft(product_id, kind, defaults);
        match previous.get(&key) {
            Some(old) => { variation.inherit(old); out.kept.push(key); }
            None => out.added.push(key),
        }
        out.variations.push(variation);
    }
    out.removed = existing.iter().filter(|v| !seen.contains(&v.key())).cloned().collect();
    out
}

/// Full cross product of the given axes mapped onto semantic fields and reconciled.
pub fn generate(product_id: Option<Uuid>, axes: &[(AttributeKey, Vec<String>)], existing: &[ProductVariation], defaults: VariationDefaults) -> Reconciled {
    let axes: Vec<&(AttributeKey, Vec<String>)> = axes.iter().filter(|(_, values)| !values.is_empty()).collect();
    let keys: Vec<AttributeKey> = axes.iter().map(|(key, _)| key.clone()).collect();
    let values: Vec<Vec<String>> = axes.iter().map(|(_, values)| values.clone()).collect();
    let kinds = cartesian_product(&values)
        .into_iter()
        .map(|tuple| VariationKind::Simple(Combination::from_tuple(&keys, &tuple)))
        .collect();
    reconcile(product_id, kinds, existing, defaults)
}

/// Grade generation output: the reconciled list plus grades that had no sizes configured.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GradeOutcome {
    pub reconciled: Reconciled,
    pub unconfigured: Vec<String>,
}

/// One variation per (colour, grade). Pair counts travel aligned to the size labels;
/// an unconfigured grade yields empty arrays and is reported instead of failing.
pub fn generate_grades(product_id: Option<Uuid>, colors: &[&AttributeValue], grades: &[&AttributeValue], existing: &[ProductVariation], defaults: VariationDefaults) -> GradeOutcome {
    let mut unconfigured = Vec::new();
    for grade in grades {
        if !grade.grade.as_ref().is_some_and(|g| g.is_configured()) && !unconfigured.contains(&grade.label) {
            unconfigured.push(grade.label.clone());
        }
    }
    let mut kinds = Vec::with_capacity(colors.len() * grades.len());
    for color in colors {
        for grade in grades {
            let (sizes, pairs): (Vec<String>, Vec<u32>) = grade.grade.as_ref()
                .map(|bundle| bundle.sizes.iter().map(|s| (s.size.clone(), s.pairs)).unzip())
                .unwrap_or_default();
            kinds.push(VariationKind::Grade(GradeVariation { color: color.label.trim().to_string(), grade: grade.label.trim().to_string(), sizes, pairs }));
        }
    }
    GradeOutcome { reconciled: reconcile(product_id, kinds, existing, defaults), unconfigured }
}
