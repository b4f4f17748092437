//! Model dependency table and the cascade resolver.
//!
//! A model may name up to three companion codes (`subs`) that must be
//! selected with it and up to three conflicting codes (`dels`) that must be
//! deselected when it becomes active. A code matches a composition slot by
//! category or by model.

use crate::domain::codes::{normalize_category, normalize_model};
use crate::domain::model::{CompositionSlot, ModelDependency};
use crate::domain::wire::{RawEquipmentRecord, RawModelRow};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

const MAX_LINKED_CODES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyTable {
    entries: HashMap<String, ModelDependency>,
}

impl DependencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a dependency; the first entry for a model wins.
    pub fn insert(&mut self, dependency: ModelDependency) -> bool {
        if self.entries.contains_key(&dependency.model_code) {
            return false;
        }
        self.entries
            .insert(dependency.model_code.clone(), dependency);
        true
    }

    pub fn get(&self, model_code: &str) -> Option<&ModelDependency> {
        self.entries.get(model_code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Models selectable for a category, sorted by model code.
    pub fn models_for_category(&self, category: &str) -> Vec<&ModelDependency> {
        let mut models: Vec<_> = self
            .entries
            .values()
            .filter(|d| d.category == category)
            .collect();
        models.sort_by(|a, b| a.model_code.cmp(&b.model_code));
        models
    }

    pub fn from_model_rows(rows: &[RawModelRow]) -> Self {
        let mut table = Self::new();
        for row in rows {
            let model = row.eqt_cl_cd.as_deref().map(normalize_model);
            let category = row.eqt_cd.as_deref().map(normalize_category);
            let (Some(model_code), Some(category)) = (model, category) else {
                warn!("Dropping model row without category or model: {:?}", row);
                continue;
            };
            table.insert(ModelDependency {
                model_code,
                category,
                model_name: row.eqt_cl_nm.clone(),
                subs: linked_codes([&row.sub_eqt_1, &row.sub_eqt_2, &row.sub_eqt_3]),
                dels: linked_codes([&row.del_eqt_1, &row.del_eqt_2, &row.del_eqt_3]),
            });
        }
        debug!("Dependency table built with {} models", table.len());
        table
    }

    /// Adds every model of `other` this table does not know yet.
    pub fn merge(&mut self, other: &DependencyTable) {
        for dependency in other.entries.values() {
            self.insert(dependency.clone());
        }
    }

    /// Tops the table up from sub/del columns carried on contract rows.
    pub fn merge_slot_rows(&mut self, rows: &[RawEquipmentRecord]) {
        for row in rows {
            let model = row
                .eqt_cl_cd
                .as_deref()
                .or(row.eqt_cl.as_deref())
                .map(normalize_model);
            let category = row
                .item_mid_cd
                .as_deref()
                .or(row.eqt_cd.as_deref())
                .map(normalize_category);
            let (Some(model_code), Some(category)) = (model, category) else {
                continue;
            };
            let subs = linked_codes([&row.sub_eqt_1, &row.sub_eqt_2, &row.sub_eqt_3]);
            let dels = linked_codes([&row.del_eqt_1, &row.del_eqt_2, &row.del_eqt_3]);
            if subs.is_empty() && dels.is_empty() && self.entries.contains_key(&model_code) {
                continue;
            }
            self.insert(ModelDependency {
                model_code,
                category,
                model_name: row.eqt_cl_nm.clone(),
                subs,
                dels,
            });
        }
    }
}

fn linked_codes(raw: [&Option<String>; MAX_LINKED_CODES]) -> Vec<String> {
    raw.iter()
        .filter_map(|code| code.as_deref())
        .map(|code| {
            // Two-character codes are category codes; longer ones are models.
            if code.trim().len() <= 2 {
                normalize_category(code)
            } else {
                normalize_model(code)
            }
        })
        .collect()
}

/// Slots to flip as the consequence of one user action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cascade {
    pub to_select: Vec<String>,
    pub to_deselect: Vec<String>,
}

impl Cascade {
    pub fn is_empty(&self) -> bool {
        self.to_select.is_empty() && self.to_deselect.is_empty()
    }
}

/// Resolves the cascade of putting `new_model` on `slot_id`. Pure: the caller
/// applies the result. Running it again against the cascaded slots yields an
/// empty cascade.
pub fn resolve_model_change(
    slot_id: &str,
    new_model: &str,
    slots: &[CompositionSlot],
    table: &DependencyTable,
) -> Cascade {
    let Some(dependency) = table.get(new_model) else {
        return Cascade::default();
    };

    let mut to_deselect = BTreeSet::new();
    for del in &dependency.dels {
        for slot in slots.iter().filter(|s| s.slot_id != slot_id) {
            if slot.selected && slot.matches_code(del) {
                to_deselect.insert(slot.slot_id.clone());
            }
        }
    }

    let mut to_select = BTreeSet::new();
    for sub in &dependency.subs {
        for slot in slots.iter().filter(|s| s.slot_id != slot_id) {
            if !slot.selected && slot.matches_code(sub) && !to_deselect.contains(&slot.slot_id) {
                to_select.insert(slot.slot_id.clone());
            }
        }
    }

    Cascade {
        to_select: ordered(slots, &to_select),
        to_deselect: ordered(slots, &to_deselect),
    }
}

/// Resolves the cascade of toggling a slot's inclusion. Turning a slot on
/// selects the subs of its model; turning it off deselects those subs that
/// no other selected slot still requires.
pub fn resolve_toggle(
    slot_id: &str,
    selected: bool,
    slots: &[CompositionSlot],
    table: &DependencyTable,
) -> Cascade {
    let Some(slot) = slots.iter().find(|s| s.slot_id == slot_id) else {
        return Cascade::default();
    };
    let Some(dependency) = slot.model_code.as_deref().and_then(|m| table.get(m)) else {
        return Cascade::default();
    };

    let mut affected = BTreeSet::new();
    for sub in &dependency.subs {
        for other in slots.iter().filter(|s| s.slot_id != slot_id) {
            if !other.matches_code(sub) {
                continue;
            }
            if selected && !other.selected {
                affected.insert(other.slot_id.clone());
            }
            if !selected && other.selected && !is_required_elsewhere(other, slot_id, slots, table)
            {
                affected.insert(other.slot_id.clone());
            }
        }
    }

    let affected = ordered(slots, &affected);
    if selected {
        Cascade {
            to_select: affected,
            to_deselect: Vec::new(),
        }
    } else {
        Cascade {
            to_select: Vec::new(),
            to_deselect: affected,
        }
    }
}

/// True when a selected slot other than `candidate` and `excluded` lists the
/// candidate among its subs.
fn is_required_elsewhere(
    candidate: &CompositionSlot,
    excluded: &str,
    slots: &[CompositionSlot],
    table: &DependencyTable,
) -> bool {
    slots
        .iter()
        .filter(|s| s.selected && s.slot_id != excluded && s.slot_id != candidate.slot_id)
        .filter_map(|s| s.model_code.as_deref().and_then(|m| table.get(m)))
        .any(|d| d.subs.iter().any(|sub| candidate.matches_code(sub)))
}

fn ordered(slots: &[CompositionSlot], ids: &BTreeSet<String>) -> Vec<String> {
    slots
        .iter()
        .filter(|s| ids.contains(&s.slot_id))
        .map(|s| s.slot_id.clone())
        .collect()
}
