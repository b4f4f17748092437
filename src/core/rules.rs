//! Quantity caps and mandatory-equipment rules.

use crate::config::toml_config::RulesConfig;
use crate::domain::model::{CompositionSlot, WorkContext};
use crate::utils::error::Rejection;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityLimit {
    AtMost(usize),
    /// Dual-composition contracts need exactly this many units.
    Exactly(usize),
}

/// Per-contract quantity policy resolved from the rules and the work order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantityPolicy {
    capped: BTreeMap<String, QuantityLimit>,
    bulk_categories: Vec<String>,
    bulk_ceiling: Option<usize>,
}

impl QuantityPolicy {
    /// No caps at all.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(rules: &RulesConfig, context: &WorkContext) -> Self {
        let unlimited = rules
            .unlimited_products
            .iter()
            .any(|p| *p == context.product_code);
        let dual = context.composition_quantity_from.as_deref()
            == Some(rules.dual_composition_flag.as_str());

        let mut capped = BTreeMap::new();
        if !unlimited {
            let limit = if dual {
                QuantityLimit::Exactly(rules.dual_composition_cap)
            } else {
                QuantityLimit::AtMost(rules.default_cap)
            };
            for category in &rules.capped_categories {
                capped.insert(category.clone(), limit);
            }
        }

        Self {
            capped,
            bulk_categories: rules.bulk_categories.clone(),
            bulk_ceiling: Some(rules.bulk_ceiling),
        }
    }

    pub fn limit(&self, category: &str) -> Option<QuantityLimit> {
        self.capped.get(category).copied()
    }

    /// Upper bound for `count` units of `category`; used while binding, when
    /// an exact requirement can still be met later.
    pub fn check_upper(&self, category: &str, count: usize) -> Result<(), Rejection> {
        let cap = match self.limit(category) {
            Some(QuantityLimit::AtMost(cap)) | Some(QuantityLimit::Exactly(cap)) => Some(cap),
            None => None,
        };
        if let Some(cap) = cap {
            if count > cap {
                return Err(Rejection::QuantityExceeded {
                    category: category.to_string(),
                    cap,
                    requested: count,
                });
            }
        }
        self.check_bulk(category, count)
    }

    /// Full check at save time: exact requirements must be met as well.
    pub fn check(&self, category: &str, count: usize) -> Result<(), Rejection> {
        if let Some(QuantityLimit::Exactly(required)) = self.limit(category) {
            if count != required {
                return Err(Rejection::QuantityMismatch {
                    category: category.to_string(),
                    required,
                    requested: count,
                });
            }
        }
        self.check_upper(category, count)
    }

    fn check_bulk(&self, category: &str, count: usize) -> Result<(), Rejection> {
        match self.bulk_ceiling {
            Some(ceiling)
                if count > ceiling && self.bulk_categories.iter().any(|c| c == category) =>
            {
                Err(Rejection::QuantityExceeded {
                    category: category.to_string(),
                    cap: ceiling,
                    requested: count,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Counts per category, in category order.
pub fn count_by_category<'a>(categories: impl Iterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for category in categories {
        *counts.entry(category.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Save-time validation of a composition: at least one row, the primary
/// decoder present unless the contract is voice-only, and every capped
/// category within its limit.
pub fn validate_composition(
    slots: &[CompositionSlot],
    context: &WorkContext,
    rules: &RulesConfig,
) -> Result<(), Rejection> {
    let selected: Vec<&CompositionSlot> = slots.iter().filter(|s| s.selected).collect();
    if selected.is_empty() {
        return Err(Rejection::EmptyComposition);
    }

    let voice_only = context.product_group == rules.voice_only_product_group;
    if !voice_only
        && !selected
            .iter()
            .any(|s| s.category == rules.primary_decoder_category)
    {
        return Err(Rejection::MandatoryCategoryMissing {
            category: rules.primary_decoder_category.clone(),
        });
    }

    let policy = QuantityPolicy::new(rules, context);
    let counts = count_by_category(selected.iter().map(|s| s.category.as_str()));
    for category in rules.capped_categories.iter().chain(&rules.bulk_categories) {
        let count = counts.get(category).copied().unwrap_or(0);
        if count == 0 && !matches!(policy.limit(category), Some(QuantityLimit::Exactly(_))) {
            continue;
        }
        policy.check(category, count)?;
    }
    Ok(())
}

/// A composition change is refused while units are bound to the contract.
pub fn ensure_composition_changeable(bound_units: usize) -> Result<(), Rejection> {
    if bound_units > 0 {
        return Err(Rejection::ModelChangeBlockedByBoundUnits { bound: bound_units });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(product_group: &str) -> WorkContext {
        WorkContext {
            product_group: product_group.to_string(),
            product_code: "P100".to_string(),
            ..WorkContext::default()
        }
    }

    fn slot(category: &str) -> CompositionSlot {
        CompositionSlot {
            slot_id: format!("s{}", category),
            category: category.to_string(),
            selected: true,
            ..CompositionSlot::default()
        }
    }

    #[test]
    fn test_default_ap_cap_is_one() {
        let policy = QuantityPolicy::new(&RulesConfig::default(), &context("D"));
        assert!(policy.check_upper("10", 1).is_ok());
        assert_eq!(
            policy.check_upper("10", 2),
            Err(Rejection::QuantityExceeded {
                category: "10".to_string(),
                cap: 1,
                requested: 2
            })
        );
    }

    #[test]
    fn test_dual_composition_requires_exactly_two() {
        let mut ctx = context("D");
        ctx.composition_quantity_from = Some("2".to_string());
        let policy = QuantityPolicy::new(&RulesConfig::default(), &ctx);
        assert!(policy.check_upper("10", 1).is_ok());
        assert!(matches!(
            policy.check("10", 1),
            Err(Rejection::QuantityMismatch { required: 2, .. })
        ));
        assert!(policy.check("10", 2).is_ok());
        assert!(policy.check_upper("10", 3).is_err());
    }

    #[test]
    fn test_allowlisted_product_only_hits_bulk_ceiling() {
        let rules = RulesConfig {
            unlimited_products: vec!["P100".to_string()],
            ..RulesConfig::default()
        };
        let policy = QuantityPolicy::new(&rules, &context("D"));
        assert!(policy.check("10", 180).is_ok());
        assert!(matches!(
            policy.check("10", 181),
            Err(Rejection::QuantityExceeded { cap: 180, .. })
        ));
        assert!(matches!(
            policy.check("09", 181),
            Err(Rejection::QuantityExceeded { cap: 180, .. })
        ));
        assert!(policy.check("05", 500).is_ok());
    }

    #[test]
    fn test_decoder_is_mandatory_unless_voice_only() {
        let rules = RulesConfig::default();
        let slots = vec![slot("05")];
        assert_eq!(
            validate_composition(&slots, &context("D"), &rules),
            Err(Rejection::MandatoryCategoryMissing {
                category: "04".to_string()
            })
        );
        assert!(validate_composition(&slots, &context("V"), &rules).is_ok());
        assert!(validate_composition(&[slot("04"), slot("05")], &context("D"), &rules).is_ok());
    }

    #[test]
    fn test_composition_caps_apply_at_save() {
        let rules = RulesConfig::default();
        let slots = vec![slot("04"), slot("10"), slot("10")];
        assert!(matches!(
            validate_composition(&slots, &context("D"), &rules),
            Err(Rejection::QuantityExceeded { .. })
        ));
    }

    #[test]
    fn test_bound_units_block_composition_change() {
        assert!(ensure_composition_changeable(0).is_ok());
        assert_eq!(
            ensure_composition_changeable(2),
            Err(Rejection::ModelChangeBlockedByBoundUnits { bound: 2 })
        );
    }
}
