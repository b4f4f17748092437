use equipment_engine::config::toml_config::RulesConfig;
use equipment_engine::core::composition::CompositionDraft;
use equipment_engine::core::dependency::{resolve_model_change, Cascade, DependencyTable};
use equipment_engine::domain::model::{CompositionSlot, ModelDependency, WorkContext};
use equipment_engine::Rejection;

fn slot(id: &str, category: &str, model: Option<&str>, selected: bool) -> CompositionSlot {
    CompositionSlot {
        slot_id: id.to_string(),
        category: category.to_string(),
        model_code: model.map(str::to_string),
        selected,
        rental_type: Some("10".to_string()),
        usage_status: Some("1".to_string()),
        installment_period: Some("00".to_string()),
        ..CompositionSlot::default()
    }
}

fn dependency(model: &str, category: &str, subs: &[&str], dels: &[&str]) -> ModelDependency {
    ModelDependency {
        model_code: model.to_string(),
        category: category.to_string(),
        model_name: Some(format!("Model {}", model)),
        subs: subs.iter().map(|s| s.to_string()).collect(),
        dels: dels.iter().map(|s| s.to_string()).collect(),
    }
}

/// Decoder slot plus a smart-card slot holding candidate model C1.
fn decoder_and_card() -> CompositionDraft {
    let mut table = DependencyTable::new();
    table.insert(dependency("M1", "04", &["C1"], &[]));
    table.insert(dependency("M2", "04", &[], &["C1"]));
    CompositionDraft::new(
        vec![
            slot("dec", "04", None, true),
            slot("card", "06", Some("C1"), false),
        ],
        table,
    )
}

fn is_selected(draft: &CompositionDraft, slot_id: &str) -> bool {
    draft.slot(slot_id).map(|s| s.selected).unwrap_or(false)
}

#[test]
fn test_decoder_and_smart_card_scenario() {
    let rules = RulesConfig::default();
    let mut draft = decoder_and_card();

    // Selecting M1 pulls in its smart card.
    let cascade = draft.change_model("dec", "M1", &rules).unwrap();
    assert_eq!(cascade.to_select, vec!["card"]);
    assert!(is_selected(&draft, "card"));
    assert_eq!(
        draft.slot("dec").unwrap().model_name.as_deref(),
        Some("Model M1")
    );

    // Deselecting the decoder drops the card, which nothing else requires.
    let cascade = draft.toggle("dec", false).unwrap();
    assert_eq!(cascade.to_deselect, vec!["card"]);
    assert!(!is_selected(&draft, "card"));

    // Back on, then switch to M2 which conflicts with C1.
    draft.toggle("dec", true).unwrap();
    assert!(is_selected(&draft, "card"));
    let cascade = draft.change_model("dec", "M2", &rules).unwrap();
    assert_eq!(cascade.to_deselect, vec!["card"]);
    assert!(cascade.to_select.is_empty());
    assert!(!is_selected(&draft, "card"));
}

#[test]
fn test_cascade_is_idempotent() {
    let rules = RulesConfig::default();
    let mut draft = decoder_and_card();
    draft.change_model("dec", "M1", &rules).unwrap();

    let again = resolve_model_change("dec", "M1", draft.slots(), draft.table());
    assert_eq!(again, Cascade::default());

    let snapshot = draft.clone();
    let cascade = draft.change_model("dec", "M1", &rules).unwrap();
    assert!(cascade.is_empty());
    assert_eq!(draft, snapshot);
}

#[test]
fn test_subs_match_by_category_code() {
    let mut table = DependencyTable::new();
    table.insert(dependency("M5", "04", &["07"], &[]));
    let slots = vec![
        slot("dec", "04", None, true),
        slot("aux1", "07", None, false),
        slot("aux2", "07", Some("090701"), false),
    ];
    let cascade = resolve_model_change("dec", "M5", &slots, &table);
    assert_eq!(cascade.to_select, vec!["aux1", "aux2"]);
}

#[test]
fn test_shared_sub_survives_toggle_off() {
    let mut table = DependencyTable::new();
    table.insert(dependency("M1", "04", &["C1"], &[]));
    table.insert(dependency("M9", "03", &["C1"], &[]));
    let mut draft = CompositionDraft::new(
        vec![
            slot("dec", "04", Some("M1"), true),
            slot("modem", "03", Some("M9"), true),
            slot("card", "06", Some("C1"), true),
        ],
        table,
    );
    let cascade = draft.toggle("dec", false).unwrap();
    assert!(cascade.is_empty());
    assert!(is_selected(&draft, "card"));
}

#[test]
fn test_customer_owned_override_applies_after_cascade() {
    let rules = RulesConfig::default();
    let mut table = DependencyTable::new();
    table.insert(dependency("090491", "04", &[], &[]));
    let mut draft = CompositionDraft::new(
        vec![
            slot("dec", "04", None, true),
            slot("isp", "21", None, true),
        ],
        table,
    );
    draft.set_rental_type("dec", "31").unwrap();
    draft.set_installment_period("dec", "24").unwrap();

    draft.change_model("dec", "090491", &rules).unwrap();
    let dec = draft.slot("dec").unwrap();
    assert_eq!(dec.rental_type.as_deref(), Some("40"));
    assert_eq!(dec.installment_period.as_deref(), Some("24"));

    draft.change_model("isp", "092101", &rules).unwrap();
    assert_eq!(draft.slot("isp").unwrap().rental_type.as_deref(), Some("40"));
}

#[test]
fn test_save_rules_on_composition() {
    let rules = RulesConfig::default();
    let ctx = WorkContext {
        product_group: "D".to_string(),
        ..WorkContext::default()
    };
    let mut draft = decoder_and_card();
    draft.toggle("dec", false).unwrap();
    assert_eq!(draft.validate(&ctx, &rules), Err(Rejection::EmptyComposition));

    let only_card = CompositionDraft::new(
        vec![slot("card", "06", Some("C1"), true)],
        DependencyTable::new(),
    );
    assert_eq!(
        only_card.validate(&ctx, &rules),
        Err(Rejection::MandatoryCategoryMissing {
            category: "04".to_string()
        })
    );
    let voice = WorkContext {
        product_group: "V".to_string(),
        ..WorkContext::default()
    };
    assert!(only_card.validate(&voice, &rules).is_ok());
}
