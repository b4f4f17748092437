#![allow(dead_code)]

use equipment_engine::core::catalog::{Catalog, PendingRemoval};
use equipment_engine::core::reconcile::reconcile;
use equipment_engine::core::rules::QuantityPolicy;
use equipment_engine::domain::model::{
    ContractSlot, LossFlags, Ownership, PhysicalUnit, UnitComposition, UnitPricing, WorkContext,
};
use equipment_engine::EquipmentSession;

pub fn context() -> WorkContext {
    WorkContext {
        work_order_id: "W100".to_string(),
        customer_id: "C100".to_string(),
        contract_id: "K100".to_string(),
        worker_id: "tech7".to_string(),
        so_id: "200".to_string(),
        work_code: "05".to_string(),
        product_code: "P100".to_string(),
        product_group: "D".to_string(),
        ..WorkContext::default()
    }
}

pub fn slot(id: &str, category: &str, model: &str) -> ContractSlot {
    ContractSlot {
        slot_id: id.to_string(),
        category: category.to_string(),
        required_model: Some(model.to_string()),
        model_name: None,
        composition_id: None,
        basic_composition_id: None,
        product_code: Some("P100".to_string()),
        service_code: None,
    }
}

pub fn unit(id: &str, category: &str, model: &str, ownership: Ownership) -> PhysicalUnit {
    PhysicalUnit {
        unit_id: id.to_string(),
        serial_number: Some(format!("SN-{}", id)),
        category: category.to_string(),
        model_code: model.to_string(),
        model_name: None,
        mac_address: None,
        ownership,
        pricing: UnitPricing::default(),
        composition: UnitComposition::default(),
        customer_owned: false,
        equipment_kind: None,
    }
}

pub fn stock(id: &str, category: &str, model: &str) -> PhysicalUnit {
    unit(id, category, model, Ownership::TechnicianStock)
}

pub fn customer(id: &str, category: &str, model: &str) -> PhysicalUnit {
    unit(id, category, model, Ownership::CustomerInstalled)
}

pub fn pending(id: &str, category: &str, model: &str, flags: LossFlags) -> PendingRemoval {
    PendingRemoval {
        unit: customer(id, category, model),
        flags,
    }
}

/// Decoder, modem and AP slots with matching stock and one installed decoder.
pub fn sample_catalog() -> Catalog {
    Catalog {
        slots: vec![
            slot("S-DEC", "04", "090401"),
            slot("S-MODEM", "03", "090301"),
            slot("S-AP", "10", "091001"),
        ],
        stock: vec![
            stock("T-DEC", "04", "090401"),
            stock("T-DEC2", "04", "090401"),
            stock("T-MODEM", "03", "090301"),
            stock("T-AP1", "10", "091001"),
            stock("T-AP2", "10", "091001"),
        ],
        installed: vec![customer("C-DEC", "04", "090401")],
        pending_removal: vec![pending(
            "P-MODEM",
            "03",
            "090301",
            LossFlags {
                cable_lost: true,
                ..LossFlags::default()
            },
        )],
        ..Catalog::default()
    }
}

pub fn fresh_session(catalog: &Catalog) -> EquipmentSession {
    reconcile(context(), catalog, None, QuantityPolicy::unbounded())
}
