//! Equipment catalog normalisation. Raw backend rows are turned into strict
//! slots and units here and nowhere else.

use crate::core::dependency::DependencyTable;
use crate::domain::codes::{is_removal_work, normalize_category, normalize_model};
use crate::domain::model::{
    CatalogMeta, ContractSlot, LossFlags, Ownership, PhysicalUnit, UnitComposition, UnitPricing,
    WorkContext,
};
use crate::domain::wire::{RawCatalogResponse, RawEquipmentRecord};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const CUSTOMER_OWNED_RENTAL_FLAG: &str = "40";
const CUSTOMER_OWNED_MODEL: &str = "090852";

/// A unit the backend reports as pending removal, with its loss flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRemoval {
    pub unit: PhysicalUnit,
    pub flags: LossFlags,
}

/// The four normalised pools of one work order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub slots: Vec<ContractSlot>,
    pub stock: Vec<PhysicalUnit>,
    pub installed: Vec<PhysicalUnit>,
    pub pending_removal: Vec<PendingRemoval>,
    pub meta: CatalogMeta,
    /// Sub/del links carried on the contract rows.
    pub dependencies: DependencyTable,
}

impl Catalog {
    /// Normalises a `getCustProdInfo` response. For removal-class work the
    /// customer array is the removal pool. A unit id seen in more than one
    /// pool keeps the first of: pending removal, installed, stock.
    pub fn from_response(response: RawCatalogResponse, context: &WorkContext) -> Self {
        let removal_work = is_removal_work(&context.work_code);
        let slot_rows = response.output2.unwrap_or_default();
        let stock_rows = response.output3.unwrap_or_default();
        let (installed_rows, removal_rows) = if removal_work {
            (Vec::new(), response.output4.unwrap_or_default())
        } else {
            (
                response.output4.unwrap_or_default(),
                response.output5.unwrap_or_default(),
            )
        };

        let meta = response
            .output1
            .and_then(|rows| rows.into_iter().next())
            .map(|p| CatalogMeta {
                kpi_product_group: p.kpi_prod_grp_cd,
                change_reason_code: p.prod_chg_gb,
                changed_kpi_product_group: p.chg_kpi_prod_grp_cd,
                product_group: p.prod_grp,
            })
            .unwrap_or_default();

        let mut seen_slots = HashSet::new();
        let slots: Vec<ContractSlot> = slot_rows
            .iter()
            .filter_map(normalize_slot)
            .filter(|slot| {
                let fresh = seen_slots.insert(slot.slot_id.clone());
                if !fresh {
                    warn!("Duplicate contract slot {} ignored", slot.slot_id);
                }
                fresh
            })
            .collect();

        let mut seen_units = HashSet::new();
        let pending_removal: Vec<PendingRemoval> = removal_rows
            .iter()
            .filter_map(|row| {
                let unit = normalize_unit(row, Ownership::CustomerInstalled)?;
                Some(PendingRemoval {
                    flags: loss_flags(row),
                    unit,
                })
            })
            .filter(|p| claim(&mut seen_units, &p.unit))
            .collect();
        let installed: Vec<PhysicalUnit> = installed_rows
            .iter()
            .filter_map(|row| normalize_unit(row, Ownership::CustomerInstalled))
            .filter(|u| claim(&mut seen_units, u))
            .collect();
        let stock: Vec<PhysicalUnit> = stock_rows
            .iter()
            .filter_map(|row| normalize_unit(row, Ownership::TechnicianStock))
            .filter(|u| claim(&mut seen_units, u))
            .collect();

        let mut dependencies = DependencyTable::new();
        dependencies.merge_slot_rows(&slot_rows);

        info!(
            "Catalog for work order {}: {} slots, {} stock, {} installed, {} pending removal",
            context.work_order_id,
            slots.len(),
            stock.len(),
            installed.len(),
            pending_removal.len()
        );

        Self {
            slots,
            stock,
            installed,
            pending_removal,
            meta,
            dependencies,
        }
    }
}

fn claim(seen: &mut HashSet<String>, unit: &PhysicalUnit) -> bool {
    let fresh = seen.insert(unit.unit_id.clone());
    if !fresh {
        warn!("Unit {} reported in more than one pool", unit.unit_id);
    }
    fresh
}

fn first_of(a: &Option<String>, b: &Option<String>) -> Option<String> {
    a.clone().or_else(|| b.clone())
}

pub fn normalize_slot(row: &RawEquipmentRecord) -> Option<ContractSlot> {
    let Some(slot_id) = first_of(&row.svc_cmps_id, &row.prod_cmps_id) else {
        warn!("Dropping contract row without slot id");
        return None;
    };
    let Some(category) = first_of(&row.item_mid_cd, &row.eqt_cd) else {
        warn!("Dropping contract slot {} without category", slot_id);
        return None;
    };
    Some(ContractSlot {
        slot_id,
        category: normalize_category(&category),
        required_model: first_of(&row.eqt_cl_cd, &row.eqt_cl).map(|m| normalize_model(&m)),
        model_name: row.eqt_cl_nm.clone(),
        composition_id: first_of(&row.eqt_prod_cmps_id, &row.prod_cmps_id),
        basic_composition_id: row.basic_prod_cmps_id.clone(),
        product_code: row.prod_cd.clone(),
        service_code: row.svc_cd.clone(),
    })
}

pub fn normalize_unit(row: &RawEquipmentRecord, ownership: Ownership) -> Option<PhysicalUnit> {
    let Some(unit_id) = row.eqt_no.clone() else {
        warn!("Dropping equipment row without unit id");
        return None;
    };
    let (Some(category), Some(model)) = (
        first_of(&row.item_mid_cd, &row.eqt_cd),
        first_of(&row.eqt_cl_cd, &row.eqt_cl),
    ) else {
        warn!("Dropping unit {} without category or model", unit_id);
        return None;
    };
    let model_code = normalize_model(&model);
    let customer_owned = row.lent_yn.as_deref() == Some(CUSTOMER_OWNED_RENTAL_FLAG)
        || row.voip_custown_eqt.as_deref() == Some("Y")
        || model_code == CUSTOMER_OWNED_MODEL;

    debug!("Normalised unit {} ({:?})", unit_id, ownership);
    Some(PhysicalUnit {
        unit_id,
        serial_number: row.eqt_serno.clone(),
        category: normalize_category(&category),
        model_code,
        model_name: row.eqt_cl_nm.clone(),
        mac_address: first_of(&row.mac_address, &row.mac_addr),
        ownership,
        pricing: UnitPricing {
            rental_type: first_of(&row.lent, &row.lent_yn),
            old_rental_type: row.old_lent_yn.clone(),
            sale_amount: row.eqt_sale_amt.clone(),
            usage_status: row.eqt_use_stat_cd.clone(),
            installment_period: row.itllmt_prd.clone(),
        },
        composition: UnitComposition {
            server_slot_id: first_of(&row.svc_cmps_id, &row.prod_cmps_id),
            basic_composition_id: row.basic_prod_cmps_id.clone(),
            equipment_composition_id: row.eqt_prod_cmps_id.clone(),
            product_code: row.prod_cd.clone(),
            service_code: row.svc_cd.clone(),
        },
        customer_owned,
        equipment_kind: row.eqt_knd.clone(),
    })
}

fn is_set(flag: &Option<String>) -> bool {
    matches!(flag.as_deref(), Some("1") | Some("Y"))
}

fn loss_flags(row: &RawEquipmentRecord) -> LossFlags {
    LossFlags {
        equipment_lost: is_set(&row.eqt_loss_yn),
        accessory_lost: is_set(&row.part_loss_brk_yn),
        remote_lost: is_set(&row.eqt_brk_yn),
        cable_lost: is_set(&row.eqt_cabl_loss_yn),
        cradle_lost: is_set(&row.eqt_crdl_loss_yn),
    }
}
