use crate::utils::serde_ext::yn_flag;
use serde::{Deserialize, Serialize};

/// A required equipment position on a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSlot {
    pub slot_id: String,
    pub category: String,
    /// `None` while the slot is still unconstrained.
    pub required_model: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub composition_id: Option<String>,
    #[serde(default)]
    pub basic_composition_id: Option<String>,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub service_code: Option<String>,
}

impl ContractSlot {
    pub fn accepts(&self, category: &str, model_code: &str) -> bool {
        self.category == category && self.required_model.as_deref() == Some(model_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    TechnicianStock,
    CustomerInstalled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPricing {
    pub rental_type: Option<String>,
    pub old_rental_type: Option<String>,
    pub sale_amount: Option<String>,
    pub usage_status: Option<String>,
    pub installment_period: Option<String>,
}

/// Billing composition identifiers the backend attached to a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitComposition {
    /// Slot the server last recorded this unit against.
    pub server_slot_id: Option<String>,
    pub basic_composition_id: Option<String>,
    pub equipment_composition_id: Option<String>,
    pub product_code: Option<String>,
    pub service_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalUnit {
    pub unit_id: String,
    pub serial_number: Option<String>,
    pub category: String,
    pub model_code: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    pub ownership: Ownership,
    #[serde(default)]
    pub pricing: UnitPricing,
    #[serde(default)]
    pub composition: UnitComposition,
    /// Owned by the customer rather than rented (rental flag `40` and friends).
    #[serde(default)]
    pub customer_owned: bool,
    /// Raw `EQT_KND` tag; `CUST` marks customer equipment.
    #[serde(default)]
    pub equipment_kind: Option<String>,
}

impl PhysicalUnit {
    pub fn is_customer_equipment(&self) -> bool {
        self.equipment_kind.as_deref() == Some("CUST")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeReason {
    #[serde(rename = "new")]
    NewInstallation,
    #[serde(rename = "reuse")]
    ReuseFromRemoval,
}

impl ChangeReason {
    /// Legacy `EQT_CHG_GB` code.
    pub fn legacy_code(self) -> &'static str {
        match self {
            ChangeReason::NewInstallation => "1",
            ChangeReason::ReuseFromRemoval => "3",
        }
    }

    pub fn from_legacy_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" | "new" => Some(ChangeReason::NewInstallation),
            "3" | "reuse" => Some(ChangeReason::ReuseFromRemoval),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub slot_id: String,
    pub unit_id: String,
    pub change_reason: ChangeReason,
}

/// Loss and damage flags of a removed unit. Serialized with the backend's
/// column names so the struct can be flattened into export records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LossFlags {
    #[serde(rename = "EQT_LOSS_YN", default, with = "yn_flag")]
    pub equipment_lost: bool,
    #[serde(rename = "PART_LOSS_BRK_YN", default, with = "yn_flag")]
    pub accessory_lost: bool,
    #[serde(rename = "EQT_BRK_YN", default, with = "yn_flag")]
    pub remote_lost: bool,
    #[serde(rename = "EQT_CABL_LOSS_YN", default, with = "yn_flag")]
    pub cable_lost: bool,
    #[serde(rename = "EQT_CRDL_LOSS_YN", default, with = "yn_flag")]
    pub cradle_lost: bool,
}

impl LossFlags {
    pub fn any(&self) -> bool {
        self.equipment_lost
            || self.accessory_lost
            || self.remote_lost
            || self.cable_lost
            || self.cradle_lost
    }
}

/// How a unit ended up in the removal pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOrigin {
    /// Reported by the backend as pending removal.
    ServerPending,
    /// Unbound by the technician during this session.
    LocallyRemoved,
    /// Flagged by the first-load heuristic.
    AutoClassified,
    /// Customer unit with no slot left to occupy.
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRecord {
    pub unit_id: String,
    pub flags: LossFlags,
    pub origin: RemovalOrigin,
}

impl RemovalRecord {
    pub fn new(unit_id: impl Into<String>, origin: RemovalOrigin) -> Self {
        Self {
            unit_id: unit_id.into(),
            flags: LossFlags::default(),
            origin,
        }
    }
}

/// Companion (`subs`) and conflicting (`dels`) models of one model code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDependency {
    pub model_code: String,
    pub category: String,
    #[serde(default)]
    pub model_name: Option<String>,
    pub subs: Vec<String>,
    pub dels: Vec<String>,
}

/// One row of a contract's equipment composition as edited before a model
/// change is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionSlot {
    pub slot_id: String,
    pub category: String,
    pub model_code: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    pub selected: bool,
    #[serde(default)]
    pub rental_type: Option<String>,
    #[serde(default)]
    pub usage_status: Option<String>,
    #[serde(default)]
    pub installment_period: Option<String>,
    #[serde(default)]
    pub sale_amount: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub equipment_seq: Option<String>,
    #[serde(default)]
    pub product_group: Option<String>,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub service_code: Option<String>,
    /// Appended support equipment rather than a contract row.
    #[serde(default)]
    pub support: bool,
}

impl CompositionSlot {
    /// A sub/del code names either a category or a model.
    pub fn matches_code(&self, code: &str) -> bool {
        self.category == code || self.model_code.as_deref() == Some(code)
    }
}

/// Work-order scalars every backend call and export record needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkContext {
    pub work_order_id: String,
    pub customer_id: String,
    pub contract_id: String,
    #[serde(default)]
    pub receipt_id: String,
    #[serde(default)]
    pub worker_id: String,
    #[serde(default)]
    pub so_id: String,
    #[serde(default)]
    pub mst_so_id: String,
    pub work_code: String,
    #[serde(default)]
    pub work_detail_code: String,
    #[serde(default)]
    pub product_code: String,
    /// Product group (`V` voice-only, `I` internet-only, `C` cable, ...).
    #[serde(default)]
    pub product_group: String,
    /// Set when the contract bundles a VoIP product.
    #[serde(default)]
    pub voip_product_code: Option<String>,
    /// Set when the contract bundles an ISP product.
    #[serde(default)]
    pub isp_product_code: Option<String>,
    /// `CMPS_QTY_FROM`; `"2"` doubles the AP allowance.
    #[serde(default)]
    pub composition_quantity_from: Option<String>,
}

/// Scalars the backend returns alongside the pools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMeta {
    pub kpi_product_group: Option<String>,
    pub change_reason_code: Option<String>,
    pub changed_kpi_product_group: Option<String>,
    pub product_group: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    #[default]
    Idle,
    Success,
    Fail,
}
