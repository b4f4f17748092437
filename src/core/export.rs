//! Flattens a session into the installed/removed record lists the
//! work-completion collaborator consumes, and back.

use crate::core::removal;
use crate::core::session::EquipmentSession;
use crate::domain::model::{
    Binding, ChangeReason, LossFlags, Ownership, PhysicalUnit, RemovalOrigin, RemovalRecord,
    SignalStatus, UnitComposition, UnitPricing,
};
use crate::utils::error::{EquipmentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct InstalledRecord {
    pub eqt_no: String,
    #[serde(default)]
    pub eqt_serno: Option<String>,
    pub item_mid_cd: String,
    pub eqt_cl_cd: String,
    #[serde(default)]
    pub eqt_cl_nm: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    pub wrk_id: String,
    pub cust_id: String,
    pub ctrt_id: String,
    #[serde(default)]
    pub wrk_cd: String,
    /// Slot the unit is bound to.
    pub svc_cmps_id: String,
    #[serde(default)]
    pub basic_prod_cmps_id: Option<String>,
    #[serde(default)]
    pub eqt_prod_cmps_id: Option<String>,
    #[serde(default)]
    pub prod_cd: Option<String>,
    #[serde(default)]
    pub svc_cd: Option<String>,
    #[serde(default)]
    pub eqt_sale_amt: Option<String>,
    #[serde(default)]
    pub mst_so_id: String,
    #[serde(default)]
    pub so_id: String,
    #[serde(default)]
    pub reg_uid: String,
    #[serde(default)]
    pub old_lent_yn: Option<String>,
    #[serde(default)]
    pub lent: Option<String>,
    #[serde(default)]
    pub itllmt_prd: Option<String>,
    #[serde(default)]
    pub eqt_use_stat_cd: Option<String>,
    /// Legacy discriminator: `1` new installation, `3` reuse.
    pub eqt_chg_gb: String,
    pub chg_reason: ChangeReason,
    pub ownership: Ownership,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RemovedRecord {
    pub eqt_no: String,
    #[serde(default)]
    pub eqt_serno: Option<String>,
    pub item_mid_cd: String,
    pub eqt_cl_cd: String,
    #[serde(default)]
    pub eqt_cl_nm: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    pub wrk_id: String,
    pub wrkr_id: String,
    pub cust_id: String,
    pub ctrt_id: String,
    #[serde(default)]
    pub so_id: String,
    /// Slot the server last recorded the unit against.
    #[serde(default)]
    pub svc_cmps_id: Option<String>,
    #[serde(default)]
    pub lent: Option<String>,
    #[serde(flatten)]
    pub flags: LossFlags,
    pub removal_origin: RemovalOrigin,
    pub ownership: Ownership,
}

/// Installed and removed lists of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub installed: Vec<InstalledRecord>,
    pub removed: Vec<RemovedRecord>,
}

impl ExportBundle {
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty() && self.removed.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(EquipmentError::SerializationError)
    }

    /// Renders both lists as CSV, installed first, separated by a blank line.
    pub fn to_csv(&self) -> Result<String> {
        let mut out = String::new();
        out.push_str(&installed_csv(&self.installed)?);
        out.push('\n');
        out.push_str(&removed_csv(&self.removed)?);
        Ok(out)
    }
}

/// Persisted session state for one work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub work_id: String,
    pub bundle: ExportBundle,
    #[serde(default)]
    pub signal_status: SignalStatus,
    pub saved_at: DateTime<Utc>,
}

impl SessionDraft {
    pub fn from_session(session: &EquipmentSession) -> Self {
        Self {
            work_id: session.context().work_order_id.clone(),
            bundle: export_session(session),
            signal_status: session.signal_status(),
            saved_at: Utc::now(),
        }
    }

    /// Equal apart from the timestamp.
    pub fn same_content(&self, other: &SessionDraft) -> bool {
        self.work_id == other.work_id
            && self.bundle == other.bundle
            && self.signal_status == other.signal_status
    }
}

/// Exports the bindings made during the session and the removal pool.
/// Customer units that were already installed and stayed put are not part
/// of the installed list. Unmatched units stay at the customer and are only
/// reported once the technician flags a loss on them.
pub fn export_session(session: &EquipmentSession) -> ExportBundle {
    let installed = session
        .local_bindings()
        .into_iter()
        .filter_map(|binding| installed_record(session, binding))
        .collect();
    let removed = session
        .removal_records()
        .into_iter()
        .filter(|record| removal::is_reported(record))
        .filter_map(|record| removed_record(session, record))
        .collect();
    ExportBundle { installed, removed }
}

fn installed_record(session: &EquipmentSession, binding: &Binding) -> Option<InstalledRecord> {
    let unit = session.unit(&binding.unit_id)?;
    let slot = session.slot(&binding.slot_id)?;
    let ctx = session.context();
    Some(InstalledRecord {
        eqt_no: unit.unit_id.clone(),
        eqt_serno: unit.serial_number.clone(),
        item_mid_cd: unit.category.clone(),
        eqt_cl_cd: unit.model_code.clone(),
        eqt_cl_nm: unit.model_name.clone(),
        mac_address: unit.mac_address.clone(),
        wrk_id: ctx.work_order_id.clone(),
        cust_id: ctx.customer_id.clone(),
        ctrt_id: ctx.contract_id.clone(),
        wrk_cd: ctx.work_code.clone(),
        svc_cmps_id: slot.slot_id.clone(),
        basic_prod_cmps_id: slot
            .basic_composition_id
            .clone()
            .or_else(|| unit.composition.basic_composition_id.clone()),
        eqt_prod_cmps_id: slot
            .composition_id
            .clone()
            .or_else(|| unit.composition.equipment_composition_id.clone()),
        prod_cd: slot
            .product_code
            .clone()
            .or_else(|| unit.composition.product_code.clone()),
        svc_cd: slot
            .service_code
            .clone()
            .or_else(|| unit.composition.service_code.clone()),
        eqt_sale_amt: unit.pricing.sale_amount.clone(),
        mst_so_id: ctx.mst_so_id.clone(),
        so_id: ctx.so_id.clone(),
        reg_uid: ctx.worker_id.clone(),
        old_lent_yn: unit.pricing.old_rental_type.clone(),
        lent: unit.pricing.rental_type.clone(),
        itllmt_prd: unit.pricing.installment_period.clone(),
        eqt_use_stat_cd: unit.pricing.usage_status.clone(),
        eqt_chg_gb: binding.change_reason.legacy_code().to_string(),
        chg_reason: binding.change_reason,
        ownership: unit.ownership,
    })
}

fn removed_record(session: &EquipmentSession, record: &RemovalRecord) -> Option<RemovedRecord> {
    let unit = session.unit(&record.unit_id)?;
    let ctx = session.context();
    Some(RemovedRecord {
        eqt_no: unit.unit_id.clone(),
        eqt_serno: unit.serial_number.clone(),
        item_mid_cd: unit.category.clone(),
        eqt_cl_cd: unit.model_code.clone(),
        eqt_cl_nm: unit.model_name.clone(),
        mac_address: unit.mac_address.clone(),
        wrk_id: ctx.work_order_id.clone(),
        wrkr_id: ctx.worker_id.clone(),
        cust_id: ctx.customer_id.clone(),
        ctrt_id: ctx.contract_id.clone(),
        so_id: ctx.so_id.clone(),
        svc_cmps_id: unit.composition.server_slot_id.clone(),
        lent: unit.pricing.rental_type.clone(),
        flags: record.flags,
        removal_origin: record.origin,
        ownership: unit.ownership,
    })
}

impl InstalledRecord {
    pub fn binding(&self) -> Binding {
        Binding {
            slot_id: self.svc_cmps_id.clone(),
            unit_id: self.eqt_no.clone(),
            change_reason: self.chg_reason,
        }
    }

    /// Rebuilds the unit for a record whose unit the server no longer lists.
    pub fn to_unit(&self) -> PhysicalUnit {
        PhysicalUnit {
            unit_id: self.eqt_no.clone(),
            serial_number: self.eqt_serno.clone(),
            category: self.item_mid_cd.clone(),
            model_code: self.eqt_cl_cd.clone(),
            model_name: self.eqt_cl_nm.clone(),
            mac_address: self.mac_address.clone(),
            ownership: self.ownership,
            pricing: UnitPricing {
                rental_type: self.lent.clone(),
                old_rental_type: self.old_lent_yn.clone(),
                sale_amount: self.eqt_sale_amt.clone(),
                usage_status: self.eqt_use_stat_cd.clone(),
                installment_period: self.itllmt_prd.clone(),
            },
            composition: UnitComposition {
                server_slot_id: None,
                basic_composition_id: self.basic_prod_cmps_id.clone(),
                equipment_composition_id: self.eqt_prod_cmps_id.clone(),
                product_code: self.prod_cd.clone(),
                service_code: self.svc_cd.clone(),
            },
            customer_owned: false,
            equipment_kind: None,
        }
    }
}

impl RemovedRecord {
    pub fn removal_record(&self) -> RemovalRecord {
        RemovalRecord {
            unit_id: self.eqt_no.clone(),
            flags: self.flags,
            origin: self.removal_origin,
        }
    }

    pub fn to_unit(&self) -> PhysicalUnit {
        PhysicalUnit {
            unit_id: self.eqt_no.clone(),
            serial_number: self.eqt_serno.clone(),
            category: self.item_mid_cd.clone(),
            model_code: self.eqt_cl_cd.clone(),
            model_name: self.eqt_cl_nm.clone(),
            mac_address: self.mac_address.clone(),
            ownership: self.ownership,
            pricing: UnitPricing {
                rental_type: self.lent.clone(),
                ..UnitPricing::default()
            },
            composition: UnitComposition {
                server_slot_id: self.svc_cmps_id.clone(),
                ..UnitComposition::default()
            },
            customer_owned: false,
            equipment_kind: None,
        }
    }
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn yn(flag: bool) -> &'static str {
    if flag {
        "1"
    } else {
        "0"
    }
}

fn ownership_str(ownership: Ownership) -> &'static str {
    match ownership {
        Ownership::TechnicianStock => "technician_stock",
        Ownership::CustomerInstalled => "customer_installed",
    }
}

fn origin_str(origin: RemovalOrigin) -> &'static str {
    match origin {
        RemovalOrigin::ServerPending => "server_pending",
        RemovalOrigin::LocallyRemoved => "locally_removed",
        RemovalOrigin::AutoClassified => "auto_classified",
        RemovalOrigin::Unmatched => "unmatched",
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().map_err(|e| EquipmentError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| EquipmentError::ConfigError {
        message: format!("CSV output is not UTF-8: {}", e),
    })
}

fn installed_csv(records: &[InstalledRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "EQT_NO",
        "EQT_SERNO",
        "ITEM_MID_CD",
        "EQT_CL_CD",
        "EQT_CL_NM",
        "MAC_ADDRESS",
        "SVC_CMPS_ID",
        "PROD_CD",
        "LENT",
        "EQT_SALE_AMT",
        "EQT_CHG_GB",
        "CHG_REASON",
        "OWNERSHIP",
    ])?;
    for r in records {
        let reason = match r.chg_reason {
            ChangeReason::NewInstallation => "new",
            ChangeReason::ReuseFromRemoval => "reuse",
        };
        writer.write_record([
            r.eqt_no.as_str(),
            opt(&r.eqt_serno),
            r.item_mid_cd.as_str(),
            r.eqt_cl_cd.as_str(),
            opt(&r.eqt_cl_nm),
            opt(&r.mac_address),
            r.svc_cmps_id.as_str(),
            opt(&r.prod_cd),
            opt(&r.lent),
            opt(&r.eqt_sale_amt),
            r.eqt_chg_gb.as_str(),
            reason,
            ownership_str(r.ownership),
        ])?;
    }
    finish(writer)
}

fn removed_csv(records: &[RemovedRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "EQT_NO",
        "EQT_SERNO",
        "ITEM_MID_CD",
        "EQT_CL_CD",
        "WRKR_ID",
        "CTRT_ID",
        "EQT_LOSS_YN",
        "PART_LOSS_BRK_YN",
        "EQT_BRK_YN",
        "EQT_CABL_LOSS_YN",
        "EQT_CRDL_LOSS_YN",
        "REMOVAL_ORIGIN",
        "OWNERSHIP",
    ])?;
    for r in records {
        writer.write_record([
            r.eqt_no.as_str(),
            opt(&r.eqt_serno),
            r.item_mid_cd.as_str(),
            r.eqt_cl_cd.as_str(),
            r.wrkr_id.as_str(),
            r.ctrt_id.as_str(),
            yn(r.flags.equipment_lost),
            yn(r.flags.accessory_lost),
            yn(r.flags.remote_lost),
            yn(r.flags.cable_lost),
            yn(r.flags.cradle_lost),
            origin_str(r.removal_origin),
            ownership_str(r.ownership),
        ])?;
    }
    finish(writer)
}
