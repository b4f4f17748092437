//! Backend request and response shapes. Field names follow the provisioning
//! backend; nothing here leaves the adapters and the catalog normaliser.

use crate::utils::serde_ext::loose_string;
use serde::{Deserialize, Serialize};

/// `getCustProdInfo` response: one promotion array and four equipment pools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCatalogResponse {
    #[serde(default)]
    pub output1: Option<Vec<RawPromotionInfo>>,
    /// Contract slots.
    #[serde(default)]
    pub output2: Option<Vec<RawEquipmentRecord>>,
    /// Technician stock.
    #[serde(default)]
    pub output3: Option<Vec<RawEquipmentRecord>>,
    /// Customer-installed units (removal pool for removal work).
    #[serde(default)]
    pub output4: Option<Vec<RawEquipmentRecord>>,
    /// Pending removal.
    #[serde(default)]
    pub output5: Option<Vec<RawEquipmentRecord>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RawPromotionInfo {
    #[serde(default, deserialize_with = "loose_string")]
    pub kpi_prod_grp_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub prod_chg_gb: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub chg_kpi_prod_grp_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub prod_grp: Option<String>,
}

/// Any equipment row the backend returns. Alternative keys are kept as
/// separate fields because both spellings may be present at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RawEquipmentRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_no: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_serno: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub item_mid_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cl_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cl: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cl_nm: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub mac_address: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub mac_addr: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub svc_cmps_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub prod_cmps_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub basic_prod_cmps_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_prod_cmps_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub prod_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub svc_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub lent: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub lent_yn: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub old_lent_yn: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_sale_amt: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_use_stat_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub itllmt_prd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub voip_custown_eqt: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_knd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_loss_yn: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub part_loss_brk_yn: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_brk_yn: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cabl_loss_yn: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_crdl_loss_yn: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub sub_eqt_1: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub sub_eqt_2: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub sub_eqt_3: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub del_eqt_1: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub del_eqt_2: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub del_eqt_3: Option<String>,
}

/// `getEquipmentNmListOfProd` row: one selectable model of a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RawModelRow {
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cl_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cl_nm: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub sub_eqt_1: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub sub_eqt_2: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub sub_eqt_3: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub del_eqt_1: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub del_eqt_2: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub del_eqt_3: Option<String>,
}

/// `getContractEqtList` response; `output2` holds the composition rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCompositionList {
    #[serde(default)]
    pub output2: Option<Vec<RawCompositionRow>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RawCompositionRow {
    #[serde(default, deserialize_with = "loose_string")]
    pub sel: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub prod_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub svc_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub prod_typ: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub prod_grp: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub item_mid_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cl: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cl_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_cl_nm: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub lent: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_use_stat_cd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub itllmt_prd: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub eqt_sale_amt: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub equip_seq: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub svc_cmps_id: Option<String>,
}

/// Fixed-width `eqtCmpsInfoChg` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CompositionRequest {
    pub rcpt_id: String,
    pub wrk_id: String,
    pub ctrt_id: String,
    pub prod_grps: String,
    pub prod_cmps_cls: String,
    pub prod_cds: String,
    pub svc_cds: String,
    pub item_mid_cds: String,
    pub eqt_cls: String,
    pub lents: String,
    pub eqt_use_stats: String,
    pub eqt_sale_amts: String,
    pub itllmt_prds: String,
    pub service_cnt: String,
    pub prom_cnt: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendAck {
    #[serde(rename = "MSGCODE", default, deserialize_with = "loose_string")]
    pub msg_code: Option<String>,
    #[serde(rename = "MESSAGE", default, deserialize_with = "loose_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub code: Option<String>,
    #[serde(rename = "message", default, deserialize_with = "loose_string")]
    pub message_text: Option<String>,
}

impl BackendAck {
    pub fn is_success(&self) -> bool {
        matches!(self.msg_code.as_deref(), Some("SUCCESS") | Some("0"))
            || self.code.as_deref() == Some("SUCCESS")
    }

    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.message_text.clone())
            .unwrap_or_else(|| "unknown backend error".to_string())
    }
}

/// `signal/send` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SignalRequest {
    pub msg_id: String,
    pub cust_id: String,
    pub ctrt_id: String,
    pub so_id: String,
    pub eqt_no: String,
    pub eqt_prod_cmps_id: String,
    pub prod_cd: String,
    pub etc_1: String,
    pub etc_2: String,
    pub etc_3: String,
    pub etc_4: String,
    pub wrk_id: String,
    pub reg_uid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalResponse {
    #[serde(rename = "O_IFSVC_RESULT", default, deserialize_with = "loose_string")]
    pub result: Option<String>,
    #[serde(rename = "MESSAGE", default, deserialize_with = "loose_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub code: Option<String>,
}

impl SignalResponse {
    pub fn is_success(&self) -> bool {
        self.result
            .as_deref()
            .is_some_and(|r| r.starts_with("TRUE"))
            || self.code.as_deref() == Some("SUCCESS")
    }

    pub fn failure_reason(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.result.clone())
            .unwrap_or_else(|| "no result from signal service".to_string())
    }
}
