//! Derives the unit identifiers a provisioning signal carries from the final
//! binding set (or the removal pool, for removal signals).

use crate::config::toml_config::EngineConfig;
use crate::core::removal;
use crate::core::session::{EquipmentSession, Placement};
use crate::domain::model::PhysicalUnit;
use crate::domain::wire::SignalRequest;
use crate::utils::error::{EquipmentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Install,
    Removal,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Install => f.write_str("install"),
            SignalKind::Removal => f.write_str("removal"),
        }
    }
}

impl FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "install" => Ok(SignalKind::Install),
            "removal" | "remove" => Ok(SignalKind::Removal),
            other => Err(format!("unknown signal kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalUnits {
    /// `EQT_NO`: the unit picked by category priority.
    pub primary: Option<String>,
    pub etc_1: Option<String>,
    pub etc_2: Option<String>,
    pub etc_3: Option<String>,
    /// Wireless unit for voice-only products, or the ISP unit.
    pub etc_4: Option<String>,
    /// `EQT_PROD_CMPS_ID` of the primary unit.
    pub composition_id: Option<String>,
    /// `WRK_ID`: a keyed unit's id or MAC, otherwise the work order id.
    pub work_ref: String,
}

impl SignalUnits {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.etc_1.is_none()
    }
}

fn units_for(session: &EquipmentSession, kind: SignalKind) -> Vec<&PhysicalUnit> {
    match kind {
        SignalKind::Install => session
            .bindings()
            .into_iter()
            .filter_map(|b| session.unit(&b.unit_id))
            .collect(),
        SignalKind::Removal => session
            .removal_records()
            .into_iter()
            .filter(|r| removal::is_reported(r))
            .filter_map(|r| session.unit(&r.unit_id))
            .collect(),
    }
}

/// Composition id of a unit: its slot's when bound, else the one the server
/// recorded.
fn composition_of(session: &EquipmentSession, unit_id: &str) -> Option<String> {
    let from_slot = match session.placement(unit_id) {
        Some(Placement::Bound(binding)) => session
            .slot(&binding.slot_id)
            .and_then(|slot| slot.composition_id.clone()),
        _ => None,
    };
    from_slot.or_else(|| {
        session
            .unit(unit_id)
            .and_then(|u| u.composition.equipment_composition_id.clone())
    })
}

fn first_of_category(units: &[&PhysicalUnit], category: &str) -> Option<String> {
    units
        .iter()
        .find(|u| u.category == category)
        .map(|u| u.unit_id.clone())
}

pub fn derive_signal_units(
    session: &EquipmentSession,
    kind: SignalKind,
    config: &EngineConfig,
) -> SignalUnits {
    let signal = &config.signal;
    let ctx = session.context();
    let units = units_for(session, kind);
    let find = |category: &str| first_of_category(&units, category);
    let voip = ctx.voip_product_code.as_deref().is_some_and(|c| !c.is_empty());

    let primary = if voip {
        find(&signal.voice_category)
    } else {
        signal
            .primary_priority
            .iter()
            .find_map(|category| find(category))
            .or_else(|| {
                (ctx.product_group == signal.internet_only_group)
                    .then(|| find(&signal.internet_only_category))
                    .flatten()
            })
            .or_else(|| find(&signal.voice_category))
    };

    let etc_1 = if voip {
        find(&signal.modem_category)
    } else {
        find(&signal.decoder_category)
    };
    let etc_2 = find(&signal.auxiliary_category);
    let etc_3 = if ctx.product_group == signal.cable_group {
        find(&signal.modem_category)
    } else {
        None
    };
    let isp = ctx.isp_product_code.as_deref().is_some_and(|c| !c.is_empty());
    let etc_4 = if isp {
        find(&signal.isp_category)
    } else if ctx.product_group == config.rules.voice_only_product_group {
        find(&signal.voice_group_category)
    } else {
        None
    };
    let composition_id = primary
        .as_deref()
        .and_then(|unit_id| composition_of(session, unit_id));

    let work_ref = units
        .iter()
        .find_map(|u| {
            if signal.unit_keyed_models.contains(&u.model_code) {
                Some(u.unit_id.clone())
            } else if signal.mac_keyed_models.contains(&u.model_code) {
                Some(u.mac_address.clone().unwrap_or_else(|| u.unit_id.clone()))
            } else {
                None
            }
        })
        .unwrap_or_else(|| ctx.work_order_id.clone());

    SignalUnits {
        primary,
        etc_1,
        etc_2,
        etc_3,
        etc_4,
        composition_id,
        work_ref,
    }
}

pub fn message_type(session: &EquipmentSession, kind: SignalKind, config: &EngineConfig) -> String {
    let signal = &config.signal;
    if session.context().product_group == config.rules.voice_only_product_group {
        return signal.voice_only_message.clone();
    }
    match kind {
        SignalKind::Install => signal.install_message.clone(),
        SignalKind::Removal => signal.removal_message.clone(),
    }
}

/// Builds the dispatch request. A session with nothing to signal is a failed
/// dispatch, never an empty request.
pub fn build_signal_request(
    session: &EquipmentSession,
    kind: SignalKind,
    config: &EngineConfig,
) -> Result<SignalRequest> {
    let message_type = message_type(session, kind, config);
    let units = derive_signal_units(session, kind, config);
    if units.is_empty() {
        return Err(EquipmentError::DispatchFailed {
            message_type,
            message: format!("no equipment to signal for {}", kind),
        });
    }

    let ctx = session.context();
    Ok(SignalRequest {
        msg_id: message_type,
        cust_id: ctx.customer_id.clone(),
        ctrt_id: ctx.contract_id.clone(),
        so_id: ctx.so_id.clone(),
        eqt_no: units.primary.unwrap_or_default(),
        eqt_prod_cmps_id: units.composition_id.unwrap_or_default(),
        prod_cd: ctx.product_code.clone(),
        etc_1: units.etc_1.unwrap_or_default(),
        etc_2: units.etc_2.unwrap_or_default(),
        etc_3: units.etc_3.unwrap_or_default(),
        etc_4: units.etc_4.unwrap_or_default(),
        wrk_id: units.work_ref,
        reg_uid: ctx.worker_id.clone(),
    })
}
