//! Loss and damage tracking for units in the removal pool.

use crate::domain::model::{LossFlags, RemovalOrigin, RemovalRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFlag {
    EquipmentLost,
    AccessoryLost,
    RemoteLost,
    CableLost,
    CradleLost,
}

impl LossFlag {
    pub const ALL: [LossFlag; 5] = [
        LossFlag::EquipmentLost,
        LossFlag::AccessoryLost,
        LossFlag::RemoteLost,
        LossFlag::CableLost,
        LossFlag::CradleLost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LossFlag::EquipmentLost => "equipment",
            LossFlag::AccessoryLost => "accessory",
            LossFlag::RemoteLost => "remote",
            LossFlag::CableLost => "cable",
            LossFlag::CradleLost => "cradle",
        }
    }
}

impl fmt::Display for LossFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LossFlag::ALL
            .into_iter()
            .find(|flag| flag.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown loss flag: {}", s))
    }
}

/// Display classification of a removed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnBadge {
    Returned,
    Lost,
}

impl fmt::Display for ReturnBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnBadge::Returned => f.write_str("returned"),
            ReturnBadge::Lost => f.write_str("lost"),
        }
    }
}

/// Flips exactly one flag; nothing else on the record changes.
pub fn toggle_flag(record: &mut RemovalRecord, flag: LossFlag) -> LossFlags {
    let flags = &mut record.flags;
    let slot = match flag {
        LossFlag::EquipmentLost => &mut flags.equipment_lost,
        LossFlag::AccessoryLost => &mut flags.accessory_lost,
        LossFlag::RemoteLost => &mut flags.remote_lost,
        LossFlag::CableLost => &mut flags.cable_lost,
        LossFlag::CradleLost => &mut flags.cradle_lost,
    };
    *slot = !*slot;
    record.flags
}

pub fn has_any_loss(record: &RemovalRecord) -> bool {
    record.flags.any()
}

/// Whether the unit leaves the customer at completion. An unmatched unit
/// stays put unless a loss was reported on it.
pub fn is_reported(record: &RemovalRecord) -> bool {
    record.origin != RemovalOrigin::Unmatched || has_any_loss(record)
}

pub fn badge(record: &RemovalRecord) -> ReturnBadge {
    if has_any_loss(record) {
        ReturnBadge::Lost
    } else {
        ReturnBadge::Returned
    }
}
