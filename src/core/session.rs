//! The binding engine.
//!
//! An [`EquipmentSession`] owns every unit of one work order and places each
//! in exactly one pool: technician stock, bound to a contract slot, or the
//! removal pool. Operations validate first and mutate only on success, so a
//! rejected call leaves the session untouched.

use crate::core::removal::{self, LossFlag};
use crate::core::rules::{count_by_category, QuantityPolicy};
use crate::domain::model::{
    Binding, ChangeReason, ContractSlot, LossFlags, Ownership, PhysicalUnit, RemovalOrigin,
    RemovalRecord, SignalStatus, WorkContext,
};
use crate::utils::error::Rejection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pool", rename_all = "snake_case")]
pub enum Placement {
    Stock,
    Bound(Binding),
    Removal(RemovalRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    Stock,
    Bound,
    Removal,
}

impl Placement {
    pub fn pool(&self) -> Pool {
        match self {
            Placement::Stock => Pool::Stock,
            Placement::Bound(_) => Pool::Bound,
            Placement::Removal(_) => Pool::Removal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Install { slot_id: String, unit_id: String },
    Remove { unit_id: String },
    Reuse { unit_id: String, slot_id: String },
    ToggleFlag { unit_id: String, flag: LossFlag },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub binding: Binding,
    /// Stock unit that previously occupied the slot and went back to stock.
    pub displaced: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Stock unit unbound: registration undone, no removal record.
    ReturnedToStock { unit_id: String },
    MarkedForRemoval(RemovalRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed(InstallOutcome),
    Removed(RemoveOutcome),
    FlagToggled { unit_id: String, flags: LossFlags },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentSession {
    context: WorkContext,
    slots: Vec<ContractSlot>,
    units: BTreeMap<String, PhysicalUnit>,
    placements: BTreeMap<String, Placement>,
    /// Loss flags of server-reported pending removals, restored when such a
    /// unit is reused and then removed again.
    server_flags: BTreeMap<String, LossFlags>,
    policy: QuantityPolicy,
    signal_status: SignalStatus,
    revision: u64,
}

impl EquipmentSession {
    pub fn new(context: WorkContext, slots: Vec<ContractSlot>, policy: QuantityPolicy) -> Self {
        Self {
            context,
            slots,
            units: BTreeMap::new(),
            placements: BTreeMap::new(),
            server_flags: BTreeMap::new(),
            policy,
            signal_status: SignalStatus::Idle,
            revision: 0,
        }
    }

    /// Registers a unit with its starting placement. Used while seeding.
    pub(crate) fn seed(&mut self, unit: PhysicalUnit, placement: Placement) {
        self.placements.insert(unit.unit_id.clone(), placement);
        self.units.insert(unit.unit_id.clone(), unit);
    }

    pub(crate) fn seed_server_flags(&mut self, unit_id: &str, flags: LossFlags) {
        self.server_flags.insert(unit_id.to_string(), flags);
    }

    pub(crate) fn set_placement(&mut self, unit_id: &str, placement: Placement) {
        self.placements.insert(unit_id.to_string(), placement);
    }

    pub(crate) fn drop_unit(&mut self, unit_id: &str) {
        self.units.remove(unit_id);
        self.placements.remove(unit_id);
    }

    pub fn context(&self) -> &WorkContext {
        &self.context
    }

    pub fn slots(&self) -> &[ContractSlot] {
        &self.slots
    }

    pub fn slot(&self, slot_id: &str) -> Option<&ContractSlot> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }

    pub fn unit(&self, unit_id: &str) -> Option<&PhysicalUnit> {
        self.units.get(unit_id)
    }

    pub fn units(&self) -> impl Iterator<Item = &PhysicalUnit> {
        self.units.values()
    }

    pub fn placement(&self, unit_id: &str) -> Option<&Placement> {
        self.placements.get(unit_id)
    }

    pub fn pool_of(&self, unit_id: &str) -> Option<Pool> {
        self.placements.get(unit_id).map(Placement::pool)
    }

    pub fn policy(&self) -> &QuantityPolicy {
        &self.policy
    }

    pub fn server_flags(&self, unit_id: &str) -> Option<LossFlags> {
        self.server_flags.get(unit_id).copied()
    }

    /// Bindings in contract slot order.
    pub fn bindings(&self) -> Vec<&Binding> {
        self.slots
            .iter()
            .filter_map(|slot| self.binding_for_slot(&slot.slot_id))
            .collect()
    }

    pub fn binding_for_slot(&self, slot_id: &str) -> Option<&Binding> {
        self.placements.values().find_map(|p| match p {
            Placement::Bound(b) if b.slot_id == slot_id => Some(b),
            _ => None,
        })
    }

    pub fn removal_records(&self) -> Vec<&RemovalRecord> {
        self.placements
            .values()
            .filter_map(|p| match p {
                Placement::Removal(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn removal_record(&self, unit_id: &str) -> Option<&RemovalRecord> {
        match self.placements.get(unit_id) {
            Some(Placement::Removal(r)) => Some(r),
            _ => None,
        }
    }

    pub fn available_stock(&self) -> Vec<&PhysicalUnit> {
        self.placements
            .iter()
            .filter(|(_, p)| matches!(p, Placement::Stock))
            .filter_map(|(id, _)| self.units.get(id))
            .collect()
    }

    /// Bindings made during this session: stock units and reused units.
    /// Pre-existing customer units bound from server data are not counted.
    pub fn local_bindings(&self) -> Vec<&Binding> {
        self.bindings()
            .into_iter()
            .filter(|b| self.is_local_binding(b))
            .collect()
    }

    pub fn is_local_binding(&self, binding: &Binding) -> bool {
        binding.change_reason == ChangeReason::ReuseFromRemoval
            || self
                .units
                .get(&binding.unit_id)
                .is_some_and(|u| u.ownership == Ownership::TechnicianStock)
    }

    pub fn signal_status(&self) -> SignalStatus {
        self.signal_status
    }

    pub fn set_signal_status(&mut self, status: SignalStatus) {
        self.signal_status = status;
    }

    /// True when the session holds nothing a fresh load would not rebuild:
    /// no local bindings, no local removals or flag edits, no signal result.
    pub fn is_pristine(&self) -> bool {
        self.signal_status == SignalStatus::Idle
            && self.local_bindings().is_empty()
            && self.removal_records().iter().all(|r| match r.origin {
                RemovalOrigin::ServerPending => self.server_flags.get(&r.unit_id) == Some(&r.flags),
                RemovalOrigin::AutoClassified | RemovalOrigin::Unmatched => !r.flags.any(),
                RemovalOrigin::LocallyRemoved => false,
            })
    }

    /// Bumped on every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Binds `unit_id` to `slot_id`. Category and model must both match the
    /// slot. A stock unit already in the slot is sent back to stock; a
    /// customer unit must be removed first.
    pub fn install(&mut self, slot_id: &str, unit_id: &str) -> Result<InstallOutcome, Rejection> {
        let slot = self
            .slot(slot_id)
            .ok_or_else(|| Rejection::UnknownSlot(slot_id.to_string()))?;
        let unit = self
            .units
            .get(unit_id)
            .ok_or_else(|| Rejection::UnknownUnit(unit_id.to_string()))?;
        let placement = self
            .placements
            .get(unit_id)
            .ok_or_else(|| Rejection::UnknownUnit(unit_id.to_string()))?;

        if let Placement::Bound(existing) = placement {
            return Err(Rejection::UnitAlreadyBound {
                unit_id: unit_id.to_string(),
                slot_id: existing.slot_id.clone(),
            });
        }

        if !slot.accepts(&unit.category, &unit.model_code) {
            return Err(Rejection::ModelMismatch {
                slot_id: slot.slot_id.clone(),
                unit_id: unit.unit_id.clone(),
                slot_category: slot.category.clone(),
                slot_model: slot.required_model.clone().unwrap_or_default(),
                unit_category: unit.category.clone(),
                unit_model: unit.model_code.clone(),
            });
        }

        let displaced = match self.binding_for_slot(slot_id) {
            Some(occupant) => {
                let from_stock = self
                    .units
                    .get(&occupant.unit_id)
                    .is_some_and(|u| u.ownership == Ownership::TechnicianStock);
                if !from_stock {
                    return Err(Rejection::SlotOccupied {
                        slot_id: slot_id.to_string(),
                        occupant: occupant.unit_id.clone(),
                    });
                }
                Some(occupant.unit_id.clone())
            }
            None => None,
        };

        let bound_in_category = self
            .bindings()
            .into_iter()
            .filter(|b| Some(&b.unit_id) != displaced.as_ref())
            .filter_map(|b| self.units.get(&b.unit_id))
            .filter(|u| u.category == unit.category)
            .count();
        self.policy
            .check_upper(&unit.category, bound_in_category + 1)?;

        let change_reason = match placement {
            Placement::Removal(_) => ChangeReason::ReuseFromRemoval,
            _ => ChangeReason::NewInstallation,
        };
        let binding = Binding {
            slot_id: slot_id.to_string(),
            unit_id: unit_id.to_string(),
            change_reason,
        };

        if let Some(previous) = &displaced {
            self.placements.insert(previous.clone(), Placement::Stock);
        }
        self.placements
            .insert(unit_id.to_string(), Placement::Bound(binding.clone()));
        self.touch();

        debug!(
            "Bound unit {} to slot {} ({:?})",
            unit_id, slot_id, change_reason
        );
        Ok(InstallOutcome { binding, displaced })
    }

    /// Unbinds a unit. Stock units go back to stock; customer units enter the
    /// removal pool, keeping the server's flags when the server had already
    /// reported the unit for removal.
    pub fn remove(&mut self, unit_id: &str) -> Result<RemoveOutcome, Rejection> {
        let unit = self
            .units
            .get(unit_id)
            .ok_or_else(|| Rejection::UnknownUnit(unit_id.to_string()))?;
        match self.placements.get(unit_id) {
            Some(Placement::Bound(_)) => {}
            _ => return Err(Rejection::UnitNotBound(unit_id.to_string())),
        }

        let outcome = if unit.ownership == Ownership::TechnicianStock {
            self.placements.insert(unit_id.to_string(), Placement::Stock);
            RemoveOutcome::ReturnedToStock {
                unit_id: unit_id.to_string(),
            }
        } else {
            let record = match self.server_flags.get(unit_id) {
                Some(flags) => RemovalRecord {
                    unit_id: unit_id.to_string(),
                    flags: *flags,
                    origin: RemovalOrigin::ServerPending,
                },
                None => RemovalRecord::new(unit_id, RemovalOrigin::LocallyRemoved),
            };
            self.placements
                .insert(unit_id.to_string(), Placement::Removal(record.clone()));
            RemoveOutcome::MarkedForRemoval(record)
        };
        self.touch();

        debug!("Unbound unit {}: {:?}", unit_id, outcome);
        Ok(outcome)
    }

    /// Re-binds a unit from the removal pool. Its removal record and any
    /// locally toggled flags are discarded.
    pub fn reuse(&mut self, unit_id: &str, slot_id: &str) -> Result<InstallOutcome, Rejection> {
        match self.placements.get(unit_id) {
            Some(Placement::Removal(_)) => self.install(slot_id, unit_id),
            Some(_) => Err(Rejection::NotInRemovalPool(unit_id.to_string())),
            None => Err(Rejection::UnknownUnit(unit_id.to_string())),
        }
    }

    pub fn toggle_flag(&mut self, unit_id: &str, flag: LossFlag) -> Result<LossFlags, Rejection> {
        let record = match self.placements.get_mut(unit_id) {
            Some(Placement::Removal(record)) => record,
            Some(_) => return Err(Rejection::NotInRemovalPool(unit_id.to_string())),
            None => return Err(Rejection::UnknownUnit(unit_id.to_string())),
        };
        let flags = removal::toggle_flag(record, flag);
        self.revision += 1;
        Ok(flags)
    }

    pub fn has_any_loss(&self, unit_id: &str) -> bool {
        self.removal_record(unit_id)
            .is_some_and(removal::has_any_loss)
    }

    /// Applies a command to a copy of the session and returns the new
    /// session. `self` is never modified.
    pub fn apply(&self, command: Command) -> Result<(EquipmentSession, Outcome), Rejection> {
        let mut next = self.clone();
        let outcome = match command {
            Command::Install { slot_id, unit_id } => {
                Outcome::Installed(next.install(&slot_id, &unit_id)?)
            }
            Command::Remove { unit_id } => Outcome::Removed(next.remove(&unit_id)?),
            Command::Reuse { unit_id, slot_id } => {
                Outcome::Installed(next.reuse(&unit_id, &slot_id)?)
            }
            Command::ToggleFlag { unit_id, flag } => {
                let flags = next.toggle_flag(&unit_id, flag)?;
                Outcome::FlagToggled { unit_id, flags }
            }
        };
        Ok((next, outcome))
    }

    /// Save-time quantity check over the current bindings.
    pub fn validate(&self) -> Result<(), Rejection> {
        let counts = count_by_category(
            self.bindings()
                .into_iter()
                .filter_map(|b| self.units.get(&b.unit_id))
                .map(|u| u.category.as_str()),
        );
        for (category, count) in counts {
            self.policy.check_upper(&category, count)?;
        }
        Ok(())
    }

    /// Checks the structural invariants. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut slot_owners: BTreeMap<&str, &str> = BTreeMap::new();
        for (unit_id, placement) in &self.placements {
            let Some(unit) = self.units.get(unit_id) else {
                return Err(format!("placement for unknown unit {}", unit_id));
            };
            if let Placement::Bound(binding) = placement {
                if binding.unit_id != *unit_id {
                    return Err(format!("binding of {} names {}", unit_id, binding.unit_id));
                }
                if let Some(other) = slot_owners.insert(&binding.slot_id, unit_id) {
                    return Err(format!(
                        "slot {} bound to both {} and {}",
                        binding.slot_id, other, unit_id
                    ));
                }
                let Some(slot) = self.slot(&binding.slot_id) else {
                    return Err(format!("unit {} bound to unknown slot", unit_id));
                };
                if !slot.accepts(&unit.category, &unit.model_code) {
                    return Err(format!("unit {} does not match slot {}", unit_id, slot.slot_id));
                }
            }
            if let Placement::Removal(record) = placement {
                if record.unit_id != *unit_id {
                    return Err(format!("removal record of {} names {}", unit_id, record.unit_id));
                }
            }
        }
        if self.units.len() != self.placements.len() {
            return Err("unit without placement".to_string());
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.signal_status = SignalStatus::Idle;
    }
}
