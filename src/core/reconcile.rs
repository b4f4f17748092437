//! Seeds a session from a freshly fetched catalog and replays any locally
//! saved draft on top of it.
//!
//! Server truth decides the starting placement of every unit. A draft then
//! overrides the units it mentions: its removed list first (which may free
//! slots held by server-reported customer units), then its installed list.
//! Replaying the same draft twice yields the same session.

use crate::core::catalog::Catalog;
use crate::core::export::SessionDraft;
use crate::core::rules::QuantityPolicy;
use crate::core::session::{EquipmentSession, Placement, Pool};
use crate::domain::model::{
    Binding, ChangeReason, ContractSlot, PhysicalUnit, RemovalOrigin, RemovalRecord, WorkContext,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub fn reconcile(
    context: WorkContext,
    catalog: &Catalog,
    draft: Option<&SessionDraft>,
    policy: QuantityPolicy,
) -> EquipmentSession {
    let mut session = EquipmentSession::new(context, catalog.slots.clone(), policy);

    for unit in &catalog.stock {
        session.seed(unit.clone(), Placement::Stock);
    }
    for pending in &catalog.pending_removal {
        let record = RemovalRecord {
            unit_id: pending.unit.unit_id.clone(),
            flags: pending.flags,
            origin: RemovalOrigin::ServerPending,
        };
        session.seed_server_flags(&pending.unit.unit_id, pending.flags);
        session.seed(pending.unit.clone(), Placement::Removal(record));
    }
    seed_installed(&mut session, &catalog.installed, draft.is_none());

    if let Some(draft) = draft {
        replay_draft(&mut session, draft);
    }

    info!(
        "Session for work order {} ready: {} bound, {} in removal, {} in stock",
        session.context().work_order_id,
        session.bindings().len(),
        session.removal_records().len(),
        session.available_stock().len()
    );
    session
}

/// Binds server-reported customer units to their slots. Units with no
/// accepting slot go to the removal pool; on a first load those tagged as
/// customer equipment are auto-classified.
fn seed_installed(session: &mut EquipmentSession, installed: &[PhysicalUnit], first_load: bool) {
    let mut taken: HashSet<String> = HashSet::new();
    for unit in installed {
        match pick_slot(session.slots(), unit, &taken) {
            Some(slot_id) => {
                taken.insert(slot_id.clone());
                let binding = Binding {
                    slot_id,
                    unit_id: unit.unit_id.clone(),
                    change_reason: ChangeReason::NewInstallation,
                };
                session.seed(unit.clone(), Placement::Bound(binding));
            }
            None => {
                let origin = if first_load && unit.is_customer_equipment() {
                    RemovalOrigin::AutoClassified
                } else {
                    RemovalOrigin::Unmatched
                };
                warn!(
                    "Installed unit {} ({}/{}) matches no contract slot; marked {:?}",
                    unit.unit_id, unit.category, unit.model_code, origin
                );
                let record = RemovalRecord::new(unit.unit_id.clone(), origin);
                session.seed(unit.clone(), Placement::Removal(record));
            }
        }
    }
}

/// The slot the server recorded for the unit when it still accepts it,
/// otherwise the first free accepting slot.
fn pick_slot(slots: &[ContractSlot], unit: &PhysicalUnit, taken: &HashSet<String>) -> Option<String> {
    let free_and_accepting =
        |s: &&ContractSlot| !taken.contains(&s.slot_id) && s.accepts(&unit.category, &unit.model_code);

    if let Some(server_slot) = &unit.composition.server_slot_id {
        if let Some(slot) = slots
            .iter()
            .filter(free_and_accepting)
            .find(|s| s.slot_id == *server_slot)
        {
            return Some(slot.slot_id.clone());
        }
    }
    slots
        .iter()
        .find(free_and_accepting)
        .map(|s| s.slot_id.clone())
}

fn replay_draft(session: &mut EquipmentSession, draft: &SessionDraft) {
    for removed in &draft.bundle.removed {
        if session.unit(&removed.eqt_no).is_none() {
            debug!("Restoring removed unit {} from draft", removed.eqt_no);
            session.seed(removed.to_unit(), Placement::Stock);
        }
        session.set_placement(&removed.eqt_no, Placement::Removal(removed.removal_record()));
    }

    for installed in &draft.bundle.installed {
        let binding = installed.binding();
        if session.slot(&binding.slot_id).is_none() {
            warn!(
                "Draft binding of {} dropped: slot {} no longer on the contract",
                binding.unit_id, binding.slot_id
            );
            continue;
        }

        let unit = match session.unit(&binding.unit_id) {
            Some(unit) => unit.clone(),
            None => installed.to_unit(),
        };
        let accepts = session
            .slot(&binding.slot_id)
            .is_some_and(|s| s.accepts(&unit.category, &unit.model_code));
        if !accepts {
            warn!(
                "Draft binding of {} dropped: slot {} no longer accepts {}/{}",
                binding.unit_id, binding.slot_id, unit.category, unit.model_code
            );
            continue;
        }

        if let Some(occupant) = session.binding_for_slot(&binding.slot_id) {
            if occupant.unit_id != binding.unit_id {
                warn!(
                    "Draft binding of {} dropped: slot {} is held by {}",
                    binding.unit_id, binding.slot_id, occupant.unit_id
                );
                continue;
            }
        }
        if let Some(Placement::Bound(current)) = session.placement(&binding.unit_id) {
            if current.slot_id != binding.slot_id {
                warn!(
                    "Draft binding of {} dropped: unit is bound to {}",
                    binding.unit_id, current.slot_id
                );
                continue;
            }
        }

        if session.unit(&binding.unit_id).is_none() {
            debug!("Restoring installed unit {} from draft", binding.unit_id);
            session.seed(unit, Placement::Stock);
        }
        let unit_id = binding.unit_id.clone();
        session.set_placement(&unit_id, Placement::Bound(binding));
    }

    session.set_signal_status(draft.signal_status);
    debug!(
        "Replayed draft for {}: {} installed, {} removed",
        draft.work_id,
        draft.bundle.installed.len(),
        draft.bundle.removed.len()
    );
}

/// Units of the catalog that the session no longer lists as available stock
/// because a draft bound them.
pub fn locally_consumed_stock<'a>(catalog: &'a Catalog, session: &EquipmentSession) -> Vec<&'a str> {
    catalog
        .stock
        .iter()
        .filter(|u| session.pool_of(&u.unit_id) != Some(Pool::Stock))
        .map(|u| u.unit_id.as_str())
        .collect()
}
