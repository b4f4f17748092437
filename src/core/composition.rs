//! Contract equipment composition: the editable slot list behind a model
//! change and its fixed-width encoding for the backend.

use crate::config::toml_config::RulesConfig;
use crate::core::dependency::{resolve_model_change, resolve_toggle, Cascade, DependencyTable};
use crate::core::rules;
use crate::domain::codes::{normalize_category, normalize_model, rpad};
use crate::domain::model::{CompositionSlot, WorkContext};
use crate::domain::wire::{CompositionRequest, RawCompositionRow};
use crate::utils::error::Rejection;
use tracing::debug;

const DEFAULT_RENTAL_TYPE: &str = "10";
const DEFAULT_USAGE_STATUS: &str = "1";
const DEFAULT_INSTALLMENT_PERIOD: &str = "00";
const DEFAULT_PRODUCT_TYPE: &str = "2";
const INSTALLMENT_RENTAL_TYPE: &str = "31";
const USAGE_STATUS_RENTAL_TYPES: [&str; 3] = ["30", "31", "60"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionDraft {
    slots: Vec<CompositionSlot>,
    table: DependencyTable,
}

impl CompositionDraft {
    pub fn new(slots: Vec<CompositionSlot>, table: DependencyTable) -> Self {
        Self { slots, table }
    }

    /// Builds the draft from `getContractEqtList` rows. Rows without a
    /// sequence get their 1-based position.
    pub fn from_rows(rows: &[RawCompositionRow], table: DependencyTable) -> Self {
        let slots = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let category = row
                    .eqt
                    .as_deref()
                    .or(row.item_mid_cd.as_deref())
                    .or(row.eqt_cd.as_deref())
                    .map(normalize_category)
                    .unwrap_or_default();
                let equipment_seq = row
                    .equip_seq
                    .clone()
                    .or_else(|| row.svc_cmps_id.clone())
                    .unwrap_or_else(|| (index + 1).to_string());
                let model_code = row
                    .eqt_cl
                    .as_deref()
                    .or(row.eqt_cl_cd.as_deref())
                    .map(normalize_model);
                CompositionSlot {
                    slot_id: equipment_seq.clone(),
                    category,
                    model_code,
                    model_name: row.eqt_cl_nm.clone(),
                    selected: row.sel.as_deref() == Some("1"),
                    rental_type: Some(
                        row.lent
                            .clone()
                            .unwrap_or_else(|| DEFAULT_RENTAL_TYPE.to_string()),
                    ),
                    usage_status: Some(
                        row.eqt_use_stat_cd
                            .clone()
                            .unwrap_or_else(|| DEFAULT_USAGE_STATUS.to_string()),
                    ),
                    installment_period: Some(
                        row.itllmt_prd
                            .clone()
                            .unwrap_or_else(|| DEFAULT_INSTALLMENT_PERIOD.to_string()),
                    ),
                    sale_amount: row.eqt_sale_amt.clone(),
                    product_type: Some(
                        row.prod_typ
                            .clone()
                            .unwrap_or_else(|| DEFAULT_PRODUCT_TYPE.to_string()),
                    ),
                    equipment_seq: Some(equipment_seq),
                    product_group: row.prod_grp.clone(),
                    product_code: row.prod_cd.clone(),
                    service_code: row.svc_cd.clone(),
                    support: false,
                }
            })
            .collect();
        Self::new(dedupe_slot_ids(slots), table)
    }

    pub fn slots(&self) -> &[CompositionSlot] {
        &self.slots
    }

    pub fn slot(&self, slot_id: &str) -> Option<&CompositionSlot> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }

    pub fn table(&self) -> &DependencyTable {
        &self.table
    }

    pub fn selected(&self) -> impl Iterator<Item = &CompositionSlot> {
        self.slots.iter().filter(|s| s.selected)
    }

    /// Puts `model_code` on a slot, applies the dependency cascade and then
    /// the customer-owned rental override.
    pub fn change_model(
        &mut self,
        slot_id: &str,
        model_code: &str,
        rules: &RulesConfig,
    ) -> Result<Cascade, Rejection> {
        let index = self.index_of(slot_id)?;
        let model_code = normalize_model(model_code);

        let cascade = resolve_model_change(slot_id, &model_code, &self.slots, &self.table);
        let model_name = self
            .table
            .get(&model_code)
            .and_then(|d| d.model_name.clone());

        let slot = &mut self.slots[index];
        slot.model_code = Some(model_code.clone());
        slot.model_name = model_name;
        self.apply(&cascade);

        let category = self.slots[index].category.clone();
        if rules.forces_customer_owned(&category, Some(&model_code)) {
            // Only the rental type is forced; the edit-time resets do not run.
            self.slots[index].rental_type = Some(rules.customer_owned_rental_type.clone());
        }

        debug!(
            "Model of slot {} set to {}: select {:?}, deselect {:?}",
            slot_id, model_code, cascade.to_select, cascade.to_deselect
        );
        Ok(cascade)
    }

    pub fn toggle(&mut self, slot_id: &str, selected: bool) -> Result<Cascade, Rejection> {
        let index = self.index_of(slot_id)?;
        let cascade = resolve_toggle(slot_id, selected, &self.slots, &self.table);
        self.slots[index].selected = selected;
        self.apply(&cascade);
        Ok(cascade)
    }

    /// Changing the rental type resets the installment period unless the
    /// unit is paid in installments, and the usage status unless the rental
    /// type carries one.
    pub fn set_rental_type(&mut self, slot_id: &str, rental_type: &str) -> Result<(), Rejection> {
        let index = self.index_of(slot_id)?;
        let slot = &mut self.slots[index];
        slot.rental_type = Some(rental_type.to_string());
        if rental_type != INSTALLMENT_RENTAL_TYPE {
            slot.installment_period = Some(DEFAULT_INSTALLMENT_PERIOD.to_string());
        }
        if !USAGE_STATUS_RENTAL_TYPES.contains(&rental_type) {
            slot.usage_status = Some(DEFAULT_USAGE_STATUS.to_string());
        }
        Ok(())
    }

    pub fn set_usage_status(&mut self, slot_id: &str, usage_status: &str) -> Result<(), Rejection> {
        let index = self.index_of(slot_id)?;
        self.slots[index].usage_status = Some(usage_status.to_string());
        Ok(())
    }

    pub fn set_installment_period(&mut self, slot_id: &str, period: &str) -> Result<(), Rejection> {
        let index = self.index_of(slot_id)?;
        self.slots[index].installment_period = Some(period.to_string());
        Ok(())
    }

    pub fn set_sale_amount(&mut self, slot_id: &str, amount: &str) -> Result<(), Rejection> {
        let index = self.index_of(slot_id)?;
        self.slots[index].sale_amount = Some(amount.to_string());
        Ok(())
    }

    /// Appends `count` selected copies of the first unselected row of
    /// `category`. Returns the new slot ids.
    pub fn add_support_slots(
        &mut self,
        category: &str,
        count: usize,
    ) -> Result<Vec<String>, Rejection> {
        let category = normalize_category(category);
        let template = self
            .slots
            .iter()
            .find(|s| !s.selected && !s.support && s.category == category)
            .cloned()
            .ok_or_else(|| Rejection::UnknownSlot(format!("support:{}", category)))?;

        let mut added = Vec::with_capacity(count);
        for _ in 0..count {
            let slot_id = format!("{}#{}", template.slot_id, self.slots.len() + 1);
            self.slots.push(CompositionSlot {
                slot_id: slot_id.clone(),
                selected: true,
                rental_type: Some(DEFAULT_RENTAL_TYPE.to_string()),
                usage_status: Some(DEFAULT_USAGE_STATUS.to_string()),
                installment_period: Some(DEFAULT_INSTALLMENT_PERIOD.to_string()),
                support: true,
                ..template.clone()
            });
            added.push(slot_id);
        }
        Ok(added)
    }

    pub fn validate(&self, context: &WorkContext, rules: &RulesConfig) -> Result<(), Rejection> {
        rules::validate_composition(self.slots(), context, rules)
    }

    /// Encodes the selected rows, ordered by equipment sequence, into the
    /// backend's fixed-width columns.
    pub fn to_request(
        &self,
        context: &WorkContext,
        promotion_count: Option<&str>,
    ) -> Result<CompositionRequest, Rejection> {
        let mut selected: Vec<(usize, &CompositionSlot)> = self.selected().enumerate().collect();
        if selected.is_empty() {
            return Err(Rejection::EmptyComposition);
        }
        selected.sort_by_key(|(index, slot)| (sequence_number(slot).unwrap_or(*index + 1), *index));

        let mut request = CompositionRequest {
            rcpt_id: context.receipt_id.clone(),
            wrk_id: context.work_order_id.clone(),
            ctrt_id: context.contract_id.clone(),
            prom_cnt: promotion_count.unwrap_or_default().to_string(),
            ..CompositionRequest::default()
        };

        for (_, slot) in &selected {
            request
                .prod_grps
                .push_str(slot.product_group.as_deref().unwrap_or_default());
            request
                .prod_cmps_cls
                .push_str(slot.product_type.as_deref().unwrap_or_default());
            request
                .prod_cmps_cls
                .push_str(slot.equipment_seq.as_deref().unwrap_or(&slot.slot_id));
            request
                .prod_cds
                .push_str(slot.product_code.as_deref().unwrap_or_default());
            request
                .svc_cds
                .push_str(slot.service_code.as_deref().unwrap_or_default());
            request.item_mid_cds.push_str(&rpad(&slot.category, 10));
            request
                .eqt_cls
                .push_str(&rpad(slot.model_code.as_deref().unwrap_or_default(), 10));
            request
                .lents
                .push_str(slot.rental_type.as_deref().unwrap_or_default());
            request
                .eqt_use_stats
                .push_str(&rpad(slot.usage_status.as_deref().unwrap_or_default(), 1));
            request.itllmt_prds.push_str(&rpad(
                slot.installment_period
                    .as_deref()
                    .unwrap_or(DEFAULT_INSTALLMENT_PERIOD),
                2,
            ));
        }

        // Only the last row's sale amount is sent.
        if let Some((_, last)) = selected.last() {
            request.eqt_sale_amts = rpad(last.sale_amount.as_deref().unwrap_or("0"), 10);
        }
        request.service_cnt = selected.len().to_string();
        Ok(request)
    }

    fn index_of(&self, slot_id: &str) -> Result<usize, Rejection> {
        self.slots
            .iter()
            .position(|s| s.slot_id == slot_id)
            .ok_or_else(|| Rejection::UnknownSlot(slot_id.to_string()))
    }

    fn apply(&mut self, cascade: &Cascade) {
        for slot in self.slots.iter_mut() {
            if cascade.to_select.contains(&slot.slot_id) {
                slot.selected = true;
            }
            if cascade.to_deselect.contains(&slot.slot_id) {
                slot.selected = false;
            }
        }
    }
}

fn sequence_number(slot: &CompositionSlot) -> Option<usize> {
    slot.equipment_seq
        .as_deref()
        .and_then(|seq| seq.trim().parse().ok())
}

fn dedupe_slot_ids(mut slots: Vec<CompositionSlot>) -> Vec<CompositionSlot> {
    let mut seen = std::collections::HashSet::new();
    for (index, slot) in slots.iter_mut().enumerate() {
        if !seen.insert(slot.slot_id.clone()) {
            slot.slot_id = format!("{}#{}", slot.slot_id, index + 1);
            seen.insert(slot.slot_id.clone());
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(seq: &str, category: &str, model: &str, sel: &str) -> RawCompositionRow {
        RawCompositionRow {
            sel: Some(sel.to_string()),
            prod_cd: Some("P100".to_string()),
            svc_cd: Some("S1".to_string()),
            prod_typ: Some("2".to_string()),
            prod_grp: Some("D".to_string()),
            eqt: Some(category.to_string()),
            eqt_cl: Some(model.to_string()),
            equip_seq: Some(seq.to_string()),
            ..RawCompositionRow::default()
        }
    }

    fn context() -> WorkContext {
        WorkContext {
            work_order_id: "W1".to_string(),
            receipt_id: "R1".to_string(),
            contract_id: "C1".to_string(),
            ..WorkContext::default()
        }
    }

    #[test]
    fn test_rows_get_defaults() {
        let draft = CompositionDraft::from_rows(
            &[RawCompositionRow {
                eqt: Some("4".to_string()),
                ..RawCompositionRow::default()
            }],
            DependencyTable::new(),
        );
        let slot = &draft.slots()[0];
        assert_eq!(slot.slot_id, "1");
        assert_eq!(slot.category, "04");
        assert!(!slot.selected);
        assert_eq!(slot.rental_type.as_deref(), Some("10"));
        assert_eq!(slot.installment_period.as_deref(), Some("00"));
        assert_eq!(slot.product_type.as_deref(), Some("2"));
    }

    #[test]
    fn test_rental_change_resets_dependent_fields() {
        let mut draft =
            CompositionDraft::from_rows(&[row("1", "04", "090401", "1")], DependencyTable::new());
        draft.set_usage_status("1", "2").unwrap();
        draft.set_installment_period("1", "24").unwrap();

        draft.set_rental_type("1", "31").unwrap();
        assert_eq!(draft.slot("1").unwrap().installment_period.as_deref(), Some("24"));
        assert_eq!(draft.slot("1").unwrap().usage_status.as_deref(), Some("2"));

        draft.set_rental_type("1", "10").unwrap();
        assert_eq!(draft.slot("1").unwrap().installment_period.as_deref(), Some("00"));
        assert_eq!(draft.slot("1").unwrap().usage_status.as_deref(), Some("1"));
    }

    #[test]
    fn test_xcas_model_forces_customer_owned_after_cascade() {
        let mut draft =
            CompositionDraft::from_rows(&[row("1", "04", "090401", "1")], DependencyTable::new());
        draft.set_rental_type("1", "31").unwrap();
        draft.set_installment_period("1", "24").unwrap();
        draft.set_usage_status("1", "2").unwrap();
        draft
            .change_model("1", "090491", &RulesConfig::default())
            .unwrap();
        let slot = draft.slot("1").unwrap();
        assert_eq!(slot.model_code.as_deref(), Some("090491"));
        assert_eq!(slot.rental_type.as_deref(), Some("40"));
        assert_eq!(slot.installment_period.as_deref(), Some("24"));
        assert_eq!(slot.usage_status.as_deref(), Some("2"));
    }

    #[test]
    fn test_support_slots_are_appended_selected() {
        let mut draft = CompositionDraft::from_rows(
            &[row("1", "04", "090401", "1"), row("2", "10", "091003", "0")],
            DependencyTable::new(),
        );
        let added = draft.add_support_slots("10", 2).unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(draft.selected().filter(|s| s.category == "10").count(), 2);
        assert!(draft.add_support_slots("09", 1).is_err());
    }

    #[test]
    fn test_request_encoding_is_fixed_width_and_ordered() {
        let mut rows = vec![row("2", "10", "091003", "1"), row("1", "04", "090401", "1")];
        rows[0].eqt_sale_amt = Some("5000".to_string());
        rows.push(row("3", "05", "090501", "0"));
        let mut draft = CompositionDraft::from_rows(&rows, DependencyTable::new());

        let request = draft.to_request(&context(), Some("12")).unwrap();
        assert_eq!(request.item_mid_cds, "04        10        ");
        assert_eq!(request.eqt_cls, "090401    091003    ");
        assert_eq!(request.prod_cmps_cls, "2122");
        assert_eq!(request.lents, "1010");
        assert_eq!(request.eqt_use_stats, "11");
        assert_eq!(request.itllmt_prds, "0000");
        assert_eq!(request.eqt_sale_amts, "5000      ");
        assert_eq!(request.service_cnt, "2");
        assert_eq!(request.prom_cnt, "12");
        assert_eq!(request.wrk_id, "W1");

        draft.set_sale_amount("2", "7000").unwrap();
        let request = draft.to_request(&context(), None).unwrap();
        assert_eq!(request.eqt_sale_amts, "7000      ");
        assert_eq!(request.prom_cnt, "");
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let draft =
            CompositionDraft::from_rows(&[row("1", "04", "090401", "0")], DependencyTable::new());
        assert_eq!(
            draft.to_request(&context(), None),
            Err(Rejection::EmptyComposition)
        );
    }
}
