mod common;

use common::context;
use equipment_engine::core::composition::CompositionDraft;
use equipment_engine::core::dependency::DependencyTable;
use equipment_engine::core::signal::SignalKind;
use equipment_engine::domain::model::{CompositionSlot, SignalStatus};
use equipment_engine::domain::ports::SessionStore;
use equipment_engine::{
    EngineConfig, EquipmentError, EquipmentWorkflow, HttpBackend, MemoryDraftStore, Rejection,
    SessionDraft,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const CATALOG_PATH: &str = "/customer/work/getCustProdInfo";

fn catalog_body() -> Value {
    json!({
        "output1": [{ "PROD_GRP": "D" }],
        "output2": [
            { "SVC_CMPS_ID": "S-DEC", "ITEM_MID_CD": "04", "EQT_CL_CD": "090401" },
            { "SVC_CMPS_ID": "S-MODEM", "ITEM_MID_CD": "03", "EQT_CL_CD": "090301" },
            { "SVC_CMPS_ID": "S-AP", "ITEM_MID_CD": "10", "EQT_CL_CD": "091001" }
        ],
        "output3": [
            { "EQT_NO": "T-DEC", "EQT_SERNO": "SN-T-DEC", "ITEM_MID_CD": "04", "EQT_CL_CD": "090401" },
            { "EQT_NO": "T-MODEM", "ITEM_MID_CD": "03", "EQT_CL_CD": "090301" },
            { "EQT_NO": "T-AP1", "ITEM_MID_CD": "10", "EQT_CL_CD": "091001" }
        ],
        "output4": [
            { "EQT_NO": "C-DEC", "ITEM_MID_CD": "04", "EQT_CL_CD": "090401", "SVC_CMPS_ID": "S-DEC" }
        ],
        "output5": [
            { "EQT_NO": "P-MODEM", "ITEM_MID_CD": "03", "EQT_CL_CD": "090301", "EQT_CABL_LOSS_YN": "Y" }
        ]
    })
}

fn config(server: &MockServer) -> EngineConfig {
    EngineConfig::from_toml_str(&format!(
        "[backend]\nbase_url = \"{}\"\ntimeout_seconds = 5\n",
        server.base_url()
    ))
    .unwrap()
}

fn workflow(server: &MockServer, store: MemoryDraftStore) -> EquipmentWorkflow<MemoryDraftStore> {
    let config = config(server);
    let backend = Arc::new(HttpBackend::new(&config.backend).unwrap());
    EquipmentWorkflow::new(
        context(),
        backend.clone(),
        backend.clone(),
        backend,
        store,
        config,
    )
}

fn mock_catalog(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path(CATALOG_PATH);
        then.status(200).json_body(catalog_body());
    })
}

#[tokio::test]
async fn test_load_reconciles_server_pools() {
    let server = MockServer::start();
    let mock = mock_catalog(&server);
    let workflow = workflow(&server, MemoryDraftStore::new());

    let summary = workflow.load().await.unwrap();
    mock.assert();
    assert_eq!(summary.slots, 3);
    assert_eq!(summary.bound, 1);
    assert_eq!(summary.local_bindings, 0);
    assert_eq!(summary.removal, 1);
    assert_eq!(summary.available_stock, 3);
    assert!(!summary.restored_from_draft);

    let session = workflow.session().await.unwrap();
    assert_eq!(session.binding_for_slot("S-DEC").unwrap().unit_id, "C-DEC");
    assert!(session.removal_record("P-MODEM").unwrap().flags.cable_lost);
}

#[tokio::test]
async fn test_edits_before_load_are_refused() {
    let server = MockServer::start();
    let workflow = workflow(&server, MemoryDraftStore::new());

    let err = workflow.install("S-DEC", "T-DEC").await.unwrap_err();
    assert!(matches!(err, EquipmentError::SessionNotLoaded { .. }));
}

/// Draft store whose writes always fail.
struct ReadOnlyStore;

impl SessionStore for ReadOnlyStore {
    async fn load(&self, _work_id: &str) -> Result<Option<SessionDraft>, EquipmentError> {
        Ok(None)
    }

    async fn save(&self, _work_id: &str, _draft: &SessionDraft) -> Result<(), EquipmentError> {
        Err(EquipmentError::IoError(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only draft store",
        )))
    }

    async fn clear(&self, _work_id: &str) -> Result<(), EquipmentError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_failed_autosave_leaves_session_unchanged() {
    let server = MockServer::start();
    let _mock = mock_catalog(&server);
    let config = config(&server);
    let backend = Arc::new(HttpBackend::new(&config.backend).unwrap());
    let workflow = EquipmentWorkflow::new(
        context(),
        backend.clone(),
        backend.clone(),
        backend,
        ReadOnlyStore,
        config,
    );
    assert_ok!(workflow.load().await);

    let err = workflow.install("S-MODEM", "T-MODEM").await.unwrap_err();
    assert!(matches!(err, EquipmentError::IoError(_)));
    let session = workflow.session().await.unwrap();
    assert!(session.binding_for_slot("S-MODEM").is_none());
    assert_eq!(session.revision(), 0);
}

#[tokio::test]
async fn test_edits_autosave_and_restore_on_reload() {
    let server = MockServer::start();
    let _mock = mock_catalog(&server);
    let store = MemoryDraftStore::new();
    let first = workflow(&server, store.clone());
    first.load().await.unwrap();

    let err = assert_err!(first.install("S-DEC", "T-DEC").await);
    assert!(matches!(
        err,
        EquipmentError::Rejected(Rejection::SlotOccupied { .. })
    ));
    assert_eq!(store.len().await, 0);

    assert_ok!(first.remove("C-DEC").await);
    assert_ok!(first.install("S-DEC", "T-DEC").await);
    assert_eq!(store.len().await, 1);

    let second = workflow(&server, store.clone());
    let summary = second.load().await.unwrap();
    assert!(summary.restored_from_draft);
    assert_eq!(summary.consumed_stock, vec!["T-DEC"]);
    assert_eq!(summary.local_bindings, 1);

    let bundle = second.export().await.unwrap();
    assert_eq!(bundle.installed.len(), 1);
    assert_eq!(bundle.installed[0].eqt_no, "T-DEC");
    assert_eq!(bundle.installed[0].svc_cmps_id, "S-DEC");
    let removed: Vec<&str> = bundle.removed.iter().map(|r| r.eqt_no.as_str()).collect();
    assert_eq!(removed, vec!["C-DEC", "P-MODEM"]);
}

#[tokio::test]
async fn test_undo_back_to_server_state_clears_draft() {
    let server = MockServer::start();
    let _mock = mock_catalog(&server);
    let store = MemoryDraftStore::new();
    let workflow = workflow(&server, store.clone());
    workflow.load().await.unwrap();

    workflow.install("S-MODEM", "T-MODEM").await.unwrap();
    assert_eq!(store.len().await, 1);
    workflow.remove("T-MODEM").await.unwrap();
    assert_eq!(store.len().await, 0);
    assert!(workflow.session().await.unwrap().is_pristine());
}

#[tokio::test]
async fn test_failed_reload_keeps_current_session() {
    let server = MockServer::start();
    let mut ok = mock_catalog(&server);
    let workflow = workflow(&server, MemoryDraftStore::new());
    workflow.load().await.unwrap();
    workflow.install("S-MODEM", "T-MODEM").await.unwrap();
    let before = workflow.session().await.unwrap();

    ok.delete();
    server.mock(|when, then| {
        when.method(POST).path(CATALOG_PATH);
        then.status(503).body("maintenance");
    });

    let err = workflow.load().await.unwrap_err();
    assert!(matches!(err, EquipmentError::BackendError { .. }));
    assert_eq!(workflow.session().await.unwrap(), before);
    assert!(!workflow.is_busy());
}

#[tokio::test]
async fn test_concurrent_load_is_refused_while_in_flight() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(CATALOG_PATH);
        then.status(200)
            .delay(Duration::from_millis(300))
            .json_body(catalog_body());
    });
    let workflow = workflow(&server, MemoryDraftStore::new());

    let (first, second) = tokio::join!(workflow.load(), workflow.load());
    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(EquipmentError::RequestInFlight { .. })
    ));
    assert!(!workflow.is_busy());
}

#[tokio::test]
async fn test_dispatch_success_records_status() {
    let server = MockServer::start();
    let _catalog = mock_catalog(&server);
    let signal = server.mock(|when, then| {
        when.method(POST)
            .path("/signal/send")
            .json_body_partial(r#"{"MSG_ID": "SMR03", "EQT_NO": "T-MODEM", "ETC_1": "C-DEC", "PROD_CD": "P100", "WRK_ID": "W100"}"#);
        then.status(200)
            .json_body(json!([{ "O_IFSVC_RESULT": "TRUE0000000001SMR03" }]));
    });
    let store = MemoryDraftStore::new();
    let workflow = workflow(&server, store.clone());
    workflow.load().await.unwrap();
    workflow.install("S-MODEM", "T-MODEM").await.unwrap();

    let response = workflow.dispatch_signal(SignalKind::Install).await.unwrap();
    signal.assert();
    assert!(response.is_success());
    assert_eq!(
        workflow.session().await.unwrap().signal_status(),
        SignalStatus::Success
    );
    let draft = store.load("W100").await.unwrap().unwrap();
    assert_eq!(draft.signal_status, SignalStatus::Success);
}

#[tokio::test]
async fn test_dispatch_failure_marks_session_failed() {
    let server = MockServer::start();
    let _catalog = mock_catalog(&server);
    server.mock(|when, then| {
        when.method(POST).path("/signal/send");
        then.status(200)
            .json_body(json!({ "O_IFSVC_RESULT": "FALSE", "MESSAGE": "device offline" }));
    });
    let store = MemoryDraftStore::new();
    let workflow = workflow(&server, store.clone());
    workflow.load().await.unwrap();

    let err = workflow.dispatch_signal(SignalKind::Install).await.unwrap_err();
    match err {
        EquipmentError::DispatchFailed {
            message_type,
            message,
        } => {
            assert_eq!(message_type, "SMR03");
            assert_eq!(message, "device offline");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(
        workflow.session().await.unwrap().signal_status(),
        SignalStatus::Fail
    );
    assert_eq!(
        store.load("W100").await.unwrap().unwrap().signal_status,
        SignalStatus::Fail
    );
}

fn decoder_row() -> CompositionSlot {
    CompositionSlot {
        slot_id: "1".to_string(),
        category: "04".to_string(),
        model_code: Some("090401".to_string()),
        selected: true,
        rental_type: Some("10".to_string()),
        usage_status: Some("1".to_string()),
        installment_period: Some("00".to_string()),
        product_type: Some("2".to_string()),
        equipment_seq: Some("1".to_string()),
        product_group: Some("D".to_string()),
        product_code: Some("P100".to_string()),
        service_code: Some("SV01".to_string()),
        ..CompositionSlot::default()
    }
}

#[tokio::test]
async fn test_composition_change_blocked_by_local_bindings() {
    let server = MockServer::start();
    let _catalog = mock_catalog(&server);
    let update = server.mock(|when, then| {
        when.method(POST).path("/customer/work/eqtCmpsInfoChg");
        then.status(200).json_body(json!({ "MSGCODE": "SUCCESS" }));
    });
    let workflow = workflow(&server, MemoryDraftStore::new());
    workflow.load().await.unwrap();
    workflow.install("S-MODEM", "T-MODEM").await.unwrap();

    let draft = CompositionDraft::new(vec![decoder_row()], DependencyTable::new());
    let err = workflow.change_composition(&draft, None).await.unwrap_err();
    assert!(matches!(
        err,
        EquipmentError::Rejected(Rejection::ModelChangeBlockedByBoundUnits { bound: 1 })
    ));
    update.assert_hits(0);
}

#[tokio::test]
async fn test_composition_change_submits_and_reloads() {
    let server = MockServer::start();
    let catalog = mock_catalog(&server);
    let update = server.mock(|when, then| {
        when.method(POST)
            .path("/customer/work/eqtCmpsInfoChg")
            .json_body_partial(r#"{"parameters": {"WRK_ID": "W100", "CTRT_ID": "K100"}}"#);
        then.status(200).json_body(json!({ "MSGCODE": "SUCCESS" }));
    });
    let store = MemoryDraftStore::new();
    let workflow = workflow(&server, store.clone());
    workflow.load().await.unwrap();
    workflow.toggle_flag("P-MODEM", equipment_engine::core::removal::LossFlag::RemoteLost)
        .await
        .unwrap();
    assert_eq!(store.len().await, 1);

    let draft = CompositionDraft::new(vec![decoder_row()], DependencyTable::new());
    let summary = workflow.change_composition(&draft, Some("0")).await.unwrap();
    update.assert();
    catalog.assert_hits(2);
    assert_eq!(store.len().await, 0);
    assert!(!summary.restored_from_draft);
}

#[tokio::test]
async fn test_open_composition_builds_draft_with_dependencies() {
    let server = MockServer::start();
    let _catalog = mock_catalog(&server);
    let list = server.mock(|when, then| {
        when.method(POST)
            .path("/customer/receipt/contract/getContractEqtList")
            .json_body_partial(r#"{"PROD_CD": "P100", "CTRT_ID": "K100"}"#);
        then.status(200).json_body(json!({
            "output2": [
                { "SEL": "1", "EQT": "04", "EQT_CL": "090401", "EQUIP_SEQ": "1" },
                { "SEL": "0", "EQT": "06", "EQT_CL": "090601", "EQUIP_SEQ": "2" }
            ]
        }));
    });
    let models = server.mock(|when, then| {
        when.method(POST)
            .path("/customer/receipt/contract/getEquipmentNmListOfProd");
        then.status(200).json_body(json!([
            { "EQT_CD": "04", "EQT_CL_CD": "090401", "EQT_CL_NM": "HD STB", "SUB_EQT_1": "06" },
            { "EQT_CD": "06", "EQT_CL_CD": "090601", "EQT_CL_NM": "Smart card" }
        ]));
    });
    let workflow = workflow(&server, MemoryDraftStore::new());
    workflow.load().await.unwrap();

    let mut draft = workflow.open_composition().await.unwrap();
    list.assert();
    models.assert();
    assert_eq!(draft.slots().len(), 2);
    assert!(draft.slot("1").unwrap().selected);
    assert_eq!(
        draft.table().get("090401").unwrap().model_name.as_deref(),
        Some("HD STB")
    );

    let cascade = draft.toggle("1", false).unwrap();
    assert!(cascade.is_empty());
    let cascade = draft.toggle("1", true).unwrap();
    assert_eq!(cascade.to_select, vec!["2"]);
}
