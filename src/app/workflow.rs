//! Per-work-order orchestration: load and reconcile, edit, save, change the
//! composition and dispatch the provisioning signal.

use crate::config::toml_config::EngineConfig;
use crate::core::catalog::Catalog;
use crate::core::composition::CompositionDraft;
use crate::core::dependency::DependencyTable;
use crate::core::export::{export_session, ExportBundle, SessionDraft};
use crate::core::reconcile::{locally_consumed_stock, reconcile};
use crate::core::removal::LossFlag;
use crate::core::rules::{ensure_composition_changeable, QuantityPolicy};
use crate::core::session::{Command, EquipmentSession, Outcome};
use crate::core::signal::{build_signal_request, SignalKind};
use crate::domain::model::{SignalStatus, WorkContext};
use crate::domain::ports::{CatalogSource, CompositionGateway, SessionStore, SignalDispatcher};
use crate::domain::wire::SignalResponse;
use crate::utils::error::{EquipmentError, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub work_id: String,
    pub slots: usize,
    pub bound: usize,
    pub local_bindings: usize,
    pub removal: usize,
    pub available_stock: usize,
    pub restored_from_draft: bool,
    /// Stock units the restored draft had already bound.
    pub consumed_stock: Vec<String>,
}

struct LoadedState {
    session: EquipmentSession,
    catalog: Catalog,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct EquipmentWorkflow<S: SessionStore> {
    context: WorkContext,
    catalog_source: Arc<dyn CatalogSource>,
    gateway: Arc<dyn CompositionGateway>,
    dispatcher: Arc<dyn SignalDispatcher>,
    store: S,
    config: EngineConfig,
    state: Mutex<Option<LoadedState>>,
    in_flight: AtomicBool,
}

impl<S: SessionStore> EquipmentWorkflow<S> {
    pub fn new(
        context: WorkContext,
        catalog_source: Arc<dyn CatalogSource>,
        gateway: Arc<dyn CompositionGateway>,
        dispatcher: Arc<dyn SignalDispatcher>,
        store: S,
        config: EngineConfig,
    ) -> Self {
        Self {
            context,
            catalog_source,
            gateway,
            dispatcher,
            store,
            config,
            state: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &WorkContext {
        &self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn work_id(&self) -> &str {
        &self.context.work_order_id
    }

    /// Claims the request slot. A second network operation started while one
    /// is running is refused rather than queued.
    fn begin(&self) -> Result<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EquipmentError::RequestInFlight {
                work_id: self.work_id().to_string(),
            })?;
        Ok(InFlight(&self.in_flight))
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Fetches the catalog and reconciles it with the stored draft. On a
    /// fetch failure the current session is kept and the error returned.
    pub async fn load(&self) -> Result<LoadSummary> {
        let _guard = self.begin()?;
        self.load_inner().await
    }

    async fn load_inner(&self) -> Result<LoadSummary> {
        info!("🚀 Loading equipment for work order {}", self.work_id());
        let raw = match self.catalog_source.fetch_catalog(&self.context).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "Catalog fetch for {} failed, keeping current session: {}",
                    self.work_id(),
                    e
                );
                return Err(e);
            }
        };

        let catalog = Catalog::from_response(raw, &self.context);
        let context = self.effective_context(&catalog);
        let draft = self.store.load(self.work_id()).await?;
        let policy = QuantityPolicy::new(&self.config.rules, &context);
        let session = reconcile(context, &catalog, draft.as_ref(), policy);

        let summary = LoadSummary {
            work_id: self.work_id().to_string(),
            slots: session.slots().len(),
            bound: session.bindings().len(),
            local_bindings: session.local_bindings().len(),
            removal: session.removal_records().len(),
            available_stock: session.available_stock().len(),
            restored_from_draft: draft.is_some(),
            consumed_stock: locally_consumed_stock(&catalog, &session)
                .into_iter()
                .map(str::to_string)
                .collect(),
        };
        *self.state.lock().await = Some(LoadedState { session, catalog });
        info!("✅ Equipment loaded for work order {}", self.work_id());
        Ok(summary)
    }

    /// Fills the product group from the catalog when the work order did not
    /// carry one.
    fn effective_context(&self, catalog: &Catalog) -> WorkContext {
        let mut context = self.context.clone();
        if context.product_group.is_empty() {
            if let Some(group) = &catalog.meta.product_group {
                context.product_group = group.clone();
            }
        }
        context
    }

    /// A snapshot of the current session.
    pub async fn session(&self) -> Option<EquipmentSession> {
        self.state
            .lock()
            .await
            .as_ref()
            .map(|state| state.session.clone())
    }

    /// Applies one binding command and autosaves the draft.
    pub async fn execute(&self, command: Command) -> Result<Outcome> {
        let mut state = self.state.lock().await;
        let loaded = state
            .as_mut()
            .ok_or_else(|| EquipmentError::SessionNotLoaded {
                work_id: self.work_id().to_string(),
            })?;

        debug!("Applying {:?}", command);
        let (next, outcome) = loaded.session.apply(command)?;
        self.persist(&next).await?;
        loaded.session = next;
        Ok(outcome)
    }

    pub async fn install(&self, slot_id: &str, unit_id: &str) -> Result<Outcome> {
        self.execute(Command::Install {
            slot_id: slot_id.to_string(),
            unit_id: unit_id.to_string(),
        })
        .await
    }

    pub async fn remove(&self, unit_id: &str) -> Result<Outcome> {
        self.execute(Command::Remove {
            unit_id: unit_id.to_string(),
        })
        .await
    }

    pub async fn reuse(&self, unit_id: &str, slot_id: &str) -> Result<Outcome> {
        self.execute(Command::Reuse {
            unit_id: unit_id.to_string(),
            slot_id: slot_id.to_string(),
        })
        .await
    }

    pub async fn toggle_flag(&self, unit_id: &str, flag: LossFlag) -> Result<Outcome> {
        self.execute(Command::ToggleFlag {
            unit_id: unit_id.to_string(),
            flag,
        })
        .await
    }

    /// Writes the draft, or clears it when a fresh load would rebuild the
    /// same session. Unchanged content is not rewritten.
    async fn persist(&self, session: &EquipmentSession) -> Result<()> {
        if session.is_pristine() {
            debug!("Session {} untouched, clearing draft", self.work_id());
            return self.store.clear(self.work_id()).await;
        }
        let draft = SessionDraft::from_session(session);
        if let Some(existing) = self.store.load(self.work_id()).await? {
            if existing.same_content(&draft) {
                return Ok(());
            }
        }
        self.store.save(self.work_id(), &draft).await
    }

    /// Validates the session and flattens it for the work-completion step.
    pub async fn export(&self) -> Result<ExportBundle> {
        let state = self.state.lock().await;
        let loaded = state
            .as_ref()
            .ok_or_else(|| EquipmentError::SessionNotLoaded {
                work_id: self.work_id().to_string(),
            })?;
        loaded.session.validate()?;
        Ok(export_session(&loaded.session))
    }

    /// Validates and persists the session as a draft.
    pub async fn save(&self) -> Result<SessionDraft> {
        let _guard = self.begin()?;
        let state = self.state.lock().await;
        let loaded = state
            .as_ref()
            .ok_or_else(|| EquipmentError::SessionNotLoaded {
                work_id: self.work_id().to_string(),
            })?;
        loaded.session.validate()?;
        let draft = SessionDraft::from_session(&loaded.session);
        self.store.save(self.work_id(), &draft).await?;
        info!(
            "💾 Saved {} installed and {} removed records for {}",
            draft.bundle.installed.len(),
            draft.bundle.removed.len(),
            self.work_id()
        );
        Ok(draft)
    }

    /// Sends the provisioning signal. Any failure marks the session's signal
    /// status as failed and is returned as `DispatchFailed`.
    pub async fn dispatch_signal(&self, kind: SignalKind) -> Result<SignalResponse> {
        let _guard = self.begin()?;
        let mut state = self.state.lock().await;
        let loaded = state
            .as_mut()
            .ok_or_else(|| EquipmentError::SessionNotLoaded {
                work_id: self.work_id().to_string(),
            })?;

        let request = match build_signal_request(&loaded.session, kind, &self.config) {
            Ok(request) => request,
            Err(e) => {
                self.record_signal(&mut loaded.session, SignalStatus::Fail).await?;
                return Err(e);
            }
        };

        info!(
            "📡 Dispatching {} signal for {} (unit {})",
            request.msg_id,
            self.work_id(),
            request.eqt_no
        );
        let failure = match self.dispatcher.dispatch(&request).await {
            Ok(response) if response.is_success() => {
                self.record_signal(&mut loaded.session, SignalStatus::Success)
                    .await?;
                info!("✅ Signal {} accepted", request.msg_id);
                return Ok(response);
            }
            Ok(response) => response.failure_reason(),
            Err(e) => e.to_string(),
        };

        warn!("Signal {} failed: {}", request.msg_id, failure);
        self.record_signal(&mut loaded.session, SignalStatus::Fail).await?;
        Err(EquipmentError::DispatchFailed {
            message_type: request.msg_id,
            message: failure,
        })
    }

    async fn record_signal(&self, session: &mut EquipmentSession, status: SignalStatus) -> Result<()> {
        session.set_signal_status(status);
        self.persist(session).await
    }

    /// Fetches the contract composition and the model list and builds an
    /// editable draft. The catalog's own sub/del links top up the table.
    pub async fn open_composition(&self) -> Result<CompositionDraft> {
        let _guard = self.begin()?;
        let product_code = &self.context.product_code;
        let contract_id = &self.context.contract_id;
        let (list, models) = tokio::try_join!(
            self.catalog_source.fetch_composition(product_code, contract_id),
            self.catalog_source.fetch_model_list(product_code, contract_id),
        )?;

        let mut table = DependencyTable::from_model_rows(&models);
        if let Some(loaded) = self.state.lock().await.as_ref() {
            table.merge(&loaded.catalog.dependencies);
        }
        let rows = list.output2.unwrap_or_default();
        debug!(
            "Composition for {}: {} rows, {} models",
            contract_id,
            rows.len(),
            table.len()
        );
        Ok(CompositionDraft::from_rows(&rows, table))
    }

    /// Submits a composition change. Refused while units bound in this
    /// session remain; on success the draft is discarded and the catalog
    /// reloaded.
    pub async fn change_composition(
        &self,
        draft: &CompositionDraft,
        promotion_count: Option<&str>,
    ) -> Result<LoadSummary> {
        let _guard = self.begin()?;
        let context = {
            let state = self.state.lock().await;
            let loaded = state
                .as_ref()
                .ok_or_else(|| EquipmentError::SessionNotLoaded {
                    work_id: self.work_id().to_string(),
                })?;
            ensure_composition_changeable(loaded.session.local_bindings().len())?;
            loaded.session.context().clone()
        };

        draft.validate(&context, &self.config.rules)?;
        let request = draft.to_request(&context, promotion_count)?;
        self.gateway.update_composition(&request).await?;

        self.store.clear(self.work_id()).await?;
        self.load_inner().await
    }
}
