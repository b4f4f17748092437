pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{HttpBackend, LocalDraftStore, MemoryDraftStore};
pub use app::{EquipmentWorkflow, LoadSummary};
pub use config::EngineConfig;
pub use core::export::{ExportBundle, SessionDraft};
pub use core::session::{Command, EquipmentSession, Outcome};
pub use utils::error::{EquipmentError, Rejection, Result};
