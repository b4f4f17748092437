pub mod catalog;
pub mod composition;
pub mod dependency;
pub mod export;
pub mod reconcile;
pub mod removal;
pub mod rules;
pub mod session;
pub mod signal;

pub use crate::domain::model::{Binding, ContractSlot, PhysicalUnit, RemovalRecord};
pub use crate::domain::ports::{CatalogSource, CompositionGateway, SessionStore, SignalDispatcher};
pub use crate::utils::error::Result;
