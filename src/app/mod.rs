pub mod workflow;

pub use workflow::{EquipmentWorkflow, LoadSummary};
