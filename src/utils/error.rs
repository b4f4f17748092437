use thiserror::Error;

/// Domain rejections raised by the equipment engine. These are user-facing
/// warnings: the session is left exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Unit {unit_id} ({unit_category}/{unit_model}) does not match slot {slot_id} ({slot_category}/{slot_model})")]
    ModelMismatch {
        slot_id: String,
        unit_id: String,
        slot_category: String,
        slot_model: String,
        unit_category: String,
        unit_model: String,
    },

    #[error("Slot {slot_id} is occupied by customer unit {occupant}; remove it first")]
    SlotOccupied { slot_id: String, occupant: String },

    #[error("Category {category} allows at most {cap} unit(s), requested {requested}")]
    QuantityExceeded {
        category: String,
        cap: usize,
        requested: usize,
    },

    #[error("Category {category} requires exactly {required} unit(s), requested {requested}")]
    QuantityMismatch {
        category: String,
        required: usize,
        requested: usize,
    },

    #[error("At least one slot of category {category} must be selected")]
    MandatoryCategoryMissing { category: String },

    #[error("Composition cannot change while {bound} unit(s) are bound; remove them first")]
    ModelChangeBlockedByBoundUnits { bound: usize },

    #[error("No equipment selected")]
    EmptyComposition,

    #[error("Unknown slot: {0}")]
    UnknownSlot(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Unit {unit_id} is already bound to slot {slot_id}")]
    UnitAlreadyBound { unit_id: String, slot_id: String },

    #[error("Unit {0} is not bound to any slot")]
    UnitNotBound(String),

    #[error("Unit {0} is not in the removal pool")]
    NotInRemovalPool(String),
}

#[derive(Error, Debug)]
pub enum EquipmentError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(#[from] Rejection),

    #[error("Backend error from {endpoint}: {message}")]
    BackendError { endpoint: String, message: String },

    #[error("Signal dispatch failed ({message_type}): {message}")]
    DispatchFailed {
        message_type: String,
        message: String,
    },

    #[error("Catalog error: {message}")]
    CatalogError { message: String },

    #[error("No equipment session loaded for work order {work_id}")]
    SessionNotLoaded { work_id: String },

    #[error("A request for work order {work_id} is already in flight")]
    RequestInFlight { work_id: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Domain,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EquipmentError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::BackendError { .. } | Self::DispatchFailed { .. } => {
                ErrorCategory::Network
            }
            Self::CsvError(_) | Self::SerializationError(_) | Self::CatalogError { .. } => {
                ErrorCategory::Data
            }
            Self::Rejected(_) | Self::SessionNotLoaded { .. } | Self::RequestInFlight { .. } => {
                ErrorCategory::Domain
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Rejected(_) | Self::RequestInFlight { .. } => ErrorSeverity::Low,
            Self::ApiError(_) | Self::BackendError { .. } | Self::SessionNotLoaded { .. } => {
                ErrorSeverity::Medium
            }
            Self::DispatchFailed { .. }
            | Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::CatalogError { .. }
            | Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorSeverity::High,
            Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// Network failures leave the session untouched and may simply be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ApiError(_) | Self::BackendError { .. } | Self::DispatchFailed { .. }
        )
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ApiError(_) | Self::BackendError { .. } => {
                "Check the network connection and reload the equipment list".to_string()
            }
            Self::DispatchFailed { .. } => {
                "Signal dispatch must succeed before the work order can be completed; retry the dispatch".to_string()
            }
            Self::Rejected(rejection) => match rejection {
                Rejection::ModelMismatch { .. } => {
                    "Pick a unit whose category and model match the contract slot".to_string()
                }
                Rejection::SlotOccupied { .. } => {
                    "Remove the customer's existing unit from the slot first".to_string()
                }
                Rejection::QuantityExceeded { .. } | Rejection::QuantityMismatch { .. } => {
                    "Adjust the number of units for the capped category".to_string()
                }
                Rejection::MandatoryCategoryMissing { .. } => {
                    "Select at least one primary decoder slot".to_string()
                }
                Rejection::ModelChangeBlockedByBoundUnits { .. } => {
                    "Remove the bound units before changing the equipment composition".to_string()
                }
                _ => "Refresh the equipment list and try again".to_string(),
            },
            Self::SessionNotLoaded { .. } => "Load the work order equipment first".to_string(),
            Self::RequestInFlight { .. } => "Wait for the current request to finish".to_string(),
            Self::CsvError(_) | Self::SerializationError(_) | Self::CatalogError { .. } => {
                "The backend returned unexpected data; contact support if this persists"
                    .to_string()
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => {
                "Check the configuration file and environment variables".to_string()
            }
            Self::IoError(_) => "Check file permissions and available disk space".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Rejected(rejection) => rejection.to_string(),
            Self::ApiError(_) | Self::BackendError { .. } => {
                "Could not reach the provisioning backend".to_string()
            }
            Self::DispatchFailed { message_type, .. } => {
                format!("Signal dispatch {} failed", message_type)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EquipmentError>;
