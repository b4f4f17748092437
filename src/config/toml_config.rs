use crate::utils::error::{EquipmentError, Result};
use crate::utils::validation::{
    validate_code_list, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub so_id: Option<String>,
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Save-time business rules. The code tables behind these vary per operator,
/// so they are configuration rather than constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub primary_decoder_category: String,
    pub voice_only_product_group: String,
    /// Categories limited to `default_cap` units per contract (AP/router).
    pub capped_categories: Vec<String>,
    pub default_cap: usize,
    pub dual_composition_flag: String,
    pub dual_composition_cap: usize,
    /// Products exempt from the per-contract cap.
    pub unlimited_products: Vec<String>,
    pub bulk_categories: Vec<String>,
    pub bulk_ceiling: usize,
    pub customer_owned_models: Vec<String>,
    pub customer_owned_categories: Vec<String>,
    pub customer_owned_rental_type: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            primary_decoder_category: "04".to_string(),
            voice_only_product_group: "V".to_string(),
            capped_categories: vec!["10".to_string()],
            default_cap: 1,
            dual_composition_flag: "2".to_string(),
            dual_composition_cap: 2,
            unlimited_products: Vec::new(),
            bulk_categories: vec!["09".to_string(), "10".to_string()],
            bulk_ceiling: 180,
            customer_owned_models: vec!["090491".to_string()],
            customer_owned_categories: vec!["21".to_string(), "22".to_string()],
            customer_owned_rental_type: "40".to_string(),
        }
    }
}

impl RulesConfig {
    pub fn forces_customer_owned(&self, category: &str, model_code: Option<&str>) -> bool {
        self.customer_owned_categories.iter().any(|c| c == category)
            || model_code.is_some_and(|m| self.customer_owned_models.iter().any(|c| c == m))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub install_message: String,
    pub removal_message: String,
    pub voice_only_message: String,
    /// Categories tried in order for the primary unit.
    pub primary_priority: Vec<String>,
    pub internet_only_group: String,
    pub internet_only_category: String,
    pub voice_category: String,
    /// Wireless/modem unit reported in `ETC_1` for VoIP and `ETC_3` for cable.
    pub modem_category: String,
    pub decoder_category: String,
    pub auxiliary_category: String,
    pub cable_group: String,
    /// Unit reported in `ETC_4` for voice-only products.
    pub voice_group_category: String,
    /// Unit reported in `ETC_4` when the contract bundles an ISP product.
    pub isp_category: String,
    /// Models whose unit id replaces the work id in the request.
    pub unit_keyed_models: Vec<String>,
    /// Models whose MAC address replaces the work id in the request.
    pub mac_keyed_models: Vec<String>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            install_message: "SMR03".to_string(),
            removal_message: "SMR05".to_string(),
            voice_only_message: "SMR60".to_string(),
            primary_priority: vec!["05".to_string(), "01".to_string(), "03".to_string()],
            internet_only_group: "I".to_string(),
            internet_only_category: "02".to_string(),
            voice_category: "08".to_string(),
            modem_category: "02".to_string(),
            decoder_category: "04".to_string(),
            auxiliary_category: "07".to_string(),
            cable_group: "C".to_string(),
            voice_group_category: "10".to_string(),
            isp_category: "21".to_string(),
            unit_keyed_models: vec!["091003".to_string(), "091004".to_string()],
            mac_keyed_models: vec!["092201".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub draft_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            draft_dir: "./drafts".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EquipmentError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EquipmentError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EquipmentError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_url("backend.base_url", &self.backend.base_url)?;
        validate_range("backend.timeout_seconds", self.backend.timeout_seconds, 1, 300)?;
        if let Some(worker_id) = &self.backend.worker_id {
            if worker_id.contains("${") {
                return Err(EquipmentError::MissingConfigError {
                    field: "backend.worker_id".to_string(),
                });
            }
        }

        validate_non_empty_string(
            "rules.primary_decoder_category",
            &self.rules.primary_decoder_category,
        )?;
        validate_code_list("rules.capped_categories", &self.rules.capped_categories)?;
        validate_code_list("rules.bulk_categories", &self.rules.bulk_categories)?;
        validate_code_list("rules.unlimited_products", &self.rules.unlimited_products)?;
        validate_positive_number("rules.default_cap", self.rules.default_cap, 1)?;
        validate_positive_number(
            "rules.dual_composition_cap",
            self.rules.dual_composition_cap,
            1,
        )?;
        if self.rules.bulk_ceiling < self.rules.dual_composition_cap {
            return Err(EquipmentError::ConfigValidationError {
                field: "rules.bulk_ceiling".to_string(),
                message: "bulk ceiling must not be below the per-contract caps".to_string(),
            });
        }

        validate_non_empty_string("signal.install_message", &self.signal.install_message)?;
        validate_non_empty_string("signal.removal_message", &self.signal.removal_message)?;
        validate_non_empty_string(
            "signal.voice_only_message",
            &self.signal.voice_only_message,
        )?;
        validate_code_list("signal.primary_priority", &self.signal.primary_priority)?;

        validate_path("storage.draft_dir", &self.storage.draft_dir)?;
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.backend.base_url.trim_end_matches('/')
    }

    pub fn draft_dir(&self) -> &str {
        &self.storage.draft_dir
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
