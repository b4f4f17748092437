use crate::config::toml_config::BackendConfig;
use crate::domain::codes::TaskClass;
use crate::domain::model::WorkContext;
use crate::domain::ports::{CatalogSource, CompositionGateway, SignalDispatcher};
use crate::domain::wire::{
    BackendAck, CompositionRequest, RawCatalogResponse, RawCompositionList, RawModelRow,
    SignalRequest, SignalResponse,
};
use crate::utils::error::{EquipmentError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

const CATALOG_ENDPOINT: &str = "customer/work/getCustProdInfo";
const MODEL_LIST_ENDPOINT: &str = "customer/receipt/contract/getEquipmentNmListOfProd";
const CONTRACT_EQUIPMENT_ENDPOINT: &str = "customer/receipt/contract/getContractEqtList";
const COMPOSITION_UPDATE_ENDPOINT: &str = "customer/work/eqtCmpsInfoChg";
const SIGNAL_ENDPOINT: &str = "signal/send";

/// reqwest client for the provisioning backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    worker_id: Option<String>,
    so_id: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            worker_id: config.worker_id.clone(),
            so_id: config.so_id.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn post_json<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> Result<T> {
        let url = self.url(endpoint);
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        tracing::debug!("Response status from {}: {}", endpoint, status);
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EquipmentError::BackendError {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        Ok(response.json().await?)
    }

    fn product_query(product_code: &str, contract_id: &str) -> Value {
        json!({
            "EQT_SEL": "0",
            "PROD_CD": product_code,
            "BUGA_EQT_SEL": "Y",
            "CTRT_ID": contract_id,
        })
    }

    fn or_default<'a>(value: &'a str, fallback: &'a Option<String>) -> &'a str {
        if value.is_empty() {
            fallback.as_deref().unwrap_or("")
        } else {
            value
        }
    }
}

#[async_trait]
impl CatalogSource for HttpBackend {
    async fn fetch_catalog(&self, context: &WorkContext) -> Result<RawCatalogResponse> {
        let body = json!({
            "WRKR_ID": Self::or_default(&context.worker_id, &self.worker_id),
            "SO_ID": Self::or_default(&context.so_id, &self.so_id),
            "WORK_ID": context.work_order_id,
            "WRK_ID": context.work_order_id,
            "CUST_ID": context.customer_id,
            "RCPT_ID": context.receipt_id,
            "CTRT_ID": context.contract_id,
            "CRR_TSK_CL": TaskClass::from_work_code(&context.work_code).code(),
            "WRK_DTL_TCD": context.work_detail_code,
            "WRK_CD": context.work_code,
            "PROD_CD": context.product_code,
        });
        tracing::info!(
            "📡 Fetching equipment catalog for work order {}",
            context.work_order_id
        );
        self.post_json(CATALOG_ENDPOINT, &body).await
    }

    async fn fetch_model_list(
        &self,
        product_code: &str,
        contract_id: &str,
    ) -> Result<Vec<RawModelRow>> {
        let rows: Option<Vec<RawModelRow>> = self
            .post_json(
                MODEL_LIST_ENDPOINT,
                &Self::product_query(product_code, contract_id),
            )
            .await?;
        Ok(rows.unwrap_or_default())
    }

    async fn fetch_composition(
        &self,
        product_code: &str,
        contract_id: &str,
    ) -> Result<RawCompositionList> {
        self.post_json(
            CONTRACT_EQUIPMENT_ENDPOINT,
            &Self::product_query(product_code, contract_id),
        )
        .await
    }
}

#[async_trait]
impl CompositionGateway for HttpBackend {
    async fn update_composition(&self, request: &CompositionRequest) -> Result<()> {
        let body = json!({ "parameters": request });
        let ack: BackendAck = self.post_json(COMPOSITION_UPDATE_ENDPOINT, &body).await?;
        if !ack.is_success() {
            return Err(EquipmentError::BackendError {
                endpoint: COMPOSITION_UPDATE_ENDPOINT.to_string(),
                message: ack.error_message(),
            });
        }
        tracing::info!("✅ Equipment composition updated for contract {}", request.ctrt_id);
        Ok(())
    }
}

#[async_trait]
impl SignalDispatcher for HttpBackend {
    async fn dispatch(&self, request: &SignalRequest) -> Result<SignalResponse> {
        let body = serde_json::to_value(request)?;
        let value: Value = self.post_json(SIGNAL_ENDPOINT, &body).await?;
        // Some deployments wrap the result in a one-element array.
        let value = match value {
            Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
            other => other,
        };
        if value.is_null() {
            return Ok(SignalResponse::default());
        }
        Ok(serde_json::from_value(value)?)
    }
}
