use crate::core::export::SessionDraft;
use crate::domain::model::WorkContext;
use crate::domain::wire::{
    CompositionRequest, RawCatalogResponse, RawCompositionList, RawModelRow, SignalRequest,
    SignalResponse,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Fetches the raw equipment pools and model lists for a work order.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self, context: &WorkContext) -> Result<RawCatalogResponse>;

    async fn fetch_model_list(&self, product_code: &str, contract_id: &str)
        -> Result<Vec<RawModelRow>>;

    async fn fetch_composition(
        &self,
        product_code: &str,
        contract_id: &str,
    ) -> Result<RawCompositionList>;
}

#[async_trait]
pub trait CompositionGateway: Send + Sync {
    async fn update_composition(&self, request: &CompositionRequest) -> Result<()>;
}

#[async_trait]
pub trait SignalDispatcher: Send + Sync {
    async fn dispatch(&self, request: &SignalRequest) -> Result<SignalResponse>;
}

/// Draft persistence keyed by work-order id. Last write wins.
pub trait SessionStore: Send + Sync {
    fn load(
        &self,
        work_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<SessionDraft>>> + Send;

    fn save(
        &self,
        work_id: &str,
        draft: &SessionDraft,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn clear(&self, work_id: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}
