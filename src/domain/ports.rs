use crate::domain::model::{CapacityQueryParams, CapacityResult, RegionSelection};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// 主要來源：韓電 OpenAPI。每次呼叫只發出一個請求，不在內部重試。
#[async_trait]
pub trait CapacityApi: Send + Sync {
    async fn query(&self, params: &CapacityQueryParams) -> Result<CapacityResult>;
}

/// 備援來源：韓電ON 網頁。錯誤一律視為終止。
#[async_trait]
pub trait FallbackSource: Send + Sync {
    async fn scrape(&self, selection: &RegionSelection) -> Result<CapacityResult>;
}
