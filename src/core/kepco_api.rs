use crate::config::app_config::KepcoApiConfig;
use crate::core::{CapacityApi, CapacityQueryParams, CapacityRecord, CapacityResult, DataSource, Result};
use crate::utils::error::KepcoError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// 韓電 전력데이터 개방포털 OpenAPI 用戶端
pub struct KepcoApiClient {
    client: Client,
    base_url: String,
    /// 沒有金鑰時為 None，查詢直接回傳 MissingConfig 而不發出請求
    api_key: Option<String>,
    request_delay: Duration,
}

impl KepcoApiClient {
    pub fn new(config: &KepcoApiConfig) -> Result<Self> {
        // 未替換的 ${KEPCO_API_KEY} 等同未設定
        let api_key = Some(config.api_key.trim())
            .filter(|key| !key.is_empty() && !key.starts_with("${"))
            .map(str::to_string);
        if api_key.is_none() {
            tracing::warn!("🔑 KEPCO_API_KEY is not set; primary API queries will be skipped");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| KepcoError::Config {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            request_delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// 回應可能是 {"data": [...]} 或直接是陣列
fn extract_raw_records(payload: serde_json::Value) -> Vec<serde_json::Map<String, serde_json::Value>> {
    let items = match payload {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => match obj.remove("data") {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            serde_json::Value::Object(obj) => Some(obj),
            _ => None,
        })
        .collect()
}

fn payload_message(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("message")
        .or_else(|| payload.get("resultMsg"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl CapacityApi for KepcoApiClient {
    async fn query(&self, params: &CapacityQueryParams) -> Result<CapacityResult> {
        let api_key = self.api_key.as_deref().ok_or_else(|| KepcoError::MissingConfig {
            field: "kepco_api.api_key (KEPCO_API_KEY)".to_string(),
        })?;

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let mut query = params.query_pairs();
        query.push(("apiKey", api_key));
        query.push(("returnType", "json"));

        tracing::debug!(
            "📡 KEPCO API request: metroCd={}, cityCd={}, addrLidong={:?}",
            params.metro_cd,
            params.city_cd,
            params.addr_lidong
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| KepcoError::from_transport(e.without_url(), "KEPCO API request failed"))?;

        let status = response.status();
        tracing::debug!("📡 KEPCO API response status: {}", status);

        if !status.is_success() {
            return Err(KepcoError::api(
                Some(status.as_u16()),
                format!("KEPCO API HTTP error: {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| KepcoError::from_transport(e.without_url(), "failed to read KEPCO API body"))?;

        let payload: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            KepcoError::api(
                Some(status.as_u16()),
                format!("KEPCO API returned invalid JSON: {}", e),
            )
        })?;

        let message = payload_message(&payload);
        let raw_records = extract_raw_records(payload);

        if raw_records.is_empty() {
            tracing::info!(
                "📭 KEPCO API returned no records{}",
                message.map(|m| format!(": {}", m)).unwrap_or_default()
            );
            return Ok(CapacityResult::empty(DataSource::PrimaryApi));
        }

        let raw_count = raw_records.len();
        let records: Vec<CapacityRecord> = raw_records
            .into_iter()
            .filter_map(|obj| {
                serde_json::from_value(serde_json::Value::Object(obj))
                    .map_err(|e| tracing::warn!("⚠️ Skipping malformed KEPCO record: {}", e))
                    .ok()
            })
            .collect();

        if records.is_empty() {
            return Err(KepcoError::api(
                Some(status.as_u16()),
                format!("none of the {} KEPCO records passed validation", raw_count),
            ));
        }

        tracing::info!("✅ KEPCO API returned {} records", records.len());
        Ok(CapacityResult::new(DataSource::PrimaryApi, records))
    }
}
