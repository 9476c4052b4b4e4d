use crate::config::app_config::OnlineConfig;
use crate::core::{CapacityRecord, CapacityResult, DataSource, FallbackSource, RegionSelection, Result};
use crate::domain::model::clean_number;
use crate::utils::error::KepcoError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

const MESH_ENDPOINT: &str = "/ew/cpct/retrieveMeshNo";

/// gbn 候選值：""（預設）與 "5"（全欄位搜尋模式）
const GBN_CANDIDATES: [&str; 2] = ["", "5"];

/// 韓電ON（online.kepco.co.kr）可接續容量查詢
///
/// 先以 GET 開啟頁面取得 session cookie，再直接呼叫頁面內部使用的 JSON 端點。
pub struct KepcoOnlineClient {
    client: Client,
    page_url: Url,
}

impl KepcoOnlineClient {
    pub fn new(config: &OnlineConfig) -> Result<Self> {
        let page_url = Url::parse(&config.page_url).map_err(|e| KepcoError::InvalidConfigValue {
            field: "online.page_url".to_string(),
            value: config.page_url.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)")
            .build()
            .map_err(|e| KepcoError::Config {
                message: format!("failed to build scraper HTTP client: {}", e),
            })?;

        Ok(Self { client, page_url })
    }

    fn mesh_url(&self) -> Result<Url> {
        self.page_url
            .join(MESH_ENDPOINT)
            .map_err(|e| KepcoError::fallback(format!("cannot build KEPCO ON endpoint: {}", e)))
    }

    async fn open_session(&self) -> Result<()> {
        tracing::info!("📡 Opening KEPCO ON session: {}", self.page_url);
        let response = self
            .client
            .get(self.page_url.clone())
            .send()
            .await
            .map_err(|e| KepcoError::fallback(format!("KEPCO ON page request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(KepcoError::fallback(format!(
                "KEPCO ON page returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn retrieve_mesh(&self, url: &Url, address: &Map<String, Value>) -> Result<Value> {
        let body = serde_json::json!({ "dma_addrGbn": address });

        let response = self
            .client
            .post(url.clone())
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", self.page_url.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| KepcoError::fallback(format!("retrieveMeshNo request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(KepcoError::fallback(format!(
                "retrieveMeshNo returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| KepcoError::fallback(format!("retrieveMeshNo returned invalid JSON: {}", e)))
    }
}

/// 將市郡區名稱拆成 si / gu
///
/// "천안시 서북구" → ("천안시", "서북구")，"천안시" → ("천안시", "")，與道名相同 → ("", "")
pub fn split_district(district: &str, province: &str) -> (String, String) {
    let district = district.trim();
    if district.is_empty() || district == province.trim() {
        return (String::new(), String::new());
    }

    let mut parts = district.split_whitespace();
    let si = parts.next().unwrap_or_default().to_string();
    let gu = parts.collect::<Vec<_>>().join(" ");
    (si, gu)
}

fn address_params(selection: &RegionSelection, gbn: &str) -> Result<Map<String, Value>> {
    let province = selection
        .province_name
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| KepcoError::fallback("province name is required for KEPCO ON lookup"))?;
    let district = selection
        .district_name
        .as_deref()
        .ok_or_else(|| KepcoError::fallback("district name is required for KEPCO ON lookup"))?;

    let (si, gu) = split_district(district, province);
    let dong = selection.neighborhood.name().unwrap_or_default();
    let li = if dong.is_empty() {
        ""
    } else {
        selection.ri.as_deref().unwrap_or_default()
    };
    let jibun = selection
        .jibun
        .as_deref()
        .map(str::trim)
        .filter(|j| !j.is_empty() && !dong.is_empty())
        .unwrap_or("1");

    let mut params = Map::new();
    params.insert("gbn".into(), Value::from(gbn));
    params.insert("addr_do".into(), Value::from(province));
    params.insert("addr_si".into(), Value::from(si));
    params.insert("addr_gu".into(), Value::from(gu));
    params.insert("addr_lidong".into(), Value::from(dong));
    params.insert("addr_li".into(), Value::from(li));
    params.insert("addr_jibun".into(), Value::from(jibun));
    Ok(params)
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .map(|v| match v {
            Value::String(s) => s.trim().to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

fn kw_field(obj: &Map<String, Value>, keys: &[&str]) -> i64 {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .map(|v| match v {
            Value::Number(n) => n.as_f64().map(|f| f as i64).unwrap_or(0),
            Value::String(s) => clean_number(s),
            _ => 0,
        })
        .unwrap_or(0)
}

/// 單一物件轉成紀錄；沒有變電所名稱也沒有 DL 名稱時視為無資料
fn record_from_object(obj: &Map<String, Value>) -> Option<CapacityRecord> {
    let subst_nm = text_field(obj, &["subst_nm", "substNm"]);
    let dl_nm = text_field(obj, &["dl_nm", "dlNm"]);
    if subst_nm.is_empty() && dl_nm.is_empty() {
        return None;
    }

    Some(CapacityRecord {
        subst_cd: text_field(obj, &["subst_cd", "substCd"]),
        subst_nm,
        js_subst_pwr: kw_field(obj, &["js_subst_pwr", "jsSubstPwr"]),
        subst_pwr: kw_field(obj, &["subst_pwr", "substPwr"]),
        mtr_no: text_field(obj, &["mtr_no", "mtrNo"]),
        js_mtr_pwr: kw_field(obj, &["js_mtr_pwr", "jsMtrPwr"]),
        mtr_pwr: kw_field(obj, &["mtr_pwr", "mtrPwr"]),
        dl_cd: text_field(obj, &["dl_cd", "dlCd"]),
        dl_nm,
        js_dl_pwr: kw_field(obj, &["js_dl_pwr", "jsDlPwr"]),
        dl_pwr: kw_field(obj, &["dl_pwr", "dlPwr"]),
        substation_capacity_kw: kw_field(obj, &["vol1", "subst_vol1"]),
        transformer_capacity_kw: kw_field(obj, &["vol2", "mtr_vol2"]),
        line_capacity_kw: kw_field(obj, &["vol3", "dl_vol3"]),
    })
}

/// 從內部 API 回應取出紀錄（dma_result / dlt_result / result / data 或最上層）
pub fn parse_mesh_response(payload: &Value) -> Vec<CapacityRecord> {
    let Some(root) = payload.as_object() else {
        return Vec::new();
    };

    for key in ["dma_result", "dlt_result", "result", "data"] {
        match root.get(key) {
            Some(Value::Object(obj)) => {
                return record_from_object(obj).into_iter().collect();
            }
            Some(Value::Array(items)) if !items.is_empty() => {
                let records: Vec<CapacityRecord> = items
                    .iter()
                    .filter_map(|item| item.as_object().and_then(record_from_object))
                    .collect();
                if !records.is_empty() {
                    return records;
                }
            }
            _ => {}
        }
    }

    record_from_object(root).into_iter().collect()
}

#[async_trait]
impl FallbackSource for KepcoOnlineClient {
    async fn scrape(&self, selection: &RegionSelection) -> Result<CapacityResult> {
        let url = self.mesh_url()?;
        // 地名不足時不開啟工作階段
        let candidates = GBN_CANDIDATES
            .iter()
            .map(|gbn| address_params(selection, gbn).map(|address| (*gbn, address)))
            .collect::<Result<Vec<_>>>()?;
        self.open_session().await?;

        let mut last_error: Option<KepcoError> = None;
        let mut answered = false;

        for (gbn, address) in candidates {
            tracing::info!(
                "🔬 KEPCO ON retrieveMeshNo (gbn='{}') for {}",
                gbn,
                selection.display_name()
            );

            match self.retrieve_mesh(&url, &address).await {
                Ok(payload) => {
                    answered = true;
                    let records = parse_mesh_response(&payload);
                    if !records.is_empty() {
                        tracing::info!("✅ KEPCO ON returned {} records", records.len());
                        return Ok(CapacityResult::new(DataSource::FallbackScrape, records));
                    }
                    tracing::debug!("📭 KEPCO ON gbn='{}' returned no records", gbn);
                }
                Err(e) => {
                    tracing::warn!("⚠️ KEPCO ON gbn='{}' failed: {}", gbn, e);
                    last_error = Some(e);
                }
            }
        }

        // 至少有一次正常回應但沒有資料：明確的空結果
        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(CapacityResult::empty(DataSource::FallbackScrape)),
        }
    }
}
