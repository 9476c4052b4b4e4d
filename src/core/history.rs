use crate::core::{CapacityQueryParams, CapacityResult, DataSource, RegionSelection, Result, Storage};
use crate::utils::error::KepcoError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HISTORY_FILE: &str = "history.json";

/// 可併網容量（三層級最小值）的統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityStats {
    pub min_kw: i64,
    pub median_kw: i64,
    pub max_kw: i64,
}

impl CapacityStats {
    pub fn from_result(result: &CapacityResult) -> Self {
        let mut values: Vec<i64> = result.records.iter().map(|r| r.min_capacity()).collect();
        if values.is_empty() {
            return Self::default();
        }
        values.sort_unstable();

        let mid = values.len() / 2;
        let median_kw = if values.len() % 2 == 0 {
            // 以 i128 相加，兩筆接近上限的容量也不會溢位
            ((i128::from(values[mid - 1]) + i128::from(values[mid])) / 2) as i64
        } else {
            values[mid]
        };

        Self {
            min_kw: values[0],
            median_kw,
            max_kw: values[values.len() - 1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHistoryRecord {
    #[serde(default)]
    pub id: u64,
    pub region_name: String,
    pub metro_cd: String,
    pub city_cd: String,
    pub neighborhood: String,
    pub source: DataSource,
    pub result_count: usize,
    pub connectable_count: usize,
    pub not_connectable_count: usize,
    pub stats: CapacityStats,
    pub queried_at: DateTime<Utc>,
}

impl QueryHistoryRecord {
    pub fn from_result(
        selection: &RegionSelection,
        params: &CapacityQueryParams,
        result: &CapacityResult,
    ) -> Self {
        let connectable_count = result.connectable_count();
        Self {
            id: 0,
            region_name: selection.display_name(),
            metro_cd: params.metro_cd.clone(),
            city_cd: params.city_cd.clone(),
            neighborhood: selection.neighborhood.to_string(),
            source: result.source,
            result_count: result.len(),
            connectable_count,
            not_connectable_count: result.len() - connectable_count,
            stats: CapacityStats::from_result(result),
            queried_at: Utc::now(),
        }
    }
}

/// 查詢紀錄，透過 Storage 存成單一 JSON 陣列文件
pub struct HistoryRepository<S: Storage> {
    storage: S,
    file_name: String,
}

impl<S: Storage> HistoryRepository<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            file_name: HISTORY_FILE.to_string(),
        }
    }

    async fn load(&self) -> Result<Vec<QueryHistoryRecord>> {
        if !self.storage.exists(&self.file_name).await {
            return Ok(Vec::new());
        }

        let data = self
            .storage
            .read_file(&self.file_name)
            .await
            .map_err(|e| KepcoError::History {
                message: format!("failed to read {}: {}", self.file_name, e),
            })?;

        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&data).map_err(|e| KepcoError::History {
            message: format!("corrupted {}: {}", self.file_name, e),
        })
    }

    async fn store(&self, records: &[QueryHistoryRecord]) -> Result<()> {
        let data = serde_json::to_vec_pretty(records)?;
        self.storage
            .write_file(&self.file_name, &data)
            .await
            .map_err(|e| KepcoError::History {
                message: format!("failed to write {}: {}", self.file_name, e),
            })
    }

    pub async fn save(&self, mut record: QueryHistoryRecord) -> Result<u64> {
        let mut records = self.load().await?;
        record.id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let id = record.id;
        records.push(record);
        self.store(&records).await?;

        tracing::debug!("📝 Saved query history #{}", id);
        Ok(id)
    }

    /// 最新的在前
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<QueryHistoryRecord>> {
        let mut records = self.load().await?;
        records.sort_by(|a, b| b.id.cmp(&a.id));
        records.truncate(limit);
        Ok(records)
    }

    pub async fn delete(&self, id: u64) -> Result<bool> {
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.store(&records).await?;
        Ok(true)
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }
}
