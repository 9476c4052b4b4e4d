use crate::core::cache::TtlCache;
use crate::core::params::to_query_params;
use crate::core::{
    CapacityApi, CapacityQueryParams, CapacityResult, DataSource, FallbackSource, RegionSelection,
    Result,
};
use crate::utils::error::KepcoError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// 哪些選擇在主要來源失敗或無資料時改用備援來源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackScope {
    /// 只有「全部」（市郡區層級）查詢
    #[default]
    DistrictOnly,
    Always,
}

/// 主要來源的重試設定，線性退避：第 n 次重試前等待 backoff_step * n
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_step: Duration) -> Self {
        Self {
            max_retries,
            backoff_step,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Start,
    PrimaryAttempted,
    FallbackAttempted,
    Done,
}

/// 單次查詢的主要結果：資料、空結果或錯誤
enum PrimaryOutcome {
    Records(CapacityResult),
    Empty(CapacityResult),
    Failed(KepcoError),
}

/// 主要 API → 備援爬取 的查詢協調器
///
/// 兩個來源依序呼叫、不平行競速；主要來源有資料時永遠優先。
pub struct CapacityLookup<A: CapacityApi, F: FallbackSource> {
    primary: A,
    fallback: Option<F>,
    retry: RetryPolicy,
    scope: FallbackScope,
    cache: Arc<TtlCache>,
}

impl<A: CapacityApi, F: FallbackSource> CapacityLookup<A, F> {
    pub fn new(primary: A, fallback: Option<F>, cache: Arc<TtlCache>) -> Self {
        Self {
            primary,
            fallback,
            retry: RetryPolicy::default(),
            scope: FallbackScope::default(),
            cache,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_scope(mut self, scope: FallbackScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    fn transition(&self, selection: &RegionSelection, from: QueryState, to: QueryState) {
        tracing::debug!("🔁 {}: {:?} -> {:?}", selection.display_name(), from, to);
    }

    fn wants_fallback(&self, selection: &RegionSelection) -> bool {
        match self.scope {
            FallbackScope::DistrictOnly => selection.is_all(),
            FallbackScope::Always => true,
        }
    }

    /// 查詢地區的剩餘容量
    ///
    /// 輸入錯誤立即回傳 `InvalidRegion`；備援來源的錯誤會轉成空結果，不會傳到呼叫端。
    pub async fn lookup(&self, selection: &RegionSelection) -> Result<CapacityResult> {
        let params = to_query_params(selection)?;

        for source in [DataSource::PrimaryApi, DataSource::FallbackScrape] {
            if let Some(hit) = self.cache.get(selection, source) {
                tracing::info!("💾 Cache hit for {} ({})", selection.display_name(), source);
                return Ok(hit);
            }
        }

        self.transition(selection, QueryState::Start, QueryState::PrimaryAttempted);
        let outcome = match self.query_primary(&params).await {
            PrimaryOutcome::Records(result) => {
                self.transition(selection, QueryState::PrimaryAttempted, QueryState::Done);
                self.cache.insert(selection, result.clone());
                return Ok(result);
            }
            other => other,
        };

        let Some(fallback) = self
            .fallback
            .as_ref()
            .filter(|_| self.wants_fallback(selection))
        else {
            self.transition(selection, QueryState::PrimaryAttempted, QueryState::Done);
            return match outcome {
                PrimaryOutcome::Failed(err) => Err(err),
                PrimaryOutcome::Empty(result) | PrimaryOutcome::Records(result) => Ok(result),
            };
        };

        if let PrimaryOutcome::Failed(err) = &outcome {
            tracing::warn!("⚠️ Primary API failed for {}: {}", selection.display_name(), err);
        }

        self.transition(selection, QueryState::PrimaryAttempted, QueryState::FallbackAttempted);
        tracing::info!("🔄 Falling back to KEPCO ON for {}", selection.display_name());

        let missing_key = matches!(outcome, PrimaryOutcome::Failed(KepcoError::MissingConfig { .. }));

        let result = match fallback.scrape(selection).await {
            Ok(result) if !result.is_empty() => {
                let result = if missing_key {
                    result.with_notice("한전 API 키가 설정되지 않아 한전ON에서 조회했습니다.")
                } else {
                    result
                };
                self.cache.insert(selection, result.clone());
                result
            }
            Ok(result) => {
                tracing::info!("📭 Fallback returned no data for {}", selection.display_name());
                result.with_notice("조회 가능한 데이터가 없습니다.")
            }
            Err(err) => {
                tracing::warn!("⚠️ Fallback failed for {}: {}", selection.display_name(), err);
                CapacityResult::empty(DataSource::FallbackScrape)
                    .with_notice(err.user_friendly_message())
            }
        };

        self.transition(selection, QueryState::FallbackAttempted, QueryState::Done);
        Ok(result)
    }

    async fn query_primary(&self, params: &CapacityQueryParams) -> PrimaryOutcome {
        let mut attempt = 0;
        loop {
            match self.primary.query(params).await {
                Ok(result) if result.is_empty() => return PrimaryOutcome::Empty(result),
                Ok(result) => return PrimaryOutcome::Records(result),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "⏳ Primary attempt {} failed ({}); retrying in {:?}",
                        attempt,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return PrimaryOutcome::Failed(err),
            }
        }
    }
}
