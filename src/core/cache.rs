use crate::core::{CapacityResult, DataSource, RegionSelection};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

type CacheKey = (RegionSelection, DataSource);

struct CacheEntry {
    result: CapacityResult,
    stored_at: Instant,
}

/// 以 (地區選擇, 資料來源) 為鍵的 TTL 快取。讀取時檢查過期，不限容量。
pub struct TtlCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, selection: &RegionSelection, source: DataSource) -> Option<CapacityResult> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let key = (selection.clone(), source);

        let expired = match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            tracing::debug!("🗑️ Cache entry expired for {} ({})", selection.display_name(), source);
            entries.remove(&key);
        }
        None
    }

    pub fn insert(&self, selection: &RegionSelection, result: CapacityResult) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            (selection.clone(), result.source),
            CacheEntry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CapacityRecord;
    use crate::domain::model::Neighborhood;

    fn selection() -> RegionSelection {
        RegionSelection::new("11", "11110", Neighborhood::All)
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let result = CapacityResult::new(DataSource::PrimaryApi, vec![CapacityRecord::new(1, 2, 3)]);
        cache.insert(&selection(), result.clone());

        assert_eq!(cache.get(&selection(), DataSource::PrimaryApi), Some(result));
        assert_eq!(cache.get(&selection(), DataSource::FallbackScrape), None);
    }

    #[test]
    fn test_key_includes_full_selection() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let result = CapacityResult::new(DataSource::PrimaryApi, vec![CapacityRecord::new(1, 2, 3)]);
        cache.insert(&selection(), result);

        let other = RegionSelection::new("11", "11110", Neighborhood::parse("청운동"));
        assert_eq!(cache.get(&other, DataSource::PrimaryApi), None);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.insert(&selection(), CapacityResult::new(DataSource::FallbackScrape, vec![CapacityRecord::new(1, 1, 1)]));
        assert_eq!(cache.len(), 1);

        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(cache.get(&selection(), DataSource::FallbackScrape), None);
        assert!(cache.is_empty());
    }
}
