use crate::core::lookup::{FallbackScope, RetryPolicy};
use crate::utils::error::{KepcoError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://bigdata.kepco.co.kr/openapi/v1/dispersedGeneration.do";
pub const DEFAULT_ONLINE_URL: &str = "https://online.kepco.co.kr/EWM092D00";
pub const DEFAULT_CODE_TABLE: &str = "data/bdong_codes.csv";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub kepco_api: KepcoApiConfig,
    pub online: OnlineConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub fallback: FallbackConfig,
    pub address: AddressConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KepcoApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
    /// 每次呼叫前的等待時間（避免觸發流量限制）
    pub request_delay_ms: u64,
}

impl Default for KepcoApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            timeout_seconds: 15,
            request_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineConfig {
    pub enabled: bool,
    pub page_url: String,
    pub timeout_seconds: u64,
}

impl Default for OnlineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_url: DEFAULT_ONLINE_URL.to_string(),
            timeout_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 300 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub scope: FallbackScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    pub code_table_path: String,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            code_table_path: DEFAULT_CODE_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub dir: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: ".kepco-capacity".to_string(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| KepcoError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${KEPCO_API_KEY})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| KepcoError::Config {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 只用環境變數建立配置（沒有 TOML 檔時）
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// 環境變數覆寫已載入的值
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(key) = std::env::var("KEPCO_API_KEY") {
            self.kepco_api.api_key = key.trim().to_string();
        }
        if let Ok(url) = std::env::var("KEPCO_API_BASE_URL") {
            self.kepco_api.base_url = url.trim().to_string();
        }
        if let Some(seconds) = env_seconds("KEPCO_API_TIMEOUT_SECONDS")? {
            self.kepco_api.timeout_seconds = seconds.ceil() as u64;
        }
        if let Some(seconds) = env_seconds("KEPCO_API_DELAY_SECONDS")? {
            self.kepco_api.request_delay_ms = (seconds * 1000.0).round() as u64;
        }
        if let Ok(url) = std::env::var("KEPCO_ON_URL") {
            self.online.page_url = url.trim().to_string();
        }
        if let Ok(path) = std::env::var("KEPCO_ADDRESS_CODES") {
            self.address.code_table_path = path.trim().to_string();
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.backoff_ms),
        )
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }
}

fn env_seconds(name: &str) -> Result<Option<f64>> {
    match std::env::var(name) {
        Ok(raw) => {
            let value: f64 = raw.trim().parse().map_err(|_| KepcoError::InvalidConfigValue {
                field: name.to_string(),
                value: raw.clone(),
                reason: "expected a number of seconds".to_string(),
            })?;
            if value < 0.0 || !value.is_finite() {
                return Err(KepcoError::InvalidConfigValue {
                    field: name.to_string(),
                    value: raw,
                    reason: "must be a non-negative number".to_string(),
                });
            }
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("kepco_api.base_url", &self.kepco_api.base_url)?;
        validation::validate_positive_number("kepco_api.timeout_seconds", self.kepco_api.timeout_seconds, 1)?;
        validation::validate_range("kepco_api.request_delay_ms", self.kepco_api.request_delay_ms, 0, 60_000)?;

        if self.online.enabled {
            validation::validate_url("online.page_url", &self.online.page_url)?;
            validation::validate_positive_number("online.timeout_seconds", self.online.timeout_seconds, 1)?;
        }

        validation::validate_range("retry.max_retries", self.retry.max_retries, 0, 10)?;
        validation::validate_range("retry.backoff_ms", self.retry.backoff_ms, 0, 60_000)?;
        validation::validate_positive_number("cache.ttl_seconds", self.cache.ttl_seconds, 1)?;

        validation::validate_non_empty_string("address.code_table_path", &self.address.code_table_path)?;
        validation::validate_path("address.code_table_path", &self.address.code_table_path)?;

        if self.history.enabled {
            validation::validate_path("history.dir", &self.history.dir)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(config.kepco_api.base_url, DEFAULT_API_URL);
        assert_eq!(config.kepco_api.timeout_seconds, 15);
        assert!(config.online.enabled);
        assert_eq!(config.retry_policy(), RetryPolicy::new(2, Duration::from_millis(1000)));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.fallback.scope, FallbackScope::DistrictOnly);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[kepco_api]
base_url = "http://localhost:9000/openapi"
api_key = "abc"
timeout_seconds = 5
request_delay_ms = 250

[online]
enabled = false

[retry]
max_retries = 4
backoff_ms = 10

[cache]
ttl_seconds = 60

[fallback]
scope = "always"

[address]
code_table_path = "codes.csv"

[history]
enabled = false
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.kepco_api.api_key, "abc");
        assert_eq!(config.kepco_api.request_delay_ms, 250);
        assert!(!config.online.enabled);
        assert_eq!(config.online.page_url, DEFAULT_ONLINE_URL);
        assert_eq!(config.retry_policy(), RetryPolicy::new(4, Duration::from_millis(10)));
        assert_eq!(config.fallback.scope, FallbackScope::Always);
        assert_eq!(config.address.code_table_path, "codes.csv");
        assert!(!config.history.enabled);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("KEPCO_TEST_SUBST_KEY", "secret-key");

        let toml_content = r#"
[kepco_api]
api_key = "${KEPCO_TEST_SUBST_KEY}"
base_url = "${KEPCO_TEST_UNSET_URL}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.kepco_api.api_key, "secret-key");
        assert_eq!(config.kepco_api.base_url, "${KEPCO_TEST_UNSET_URL}");
        assert!(config.validate().is_err());

        std::env::remove_var("KEPCO_TEST_SUBST_KEY");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = AppConfig::from_toml_str("[cache]\nttl_seconds = 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(KepcoError::InvalidConfigValue { .. })
        ));

        let config = AppConfig::from_toml_str("[retry]\nmax_retries = 50\n").unwrap();
        assert!(config.validate().is_err());

        let err = AppConfig::from_toml_str("[fallback]\nscope = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, KepcoError::Config { .. }));
    }

    #[test]
    fn test_env_seconds_parsing() {
        std::env::set_var("KEPCO_TEST_DELAY_SECONDS", "0.5");
        assert_eq!(env_seconds("KEPCO_TEST_DELAY_SECONDS").unwrap(), Some(0.5));

        std::env::set_var("KEPCO_TEST_DELAY_SECONDS", "soon");
        assert!(env_seconds("KEPCO_TEST_DELAY_SECONDS").is_err());

        std::env::remove_var("KEPCO_TEST_DELAY_SECONDS");
        assert_eq!(env_seconds("KEPCO_TEST_DELAY_SECONDS").unwrap(), None);
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[kepco_api]\napi_key = \"from-file\"\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.kepco_api.api_key, "from-file");
    }
}
