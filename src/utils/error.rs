use thiserror::Error;

#[derive(Error, Debug)]
pub enum KepcoError {
    #[error("Invalid region: {message}")]
    InvalidRegion { message: String },

    #[error("KEPCO API error{}: {message}", status_suffix(.code))]
    KepcoApi { code: Option<u16>, message: String },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Fallback source unavailable: {message}")]
    FallbackUnavailable { message: String },

    #[error("Address data error: {message}")]
    AddressData { message: String },

    #[error("Data load error: {message}")]
    DataLoad { message: String },

    #[error("History store error: {message}")]
    History { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Upstream,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl KepcoError {
    pub fn invalid_region(message: impl Into<String>) -> Self {
        Self::InvalidRegion {
            message: message.into(),
        }
    }

    pub fn api(code: Option<u16>, message: impl Into<String>) -> Self {
        Self::KepcoApi {
            code,
            message: message.into(),
        }
    }

    pub fn fallback(message: impl Into<String>) -> Self {
        Self::FallbackUnavailable {
            message: message.into(),
        }
    }

    /// 將 reqwest 錯誤轉為帶型別的上游錯誤（逾時與其他傳輸錯誤分開）
    pub fn from_transport(err: reqwest::Error, context: &str) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                message: format!("{}: {}", context, err),
            }
        } else {
            Self::KepcoApi {
                code: err.status().map(|s| s.as_u16()),
                message: format!("{}: {}", context, err),
            }
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRegion { .. } => ErrorCategory::Input,
            Self::KepcoApi { .. } | Self::Timeout { .. } | Self::FallbackUnavailable { .. } => {
                ErrorCategory::Upstream
            }
            Self::AddressData { .. }
            | Self::DataLoad { .. }
            | Self::Csv(_)
            | Self::Serialization(_) => ErrorCategory::Data,
            Self::Config { .. } | Self::InvalidConfigValue { .. } | Self::MissingConfig { .. } => {
                ErrorCategory::Configuration
            }
            Self::History { .. } | Self::Io(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::FallbackUnavailable { .. } => ErrorSeverity::Low,
            Self::KepcoApi { .. } | Self::Timeout { .. } => ErrorSeverity::Medium,
            Self::InvalidRegion { .. }
            | Self::AddressData { .. }
            | Self::DataLoad { .. }
            | Self::History { .. }
            | Self::Csv(_)
            | Self::Serialization(_) => ErrorSeverity::High,
            Self::Config { .. }
            | Self::InvalidConfigValue { .. }
            | Self::MissingConfig { .. }
            | Self::Io(_) => ErrorSeverity::Critical,
        }
    }

    /// 是否值得對主要 API 重試
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::KepcoApi { code: None, .. } => true,
            Self::KepcoApi { code: Some(code), .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InvalidRegion { message } => format!("지역 선택이 올바르지 않습니다: {}", message),
            Self::KepcoApi { code: Some(code), .. } => {
                format!("한전 API 호출에 실패했습니다 (HTTP {}).", code)
            }
            Self::KepcoApi { code: None, .. } => "한전 API 호출 중 오류가 발생했습니다.".to_string(),
            Self::Timeout { .. } => "한전 API 요청 시간이 초과되었습니다.".to_string(),
            Self::FallbackUnavailable { .. } => "조회 가능한 데이터가 없습니다.".to_string(),
            Self::AddressData { message } => format!("주소 데이터 처리 중 오류: {}", message),
            Self::DataLoad { message } => format!("데이터 로드 중 오류: {}", message),
            Self::History { message } => format!("조회 이력 처리 중 오류: {}", message),
            Self::Config { message } => format!("설정 오류: {}", message),
            Self::InvalidConfigValue { field, reason, .. } => {
                format!("설정 값이 올바르지 않습니다 ({}): {}", field, reason)
            }
            Self::MissingConfig { field } => format!("필수 설정이 없습니다: {}", field),
            Self::Io(e) => format!("파일 처리 중 오류: {}", e),
            Self::Csv(e) => format!("CSV 처리 중 오류: {}", e),
            Self::Serialization(e) => format!("JSON 처리 중 오류: {}", e),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::InvalidRegion { .. } => "시/도, 시/군/구, 읍/면/동 선택을 다시 확인하세요.",
            Self::KepcoApi { .. } => "KEPCO_API_KEY 와 API 주소를 확인한 뒤 다시 시도하세요.",
            Self::Timeout { .. } => "잠시 후 다시 시도하거나 timeout_seconds 값을 늘리세요.",
            Self::FallbackUnavailable { .. } => "한전ON(online.kepco.co.kr)에서 직접 조회해 보세요.",
            Self::AddressData { .. } => "법정동코드 CSV 파일 경로와 컬럼을 확인하세요.",
            Self::DataLoad { .. } | Self::Csv(_) | Self::Serialization(_) => {
                "CSV/JSON/Excel 파일 형식과 컬럼명을 확인하세요."
            }
            Self::History { .. } => "이력 저장 디렉터리의 권한을 확인하세요.",
            Self::Config { .. } | Self::InvalidConfigValue { .. } | Self::MissingConfig { .. } => {
                "설정 파일(TOML) 또는 환경변수를 확인하세요."
            }
            Self::Io(_) => "파일 경로와 권한을 확인하세요.",
        }
    }
}

fn status_suffix(code: &Option<u16>) -> String {
    code.map(|c| format!(" ({})", c)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, KepcoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(KepcoError::Timeout { message: "t".into() }.is_retryable());
        assert!(KepcoError::api(None, "connection reset").is_retryable());
        assert!(KepcoError::api(Some(503), "unavailable").is_retryable());
        assert!(KepcoError::api(Some(429), "slow down").is_retryable());
        assert!(!KepcoError::api(Some(401), "bad key").is_retryable());
        assert!(!KepcoError::invalid_region("bad").is_retryable());
        assert!(!KepcoError::fallback("down").is_retryable());
    }

    #[test]
    fn test_api_error_display_includes_code() {
        let err = KepcoError::api(Some(500), "boom");
        assert_eq!(err.to_string(), "KEPCO API error (500): boom");

        let err = KepcoError::api(None, "boom");
        assert_eq!(err.to_string(), "KEPCO API error: boom");
    }

    #[test]
    fn test_severity_and_category() {
        let err = KepcoError::fallback("down");
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.category(), ErrorCategory::Upstream);

        let err = KepcoError::MissingConfig {
            field: "kepco_api.api_key".into(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
