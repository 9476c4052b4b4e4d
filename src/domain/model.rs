use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 代表「全部」鄰里的選項
pub const ALL_NEIGHBORHOODS: &str = "ALL";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Neighborhood {
    All,
    Named(String),
}

impl Neighborhood {
    /// "ALL"、"전체" 或空字串都視為市郡區層級查詢
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case(ALL_NEIGHBORHOODS)
            || trimmed == "전체"
        {
            Self::All
        } else {
            Self::Named(trimmed.to_string())
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for Neighborhood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_NEIGHBORHOODS),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// 使用者選擇的地區，送出後不可變
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionSelection {
    pub province_code: String,
    pub district_code: String,
    pub neighborhood: Neighborhood,
    pub ri: Option<String>,
    pub jibun: Option<String>,
    pub province_name: Option<String>,
    pub district_name: Option<String>,
}

impl RegionSelection {
    pub fn new(
        province_code: impl Into<String>,
        district_code: impl Into<String>,
        neighborhood: Neighborhood,
    ) -> Self {
        Self {
            province_code: province_code.into(),
            district_code: district_code.into(),
            neighborhood,
            ri: None,
            jibun: None,
            province_name: None,
            district_name: None,
        }
    }

    pub fn with_names(mut self, province: impl Into<String>, district: impl Into<String>) -> Self {
        self.province_name = Some(province.into());
        self.district_name = Some(district.into());
        self
    }

    pub fn with_ri(mut self, ri: impl Into<String>) -> Self {
        self.ri = Some(ri.into());
        self
    }

    pub fn with_jibun(mut self, jibun: impl Into<String>) -> Self {
        self.jibun = Some(jibun.into());
        self
    }

    pub fn is_all(&self) -> bool {
        self.neighborhood.is_all()
    }

    pub fn display_name(&self) -> String {
        let mut parts = vec![
            self.province_name
                .clone()
                .unwrap_or_else(|| self.province_code.clone()),
        ];
        match &self.district_name {
            Some(district) if Some(district) != self.province_name.as_ref() => {
                parts.push(district.clone())
            }
            Some(_) => {}
            None => parts.push(self.district_code.clone()),
        }
        if let Some(name) = self.neighborhood.name() {
            parts.push(name.to_string());
            if let Some(ri) = self.ri.as_deref().filter(|r| !r.trim().is_empty()) {
                parts.push(ri.to_string());
            }
        }
        parts.join(" ")
    }
}

/// 韓電 OpenAPI 請求參數
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityQueryParams {
    pub metro_cd: String,
    pub city_cd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr_lidong: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr_li: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr_jibun: Option<String>,
}

impl CapacityQueryParams {
    pub fn is_district_level(&self) -> bool {
        self.addr_lidong.is_none()
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("metroCd", self.metro_cd.as_str()), ("cityCd", self.city_cd.as_str())];
        if let Some(dong) = &self.addr_lidong {
            pairs.push(("addrLidong", dong));
        }
        if let Some(li) = &self.addr_li {
            pairs.push(("addrLi", li));
        }
        if let Some(jibun) = &self.addr_jibun {
            pairs.push(("addrJibun", jibun));
        }
        pairs
    }
}

/// 單一配電線路的剩餘容量，0 代表該層級無法併網
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRecord {
    #[serde(default, alias = "subst_cd", deserialize_with = "lenient_text")]
    pub subst_cd: String,
    #[serde(default, alias = "subst_nm", deserialize_with = "lenient_text")]
    pub subst_nm: String,
    #[serde(default, alias = "js_subst_pwr", deserialize_with = "lenient_kw")]
    pub js_subst_pwr: i64,
    #[serde(default, alias = "subst_pwr", deserialize_with = "lenient_kw")]
    pub subst_pwr: i64,

    #[serde(default, alias = "mtr_no", deserialize_with = "lenient_text")]
    pub mtr_no: String,
    #[serde(default, alias = "js_mtr_pwr", deserialize_with = "lenient_kw")]
    pub js_mtr_pwr: i64,
    #[serde(default, alias = "mtr_pwr", deserialize_with = "lenient_kw")]
    pub mtr_pwr: i64,

    #[serde(default, alias = "dl_cd", deserialize_with = "lenient_text")]
    pub dl_cd: String,
    #[serde(default, alias = "dl_nm", deserialize_with = "lenient_text")]
    pub dl_nm: String,
    #[serde(default, alias = "js_dl_pwr", deserialize_with = "lenient_kw")]
    pub js_dl_pwr: i64,
    #[serde(default, alias = "dl_pwr", deserialize_with = "lenient_kw")]
    pub dl_pwr: i64,

    #[serde(rename = "vol1", default, deserialize_with = "lenient_kw")]
    pub substation_capacity_kw: i64,
    #[serde(rename = "vol2", default, deserialize_with = "lenient_kw")]
    pub transformer_capacity_kw: i64,
    #[serde(rename = "vol3", default, deserialize_with = "lenient_kw")]
    pub line_capacity_kw: i64,
}

impl CapacityRecord {
    pub fn new(substation_kw: i64, transformer_kw: i64, line_kw: i64) -> Self {
        Self {
            substation_capacity_kw: substation_kw,
            transformer_capacity_kw: transformer_kw,
            line_capacity_kw: line_kw,
            ..Default::default()
        }
    }

    /// 三個層級中最小的剩餘容量（實際可併網容量）
    pub fn min_capacity(&self) -> i64 {
        self.substation_capacity_kw
            .min(self.transformer_capacity_kw)
            .min(self.line_capacity_kw)
    }

    pub fn is_connectable(&self) -> bool {
        self.min_capacity() > 0
    }
}

/// 將 "159,,000"、"13,000kW" 之類的字串整理成整數 kW，無法解析時回傳 0
pub fn clean_number(text: &str) -> i64 {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    digits.parse::<f64>().map(|v| v as i64).unwrap_or(0)
}

fn lenient_kw<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => clean_number(&s),
        _ => 0,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    PrimaryApi,
    FallbackScrape,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryApi => f.write_str("PRIMARY_API"),
            Self::FallbackScrape => f.write_str("FALLBACK_SCRAPE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityResult {
    pub records: Vec<CapacityRecord>,
    pub source: DataSource,
    /// 空結果時提供給使用者的說明
    pub notice: Option<String>,
}

impl CapacityResult {
    pub fn new(source: DataSource, records: Vec<CapacityRecord>) -> Self {
        Self {
            records,
            source,
            notice: None,
        }
    }

    pub fn empty(source: DataSource) -> Self {
        Self::new(source, Vec::new())
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn connectable_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_connectable()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighborhood_parse() {
        assert_eq!(Neighborhood::parse("ALL"), Neighborhood::All);
        assert_eq!(Neighborhood::parse("all"), Neighborhood::All);
        assert_eq!(Neighborhood::parse("전체"), Neighborhood::All);
        assert_eq!(Neighborhood::parse("  "), Neighborhood::All);
        assert_eq!(
            Neighborhood::parse(" 청운동 "),
            Neighborhood::Named("청운동".to_string())
        );
    }

    #[test]
    fn test_record_accepts_numbers_and_strings() {
        let json = serde_json::json!({
            "substNm": "종로",
            "dlNm": "효자",
            "vol1": "12,000",
            "vol2": 3500,
            "vol3": "0",
            "jsSubstPwr": 45000.0
        });
        let record: CapacityRecord = serde_json::from_value(json).unwrap();

        assert_eq!(record.subst_nm, "종로");
        assert_eq!(record.substation_capacity_kw, 12000);
        assert_eq!(record.transformer_capacity_kw, 3500);
        assert_eq!(record.line_capacity_kw, 0);
        assert_eq!(record.js_subst_pwr, 45000);
        assert_eq!(record.min_capacity(), 0);
        assert!(!record.is_connectable());
    }

    #[test]
    fn test_record_accepts_snake_case_and_nulls() {
        let json = serde_json::json!({
            "subst_nm": "불당",
            "dl_pwr": null,
            "vol1": "abc",
            "vol2": "1000kW",
            "vol3": 250
        });
        let record: CapacityRecord = serde_json::from_value(json).unwrap();

        assert_eq!(record.subst_nm, "불당");
        assert_eq!(record.dl_pwr, 0);
        assert_eq!(record.substation_capacity_kw, 0);
        assert_eq!(record.transformer_capacity_kw, 1000);
        assert_eq!(record.line_capacity_kw, 250);
    }

    #[test]
    fn test_clean_number() {
        assert_eq!(clean_number("159,,000"), 159000);
        assert_eq!(clean_number("13,000kW"), 13000);
        assert_eq!(clean_number(""), 0);
        assert_eq!(clean_number("1.9"), 1);
    }

    #[test]
    fn test_display_name() {
        let selection = RegionSelection::new("44", "44131", Neighborhood::parse("불당동"))
            .with_names("충청남도", "천안시 서북구");
        assert_eq!(selection.display_name(), "충청남도 천안시 서북구 불당동");

        let selection = RegionSelection::new("36", "36110", Neighborhood::All)
            .with_names("세종특별자치시", "세종특별자치시");
        assert_eq!(selection.display_name(), "세종특별자치시");
    }

    #[test]
    fn test_query_pairs_skip_missing_fields() {
        let params = CapacityQueryParams {
            metro_cd: "11".into(),
            city_cd: "110".into(),
            addr_lidong: None,
            addr_li: None,
            addr_jibun: None,
        };
        assert!(params.is_district_level());
        assert_eq!(params.query_pairs(), vec![("metroCd", "11"), ("cityCd", "110")]);
    }
}
