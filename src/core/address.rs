use crate::core::{RegionSelection, Result};
use crate::domain::model::Neighborhood;
use crate::utils::error::KepcoError;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 6] = ["시도코드", "시도명", "시군구코드", "시군구명", "읍면동명", "말소일자"];

/// 법정동코드 表中的一列
#[derive(Debug, Clone, Deserialize)]
pub struct AddressRow {
    #[serde(rename = "시도코드")]
    pub province_code: String,
    #[serde(rename = "시도명")]
    pub province_name: String,
    #[serde(rename = "시군구코드")]
    pub district_code: String,
    #[serde(rename = "시군구명", default)]
    pub district_name: String,
    #[serde(rename = "법정동코드", default)]
    pub legal_code: String,
    #[serde(rename = "읍면동명", default)]
    pub neighborhood_name: String,
    #[serde(rename = "동리명", default)]
    pub ri_name: String,
    #[serde(rename = "말소일자", default)]
    pub abolished_on: String,
}

/// 啟動時載入一次的法定洞代碼參考表（唯讀）
#[derive(Debug, Clone)]
pub struct AddressBook {
    rows: Vec<AddressRow>,
}

fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "전체")
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl AddressBook {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| KepcoError::AddressData {
            message: format!("cannot read address table '{}': {}", path.display(), e),
        })?;
        let book = Self::from_csv_str(&content)?;
        tracing::info!("🗺️ Loaded {} active address rows from {}", book.len(), path.display());
        Ok(book)
    }

    pub fn from_csv_str(content: &str) -> Result<Self> {
        let content = content.trim_start_matches('\u{feff}');
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(KepcoError::AddressData {
                    message: format!("address table is missing column '{}'", column),
                });
            }
        }

        let mut rows = Vec::new();
        for row in reader.deserialize::<AddressRow>() {
            let mut row = row?;
            // 말소일자가 있으면 폐지된 법정동
            if !row.abolished_on.is_empty() {
                continue;
            }
            row.province_code = format!("{:0>2}", row.province_code);
            row.district_code = format!("{:0>5}", row.district_code);
            rows.push(row);
        }

        Ok(Self::from_rows(rows))
    }

    pub fn from_rows(rows: Vec<AddressRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn provinces(&self) -> Vec<String> {
        sorted_unique(self.rows.iter().map(|r| r.province_name.as_str()))
    }

    /// 沒有市郡區的廣域自治體（세종 等）以道名本身作為唯一的市郡區
    pub fn districts(&self, province: &str) -> Vec<String> {
        let has_province = self.rows.iter().any(|r| r.province_name == province);
        let districts = sorted_unique(
            self.rows
                .iter()
                .filter(|r| r.province_name == province)
                .map(|r| r.district_name.as_str()),
        );
        if districts.is_empty() && has_province {
            vec![province.to_string()]
        } else {
            districts
        }
    }

    fn district_rows<'a>(
        &'a self,
        province: &'a str,
        district: &'a str,
    ) -> impl Iterator<Item = &'a AddressRow> + 'a {
        let self_governing = province == district;
        self.rows.iter().filter(move |r| {
            r.province_name == province
                && if self_governing {
                    r.district_name.is_empty()
                } else {
                    r.district_name == district
                }
        })
    }

    pub fn neighborhoods(&self, province: &str, district: &str) -> Vec<String> {
        sorted_unique(
            self.district_rows(province, district)
                .map(|r| r.neighborhood_name.as_str()),
        )
    }

    /// 邑、面底下的里清單，都市的洞通常沒有里
    pub fn ris(&self, province: &str, district: &str, neighborhood: &str) -> Vec<String> {
        if Neighborhood::parse(neighborhood).is_all() {
            return Vec::new();
        }
        sorted_unique(
            self.district_rows(province, district)
                .filter(|r| r.neighborhood_name == neighborhood)
                .map(|r| r.ri_name.as_str()),
        )
    }

    /// 以名稱解析出帶代碼的地區選擇
    pub fn resolve(
        &self,
        province: &str,
        district: &str,
        neighborhood: &str,
        ri: Option<&str>,
        jibun: Option<&str>,
    ) -> Result<RegionSelection> {
        let province = province.trim();
        let district = district.trim();
        let self_governing = province == district;

        let matched = self
            .district_rows(province, district)
            .find(|r| !self_governing || r.district_code.ends_with("110"))
            .ok_or_else(|| KepcoError::AddressData {
                message: format!("'{} {}'에 해당하는 법정동코드를 찾을 수 없습니다.", province, district),
            })?;

        let neighborhood = Neighborhood::parse(neighborhood);
        if let Some(name) = neighborhood.name() {
            let known = self
                .district_rows(province, district)
                .any(|r| r.neighborhood_name == name);
            if !known {
                return Err(KepcoError::AddressData {
                    message: format!("'{} {}'에 '{}'이(가) 없습니다.", province, district, name),
                });
            }
        }

        let mut selection = RegionSelection::new(
            matched.province_code.clone(),
            matched.district_code.clone(),
            neighborhood,
        )
        .with_names(province, district);

        if !selection.is_all() {
            if let Some(ri) = ri.map(str::trim).filter(|r| !r.is_empty() && *r != "전체") {
                selection = selection.with_ri(ri);
            }
        }
        if let Some(jibun) = jibun.map(str::trim).filter(|j| !j.is_empty()) {
            selection = selection.with_jibun(jibun);
        }

        tracing::debug!(
            "🗺️ Resolved {} -> {}/{}",
            selection.display_name(),
            selection.province_code,
            selection.district_code
        );
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\u{feff}시도코드,시도명,시군구코드,시군구명,법정동코드,읍면동명,동리명,생성일자,말소일자
11,서울특별시,11000,,1100000000,,,1988-04-23,
11,서울특별시,11110,종로구,1111010100,청운동,,1988-04-23,
11,서울특별시,11110,종로구,1111010200,신교동,,1988-04-23,
11,서울특별시,11140,중구,1114010300,소공동,,1988-04-23,
11,서울특별시,11140,중구,1114099999,폐지동,,1988-04-23,2010-01-01
36,세종특별자치시,36000,,3600000000,,,2012-07-01,
36,세종특별자치시,36110,,3611025000,조치원읍,,2012-07-01,
36,세종특별자치시,36110,,3611025021,조치원읍,신흥리,2012-07-01,
44,충청남도,44133,천안시 서북구,4413325000,성환읍,,2008-06-02,
44,충청남도,44133,천안시 서북구,4413325021,성환읍,매주리,2008-06-02,
44,충청남도,44133,천안시 서북구,4413325022,성환읍,성월리,2008-06-02,
44,충청남도,44133,천안시 서북구,4413310900,불당동,,2008-06-02,
";

    fn book() -> AddressBook {
        AddressBook::from_csv_str(TABLE).unwrap()
    }

    #[test]
    fn test_abolished_rows_are_dropped() {
        let book = book();
        assert_eq!(book.len(), 11);
        assert_eq!(book.neighborhoods("서울특별시", "중구"), vec!["소공동"]);
    }

    #[test]
    fn test_region_lists() {
        let book = book();
        assert_eq!(book.provinces(), vec!["서울특별시", "세종특별자치시", "충청남도"]);
        assert_eq!(book.districts("서울특별시"), vec!["종로구", "중구"]);
        assert_eq!(book.districts("세종특별자치시"), vec!["세종특별자치시"]);
        assert!(book.districts("없는도").is_empty());
        assert_eq!(book.neighborhoods("서울특별시", "종로구"), vec!["신교동", "청운동"]);
        assert_eq!(book.neighborhoods("세종특별자치시", "세종특별자치시"), vec!["조치원읍"]);
    }

    #[test]
    fn test_ri_list() {
        let book = book();
        assert_eq!(book.ris("충청남도", "천안시 서북구", "성환읍"), vec!["매주리", "성월리"]);
        assert!(book.ris("충청남도", "천안시 서북구", "불당동").is_empty());
        assert!(book.ris("충청남도", "천안시 서북구", "전체").is_empty());
    }

    #[test]
    fn test_resolve_named_neighborhood() {
        let selection = book()
            .resolve("서울특별시", "종로구", "청운동", None, None)
            .unwrap();

        assert_eq!(selection.province_code, "11");
        assert_eq!(selection.district_code, "11110");
        assert_eq!(selection.neighborhood, Neighborhood::Named("청운동".into()));
        assert_eq!(selection.province_name.as_deref(), Some("서울특별시"));
        assert_eq!(selection.district_name.as_deref(), Some("종로구"));
    }

    #[test]
    fn test_resolve_self_governing_city_uses_110_code() {
        let selection = book()
            .resolve("세종특별자치시", "세종특별자치시", "전체", Some("신흥리"), None)
            .unwrap();

        assert_eq!(selection.district_code, "36110");
        assert!(selection.is_all());
        assert_eq!(selection.ri, None);
    }

    #[test]
    fn test_resolve_keeps_ri_and_jibun() {
        let selection = book()
            .resolve("충청남도", "천안시 서북구", "성환읍", Some("매주리"), Some("142-1"))
            .unwrap();

        assert_eq!(selection.district_code, "44133");
        assert_eq!(selection.ri.as_deref(), Some("매주리"));
        assert_eq!(selection.jibun.as_deref(), Some("142-1"));
    }

    #[test]
    fn test_resolve_unknown_region() {
        let book = book();
        assert!(matches!(
            book.resolve("서울특별시", "없는구", "ALL", None, None),
            Err(KepcoError::AddressData { .. })
        ));
        assert!(matches!(
            book.resolve("서울특별시", "종로구", "없는동", None, None),
            Err(KepcoError::AddressData { .. })
        ));
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let err = AddressBook::from_csv_str("시도코드,시도명\n11,서울특별시\n").unwrap_err();
        assert!(matches!(err, KepcoError::AddressData { .. }));
    }
}
