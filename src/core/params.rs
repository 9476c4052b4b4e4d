use crate::core::{CapacityQueryParams, RegionSelection, Result};
use crate::utils::error::KepcoError;

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 將地區選擇轉為韓電 API 參數
///
/// - metroCd = 市郡區代碼前 2 碼
/// - cityCd  = 市郡區代碼後 3 碼
/// - 選擇「全部」時省略 addrLidong / addrLi / addrJibun，以市郡區層級查詢
pub fn to_query_params(selection: &RegionSelection) -> Result<CapacityQueryParams> {
    let province = selection.province_code.trim();
    let district = selection.district_code.trim();

    if !is_digits(province, 2) {
        return Err(KepcoError::invalid_region(format!(
            "province code must be 2 digits, got '{}'",
            selection.province_code
        )));
    }

    if !is_digits(district, 5) {
        return Err(KepcoError::invalid_region(format!(
            "district code must be 5 digits, got '{}'",
            selection.district_code
        )));
    }

    if &district[..2] != province {
        return Err(KepcoError::invalid_region(format!(
            "district code '{}' does not belong to province '{}'",
            district, province
        )));
    }

    let metro_cd = district[..2].to_string();
    let city_cd = district[2..].to_string();

    let params = match selection.neighborhood.name() {
        None => CapacityQueryParams {
            metro_cd,
            city_cd,
            addr_lidong: None,
            addr_li: None,
            addr_jibun: None,
        },
        Some(name) => {
            let dong = non_blank(Some(name)).ok_or_else(|| {
                KepcoError::invalid_region("neighborhood name cannot be blank")
            })?;
            CapacityQueryParams {
                metro_cd,
                city_cd,
                addr_lidong: Some(dong),
                addr_li: non_blank(selection.ri.as_deref()),
                addr_jibun: non_blank(selection.jibun.as_deref()),
            }
        }
    };

    tracing::debug!(
        "🧭 Mapped {} -> metroCd={}, cityCd={}, district_level={}",
        selection.display_name(),
        params.metro_cd,
        params.city_cd,
        params.is_district_level()
    );

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Neighborhood;

    #[test]
    fn test_named_neighborhood_example() {
        let selection = RegionSelection::new("11", "11140", Neighborhood::parse("청운동"));
        let params = to_query_params(&selection).unwrap();

        assert_eq!(params.metro_cd, "11");
        assert_eq!(params.city_cd, "140");
        assert_eq!(params.addr_lidong.as_deref(), Some("청운동"));
        assert_eq!(params.addr_li, None);
        assert_eq!(params.addr_jibun, None);
    }

    #[test]
    fn test_all_omits_neighborhood_fields() {
        let selection = RegionSelection::new("11", "11140", Neighborhood::All)
            .with_ri("무시")
            .with_jibun("12-3");
        let params = to_query_params(&selection).unwrap();

        assert!(params.is_district_level());
        assert_eq!(params.addr_lidong, None);
        assert_eq!(params.addr_li, None);
        assert_eq!(params.addr_jibun, None);
    }

    #[test]
    fn test_ri_and_jibun_pass_through() {
        let selection = RegionSelection::new("44", "44131", Neighborhood::parse("성환읍"))
            .with_ri("매주리")
            .with_jibun(" 142-1 ");
        let params = to_query_params(&selection).unwrap();

        assert_eq!(params.city_cd, "131");
        assert_eq!(params.addr_li.as_deref(), Some("매주리"));
        assert_eq!(params.addr_jibun.as_deref(), Some("142-1"));
    }

    #[test]
    fn test_blank_detail_is_omitted() {
        let selection = RegionSelection::new("44", "44131", Neighborhood::parse("불당동"))
            .with_ri("  ")
            .with_jibun("");
        let params = to_query_params(&selection).unwrap();

        assert_eq!(params.addr_li, None);
        assert_eq!(params.addr_jibun, None);
    }

    #[test]
    fn test_codes_split_for_every_valid_pair() {
        for (province, district) in [("11", "11110"), ("26", "26440"), ("36", "36110"), ("50", "50130")] {
            let selection = RegionSelection::new(province, district, Neighborhood::All);
            let params = to_query_params(&selection).unwrap();
            assert_eq!(params.metro_cd, &district[..2]);
            assert_eq!(params.city_cd, &district[2..5]);
        }
    }

    #[test]
    fn test_invalid_regions_are_rejected() {
        let cases = [
            RegionSelection::new("11", "1114", Neighborhood::All),
            RegionSelection::new("11", "111400", Neighborhood::All),
            RegionSelection::new("11", "26140", Neighborhood::All),
            RegionSelection::new("1", "11140", Neighborhood::All),
            RegionSelection::new("11", "11a40", Neighborhood::All),
            RegionSelection::new("11", "11140", Neighborhood::Named("   ".into())),
        ];

        for selection in cases {
            let err = to_query_params(&selection).unwrap_err();
            assert!(
                matches!(err, KepcoError::InvalidRegion { .. }),
                "unexpected error for {:?}: {}",
                selection,
                err
            );
        }
    }
}
