use anyhow::Result;
use kepco_capacity::core::history::QueryHistoryRecord;
use kepco_capacity::core::loader::load_records_from_file;
use kepco_capacity::core::params::to_query_params;
use kepco_capacity::{
    AddressBook, AppConfig, CapacityResult, DataSource, HistoryRepository, LocalStorage,
};
use tempfile::TempDir;

/// 韓電ON 下載檔 → 統計 → 寫入查詢紀錄
#[tokio::test]
async fn test_inspect_file_and_record_history() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let codes_path = temp_dir.path().join("codes.csv");
    tokio::fs::write(
        &codes_path,
        "\u{feff}시도코드,시도명,시군구코드,시군구명,법정동코드,읍면동명,동리명,생성일자,말소일자\n\
         44,충청남도,44131,천안시 동남구,4413134000,풍세면,,2008-06-02,\n\
         44,충청남도,44131,천안시 동남구,4413134021,풍세면,풍서리,2008-06-02,\n",
    )
    .await?;

    let download_path = temp_dir.path().join("download.csv");
    tokio::fs::write(
        &download_path,
        "변전소명,변압기번호,DL명,변전소여유(kW),변압기여유(kW),DL여유(kW)\n\
         풍세,#1,공원,35000,18000,4100\n\
         풍세,#2,풍서,35000,0,2000\n\
         풍세,#2,남관,35000,0,\n",
    )
    .await?;

    let config_path = temp_dir.path().join("kepco.toml");
    tokio::fs::write(
        &config_path,
        format!(
            "[address]\ncode_table_path = \"{}\"\n\n[history]\ndir = \"{}\"\n",
            codes_path.to_string_lossy().replace('\\', "/"),
            temp_dir.path().join("history").to_string_lossy().replace('\\', "/")
        ),
    )
    .await?;
    let config = AppConfig::from_file(&config_path)?;

    let book = AddressBook::from_path(&config.address.code_table_path)?;
    let selection = book.resolve("충청남도", "천안시 동남구", "풍세면", Some("풍서리"), None)?;
    let params = to_query_params(&selection)?;
    assert_eq!(params.city_cd, "131");
    assert_eq!(params.addr_li.as_deref(), Some("풍서리"));

    let records = load_records_from_file(&download_path)?;
    let result = CapacityResult::new(DataSource::FallbackScrape, records);
    assert_eq!(result.len(), 3);
    assert_eq!(result.connectable_count(), 1);

    let repo = HistoryRepository::new(LocalStorage::new(config.history.dir.as_str()));
    let id = repo
        .save(QueryHistoryRecord::from_result(&selection, &params, &result))
        .await?;

    let recent = repo.list_recent(5).await?;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, id);
    assert_eq!(recent[0].region_name, "충청남도 천안시 동남구 풍세면 풍서리");
    assert_eq!(recent[0].source, DataSource::FallbackScrape);
    assert_eq!(recent[0].not_connectable_count, 2);
    assert_eq!(recent[0].stats.max_kw, 4100);

    assert!(temp_dir.path().join("history").join("history.json").exists());

    Ok(())
}
