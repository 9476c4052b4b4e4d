use anyhow::Context;
use clap::Parser;
use kepco_capacity::core::history::CapacityStats;
use kepco_capacity::core::{loader, params::to_query_params};
use kepco_capacity::utils::error::ErrorSeverity;
use kepco_capacity::utils::{logger, validation::Validate};
use kepco_capacity::{
    AddressBook, AppConfig, CapacityLookup, CapacityRecord, CapacityResult, Cli, Command, DataSource,
    HistoryRepository, KepcoApiClient, KepcoError, KepcoOnlineClient, LocalStorage,
    QueryHistoryRecord, TtlCache,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting kepco-capacity");

    // 載入並驗證配置
    let config = match cli.load_config().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            exit_with(&e);
        }
    };
    if cli.verbose {
        tracing::debug!(
            "Config: api={}, online={} ({}), scope={:?}, cache_ttl={:?}",
            config.kepco_api.base_url,
            config.online.enabled,
            config.online.page_url,
            config.fallback.scope,
            config.cache_ttl()
        );
    }

    if let Err(err) = run(cli.command, &config).await {
        match err.downcast_ref::<KepcoError>() {
            Some(e) => {
                tracing::error!(
                    "❌ {:#} (Category: {:?}, Severity: {:?})",
                    err,
                    e.category(),
                    e.severity()
                );
                exit_with(e);
            }
            None => {
                tracing::error!("❌ {:#}", err);
                eprintln!("❌ {:#}", err);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// 根據錯誤嚴重程度決定退出碼
fn exit_with(e: &KepcoError) -> ! {
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

async fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Regions {
            province,
            district,
            neighborhood,
        } => {
            let book = load_address_book(config)?;
            let items = match (province.as_deref(), district.as_deref(), neighborhood.as_deref()) {
                (None, _, _) => book.provinces(),
                (Some(p), None, _) => book.districts(p),
                (Some(p), Some(d), None) => book.neighborhoods(p, d),
                (Some(p), Some(d), Some(n)) => book.ris(p, d, n),
            };

            if items.is_empty() {
                println!("해당하는 지역이 없습니다.");
            }
            for item in items {
                println!("{}", item);
            }
        }

        Command::Lookup {
            province,
            district,
            neighborhood,
            ri,
            jibun,
            no_history,
        } => {
            let book = load_address_book(config)?;
            let selection =
                book.resolve(&province, &district, &neighborhood, ri.as_deref(), jibun.as_deref())?;
            let params = to_query_params(&selection)?;

            let api = KepcoApiClient::new(&config.kepco_api)?;
            let fallback = if config.online.enabled {
                Some(KepcoOnlineClient::new(&config.online)?)
            } else {
                tracing::info!("⏭️ KEPCO ON fallback disabled");
                None
            };

            let lookup = CapacityLookup::new(api, fallback, Arc::new(TtlCache::new(config.cache_ttl())))
                .with_retry(config.retry_policy())
                .with_scope(config.fallback.scope);

            let result = lookup.lookup(&selection).await?;
            print_result(&selection.display_name(), &result);

            if config.history.enabled && !no_history {
                let repo = HistoryRepository::new(LocalStorage::new(config.history.dir.as_str()));
                let record = QueryHistoryRecord::from_result(&selection, &params, &result);
                if let Err(e) = repo.save(record).await {
                    tracing::warn!("⚠️ Failed to save query history: {}", e);
                }
            }
        }

        Command::History { limit, delete } => {
            let repo = HistoryRepository::new(LocalStorage::new(config.history.dir.as_str()));

            if let Some(id) = delete {
                if repo.delete(id).await? {
                    println!("🗑️ #{} 삭제됨", id);
                } else {
                    println!("#{} 기록이 없습니다.", id);
                }
                return Ok(());
            }

            let records = repo.list_recent(limit).await?;
            if records.is_empty() {
                println!("조회 이력이 없습니다.");
            }
            for record in records {
                println!(
                    "#{:<4} {}  {}  [{}] {}건 (가능 {} / 불가 {})",
                    record.id,
                    record.queried_at.format("%Y-%m-%d %H:%M:%S"),
                    record.region_name,
                    source_label(record.source),
                    record.result_count,
                    record.connectable_count,
                    record.not_connectable_count
                );
            }
        }

        Command::Inspect { file } => {
            let records = loader::load_records_from_file(&file)
                .with_context(|| format!("failed to inspect {}", file.display()))?;
            let result = CapacityResult::new(DataSource::FallbackScrape, records);
            let stats = CapacityStats::from_result(&result);

            println!("📂 {}: {}건", file.display(), result.len());
            println!(
                "   가능 {} / 불가 {}",
                result.connectable_count(),
                result.len() - result.connectable_count()
            );
            if !result.is_empty() {
                println!(
                    "   여유용량(kW) 최소 {} / 중앙값 {} / 최대 {}",
                    stats.min_kw, stats.median_kw, stats.max_kw
                );
            }
        }
    }

    Ok(())
}

fn load_address_book(config: &AppConfig) -> anyhow::Result<AddressBook> {
    let path = &config.address.code_table_path;
    let book = AddressBook::from_path(path)
        .with_context(|| format!("address table '{}' could not be loaded", path))?;
    Ok(book)
}

fn source_label(source: DataSource) -> &'static str {
    match source {
        DataSource::PrimaryApi => "한전 OpenAPI",
        DataSource::FallbackScrape => "한전ON",
    }
}

fn format_record(record: &CapacityRecord) -> String {
    let status = if record.is_connectable() { "가능" } else { "불가" };
    format!(
        "{} / {} / {}  변전소 {} kW, 변압기 {} kW, DL {} kW  [{}]",
        display_or_dash(&record.subst_nm),
        display_or_dash(&record.mtr_no),
        display_or_dash(&record.dl_nm),
        record.substation_capacity_kw,
        record.transformer_capacity_kw,
        record.line_capacity_kw,
        status
    )
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn print_result(region: &str, result: &CapacityResult) {
    println!("📍 {} [{}]: {}건", region, source_label(result.source), result.len());

    if result.is_empty() {
        println!(
            "   {}",
            result.notice.as_deref().unwrap_or("조회 가능한 데이터가 없습니다.")
        );
        return;
    }

    if let Some(notice) = &result.notice {
        println!("   ℹ️ {}", notice);
    }
    for record in &result.records {
        println!("   {}", format_record(record));
    }
    println!(
        "   가능 {} / 불가 {}",
        result.connectable_count(),
        result.len() - result.connectable_count()
    );
}
