pub mod app_config;
pub mod cli;

pub use app_config::AppConfig;

#[cfg(feature = "cli")]
pub use args::{Cli, Command};

#[cfg(feature = "cli")]
mod args {
    use super::AppConfig;
    use crate::utils::error::Result;
    use clap::{Parser, Subcommand};
    use std::path::PathBuf;

    #[derive(Debug, Parser)]
    #[command(name = "kepco-capacity")]
    #[command(about = "한전 배전선로 여유용량 조회 도구")]
    pub struct Cli {
        /// Path to TOML configuration file (environment variables are used when omitted)
        #[arg(short, long, global = true)]
        pub config: Option<PathBuf>,

        /// Enable verbose output
        #[arg(short, long, global = true)]
        pub verbose: bool,

        /// Emit logs as JSON lines
        #[arg(long, global = true)]
        pub json_logs: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Subcommand)]
    pub enum Command {
        /// List provinces, or the districts / neighborhoods / ri below a selection
        Regions {
            province: Option<String>,
            district: Option<String>,
            neighborhood: Option<String>,
        },
        /// Look up spare capacity for a region
        Lookup {
            province: String,
            district: String,
            /// Neighborhood name, or ALL for the whole district
            #[arg(default_value = "ALL")]
            neighborhood: String,
            #[arg(long)]
            ri: Option<String>,
            #[arg(long)]
            jibun: Option<String>,
            /// Do not record this query in the history
            #[arg(long)]
            no_history: bool,
        },
        /// Show recent queries
        History {
            #[arg(long, default_value_t = 10)]
            limit: usize,
            /// Delete a history entry by id
            #[arg(long)]
            delete: Option<u64>,
        },
        /// Summarise a capacity file downloaded from KEPCO ON (CSV, JSON or Excel)
        Inspect { file: PathBuf },
    }

    impl Cli {
        /// TOML 檔 (若有指定) 之後再套用環境變數覆寫
        pub fn load_config(&self) -> Result<AppConfig> {
            match &self.config {
                Some(path) => {
                    tracing::info!("📁 Loading configuration from: {}", path.display());
                    let mut config = AppConfig::from_file(path)?;
                    config.apply_env()?;
                    Ok(config)
                }
                None => AppConfig::from_env(),
            }
        }
    }

}
