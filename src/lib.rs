pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
pub use config::AppConfig;

#[cfg(feature = "cli")]
pub use config::{Cli, Command};

pub use core::address::AddressBook;
pub use core::cache::TtlCache;
pub use core::history::{HistoryRepository, QueryHistoryRecord};
pub use core::kepco_api::KepcoApiClient;
pub use core::kepco_online::KepcoOnlineClient;
pub use core::lookup::{CapacityLookup, FallbackScope, RetryPolicy};
pub use domain::model::{CapacityRecord, CapacityResult, DataSource, Neighborhood, RegionSelection};
pub use utils::error::{KepcoError, Result};
