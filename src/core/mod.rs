pub mod address;
pub mod cache;
pub mod history;
pub mod kepco_api;
pub mod kepco_online;
pub mod loader;
pub mod lookup;
pub mod params;

pub use crate::domain::model::{
    CapacityQueryParams, CapacityRecord, CapacityResult, DataSource, Neighborhood, RegionSelection,
};
pub use crate::domain::ports::{CapacityApi, FallbackSource, Storage};
pub use crate::utils::error::Result;
