pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::http::BackendClient;
pub use config::AppConfig;
pub use core::{
    auth::AuthSession,
    cluster::{BBox, ClusterId, ClusterIndex, ClusterOptions, ClusterPoint},
    filter::{FilterState, FilteredListings, PAGE_SIZE},
    reviews::ReviewDesk,
    session::{MapSession, SearchSession},
    viewport::Viewport,
};
pub use domain::model::{HouseListing, Rating, Review};
pub use utils::error::{AtlasError, Result};
