//! Shared types for the shopscout workspace: environment configuration,
//! per-site descriptors, and the serializable search results.

pub mod app_config;
pub mod config;
pub mod descriptors;
pub mod listings;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use descriptors::{
    load_descriptors, parse_descriptors, DescriptorRegistry, DescriptorSource, FieldExtraction,
    FieldRule, ListingFields, ListingRules, PaginationRules, RenderRules, SiteDescriptor,
};
pub use listings::{FilterStatus, FleetSearchResult, NormalizedRecord, StoreScrapeOutcome};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sites file {path}: {source}")]
    SitesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sites file: {0}")]
    SitesFileParse(#[source] serde_yaml::Error),

    #[error("invalid site descriptor: {0}")]
    Validation(String),
}
