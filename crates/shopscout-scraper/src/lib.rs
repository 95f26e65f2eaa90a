//! Rendering, extraction, pagination, and fan-out for product searches
//! across configured sites.
//!
//! Leaves first: [`browser`] renders a URL into a [`PageSnapshot`],
//! [`extract`] turns a snapshot into raw records, [`pagination`] decides
//! whether another page exists, [`store`] drives those three for one site,
//! and [`fleet`] runs one store scrape per site concurrently.

pub mod browser;
pub mod error;
pub mod extract;
pub mod fleet;
pub mod normalize;
pub mod pagination;
pub mod parse;
pub mod relevance;
pub mod store;
pub mod urls;

mod navigation;

#[cfg(test)]
mod test_support;

pub use browser::{
    ChromiumFetcher, ChromiumSettings, PageFetcher, PageSnapshot, RenderOptions, WaitStrategy,
};
pub use error::{NavigationFailureKind, ScraperError};
pub use extract::{extract_listings, Extraction, ExtractionStats, RawRecord};
pub use fleet::{FleetSearch, SearchRequest};
pub use normalize::normalize_records;
pub use pagination::{ExhaustedReason, PageCursor, PaginationWalker, WalkerState};
pub use relevance::{
    FilteredRecords, HttpRelevanceClient, RelevanceError, RelevanceFilter, SiteRecords,
};
pub use store::{ScrapeSettings, StoreScraper};
