//! Rendering listing pages through a browser.
//!
//! [`PageFetcher`] is the seam the rest of the crate depends on;
//! [`ChromiumFetcher`] is the production implementation.

mod chromium;

use async_trait::async_trait;
use shopscout_core::RenderRules;

use crate::error::ScraperError;

pub use chromium::{find_chromium, ChromiumFetcher, ChromiumSettings};

/// Which load signal ends a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// The document has been parsed (`readyState` past `loading`).
    DomContentLoaded,
    /// The load event fired and resource requests stopped arriving.
    NetworkIdle,
}

impl WaitStrategy {
    /// The slower strategy to try once when this one fails.
    #[must_use]
    pub fn fallback(self) -> Option<WaitStrategy> {
        match self {
            WaitStrategy::DomContentLoaded => Some(WaitStrategy::NetworkIdle),
            WaitStrategy::NetworkIdle => None,
        }
    }
}

impl std::fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitStrategy::DomContentLoaded => write!(f, "domcontentloaded"),
            WaitStrategy::NetworkIdle => write!(f, "networkidle"),
        }
    }
}

/// Per-fetch rendering instructions, derived from a descriptor's render rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub wait_strategy: WaitStrategy,
    /// Selectors awaited independently after navigation. A selector that
    /// never appears is logged and skipped.
    pub explicit_selectors: Vec<String>,
    pub scroll_to_bottom: bool,
    /// Budget for each explicit-selector wait.
    pub max_wait_ms: u64,
}

impl RenderOptions {
    #[must_use]
    pub fn from_rules(rules: &RenderRules) -> Self {
        Self {
            wait_strategy: WaitStrategy::DomContentLoaded,
            explicit_selectors: rules.wait_for.clone(),
            scroll_to_bottom: rules.scroll_to_bottom,
            max_wait_ms: rules.max_wait_ms,
        }
    }
}

/// A rendered page: serialized DOM plus the URL the browser ended up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub html: String,
    /// URL after redirects; relative pagination links resolve against it.
    pub final_url: String,
}

/// Renders one URL into a [`PageSnapshot`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ScraperError::Navigation`] when the page cannot be loaded
    /// with any load strategy, or [`ScraperError::Browser`] when the browser
    /// itself fails.
    async fn fetch(&self, url: &str, options: &RenderOptions)
        -> Result<PageSnapshot, ScraperError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dom_content_loaded_falls_back_to_network_idle_once() {
        assert_eq!(
            WaitStrategy::DomContentLoaded.fallback(),
            Some(WaitStrategy::NetworkIdle)
        );
        assert_eq!(WaitStrategy::NetworkIdle.fallback(), None);
    }

    #[test]
    fn render_options_copy_descriptor_rules() {
        let rules = RenderRules {
            wait_for: vec![".grid".into(), ".price".into()],
            scroll_to_bottom: true,
            max_wait_ms: 4_000,
        };
        let options = RenderOptions::from_rules(&rules);
        assert_eq!(options.wait_strategy, WaitStrategy::DomContentLoaded);
        assert_eq!(options.explicit_selectors, rules.wait_for);
        assert!(options.scroll_to_bottom);
        assert_eq!(options.max_wait_ms, 4_000);
    }
}
