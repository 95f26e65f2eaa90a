//! Page-to-page traversal for one store scrape.
//!
//! [`PaginationWalker`] starts `Active` on page 1. After each rendered page
//! the caller hands it the snapshot; the walker either moves its cursor to
//! the next page or halts in `Exhausted` with the reason it stopped.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use shopscout_core::PaginationRules;

use crate::browser::PageSnapshot;
use crate::error::ScraperError;
use crate::extract::CompiledRule;
use crate::urls::resolve_url;

/// Upper bound on pages visited per store, whatever the descriptor or the
/// caller asks for.
pub const HARD_PAGE_CAP: u32 = 50;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Position of the walker inside one store's result pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub url: String,
    /// 1-based.
    pub page_index: u32,
    /// Total page count, once a page has exposed one.
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedReason {
    PaginationDisabled,
    PageBudgetReached,
    TotalPagesReached,
    NoNextLink,
    /// The next link points at a page already visited.
    Cycle,
}

impl std::fmt::Display for ExhaustedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ExhaustedReason::PaginationDisabled => "pagination disabled",
            ExhaustedReason::PageBudgetReached => "page budget reached",
            ExhaustedReason::TotalPagesReached => "total pages reached",
            ExhaustedReason::NoNextLink => "no next link",
            ExhaustedReason::Cycle => "next link revisits a page",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerState {
    Active,
    Exhausted(ExhaustedReason),
}

#[derive(Debug)]
pub struct PaginationWalker<'a> {
    rules: &'a PaginationRules,
    budget: u32,
    cursor: PageCursor,
    state: WalkerState,
    visited: HashSet<String>,
}

impl<'a> PaginationWalker<'a> {
    /// Creates a walker positioned on page 1 at `start_url`.
    ///
    /// `max_pages_override` replaces the descriptor's page budget when
    /// present. Either way the budget is clamped to `1..=HARD_PAGE_CAP`, and
    /// a descriptor with pagination disabled always gets a budget of one.
    #[must_use]
    pub fn new(rules: &'a PaginationRules, start_url: &str, max_pages_override: Option<u32>) -> Self {
        let budget = if rules.enabled {
            max_pages_override
                .unwrap_or(rules.max_pages)
                .clamp(1, HARD_PAGE_CAP)
        } else {
            1
        };

        Self {
            rules,
            budget,
            cursor: PageCursor {
                url: start_url.to_owned(),
                page_index: 1,
                total_pages: None,
            },
            state: WalkerState::Active,
            visited: HashSet::from([start_url.to_owned()]),
        }
    }

    #[must_use]
    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    #[must_use]
    pub fn state(&self) -> WalkerState {
        self.state
    }

    /// Maximum number of pages this walker will visit.
    #[must_use]
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Decides, from the page just rendered at the cursor, whether another
    /// page should be fetched.
    ///
    /// On `Active` the cursor holds the next page's absolute URL and
    /// incremented index. Once `Exhausted`, further calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSelector`] if a pagination selector does
    /// not compile.
    pub fn advance(&mut self, snapshot: &PageSnapshot) -> Result<WalkerState, ScraperError> {
        if let WalkerState::Exhausted(_) = self.state {
            return Ok(self.state);
        }
        self.visited.insert(snapshot.final_url.clone());

        let next = self.next_page_url(snapshot)?;
        self.state = match next {
            Ok(url) => {
                self.visited.insert(url.clone());
                self.cursor.url = url;
                self.cursor.page_index += 1;
                WalkerState::Active
            }
            Err(reason) => WalkerState::Exhausted(reason),
        };
        Ok(self.state)
    }

    fn next_page_url(
        &mut self,
        snapshot: &PageSnapshot,
    ) -> Result<Result<String, ExhaustedReason>, ScraperError> {
        if !self.rules.enabled {
            return Ok(Err(ExhaustedReason::PaginationDisabled));
        }
        if self.cursor.page_index >= self.budget {
            return Ok(Err(ExhaustedReason::PageBudgetReached));
        }

        let document = Html::parse_document(&snapshot.html);
        let root = document.root_element();

        if let Some(rule) = &self.rules.total_pages {
            if let Some(total) = CompiledRule::compile(rule)?
                .read(root)
                .as_deref()
                .and_then(parse_total_pages)
            {
                self.cursor.total_pages = Some(total);
            }
        }
        if let Some(total) = self.cursor.total_pages {
            if self.cursor.page_index >= total {
                return Ok(Err(ExhaustedReason::TotalPagesReached));
            }
        }

        let Some(rule) = &self.rules.next else {
            return Ok(Err(ExhaustedReason::NoNextLink));
        };
        let next = CompiledRule::compile(rule)?
            .read(root)
            .and_then(|href| resolve_url(&snapshot.final_url, &href));

        Ok(match next {
            None => Err(ExhaustedReason::NoNextLink),
            Some(url) if self.visited.contains(&url) => Err(ExhaustedReason::Cycle),
            Some(url) => Ok(url),
        })
    }
}

/// Reads a total page count from text like `"5"` or `"Page 1 of 5"`: the last
/// number in the text wins.
fn parse_total_pages(text: &str) -> Option<u32> {
    DIGITS
        .find_iter(text)
        .last()
        .and_then(|m| m.as_str().parse().ok())
        .filter(|total| *total > 0)
}
