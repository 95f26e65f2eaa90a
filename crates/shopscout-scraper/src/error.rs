use thiserror::Error;

/// Why a navigation could not produce a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationFailureKind {
    /// Neither load strategy finished inside its budget.
    Timeout,
    /// The browser reported a network or protocol error for the URL.
    Unreachable,
}

impl std::fmt::Display for NavigationFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationFailureKind::Timeout => write!(f, "timeout"),
            NavigationFailureKind::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("no site descriptor registered for \"{site}\"")]
    ConfigurationMissing { site: String },

    #[error("navigation to {url} failed ({kind}): {detail}")]
    Navigation {
        url: String,
        kind: NavigationFailureKind,
        detail: String,
    },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("invalid search URL for {domain}: {reason}")]
    InvalidSearchUrl { domain: String, reason: String },

    #[error("invalid CSS selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid search request: {0}")]
    InvalidRequest(String),
}

impl ScraperError {
    pub(crate) fn navigation(
        url: &str,
        kind: NavigationFailureKind,
        detail: impl Into<String>,
    ) -> Self {
        ScraperError::Navigation {
            url: url.to_owned(),
            kind,
            detail: detail.into(),
        }
    }

    /// Returns `true` for failures that the slower load strategy may recover.
    #[must_use]
    pub fn is_navigation(&self) -> bool {
        matches!(self, ScraperError::Navigation { .. })
    }
}
