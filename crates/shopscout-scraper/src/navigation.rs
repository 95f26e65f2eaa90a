//! Browser-independent pieces of page loading: the two-tier load fallback,
//! bounded polling, and the lazy-load scroll loop.
//!
//! Kept generic over closures so the control flow can be exercised without
//! a browser.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::browser::WaitStrategy;
use crate::error::{NavigationFailureKind, ScraperError};

/// Runs `attempt` with `initial`, and on failure once more with the slower
/// fallback strategy. Each attempt gets its own `budget`.
///
/// Returns the strategy that succeeded.
///
/// # Errors
///
/// Returns the fallback attempt's error when both tiers fail, or the first
/// error unchanged when it is not a navigation failure (a dead browser will
/// not recover by waiting longer).
pub(crate) async fn load_with_fallback<F, Fut>(
    url: &str,
    initial: WaitStrategy,
    budget: Duration,
    mut attempt: F,
) -> Result<WaitStrategy, ScraperError>
where
    F: FnMut(WaitStrategy) -> Fut,
    Fut: Future<Output = Result<(), ScraperError>>,
{
    let err = match bounded(url, initial, budget, attempt(initial)).await {
        Ok(()) => return Ok(initial),
        Err(err) => err,
    };

    let Some(fallback) = initial.fallback() else {
        return Err(err);
    };
    if !err.is_navigation() {
        return Err(err);
    }

    tracing::warn!(
        url,
        failed = %initial,
        fallback = %fallback,
        error = %err,
        "navigation did not settle; retrying with slower load strategy"
    );
    bounded(url, fallback, budget, attempt(fallback))
        .await
        .map(|()| fallback)
}

async fn bounded<Fut>(
    url: &str,
    strategy: WaitStrategy,
    budget: Duration,
    fut: Fut,
) -> Result<(), ScraperError>
where
    Fut: Future<Output = Result<(), ScraperError>>,
{
    tokio::time::timeout(budget, fut).await.unwrap_or_else(|_| {
        Err(ScraperError::navigation(
            url,
            NavigationFailureKind::Timeout,
            format!("no {strategy} signal within {}ms", budget.as_millis()),
        ))
    })
}

/// Polls `check` every `interval` until it returns `true` or `budget`
/// elapses. The check always runs at least once.
pub(crate) async fn wait_until<F, Fut>(budget: Duration, interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + budget;
    loop {
        if check().await {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Scrolls in fixed steps until the document stops growing or `max_steps`
/// is reached. `step` scrolls once and reports the document height, or
/// `None` when the page could not be scripted.
///
/// Returns the number of steps taken.
pub(crate) async fn scroll_until_stable<F, Fut>(max_steps: u32, pause: Duration, mut step: F) -> u32
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<f64>>,
{
    let mut previous_height: Option<f64> = None;
    let mut steps = 0;

    while steps < max_steps {
        let Some(height) = step().await else {
            break;
        };
        steps += 1;
        if previous_height.is_some_and(|prev| height <= prev) {
            break;
        }
        previous_height = Some(height);
        tokio::time::sleep(pause).await;
    }

    steps
}
