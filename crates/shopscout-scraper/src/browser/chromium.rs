//! Chromium-backed [`PageFetcher`] using chromiumoxide.
//!
//! One browser process is launched per [`ChromiumFetcher`] and shared by
//! every fetch. Each fetch opens its own CDP browser context (separate
//! cookies and storage), renders, snapshots, and disposes the context.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use shopscout_core::AppConfig;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::{PageFetcher, PageSnapshot, RenderOptions, WaitStrategy};
use crate::error::{NavigationFailureKind, ScraperError};
use crate::navigation::{load_with_fallback, scroll_until_stable, wait_until};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Resource count must hold still this long to call the network idle.
const IDLE_QUIET_WINDOW: Duration = Duration::from_millis(500);
const SCROLL_STEP_PX: u32 = 1_000;
const MAX_SCROLL_STEPS: u32 = 12;
const SCROLL_PAUSE: Duration = Duration::from_millis(400);

/// Launch and timing settings for [`ChromiumFetcher`].
#[derive(Debug, Clone)]
pub struct ChromiumSettings {
    /// Browser binary. Discovered with [`find_chromium`] when `None`.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
    /// Budget for each load-strategy tier.
    pub navigation_timeout: Duration,
    /// Flat delay used when no readiness selectors are given.
    pub settle_delay: Duration,
}

impl ChromiumSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            executable: config.browser_path.clone(),
            headless: config.browser_headless,
            user_agent: config.user_agent.clone(),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

/// Find a Chromium or Chrome binary on `PATH`.
#[must_use]
pub fn find_chromium() -> Option<PathBuf> {
    [
        "chromium",
        "chromium-browser",
        "google-chrome",
        "google-chrome-stable",
    ]
    .into_iter()
    .find_map(|name| which::which(name).ok())
}

/// Shared headless browser rendering listing pages in isolated contexts.
pub struct ChromiumFetcher {
    browser: RwLock<Option<Browser>>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
    settings: ChromiumSettings,
    active_contexts: AtomicUsize,
}

impl ChromiumFetcher {
    /// Launches the browser process.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Browser`] if no binary can be found, the
    /// launch configuration is rejected, or the process fails to start.
    pub async fn launch(settings: ChromiumSettings) -> Result<Self, ScraperError> {
        let executable = settings
            .executable
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                ScraperError::Browser(
                    "no Chromium binary found; set SHOPSCOUT_BROWSER_PATH".to_string(),
                )
            })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .request_timeout(settings.navigation_timeout)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", settings.user_agent));
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| ScraperError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScraperError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
        });

        tracing::info!(headless = settings.headless, "browser launched");

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler: std::sync::Mutex::new(Some(handler_task)),
            settings,
            active_contexts: AtomicUsize::new(0),
        })
    }

    /// Number of fetches currently holding a browser context.
    #[must_use]
    pub fn active_contexts(&self) -> usize {
        self.active_contexts.load(Ordering::Relaxed)
    }

    /// Closes the browser process. Later fetches fail with
    /// [`ScraperError::Browser`].
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Browser`] if the browser refuses to close.
    pub async fn close(&self) -> Result<(), ScraperError> {
        let Some(mut browser) = self.browser.write().await.take() else {
            return Ok(());
        };
        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| ScraperError::Browser(format!("failed to close browser: {e}")));
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "browser process wait failed");
        }
        let handler = self
            .handler
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(handler) = handler {
            handler.abort();
        }
        tracing::info!("browser closed");
        closed
    }

    async fn open_isolated_page(&self) -> Result<(Page, BrowserContextId), ScraperError> {
        let guard = self.browser.read().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| ScraperError::Browser("browser is closed".to_string()))?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| ScraperError::Browser(format!("failed to create browser context: {e}")))?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(ScraperError::Browser)?;

        match browser.new_page(target).await {
            Ok(page) => Ok((page, context_id)),
            Err(e) => {
                let _ = browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await;
                Err(ScraperError::Browser(format!("failed to open page: {e}")))
            }
        }
    }

    async fn dispose_context(&self, context_id: BrowserContextId) {
        let guard = self.browser.read().await;
        if let Some(browser) = guard.as_ref() {
            if let Err(e) = browser
                .execute(DisposeBrowserContextParams::new(context_id))
                .await
            {
                tracing::debug!(error = %e, "failed to dispose browser context");
            }
        }
    }

    async fn render(
        &self,
        page: &Page,
        url: &str,
        options: &RenderOptions,
    ) -> Result<PageSnapshot, ScraperError> {
        let strategy = load_with_fallback(
            url,
            options.wait_strategy,
            self.settings.navigation_timeout,
            |strategy| navigate(page, url, strategy),
        )
        .await?;
        tracing::debug!(url, strategy = %strategy, "page loaded");

        if options.explicit_selectors.is_empty() {
            tokio::time::sleep(self.settings.settle_delay).await;
        } else {
            let budget = Duration::from_millis(options.max_wait_ms);
            for selector in &options.explicit_selectors {
                let found = wait_until(budget, POLL_INTERVAL, move || async move {
                    page.find_element(selector.as_str()).await.is_ok()
                })
                .await;
                if !found {
                    tracing::warn!(
                        url,
                        selector = %selector,
                        wait_ms = options.max_wait_ms,
                        "readiness selector never appeared; extracting from current DOM"
                    );
                }
            }
        }

        if options.scroll_to_bottom {
            let script = format!(
                "(() => {{ window.scrollBy(0, {SCROLL_STEP_PX}); return document.documentElement.scrollHeight; }})()"
            );
            let script = script.as_str();
            let steps = scroll_until_stable(MAX_SCROLL_STEPS, SCROLL_PAUSE, move || async move {
                evaluate::<f64>(page, script).await.ok()
            })
            .await;
            tracing::debug!(url, steps, "scrolled for lazy-loaded content");
        }

        let html = page
            .content()
            .await
            .map_err(|e| ScraperError::Browser(format!("failed to read page content: {e}")))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_owned());

        Ok(PageSnapshot { html, final_url })
    }
}

#[async_trait]
impl PageFetcher for ChromiumFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<PageSnapshot, ScraperError> {
        let (page, context_id) = self.open_isolated_page().await?;
        self.active_contexts.fetch_add(1, Ordering::Relaxed);

        let result = self.render(&page, url, options).await;

        if let Err(e) = page.close().await {
            tracing::debug!(url, error = %e, "failed to close page");
        }
        self.dispose_context(context_id).await;
        self.active_contexts.fetch_sub(1, Ordering::Relaxed);

        result
    }
}

/// One navigation attempt under `strategy`. The caller bounds it in time.
async fn navigate(page: &Page, url: &str, strategy: WaitStrategy) -> Result<(), ScraperError> {
    match strategy {
        WaitStrategy::DomContentLoaded => {
            let response = page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| navigation_err(url, e))?;
            if let Some(error_text) = response.result.error_text.as_deref() {
                return Err(ScraperError::navigation(
                    url,
                    NavigationFailureKind::Unreachable,
                    error_text,
                ));
            }
            loop {
                let parsed = evaluate::<bool>(
                    page,
                    "document.readyState !== 'loading' && location.href !== 'about:blank'",
                )
                .await
                .unwrap_or(false);
                if parsed {
                    return Ok(());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
        WaitStrategy::NetworkIdle => {
            page.goto(url).await.map_err(|e| navigation_err(url, e))?;
            let mut last_count = resource_count(page).await;
            loop {
                tokio::time::sleep(IDLE_QUIET_WINDOW).await;
                let count = resource_count(page).await;
                if count == last_count {
                    return Ok(());
                }
                last_count = count;
            }
        }
    }
}

async fn resource_count(page: &Page) -> Option<f64> {
    evaluate::<f64>(page, "performance.getEntriesByType('resource').length")
        .await
        .ok()
}

async fn evaluate<T: serde::de::DeserializeOwned>(
    page: &Page,
    script: &str,
) -> Result<T, ScraperError> {
    page.evaluate(script)
        .await
        .map_err(|e| ScraperError::Browser(format!("script evaluation failed: {e}")))?
        .into_value::<T>()
        .map_err(|e| ScraperError::Browser(format!("unexpected script result: {e}")))
}

/// A CDP command that outlives its request timeout is a navigation timeout;
/// anything else means the page could not be reached.
fn navigation_err(url: &str, err: CdpError) -> ScraperError {
    let kind = match err {
        CdpError::Timeout => NavigationFailureKind::Timeout,
        _ => NavigationFailureKind::Unreachable,
    };
    ScraperError::navigation(url, kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ChromiumSettings {
        ChromiumSettings {
            executable: None,
            headless: true,
            user_agent: shopscout_core::config::DEFAULT_USER_AGENT.to_string(),
            navigation_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(50),
        }
    }

    #[test]
    fn cdp_timeout_is_classified_as_navigation_timeout() {
        let err = navigation_err("https://slow.example/", CdpError::Timeout);
        assert!(matches!(
            err,
            ScraperError::Navigation {
                kind: NavigationFailureKind::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn other_cdp_errors_are_unreachable() {
        let err = navigation_err("https://gone.example/", CdpError::NotFound);
        assert!(matches!(
            err,
            ScraperError::Navigation {
                kind: NavigationFailureKind::Unreachable,
                ..
            }
        ));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn renders_data_url_in_isolated_context() {
        let fetcher = ChromiumFetcher::launch(settings())
            .await
            .expect("failed to launch browser");

        let options = RenderOptions {
            wait_strategy: WaitStrategy::DomContentLoaded,
            explicit_selectors: vec!["li.product".into(), ".never-rendered".into()],
            scroll_to_bottom: true,
            max_wait_ms: 200,
        };
        let snapshot = fetcher
            .fetch(
                "data:text/html,<ul><li class=product>Kettle</li></ul>",
                &options,
            )
            .await
            .expect("fetch failed");

        assert!(snapshot.html.contains("Kettle"));
        assert_eq!(fetcher.active_contexts(), 0);

        fetcher.close().await.expect("close failed");
        let err = fetcher.fetch("data:text/html,x", &options).await.unwrap_err();
        assert!(matches!(err, ScraperError::Browser(_)));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn unresolvable_host_is_unreachable() {
        let fetcher = ChromiumFetcher::launch(settings())
            .await
            .expect("failed to launch browser");
        let options = RenderOptions {
            wait_strategy: WaitStrategy::DomContentLoaded,
            explicit_selectors: Vec::new(),
            scroll_to_bottom: false,
            max_wait_ms: 100,
        };
        let err = fetcher
            .fetch("https://does-not-exist.invalid/", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Navigation { .. }));
        fetcher.close().await.expect("close failed");
    }
}
