use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub sites_path: PathBuf,
    pub browser_path: Option<PathBuf>,
    pub browser_headless: bool,
    pub user_agent: String,
    pub navigation_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub politeness_delay_ms: u64,
    pub max_concurrent_sites: usize,
    pub relevance_url: Option<String>,
    pub relevance_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("sites_path", &self.sites_path)
            .field("browser_path", &self.browser_path)
            .field("browser_headless", &self.browser_headless)
            .field("user_agent", &self.user_agent)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("politeness_delay_ms", &self.politeness_delay_ms)
            .field("max_concurrent_sites", &self.max_concurrent_sites)
            .field(
                "relevance_url",
                &self.relevance_url.as_ref().map(|_| "[redacted]"),
            )
            .field("relevance_timeout_secs", &self.relevance_timeout_secs)
            .finish()
    }
}
