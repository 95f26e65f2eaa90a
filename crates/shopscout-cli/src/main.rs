mod search;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shopscout")]
#[command(about = "Search product listings across configured stores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one query against every configured site and print the JSON result
    Search {
        /// Search terms; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Advisory number of records to keep per site (needs the relevance service)
        #[arg(long)]
        top_n: Option<u32>,
        /// Natural-language constraint forwarded to the relevance service
        #[arg(long)]
        filter: Option<String>,
        /// Override every site's page budget
        #[arg(long)]
        max_pages: Option<u32>,
        /// Restrict the search to these domains or aliases (repeatable)
        #[arg(long = "site")]
        sites: Vec<String>,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// List the configured sites
    Sites,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = shopscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search {
            query,
            top_n,
            filter,
            max_pages,
            sites,
            pretty,
        } => {
            let request = shopscout_scraper::SearchRequest {
                query: query.join(" "),
                top_n,
                natural_language_filter: filter,
                max_pages_override: max_pages,
                sites,
            };
            search::run_search(&config, &request, pretty).await
        }
        Commands::Sites => search::run_sites(&config),
    }
}
