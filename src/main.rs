use anyhow::Context;
use clap::Parser;
use loris::cli::{Args, Command};
use loris::config::Config;
use loris::crawl::{CrawlOrchestrator, CrawlReport};
use loris::logging::setup_logging;
use loris::loris::session::CookieHeaderProvider;
use loris::loris::{
    Endpoints, LorisApi, RetryPolicy, SessionClient, SessionProvider, Term, Transport,
};
use loris::signals::cancel_on_shutdown;
use loris::store::{CatalogWriter, JsonFileStore};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load config before anything else so startup logs use the configured level
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config.log_level, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting loris"
    );

    match run(args.command, config).await {
        Ok(reports) => exit_code(&reports),
        Err(e) => {
            error!(error = ?e, "Crawl could not start");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: Config) -> anyhow::Result<Vec<CrawlReport>> {
    let Command::Crawl {
        terms,
        output,
        cookies,
    } = command;

    let provider = CookieHeaderProvider::new(cookies.or(config.cookies));
    let session = provider
        .acquire_session()
        .await
        .context("Failed to acquire a portal session")?;

    let client =
        SessionClient::new_with_config(session, &config.rate_limiting, config.request_timeout)?;
    let transport: Arc<dyn Transport> = Arc::new(client);
    let endpoints = Endpoints::new(&config.base_url)?;
    let api = LorisApi::new(
        transport,
        endpoints,
        RetryPolicy::from(&config.retry),
        config.reset_mode,
    );

    let output = output.unwrap_or(config.output_path);
    let store = JsonFileStore::open(&output)
        .await
        .with_context(|| format!("Failed to open output store {}", output.display()))?;
    let writer = Arc::new(CatalogWriter::new(store));

    let cancel = CancellationToken::new();
    cancel_on_shutdown(cancel.clone());

    let orchestrator = CrawlOrchestrator::new(
        api,
        writer,
        config.page_size,
        config.instructor_concurrency,
        cancel,
    );

    let terms: Vec<Term> = terms.into_iter().map(Term::new).collect();
    info!(terms = terms.len(), output = %output.display(), "Starting crawl");
    Ok(orchestrator.crawl_terms(&terms).await)
}

fn exit_code(reports: &[CrawlReport]) -> ExitCode {
    if reports.iter().any(|r| r.terminal_error.is_some()) {
        ExitCode::FAILURE
    } else if reports.iter().any(|r| r.cancelled) {
        ExitCode::from(130)
    } else {
        ExitCode::SUCCESS
    }
}
