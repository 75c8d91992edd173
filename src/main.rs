use clap::{Parser, ValueEnum};
use forum_client::ForumApiClient;
use ledger::ProcessedLedger;
use messaging_client::{GatewayClient, ReactionConfig, ReactionSender, SessionStore};
use monitor_service::{
    backfill_thread, shutdown_on, MonitorSettings, PostProcessor, ProcessorSettings, ThreadMonitor,
};
use starwatch_core::{BotConfig, CoreError, ErrorReporter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "starwatch=info,starwatch_core=info,forum_client=info,ledger=info,messaging_client=info,monitor_service=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// React to new posts as they appear
    Monitor,
    /// Record every existing post as processed, then exit
    Backfill,
}

/// Sends paid reactions to messaging links posted in a forum thread.
#[derive(Debug, Parser)]
#[command(name = "starwatch", version)]
struct Args {
    /// Configuration file (JSON, or TOML when it ends in .toml)
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Override the configured forum thread
    #[arg(long)]
    thread_id: Option<String>,

    #[arg(long, value_enum, default_value_t = Mode::Monitor)]
    mode: Mode,

    /// Thread page to start from
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    start_page: u32,

    /// Write a configuration template to --config and exit
    #[arg(long)]
    reset_config: bool,

    /// tracing filter, takes precedence over RUST_LOG
    #[arg(long)]
    log_filter: Option<String>,
}

fn init_logging(filter: Option<&str>) {
    let filter = filter
        .and_then(|f| EnvFilter::try_new(f).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn read_login_code() -> Result<String, CoreError> {
    println!("Enter the login code sent to your messaging account:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

async fn run_backfill(config: &BotConfig, forum: &ForumApiClient, start_page: u32) -> Result<(), CoreError> {
    let mut ledger = ProcessedLedger::open(&config.processed_posts_file);
    backfill_thread(
        forum,
        &mut ledger,
        &config.forum_thread_id,
        start_page,
        config.page_fetch_delay(),
    )
    .await?;
    Ok(())
}

async fn run_monitor(config: BotConfig, forum: Arc<ForumApiClient>, start_page: u32) -> Result<(), CoreError> {
    let store = SessionStore::new(config.session_path());
    let mut gateway = GatewayClient::from_config(&config)?;

    if !store.exists() {
        tracing::info!("No messaging session at {}, logging in", store.path().display());
        gateway.authorize(&config, &store, read_login_code).await?;
        tracing::info!(outcome = "success", "Messaging account connected");
        tracing::info!("Restart starwatch to begin monitoring");
        return Ok(());
    }

    gateway.connect(&store).await?;
    let gateway = Arc::new(gateway);

    let processor = PostProcessor::new(
        forum.clone(),
        ReactionSender::new(gateway.clone(), ReactionConfig::from_config(&config)),
        ProcessedLedger::open(&config.processed_posts_file),
        ProcessorSettings::from_config(&config),
    );
    let mut monitor = ThreadMonitor::new(
        forum,
        processor,
        MonitorSettings::from_config(&config, start_page),
    );

    monitor.run(shutdown_on(tokio::signal::ctrl_c())).await;

    drop(monitor);
    if let Ok(mut gateway) = Arc::try_unwrap(gateway) {
        gateway.disconnect();
    }
    tracing::info!("Starwatch stopped");
    Ok(())
}

async fn run(args: Args) -> Result<(), CoreError> {
    if args.reset_config {
        BotConfig::write_template(&args.config)?;
        tracing::info!(
            "Configuration template written to {}. Fill in the credentials and start again.",
            args.config.display()
        );
        return Ok(());
    }

    let config = BotConfig::load_with_thread(&args.config, args.thread_id)?;
    tracing::info!("Starting Starwatch for forum thread {}", config.forum_thread_id);

    let forum = Arc::new(ForumApiClient::from_config(&config)?);

    match args.mode {
        Mode::Backfill => run_backfill(&config, &forum, args.start_page).await,
        Mode::Monitor => run_monitor(config, forum, args.start_page).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_filter.as_deref());

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ErrorReporter::new("Starwatch").report_error(&e);
            ExitCode::FAILURE
        }
    }
}
