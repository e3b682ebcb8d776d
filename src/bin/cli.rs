//! Ad tracker CLI
//!
//! Runs the poller and the chat bot as one long-lived process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ad_tracker::{
    bot::{Dispatcher, run_bot},
    error::{AppError, Result},
    models::Config,
    pipeline::Poller,
    services::{
        AdParser, ApproveAll, HttpListingSource, Notifier, PathQueryEncoder, QuotaService,
        TelegramChannel,
    },
    storage::LocalStore,
    utils::http,
};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

/// Classified-ad tracker with Telegram notifications
#[derive(Parser, Debug)]
#[command(name = "ad-tracker", version, about = "Tracks classified ads and alerts on new ones")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the poller and the bot until Ctrl-C
    Run,

    /// Run a single polling cycle and print its statistics
    Poll,

    /// Parse a saved listing page and print the extracted ads
    Parse {
        /// HTML file to parse
        file: PathBuf,
    },

    /// Validate the configuration
    Validate,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path)?;
    if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
        config.telegram.token = token;
    }
    Ok(config)
}

fn build_parser(config: &Config) -> Result<AdParser> {
    AdParser::new(&config.parser, &config.source.base_url)
}

fn build_poller(
    config: &Config,
    store: Arc<LocalStore>,
    channel: Arc<TelegramChannel>,
) -> Result<Poller> {
    let client = http::create_async_client(&config.source)?;
    let encoder = PathQueryEncoder::new(&config.source)?;
    let source = Arc::new(HttpListingSource::new(client, Box::new(encoder)));
    let notifier = Notifier::new(channel, config.messages.clone());
    Ok(Poller::new(
        store,
        source,
        build_parser(config)?,
        notifier,
        &config.poller,
    ))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(cli.verbose, &config.logging.level);

    if !cli.config.exists() {
        log::warn!("No config at {}, using defaults", cli.config.display());
    }

    match cli.command {
        Command::Run => {
            config.validate()?;
            let store = Arc::new(LocalStore::open(&config.storage.database_path).await?);
            let telegram = Arc::new(TelegramChannel::new(&config.telegram)?);
            let poller = build_poller(&config, store.clone(), telegram.clone())?;

            let quota = QuotaService::new(
                store.clone(),
                Arc::new(ApproveAll),
                config.subscription.period_days,
            );
            let dispatcher = Dispatcher::new(
                store,
                telegram.clone(),
                quota,
                config.messages.clone(),
                config.source.category.clone(),
            );

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => log::info!("Shutdown requested"),
                    Err(e) => log::error!("Could not listen for Ctrl-C: {}", e),
                }
                on_signal.cancel();
            });

            log::info!(
                "Ad tracker running, database {}",
                config.storage.database_path.display()
            );
            tokio::join!(
                poller.run(&cancel),
                run_bot(telegram.as_ref(), &dispatcher, &cancel)
            );
            log::info!("Ad tracker stopped");
        }

        Command::Poll => {
            config.validate()?;
            let store = Arc::new(LocalStore::open(&config.storage.database_path).await?);
            let telegram = Arc::new(TelegramChannel::new(&config.telegram)?);
            let poller = build_poller(&config, store, telegram)?;

            let stats = poller.run_cycle(&CancellationToken::new()).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Parse { file } => {
            let html = tokio::fs::read_to_string(&file).await?;
            let ads = build_parser(&config)?.parse(&html)?;
            log::info!("Extracted {} ads from {}", ads.len(), file.display());
            println!("{}", serde_json::to_string_pretty(&ads)?);
        }

        Command::Validate => {
            config.validate()?;
            build_parser(&config)?;
            PathQueryEncoder::new(&config.source)?;
            if config.telegram.token.trim().is_empty() {
                return Err(AppError::config(
                    "telegram.token is empty (set TELEGRAM_BOT_TOKEN)",
                ));
            }
            log::info!("Configuration OK");
        }
    }

    Ok(())
}
