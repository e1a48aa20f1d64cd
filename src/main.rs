//! Market Signal Engine CLI
//!
//! Replays recorded price data through the analyzers and prints the
//! accepted signals.

use clap::{Parser, Subcommand};
use market_signal_engine::{
    config::Config,
    engine::AnalysisEngine,
    notify::{LogNotifier, NotificationDispatcher, Notifier, TelegramNotifier},
    registry::{AnalyzerFactory, AnalyzerRegistry},
    types::PriceData,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "signal-engine")]
#[command(about = "Signal detection engine for exchange market monitoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON array of price points through the engine
    Analyze {
        /// Path to the price file
        file: PathBuf,
        /// Sliding window length in points
        #[arg(short, long, default_value = "20")]
        window: usize,
        /// Deliver notifications (Telegram when configured, log otherwise)
        #[arg(long)]
        notify: bool,
    },
    /// Print the default analyzer configuration catalogue
    Defaults,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Analyze {
            file,
            window,
            notify,
        } => analyze_file(config, file, window, notify).await,
        Commands::Defaults => {
            let defaults = AnalyzerFactory::default_configs();
            println!("{}", serde_json::to_string_pretty(&defaults)?);
            Ok(())
        }
    }
}

async fn analyze_file(
    config: Config,
    file: PathBuf,
    window_len: usize,
    notify: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&file)?;
    let points: Vec<PriceData> = serde_json::from_str(&raw)?;
    tracing::info!("Loaded {} price points from {}", points.len(), file.display());

    let mut by_symbol: BTreeMap<String, Vec<PriceData>> = BTreeMap::new();
    for point in points {
        by_symbol.entry(point.symbol.clone()).or_default().push(point);
    }
    for series in by_symbol.values_mut() {
        series.sort_by_key(|p| p.timestamp);
    }

    let queue_size = config.notifications.queue_size.max(1);
    let (signal_tx, signal_rx) = mpsc::channel(queue_size);
    let (counter_tx, counter_rx) = mpsc::channel(queue_size);

    let factory = AnalyzerFactory::new().with_counter_events(counter_tx);
    let registry = Arc::new(AnalyzerRegistry::from_configs(
        &factory,
        &config.analyzer_configs()?,
    )?);
    drop(factory);

    let notifier: Arc<dyn Notifier> = match (&config.telegram, notify) {
        (Some(tg), true) => Arc::new(TelegramNotifier::new(
            tg.bot_token.clone(),
            tg.chat_id.clone(),
        )),
        _ => Arc::new(LogNotifier),
    };
    let dispatcher = Arc::new(NotificationDispatcher::new(notifier));
    let signal_task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.run_signals(signal_rx).await })
    };
    let counter_task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.run_counter_events(counter_rx).await })
    };

    let engine = AnalysisEngine::new(registry, config.filters.build_chain());
    let engine = if notify {
        engine.with_publisher(signal_tx)
    } else {
        drop(signal_tx);
        engine
    };

    let window_len = window_len.max(2);
    for (symbol, series) in &by_symbol {
        tracing::debug!("Replaying {} points for {}", series.len(), symbol);
        for end in 2..=series.len() {
            let start = end.saturating_sub(window_len);
            for signal in engine.process(&series[start..end]) {
                println!("{}", serde_json::to_string(&signal.to_flat_map())?);
            }
        }
    }

    let stats = engine.stats();
    for (name, filter) in engine.filter_stats() {
        tracing::info!(
            "Filter {}: {} processed, {} passed, {} filtered",
            name,
            filter.total_processed,
            filter.passed_through,
            filter.filtered_out
        );
    }
    tracing::info!(
        "Processed {} windows: {} generated, {} accepted, {} filtered, {} analyzer errors",
        stats.windows_processed,
        stats.signals_generated,
        stats.signals_accepted,
        stats.signals_filtered,
        stats.analyzer_errors
    );

    // Dropping the engine closes both queues once the analyzers are gone
    drop(engine);
    signal_task.await?;
    counter_task.await?;

    let delivered = dispatcher.stats();
    tracing::info!(
        "Notifications: {} sent, {} failed",
        delivered.sent,
        delivered.failed
    );
    Ok(())
}
