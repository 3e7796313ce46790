use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use tradedeck::api::{AlgoApi, FeedApi};
use tradedeck::config::Settings;
use tradedeck::feed::FeedManager;
use tradedeck::markers::TradeMarkerSource;
use tradedeck::ui::{DashboardSink, LogSink};
use tradedeck::Result;
use tradedeck::SessionController;

#[derive(Parser)]
#[command(name = "tradedeck", about = "Headless session controller for the trading dashboard")]
struct Cli {
    /// Backend base URL (overrides DASH_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Streaming channel base URL (overrides DASH_WS_URL)
    #[arg(long)]
    ws_url: Option<String>,

    /// Trading pair (overrides DEFAULT_PAIR)
    #[arg(long)]
    pair: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller: recurring sync, marker refresh, and health loops
    Run,
    /// Start the session (feed, channel, algorithm) and exit
    Start,
    /// Stop the session and exit
    Stop,
    /// Liquidate the open position, wait for orders to drain, then exit
    Close,
    /// Print a one-shot snapshot of remote state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    if let Some(ws_url) = cli.ws_url {
        settings.ws_url = ws_url;
    }
    if let Some(pair) = cli.pair {
        settings.default_pair = pair;
    }

    let sink: Arc<dyn DashboardSink> = Arc::new(LogSink);
    let feed = Arc::new(FeedManager::new(&settings.ws_url, Arc::clone(&sink)));
    let algo_api = AlgoApi::new(&settings.base_url);
    let controller = Arc::new(SessionController::new(
        FeedApi::new(&settings.base_url),
        algo_api.clone(),
        Arc::clone(&feed),
        Arc::clone(&sink),
        settings.default_pair.clone(),
        settings.order_poll_interval,
    ));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(controller, algo_api, feed, sink, &settings).await,
        Command::Start => {
            controller.start().await;
            controller.shutdown().await;
            Ok(())
        }
        Command::Stop => {
            controller.stop().await;
            Ok(())
        }
        Command::Close => {
            controller.close_position().await;
            controller.shutdown().await;
            Ok(())
        }
        Command::Status => {
            let truth = controller.probe().await;
            controller.refresh_health().await;
            tracing::info!(
                "feed running: {}, algo running: {}",
                truth.feed_running,
                truth.algo_running
            );
            Ok(())
        }
    }
}

async fn run(
    controller: Arc<SessionController>,
    algo_api: AlgoApi,
    feed: Arc<FeedManager>,
    sink: Arc<dyn DashboardSink>,
    settings: &Settings,
) -> Result<()> {
    tracing::info!("🚀 tradedeck starting for {}", controller.pair());
    tracing::info!("  Backend: {}", settings.base_url);
    tracing::info!("  Channel: {}", settings.ws_url);
    tracing::info!("  Sync every {:?}", settings.sync_interval);
    tracing::info!("  Markers every {:?}", settings.marker_refresh_interval);

    // Loop 1: reconcile against remote truth
    let sync_task = {
        let controller = Arc::clone(&controller);
        let interval = settings.sync_interval;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now(), interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                controller.sync().await;
            }
        })
    };

    // Loop 2: trade marker refresh
    let marker_task = {
        let markers = TradeMarkerSource::new(algo_api, feed, sink);
        let interval = settings.marker_refresh_interval;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now(), interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                markers.refresh().await;
            }
        })
    };

    // Loop 3: health badges, on the sync cadence
    let health_task = {
        let controller = Arc::clone(&controller);
        let interval = settings.sync_interval;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now(), interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                controller.refresh_health().await;
            }
        })
    };

    tracing::info!("✅ All loops spawned, press Ctrl+C to stop");

    let aborts = [
        sync_task.abort_handle(),
        marker_task.abort_handle(),
        health_task.abort_handle(),
    ];

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        result = sync_task => {
            tracing::error!("Sync loop exited: {:?}", result);
        }
        result = marker_task => {
            tracing::error!("Marker loop exited: {:?}", result);
        }
        result = health_task => {
            tracing::error!("Health loop exited: {:?}", result);
        }
    }

    // No recurring work may outlive the session it drove
    for abort in aborts {
        abort.abort();
    }
    controller.shutdown().await;
    tracing::info!("👋 tradedeck stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradedeck=info".into()),
        )
        .init();
}
