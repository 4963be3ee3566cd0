use alerter::{TelegramAlerter, run_alerter_service};
use analytics::PortfolioLedger;
use anyhow::Context;
use api_client::BinanceClient;
use chrono::Utc;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use configuration::{Config, init_tracing, load_config};
use engine::{CycleReport, InstrumentOutcome, LiveEngine};
use executor::{Executor, LiveExecutor, PaperExecutor};
use persistence::{JsonFileStore, PersistenceStore, Snapshot};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The main entry point for the Crossguard trading application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the keys may come from the environment.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env file");
        }
    }

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let _log_guard = init_tracing(&config.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Run => handle_run(config).await,
        Commands::Once { json } => handle_once(config, json).await,
        Commands::Status { json } => handle_status(config, json).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A moving-average crossover spot trading engine.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling loop until Ctrl-C.
    Run,
    /// Run a single cycle and print its report.
    Once {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the persisted positions and performance without contacting the exchange.
    Status {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Wires the exchange client, executor and state store into an engine.
fn build_engine(config: Config) -> anyhow::Result<LiveEngine> {
    let live = config.trading.live_trading_enabled;
    let timeout = Duration::from_secs(config.trading.request_timeout_secs);

    let api_client = Arc::new(
        BinanceClient::new(live, &config.api, timeout).context("Failed to build exchange client")?,
    );
    let executor: Arc<dyn Executor> = if live {
        tracing::warn!("Live trading is ENABLED. Orders will reach the exchange.");
        Arc::new(LiveExecutor::new(api_client.clone()))
    } else {
        tracing::info!("Paper trading: orders are simulated.");
        Arc::new(PaperExecutor::new())
    };
    let store = Arc::new(JsonFileStore::new(&config.persistence.path));

    Ok(LiveEngine::new(config, api_client, executor, store)?)
}

/// Starts the Telegram alerter on the engine's feed when it is configured.
fn spawn_alerter(config: &Config, engine: &LiveEngine) -> Option<JoinHandle<()>> {
    TelegramAlerter::new(&config.telegram)
        .map(|alerter| tokio::spawn(run_alerter_service(alerter, engine.subscribe())))
}

/// Drops the engine so the feed closes, then lets the alerter drain it.
async fn finish(engine: LiveEngine, alerter: Option<JoinHandle<()>>) {
    drop(engine);
    if let Some(handle) = alerter {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Alerter task failed");
        }
    }
}

async fn handle_run(config: Config) -> anyhow::Result<()> {
    let mut engine = build_engine(config.clone())?;
    let alerter = spawn_alerter(&config, &engine);

    let result = engine.run().await;
    finish(engine, alerter).await;
    result.context("Engine stopped with an error")
}

async fn handle_once(config: Config, json: bool) -> anyhow::Result<()> {
    let mut engine = build_engine(config.clone())?;
    let alerter = spawn_alerter(&config, &engine);

    let result = engine.run_once().await;
    finish(engine, alerter).await;
    let report = result.context("Cycle failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn handle_status(config: Config, json: bool) -> anyhow::Result<()> {
    let store = JsonFileStore::new(&config.persistence.path);
    let Snapshot {
        positions,
        equity_history,
        ..
    } = store.load().await.context("Failed to read persisted state")?;
    let summary = PortfolioLedger::from_history(equity_history)?.summary(Utc::now());

    if json {
        let status = serde_json::json!({
            "performance": summary,
            "positions": positions,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Symbol", "State", "Entry", "Stop-loss", "Take-profit"]);
    for (symbol, state) in &positions {
        if state.is_open {
            table.add_row(vec![
                symbol.clone(),
                "OPEN".to_string(),
                state.entry_price.to_string(),
                state.stop_loss_price.to_string(),
                state
                    .take_profit_price
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "disabled".to_string()),
            ]);
        } else {
            table.add_row(vec![
                symbol.clone(),
                "FLAT".to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
            ]);
        }
    }

    println!("{}", table);
    println!("{}", summary.headline());
    if let Some(drawdown) = summary.max_drawdown_pct {
        println!("Max drawdown: {:.2}% over {} samples", drawdown.round_dp(2), summary.samples);
    }
    Ok(())
}

fn print_report(report: &CycleReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Symbol", "Outcome", "Details"]);

    for (symbol, outcome) in &report.outcomes {
        let (label, details) = match outcome {
            InstrumentOutcome::Entered {
                quantity,
                price,
                thresholds,
            } => (
                "ENTERED".to_string(),
                format!(
                    "{} @ {} (stop {}, take-profit {})",
                    quantity,
                    price,
                    thresholds.stop_loss_price,
                    thresholds
                        .take_profit_price
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "disabled".to_string())
                ),
            ),
            InstrumentOutcome::Exited {
                quantity,
                price,
                reason,
            } => ("EXITED".to_string(), format!("{} @ {} ({})", quantity, price, reason)),
            InstrumentOutcome::Held => ("HELD".to_string(), String::new()),
            InstrumentOutcome::Waiting => ("WAITING".to_string(), String::new()),
            InstrumentOutcome::Failed { kind, detail } => (kind.to_string().to_uppercase(), detail.clone()),
        };
        table.add_row(vec![symbol.clone(), label, details]);
    }

    println!("{}", table);
    match report.valuation {
        Some(total) => println!("Total valuation: {:.2}", total.round_dp(2)),
        None => println!("Total valuation: unavailable"),
    }
    for degraded in &report.degraded {
        println!("degraded: {}", degraded);
    }
}
