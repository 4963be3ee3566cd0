use crate::error::EngineError;
use crate::lot_cache::LotCache;
use crate::position_engine::{Decision, PositionEngine};
use crate::report::{CycleReport, FailureKind, InstrumentOutcome};
use analytics::PortfolioLedger;
use api_client::ApiClient;
use chrono::{DateTime, Utc};
use configuration::Config;
use core_types::{
    CrossSignal, EquitySample, ExitReason, Instrument, LotConstraint, OrderRequest, OrderSide,
    PositionState,
};
use events::{EngineEvent, LogLevel, SeriesReport, TradeNotice};
use executor::{Executor, OrderAck};
use persistence::{PersistenceStore, Snapshot};
use risk::RiskController;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strategies::{MACrossover, SignalDetector};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A collaborator call that did not produce a value.
#[derive(Debug)]
enum CallError<E> {
    TimedOut(Duration),
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
            CallError::Failed(e) => write!(f, "{}", e),
        }
    }
}

async fn bounded<T, E>(
    limit: Duration,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, CallError<E>> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CallError::Failed(e)),
        Err(_) => Err(CallError::TimedOut(limit)),
    }
}

/// One instrument after signal detection, before any order is placed.
#[derive(Debug, Clone)]
struct Evaluation {
    instrument: Instrument,
    price: Decimal,
    decision: Decision,
}

/// The central orchestrator for the live trading application.
///
/// A single task owns all mutable state; cycles run strictly one after another.
pub struct LiveEngine {
    // --- Configuration ---
    config: Config,
    instruments: Vec<Instrument>,
    valued_assets: Vec<String>,
    request_timeout: Duration,

    // --- Shared, Thread-Safe Components ---
    api_client: Arc<dyn ApiClient>,
    executor: Arc<dyn Executor>,
    store: Arc<dyn PersistenceStore>,
    events: broadcast::Sender<EngineEvent>,

    // --- Engine State ---
    detector: MACrossover,
    positions: PositionEngine,
    ledger: PortfolioLedger,
    lot_cache: LotCache,
    last_balances: HashMap<String, Decimal>,
    last_prices: HashMap<String, Decimal>,
    /// Per-asset adjustments from simulated fills, which the venue balances never reflect.
    paper_holdings: BTreeMap<String, Decimal>,
}

impl LiveEngine {
    /// Creates a new `LiveEngine` instance with all its required components.
    pub fn new(
        mut config: Config,
        api_client: Arc<dyn ApiClient>,
        executor: Arc<dyn Executor>,
        store: Arc<dyn PersistenceStore>,
    ) -> Result<Self, EngineError> {
        config.normalize();
        let instruments = config.trading.instruments()?;
        let detector = MACrossover::new(&config.strategy)?;
        let risk = RiskController::new(&config.risk_management)?;

        let quote = config.trading.quote_asset.as_str();
        let valued_assets: Vec<String> = instruments
            .iter()
            .map(|instrument| instrument.base_asset.clone())
            .chain(config.valuation.extra_assets.iter().cloned())
            .filter(|asset| !asset.is_empty() && asset != quote)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            request_timeout: Duration::from_secs(config.trading.request_timeout_secs),
            lot_cache: LotCache::new(Duration::from_secs(config.trading.lot_cache_ttl_secs)),
            config,
            instruments,
            valued_assets,
            api_client,
            executor,
            store,
            events,
            detector,
            positions: PositionEngine::new(risk),
            ledger: PortfolioLedger::new(),
            last_balances: HashMap::new(),
            last_prices: HashMap::new(),
            paper_holdings: BTreeMap::new(),
        })
    }

    /// Subscribes to the reporting feed.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn positions(&self) -> &BTreeMap<String, PositionState> {
        self.positions.positions()
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    /// Loads the persisted snapshot into the engine.
    pub async fn restore(&mut self) -> Result<(), EngineError> {
        let snapshot = self.store.load().await?;

        for symbol in snapshot.positions.keys() {
            if !self.instruments.iter().any(|i| &i.symbol == symbol) {
                tracing::warn!(
                    symbol = %symbol,
                    "Persisted position is not configured; keeping it but not evaluating it"
                );
            }
        }

        let open = snapshot.open_positions().count();
        let Snapshot {
            positions,
            equity_history,
            paper_holdings,
        } = snapshot;
        self.positions.restore(positions);
        self.ledger = PortfolioLedger::from_history(equity_history)?;
        self.paper_holdings = paper_holdings;

        tracing::info!(
            open_positions = open,
            samples = self.ledger.len(),
            paper_assets = self.paper_holdings.len(),
            "Engine state restored"
        );
        Ok(())
    }

    /// Restores state and runs a single cycle.
    pub async fn run_once(&mut self) -> Result<CycleReport, EngineError> {
        self.restore().await?;
        self.run_cycle().await
    }

    /// The main loop: one cycle per poll interval until Ctrl-C.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        let shutdown = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Ctrl-C received, stopping"),
                Err(e) => {
                    tracing::error!(error = %e, "Cannot listen for Ctrl-C; run until killed");
                    std::future::pending::<()>().await;
                }
            }
        };
        self.run_until(shutdown).await
    }

    /// Runs cycles until `shutdown` completes. A running cycle is always finished first.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> Result<(), EngineError> {
        self.restore().await?;

        let period = Duration::from_secs(self.config.trading.poll_interval_secs);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            instruments = self.instruments.len(),
            live = self.executor.is_live(),
            poll_interval = ?period,
            "--- Engine is running ---"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) => tracing::info!(
                            failures = report.failures(),
                            valuation = ?report.valuation,
                            "Cycle complete"
                        ),
                        Err(e) => {
                            tracing::error!(error = %e, "Cycle state could not be saved");
                            self.publish_log(LogLevel::Error, format!("Failed to save state: {}", e));
                        }
                    }
                }
            }
        }

        tracing::info!("Engine stopped");
        Ok(())
    }

    /// Executes one full cycle and persists the resulting state.
    ///
    /// Per-instrument failures are contained in the report. The only error
    /// returned is a failure to save the snapshot.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, EngineError> {
        let now = Utc::now();
        let mut report = CycleReport::new(now);

        let venue_balances = self.refresh_balances(&mut report).await;
        let balances = self.account_balances(venue_balances);
        let fresh_prices = self.refresh_prices(&mut report).await;
        self.record_equity(now, &balances, &mut report);

        let mut evaluations = Vec::with_capacity(self.instruments.len());
        for instrument in self.instruments.clone() {
            match self.evaluate(&instrument, &fresh_prices).await {
                Ok(evaluation) => evaluations.push(evaluation),
                Err(outcome) => self.settle(&mut report, &instrument.symbol, outcome),
            }
        }

        // Every entry's share is fixed before the first order goes out.
        let free_quote = balances
            .get(&self.config.trading.quote_asset)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let entering: Vec<&str> = evaluations
            .iter()
            .filter(|evaluation| evaluation.decision == Decision::Enter)
            .map(|evaluation| evaluation.instrument.symbol.as_str())
            .collect();
        let allocations = self.positions.allocations(
            free_quote,
            &entering,
            self.config.trading.allocation_mode,
            self.instruments.len(),
            self.config.trading.min_entry_balance,
        );

        for evaluation in &evaluations {
            let symbol = evaluation.instrument.symbol.as_str();
            let outcome = match evaluation.decision {
                Decision::Wait => InstrumentOutcome::Waiting,
                Decision::Hold => InstrumentOutcome::Held,
                Decision::Enter => self
                    .enter(evaluation, allocations.get(symbol).copied())
                    .await
                    .unwrap_or_else(|failure| failure),
                Decision::Exit(reason) => self
                    .exit(evaluation, reason, &balances)
                    .await
                    .unwrap_or_else(|failure| failure),
            };
            self.settle(&mut report, symbol, outcome);
        }

        let snapshot = Snapshot {
            positions: self.positions.positions().clone(),
            equity_history: self.ledger.to_vec(),
            paper_holdings: self.paper_holdings.clone(),
        };
        self.store.save(&snapshot).await?;

        Ok(report)
    }

    fn settle(&self, report: &mut CycleReport, symbol: &str, outcome: InstrumentOutcome) {
        if let InstrumentOutcome::Failed { kind, detail } = &outcome {
            tracing::warn!(symbol, kind = %kind, detail = %detail, "Instrument skipped this cycle");
            let level = match kind {
                FailureKind::ExecutionFailure => LogLevel::Error,
                _ => LogLevel::Warn,
            };
            self.publish_log(level, format!("{}: {} ({})", symbol, kind, detail));
        }
        report.outcomes.insert(symbol.to_string(), outcome);
    }

    async fn refresh_balances(&mut self, report: &mut CycleReport) -> HashMap<String, Decimal> {
        match bounded(self.request_timeout, self.api_client.get_balances()).await {
            Ok(balances) => {
                self.last_balances = balances.clone();
                balances
            }
            Err(e) => {
                tracing::warn!(error = %e, "Balances unavailable; using last known values");
                report.degraded.push(format!("balances: {}", e));
                self.last_balances.clone()
            }
        }
    }

    /// The balances the engine trades and values against.
    ///
    /// While paper trading, simulated fills are applied on top of the venue
    /// balances; no asset goes below zero.
    fn account_balances(&self, mut balances: HashMap<String, Decimal>) -> HashMap<String, Decimal> {
        if self.executor.is_live() || balances.is_empty() {
            return balances;
        }
        for (asset, adjustment) in &self.paper_holdings {
            let balance = balances.entry(asset.clone()).or_default();
            *balance = (*balance + *adjustment).max(Decimal::ZERO);
        }
        balances
    }

    /// Fetches the price of every valued asset. Returns only the prices obtained this cycle.
    async fn refresh_prices(&mut self, report: &mut CycleReport) -> HashMap<String, Decimal> {
        let quote = self.config.trading.quote_asset.clone();
        let mut fresh = HashMap::new();

        for asset in self.valued_assets.clone() {
            let symbol = format!("{}{}", asset, quote);
            match bounded(self.request_timeout, self.api_client.get_current_price(&symbol)).await {
                Ok(price) => {
                    self.last_prices.insert(asset.clone(), price);
                    fresh.insert(asset, price);
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Price unavailable");
                    report.degraded.push(format!("price {}: {}", symbol, e));
                }
            }
        }
        fresh
    }

    fn record_equity(
        &mut self,
        now: DateTime<Utc>,
        balances: &HashMap<String, Decimal>,
        report: &mut CycleReport,
    ) {
        if balances.is_empty() {
            tracing::warn!("No balances known yet; skipping equity sample");
            return;
        }

        let valuation = PortfolioLedger::value_account(
            balances,
            &self.last_prices,
            &self.config.trading.quote_asset,
            &self.valued_assets,
        );
        if !valuation.missing_prices.is_empty() {
            tracing::warn!(assets = ?valuation.missing_prices, "Held assets without a price were valued at zero");
        }

        let sample = EquitySample {
            timestamp: now,
            total_valuation: valuation.total,
        };
        if let Err(e) = self.ledger.record(sample) {
            tracing::warn!(error = %e, "Equity sample rejected");
            return;
        }

        report.valuation = Some(valuation.total);
        let summary = self.ledger.summary(now);
        tracing::info!("{}", summary.headline());
        self.publish(EngineEvent::Performance(summary));
    }

    async fn evaluate(
        &self,
        instrument: &Instrument,
        fresh_prices: &HashMap<String, Decimal>,
    ) -> Result<Evaluation, InstrumentOutcome> {
        let symbol = instrument.symbol.as_str();
        let price = fresh_prices.get(&instrument.base_asset).copied().ok_or_else(|| {
            InstrumentOutcome::failed(FailureKind::CollaboratorUnavailable, "no current price this cycle")
        })?;

        let trading = &self.config.trading;
        let series = bounded(
            self.request_timeout,
            self.api_client
                .fetch_price_series(symbol, &trading.interval, trading.candle_limit),
        )
        .await
        .map_err(|e| {
            InstrumentOutcome::failed(FailureKind::CollaboratorUnavailable, format!("price series: {}", e))
        })?;

        let signal = self
            .detector
            .detect(&series)
            .map_err(|e| InstrumentOutcome::failed(FailureKind::InsufficientData, e))?;

        if let Ok(averages) = self.detector.averages(&series) {
            self.publish(EngineEvent::SeriesUpdate(SeriesReport {
                symbol: symbol.to_string(),
                points: series.points().to_vec(),
                short_sma: averages.short,
                long_sma: averages.long,
                signal: Some(signal),
            }));
        }

        let decision = self.positions.decide(symbol, signal, price);
        tracing::debug!(symbol, %price, %signal, ?decision, "Evaluated instrument");

        if signal != CrossSignal::NoCross {
            tracing::info!(symbol, %signal, %price, "Crossover detected");
        }

        Ok(Evaluation {
            instrument: instrument.clone(),
            price,
            decision,
        })
    }

    async fn lot_constraint(&mut self, symbol: &str) -> Result<LotConstraint, InstrumentOutcome> {
        let now = Instant::now();
        if let Some(lot) = self.lot_cache.get(symbol, now) {
            return Ok(lot);
        }

        let lot = bounded(self.request_timeout, self.api_client.get_lot_constraint(symbol))
            .await
            .map_err(|e| {
                InstrumentOutcome::failed(FailureKind::CollaboratorUnavailable, format!("lot constraint: {}", e))
            })?;
        self.lot_cache.insert(symbol, lot, now);
        Ok(lot)
    }

    async fn submit(
        &mut self,
        instrument: &Instrument,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderAck, InstrumentOutcome> {
        let symbol = instrument.symbol.as_str();
        let order = OrderRequest::market(symbol, side, quantity);

        match bounded(self.request_timeout, self.executor.submit_market_order(&order, price)).await {
            Ok(ack) => {
                if ack.simulated {
                    self.record_paper_fill(instrument, &ack, price);
                }
                Ok(ack)
            }
            Err(CallError::Failed(e)) => {
                if e.is_rejection() {
                    self.lot_cache.invalidate(symbol);
                }
                Err(InstrumentOutcome::failed(FailureKind::ExecutionFailure, e))
            }
            Err(timed_out) => Err(InstrumentOutcome::failed(FailureKind::ExecutionFailure, timed_out)),
        }
    }

    /// Moves a simulated fill between the base and quote adjustments.
    fn record_paper_fill(&mut self, instrument: &Instrument, ack: &OrderAck, price: Decimal) {
        let quantity = ack.executed_quantity;
        let notional = quantity * ack.average_price.unwrap_or(price);
        let (base_delta, quote_delta) = match ack.side {
            OrderSide::Buy => (quantity, -notional),
            OrderSide::Sell => (-quantity, notional),
        };

        let base = self
            .paper_holdings
            .entry(instrument.base_asset.clone())
            .or_default();
        *base = (*base + base_delta).max(Decimal::ZERO);
        *self
            .paper_holdings
            .entry(self.config.trading.quote_asset.clone())
            .or_default() += quote_delta;
    }

    async fn enter(
        &mut self,
        evaluation: &Evaluation,
        allocation: Option<Decimal>,
    ) -> Result<InstrumentOutcome, InstrumentOutcome> {
        let symbol = evaluation.instrument.symbol.as_str();
        let price = evaluation.price;

        let allocation = allocation.ok_or_else(|| {
            InstrumentOutcome::failed(
                FailureKind::UntradeableAllocation,
                format!(
                    "free {} balance does not exceed {}",
                    self.config.trading.quote_asset, self.config.trading.min_entry_balance
                ),
            )
        })?;

        let lot = self.lot_constraint(symbol).await?;
        let quantity = self
            .positions
            .size_entry(&lot, allocation, price)
            .map_err(|e| InstrumentOutcome::failed(FailureKind::UntradeableAllocation, e))?;

        let ack = self.submit(&evaluation.instrument, OrderSide::Buy, quantity, price).await?;

        let days = self.config.risk_management.trailing_high_days;
        let trailing_high = match bounded(
            self.request_timeout,
            self.api_client.get_trailing_high(symbol, days),
        )
        .await
        {
            Ok(high) => Some(high),
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Trailing high unavailable; take-profit disabled");
                None
            }
        };

        let thresholds = self
            .positions
            .confirm_entry(symbol, price, trailing_high)
            .map_err(|e| InstrumentOutcome::failed(FailureKind::UntradeableAllocation, e))?;

        tracing::info!(
            symbol,
            quantity = %ack.executed_quantity,
            %price,
            stop_loss = %thresholds.stop_loss_price,
            take_profit = ?thresholds.take_profit_price,
            "Position opened"
        );
        self.publish_trade(&ack, price, None);

        Ok(InstrumentOutcome::Entered {
            quantity: ack.executed_quantity,
            price,
            thresholds,
        })
    }

    async fn exit(
        &mut self,
        evaluation: &Evaluation,
        reason: ExitReason,
        balances: &HashMap<String, Decimal>,
    ) -> Result<InstrumentOutcome, InstrumentOutcome> {
        let symbol = evaluation.instrument.symbol.as_str();
        let price = evaluation.price;

        let base_asset = &evaluation.instrument.base_asset;
        // A paper exit sells only what the engine's simulated buys acquired.
        let free_base = if self.executor.is_live() {
            balances.get(base_asset).copied()
        } else {
            self.paper_holdings.get(base_asset).copied()
        }
        .unwrap_or(Decimal::ZERO);

        let lot = self.lot_constraint(symbol).await?;
        let quantity = self
            .positions
            .size_exit(&lot, free_base, price)
            .map_err(|e| InstrumentOutcome::failed(FailureKind::UntradeableAllocation, e))?;

        let ack = self.submit(&evaluation.instrument, OrderSide::Sell, quantity, price).await?;
        self.positions.confirm_exit(symbol);

        tracing::info!(symbol, %reason, quantity = %ack.executed_quantity, %price, "Position closed");
        self.publish_trade(&ack, price, Some(reason));

        Ok(InstrumentOutcome::Exited {
            quantity: ack.executed_quantity,
            price,
            reason,
        })
    }

    fn publish_trade(&self, ack: &OrderAck, price: Decimal, exit_reason: Option<ExitReason>) {
        self.publish(EngineEvent::TradeExecuted(TradeNotice {
            timestamp: ack.timestamp,
            symbol: ack.symbol.clone(),
            side: ack.side,
            quantity: ack.executed_quantity,
            price: ack.average_price.unwrap_or(price),
            exit_reason,
        }));
    }

    fn publish_log(&self, level: LogLevel, message: String) {
        self.publish(EngineEvent::log(level, message));
    }

    fn publish(&self, event: EngineEvent) {
        // Sending only fails when nobody is subscribed.
        let _ = self.events.send(event);
    }
}
