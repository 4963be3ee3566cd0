use chrono::{DateTime, Utc};
use core_types::ExitReason;
use risk::RiskThresholds;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The recoverable failure classes of a cycle. None of them stops the other instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The series was too short to evaluate both averages at the last two points.
    InsufficientData,
    /// The allocation or balance could not be turned into a legal order.
    UntradeableAllocation,
    /// The gateway rejected the order, failed, or timed out.
    ExecutionFailure,
    /// A market-data, account or lot-constraint call failed or timed out.
    CollaboratorUnavailable,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::InsufficientData => "insufficient data",
            FailureKind::UntradeableAllocation => "untradeable allocation",
            FailureKind::ExecutionFailure => "execution failure",
            FailureKind::CollaboratorUnavailable => "collaborator unavailable",
        };
        f.write_str(label)
    }
}

/// What happened to one instrument during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InstrumentOutcome {
    Entered {
        quantity: Decimal,
        price: Decimal,
        thresholds: RiskThresholds,
    },
    Exited {
        quantity: Decimal,
        price: Decimal,
        reason: ExitReason,
    },
    Held,
    Waiting,
    Failed {
        kind: FailureKind,
        detail: String,
    },
}

impl InstrumentOutcome {
    pub fn failed(kind: FailureKind, detail: impl fmt::Display) -> Self {
        InstrumentOutcome::Failed {
            kind,
            detail: detail.to_string(),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            InstrumentOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// The result of one engine cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// `None` when no equity sample could be recorded.
    pub valuation: Option<Decimal>,
    pub outcomes: BTreeMap<String, InstrumentOutcome>,
    /// Account-level calls that failed and were answered with last-known values.
    pub degraded: Vec<String>,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            valuation: None,
            outcomes: BTreeMap::new(),
            degraded: Vec::new(),
        }
    }

    pub fn outcome(&self, symbol: &str) -> Option<&InstrumentOutcome> {
        self.outcomes.get(symbol)
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .values()
            .filter(|outcome| outcome.failure_kind().is_some())
            .count()
    }
}
