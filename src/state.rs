use crate::config::AppConfig;
use portable_atomic::{AtomicU64, Ordering};
use smallvec::SmallVec;
use std::sync::Arc;

// ── Contract type ──

/// Side of the contract used for both pricing and ranking partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractType {
    Call,
    Put,
}

impl std::fmt::Display for ContractType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// Parsed source type tag. Broker exports use `CV`/`PV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Call,
    Put,
    /// Anything else. Mapped to PUT, never to CALL.
    Unrecognized,
}

impl TypeTag {
    /// Trimmed, case-insensitive.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CV" | "CALL" => Self::Call,
            "PV" | "PUT" => Self::Put,
            _ => Self::Unrecognized,
        }
    }

    #[inline]
    pub fn contract_type(self) -> ContractType {
        match self {
            Self::Call => ContractType::Call,
            Self::Put | Self::Unrecognized => ContractType::Put,
        }
    }

    #[inline]
    pub fn is_recognized(self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

// ── Classification ──

/// Qualitative bucket for a mean exercise probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseLabel {
    NoCalc,
    Low,
    Medium,
    High,
}

impl ExerciseLabel {
    pub fn description(&self) -> &'static str {
        match self {
            Self::NoCalc => "No calculation",
            Self::Low => "Low chance of exercise",
            Self::Medium => "Medium chance of exercise",
            Self::High => "High chance of exercise",
        }
    }
}

impl std::fmt::Display for ExerciseLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

// ── Records ──

/// One row of the input table, cells still as raw strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawContract {
    pub underlying_symbol: String,
    pub option_code: String,
    pub spot: String,
    pub strike: String,
    /// `None` when the table has no distance column.
    pub distance_pct: Option<String>,
    pub type_tag: String,
    pub expiry_tag: String,
}

/// Result of one volatility scenario for one contract.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScenarioProbability {
    pub label: String,
    pub sigma: f64,
    pub probability: Option<f64>,
}

/// A contract after normalization, aggregation and classification.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContractRecord {
    pub underlying_symbol: String,
    pub option_code: String,
    pub expiry_tag: String,
    pub type_tag: String,
    pub contract_type: ContractType,
    pub type_recognized: bool,
    pub spot_price: Option<f64>,
    pub strike_price: Option<f64>,
    pub distance_pct: Option<f64>,
    pub scenarios: SmallVec<[ScenarioProbability; 4]>,
    pub mean_probability: Option<f64>,
    pub label: ExerciseLabel,
}

// ── Shared service state ──

/// Lock-free counters for the service endpoints.
#[derive(Debug, Default)]
pub struct Counters {
    pub runs_completed: AtomicU64,
    pub rows_processed: AtomicU64,
    pub rows_no_calc: AtomicU64,
    pub runs_rejected: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            rows_processed: self.rows_processed.load(Ordering::Relaxed),
            rows_no_calc: self.rows_no_calc.load(Ordering::Relaxed),
            runs_rejected: self.runs_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CounterSnapshot {
    pub runs_completed: u64,
    pub rows_processed: u64,
    pub rows_no_calc: u64,
    pub runs_rejected: u64,
}

pub struct AppState {
    pub config: AppConfig,
    pub counters: Counters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            counters: Counters::default(),
        })
    }
}
