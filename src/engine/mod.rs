pub mod ranking;
pub mod scenarios;

use crate::config::{RunConfig, UnknownTypePolicy};
use crate::input::{normalize, OptionTable};
use crate::models::ExerciseModel;
use crate::state::{ContractRecord, ExerciseLabel, RawContract, TypeTag};
use chrono::NaiveDate;
use rayon::prelude::*;
use smallvec::SmallVec;

/// Audit record of the inputs a run used.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunParameters {
    pub run_id: String,
    pub model: &'static str,
    pub valuation_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub days_to_expiry: i64,
    pub time_years: f64,
    pub risk_free_rate: f64,
    pub volatility_scenarios: Vec<f64>,
    pub unknown_type_policy: UnknownTypePolicy,
}

impl RunParameters {
    fn new(run: &RunConfig, model: &dyn ExerciseModel) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            model: model.name(),
            valuation_date: run.valuation_date,
            expiry_date: run.expiry_date,
            days_to_expiry: run.days_to_expiry(),
            time_years: (run.time_to_expiry_years() * 1e6).round() / 1e6,
            risk_free_rate: run.risk_free_rate,
            volatility_scenarios: run.scenarios.iter().map(|s| s.sigma).collect(),
            unknown_type_policy: run.unknown_type_policy,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub total_rows: usize,
    pub calls: usize,
    pub puts: usize,
    pub no_calc: usize,
    pub unrecognized_types: usize,
}

/// Output of a run: one ranking per contract type plus the audit record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RankingReport {
    pub parameters: RunParameters,
    pub summary: RunSummary,
    pub calls: Vec<ContractRecord>,
    pub puts: Vec<ContractRecord>,
}

impl RankingReport {
    /// Keep only the first `n` of each ranking. The summary still counts all rows.
    pub fn truncate(&mut self, n: usize) {
        self.calls.truncate(n);
        self.puts.truncate(n);
    }
}

/// Rank every row of `table`. Rows are evaluated independently in parallel;
/// a row that cannot be computed ends up NO_CALC without affecting the rest.
pub fn run(table: &OptionTable, config: &RunConfig, model: &dyn ExerciseModel) -> RankingReport {
    let parameters = RunParameters::new(config, model);

    let records: Vec<ContractRecord> = table
        .rows
        .par_iter()
        .map(|raw| evaluate(raw, config, model))
        .collect();

    let summary = RunSummary {
        total_rows: records.len(),
        no_calc: records.iter().filter(|r| r.label == ExerciseLabel::NoCalc).count(),
        unrecognized_types: records.iter().filter(|r| !r.type_recognized).count(),
        ..RunSummary::default()
    };

    let (calls, puts) = ranking::partition_and_rank(records);
    let summary = RunSummary {
        calls: calls.len(),
        puts: puts.len(),
        ..summary
    };

    if summary.unrecognized_types > 0 {
        tracing::warn!(
            run_id = %parameters.run_id,
            rows = summary.unrecognized_types,
            policy = ?config.unknown_type_policy,
            "unrecognized contract type tags ranked with PUTs"
        );
    }

    tracing::info!(
        run_id = %parameters.run_id,
        rows = summary.total_rows,
        calls = summary.calls,
        puts = summary.puts,
        no_calc = summary.no_calc,
        days_to_expiry = parameters.days_to_expiry,
        scenarios = parameters.volatility_scenarios.len(),
        "ranking run complete"
    );

    RankingReport {
        parameters,
        summary,
        calls,
        puts,
    }
}

/// Normalize, aggregate and classify a single row. Pure function of the row
/// and the run config.
pub fn evaluate(raw: &RawContract, run: &RunConfig, model: &dyn ExerciseModel) -> ContractRecord {
    let mut record = normalize_row(raw);

    let skip = !record.type_recognized && run.unknown_type_policy == UnknownTypePolicy::NoCalc;
    if skip {
        scenarios::leave_undefined(&mut record, &run.scenarios);
    } else {
        scenarios::aggregate(
            model,
            &mut record,
            &run.scenarios,
            run.risk_free_rate,
            run.effective_time_years(),
        );
    }

    record.label = ranking::classify(record.mean_probability);
    record
}

fn normalize_row(raw: &RawContract) -> ContractRecord {
    let tag = TypeTag::parse(&raw.type_tag);
    let spot_price = normalize(&raw.spot, false);
    let strike_price = normalize(&raw.strike, false);

    let distance_pct = raw
        .distance_pct
        .as_deref()
        .and_then(|cell| normalize(cell, true))
        .or_else(|| derived_distance_pct(spot_price, strike_price));

    ContractRecord {
        underlying_symbol: raw.underlying_symbol.clone(),
        option_code: raw.option_code.clone(),
        expiry_tag: raw.expiry_tag.clone(),
        type_tag: raw.type_tag.clone(),
        contract_type: tag.contract_type(),
        type_recognized: tag.is_recognized(),
        spot_price,
        strike_price,
        distance_pct,
        scenarios: SmallVec::new(),
        mean_probability: None,
        label: ExerciseLabel::NoCalc,
    }
}

/// (spot / strike - 1) * 100, when both prices are usable.
fn derived_distance_pct(spot: Option<f64>, strike: Option<f64>) -> Option<f64> {
    match (spot, strike) {
        (Some(s), Some(k)) if k > 0.0 => Some((s / k - 1.0) * 100.0),
        _ => None,
    }
}
