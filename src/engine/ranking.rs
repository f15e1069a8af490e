use crate::state::{ContractRecord, ContractType, ExerciseLabel};
use std::cmp::Ordering;

/// Mean probability at or above this is HIGH.
pub const HIGH_THRESHOLD: f64 = 0.70;
/// Mean probability at or above this (and below HIGH) is MEDIUM.
pub const MEDIUM_THRESHOLD: f64 = 0.40;

/// Bucket a mean exercise probability. Pure function.
#[inline]
pub fn classify(mean_probability: Option<f64>) -> ExerciseLabel {
    match mean_probability {
        None => ExerciseLabel::NoCalc,
        Some(p) if p >= HIGH_THRESHOLD => ExerciseLabel::High,
        Some(p) if p >= MEDIUM_THRESHOLD => ExerciseLabel::Medium,
        Some(_) => ExerciseLabel::Low,
    }
}

/// Records of one contract type, most likely to be exercised first.
pub fn rank<I>(records: I, contract_type: ContractType) -> Vec<ContractRecord>
where
    I: IntoIterator<Item = ContractRecord>,
{
    let mut ranked: Vec<ContractRecord> = records
        .into_iter()
        .filter(|r| r.contract_type == contract_type)
        .collect();
    sort_ranked(&mut ranked);
    ranked
}

/// Split into (CALL ranking, PUT ranking). Each side is ranked on its own.
pub fn partition_and_rank(records: Vec<ContractRecord>) -> (Vec<ContractRecord>, Vec<ContractRecord>) {
    let (calls, puts): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| r.contract_type == ContractType::Call);
    (rank(calls, ContractType::Call), rank(puts, ContractType::Put))
}

/// First `n` entries of a ranking.
#[inline]
pub fn top(ranked: &[ContractRecord], n: usize) -> &[ContractRecord] {
    &ranked[..n.min(ranked.len())]
}

/// Stable: equal means keep input order.
fn sort_ranked(records: &mut [ContractRecord]) {
    records.sort_by(|a, b| descending_undefined_last(a.mean_probability, b.mean_probability));
}

/// Descending by value, with every `None` after every `Some`.
fn descending_undefined_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
