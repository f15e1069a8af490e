use crate::models::{ExerciseModel, ExerciseParams};
use crate::state::{ContractType, TypeTag};
use statrs::distribution::{ContinuousCDF, Normal};

/// Black-Scholes probability of exercise.
///
/// CALL: P(S_T > K) = Phi(d2)
/// PUT:  P(S_T < K) = Phi(-d2)
///
/// where d2 = (ln(S/K) + (r - sigma^2/2)*T) / (sigma * sqrt(T))
/// under the risk-neutral measure.
pub struct BlackScholesExercise {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholesExercise {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }
}

impl Default for BlackScholesExercise {
    fn default() -> Self {
        Self::new()
    }
}

impl ExerciseModel for BlackScholesExercise {
    #[inline]
    fn name(&self) -> &'static str {
        "Black-Scholes"
    }

    #[inline]
    fn probability(&self, params: &ExerciseParams, contract_type: ContractType) -> Option<f64> {
        let d2 = params.d2();
        let p = match contract_type {
            ContractType::Call => self.normal.cdf(d2),
            ContractType::Put => self.normal.cdf(-d2),
        };
        p.is_finite().then_some(p)
    }
}

/// One-shot form taking the raw type tag. Unrecognized tags price as PUT.
pub fn probability_of_exercise(
    spot: f64,
    strike: f64,
    sigma: f64,
    rate: f64,
    time_years: f64,
    type_tag: &str,
) -> Option<f64> {
    let params = ExerciseParams::new(spot, strike, sigma, rate, time_years)?;
    BlackScholesExercise::new().probability(&params, TypeTag::parse(type_tag).contract_type())
}
