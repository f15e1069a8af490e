pub mod black_scholes;

use crate::state::ContractType;

/// All exercise-probability models implement this trait.
/// probability() must be a pure function: deterministic output from inputs only.
/// Send + Sync required for use across rayon workers.
pub trait ExerciseModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Risk-neutral probability of finishing in-the-money, in [0, 1].
    /// `None` when the inputs admit no calculation. Never panics.
    fn probability(&self, params: &ExerciseParams, contract_type: ContractType) -> Option<f64>;
}

/// Validated inputs with the log-moneyness and vol-time terms precomputed.
/// Only constructible when every precondition holds.
#[derive(Debug, Clone, Copy)]
pub struct ExerciseParams {
    pub spot: f64,
    pub strike: f64,
    pub sigma: f64,
    pub rate: f64,
    pub time_years: f64,
    // Precomputed
    pub ln_s_k: f64,
    pub sigma_sqrt_t: f64,
}

impl ExerciseParams {
    /// `None` unless spot, strike, sigma and time are finite and strictly positive.
    #[inline]
    pub fn new(spot: f64, strike: f64, sigma: f64, rate: f64, time_years: f64) -> Option<Self> {
        let positive = |x: f64| x.is_finite() && x > 0.0;
        if !(positive(spot) && positive(strike) && positive(sigma) && positive(time_years))
            || !rate.is_finite()
        {
            return None;
        }

        Some(Self {
            spot,
            strike,
            sigma,
            rate,
            time_years,
            ln_s_k: (spot / strike).ln(),
            sigma_sqrt_t: sigma * time_years.sqrt(),
        })
    }

    /// d2 = (ln(S/K) + (r - sigma^2/2) * T) / (sigma * sqrt(T))
    #[inline]
    pub fn d2(&self) -> f64 {
        (self.ln_s_k + (self.rate - 0.5 * self.sigma * self.sigma) * self.time_years)
            / self.sigma_sqrt_t
    }
}
