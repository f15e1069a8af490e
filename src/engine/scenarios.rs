use crate::config::VolScenario;
use crate::models::{ExerciseModel, ExerciseParams};
use crate::state::{ContractRecord, ScenarioProbability};
use smallvec::SmallVec;

/// Run `model` once per volatility scenario and attach the results to the
/// record, keyed by scenario label, together with their mean.
///
/// Each call touches only `record`, so records can be aggregated in any
/// order or in parallel.
pub fn aggregate(
    model: &dyn ExerciseModel,
    record: &mut ContractRecord,
    scenarios: &[VolScenario],
    rate: f64,
    time_years: f64,
) {
    let results: SmallVec<[ScenarioProbability; 4]> = scenarios
        .iter()
        .map(|scenario| ScenarioProbability {
            label: scenario.label.clone(),
            sigma: scenario.sigma,
            probability: scenario_probability(model, record, scenario.sigma, rate, time_years),
        })
        .collect();

    record.mean_probability = mean_defined(results.iter().map(|s| s.probability));
    record.scenarios = results;
}

/// Fill every scenario slot with "no calculation".
pub fn leave_undefined(record: &mut ContractRecord, scenarios: &[VolScenario]) {
    record.scenarios = scenarios
        .iter()
        .map(|scenario| ScenarioProbability {
            label: scenario.label.clone(),
            sigma: scenario.sigma,
            probability: None,
        })
        .collect();
    record.mean_probability = None;
}

#[inline]
fn scenario_probability(
    model: &dyn ExerciseModel,
    record: &ContractRecord,
    sigma: f64,
    rate: f64,
    time_years: f64,
) -> Option<f64> {
    let spot = record.spot_price?;
    let strike = record.strike_price?;
    let params = ExerciseParams::new(spot, strike, sigma, rate, time_years)?;
    model.probability(&params, record.contract_type)
}

/// Arithmetic mean of the defined values. Undefined values are absent from
/// the mean, not zeros. `None` if nothing is defined.
pub fn mean_defined<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::black_scholes::BlackScholesExercise;
    use crate::state::{ContractType, ExerciseLabel};

    fn record(spot: Option<f64>, strike: Option<f64>, contract_type: ContractType) -> ContractRecord {
        ContractRecord {
            underlying_symbol: "PETR4".into(),
            option_code: "PETRJ100".into(),
            expiry_tag: String::new(),
            type_tag: "CV".into(),
            contract_type,
            type_recognized: true,
            spot_price: spot,
            strike_price: strike,
            distance_pct: None,
            scenarios: SmallVec::new(),
            mean_probability: None,
            label: ExerciseLabel::NoCalc,
        }
    }

    fn scenarios(sigmas: &[f64]) -> Vec<VolScenario> {
        sigmas.iter().map(|&s| VolScenario::new(s)).collect()
    }

    /// Defined only for sigma below 0.4; lets tests control gaps.
    struct PartialModel;

    impl ExerciseModel for PartialModel {
        fn name(&self) -> &'static str {
            "partial"
        }

        fn probability(&self, params: &ExerciseParams, _contract_type: ContractType) -> Option<f64> {
            (params.sigma < 0.4).then_some(params.sigma)
        }
    }

    #[test]
    fn test_mean_of_three_scenarios() {
        let model = BlackScholesExercise::new();
        let mut rec = record(Some(10.0), Some(10.5), ContractType::Call);
        aggregate(&model, &mut rec, &scenarios(&[0.25, 0.35, 0.45]), 0.0, 0.25);

        assert_eq!(rec.scenarios.len(), 3);
        let values: Vec<f64> = rec.scenarios.iter().map(|s| s.probability.unwrap()).collect();
        let expected = (values[0] + values[1] + values[2]) / 3.0;
        assert!((rec.mean_probability.unwrap() - expected).abs() < 1e-15);

        let labels: Vec<&str> = rec.scenarios.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["ITM @ 25%", "ITM @ 35%", "ITM @ 45%"]);
    }

    #[test]
    fn test_scenarios_keep_configured_order() {
        let model = BlackScholesExercise::new();
        let mut rec = record(Some(10.0), Some(10.0), ContractType::Put);
        aggregate(&model, &mut rec, &scenarios(&[0.45, 0.25]), 0.0, 0.25);
        assert_eq!(rec.scenarios[0].sigma, 0.45);
        assert_eq!(rec.scenarios[1].sigma, 0.25);
    }

    #[test]
    fn test_undefined_scenarios_excluded_from_mean() {
        let mut rec = record(Some(10.0), Some(10.0), ContractType::Call);
        aggregate(&PartialModel, &mut rec, &scenarios(&[0.2, 0.3, 0.5]), 0.0, 0.25);

        assert_eq!(rec.scenarios[2].probability, None);
        // (0.2 + 0.3) / 2, not (0.2 + 0.3 + 0) / 3
        assert!((rec.mean_probability.unwrap() - 0.25).abs() < 1e-15);
    }

    #[test]
    fn test_all_undefined_gives_no_mean() {
        let model = BlackScholesExercise::new();
        let mut rec = record(None, Some(10.0), ContractType::Call);
        aggregate(&model, &mut rec, &scenarios(&[0.25, 0.35]), 0.0, 0.25);
        assert!(rec.scenarios.iter().all(|s| s.probability.is_none()));
        assert_eq!(rec.mean_probability, None);

        let mut rec = record(Some(10.0), Some(0.0), ContractType::Put);
        aggregate(&model, &mut rec, &scenarios(&[0.25]), 0.0, 0.25);
        assert_eq!(rec.mean_probability, None);
    }

    #[test]
    fn test_leave_undefined() {
        let mut rec = record(Some(10.0), Some(10.0), ContractType::Put);
        rec.mean_probability = Some(0.5);
        leave_undefined(&mut rec, &scenarios(&[0.25, 0.35]));
        assert_eq!(rec.scenarios.len(), 2);
        assert_eq!(rec.scenarios[1].label, "ITM @ 35%");
        assert_eq!(rec.mean_probability, None);
    }

    #[test]
    fn test_mean_defined() {
        assert_eq!(mean_defined([None, None]), None);
        assert_eq!(mean_defined(Vec::<Option<f64>>::new()), None);
        assert_eq!(mean_defined([Some(0.2), None, Some(0.6)]), Some(0.4));
    }
}
