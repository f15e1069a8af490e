use crate::errors::{EngineError, EngineResult};
use chrono::NaiveDate;
use std::path::PathBuf;

/// Scenario set used when the caller supplies none, or only invalid ones.
pub const DEFAULT_VOLATILITIES: [f64; 3] = [0.25, 0.35, 0.45];

/// Floor on time to expiry (years) so contracts expiring today stay computable.
pub const TIME_EPSILON_YEARS: f64 = 1e-8;

const DAYS_PER_YEAR: f64 = 365.0;

/// What to do with a contract whose type tag is neither a CALL nor a PUT tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTypePolicy {
    /// Price it as a PUT and rank it with the PUTs.
    #[default]
    Put,
    /// Rank it with the PUTs but leave every scenario undefined.
    NoCalc,
}

impl UnknownTypePolicy {
    pub fn parse(raw: &str) -> EngineResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "put" => Ok(Self::Put),
            "no_calc" | "nocalc" => Ok(Self::NoCalc),
            other => Err(EngineError::Config(format!(
                "unknown type policy '{other}' (expected 'put' or 'no_calc')"
            ))),
        }
    }
}

/// Process-level defaults, loaded once at startup.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub risk_free_rate: f64,
    pub volatilities: Vec<f64>,
    pub expiry_date: Option<NaiveDate>,
    pub valuation_date: Option<NaiveDate>,
    pub unknown_type_policy: UnknownTypePolicy,
    pub input_path: Option<PathBuf>,
    pub top_n: usize,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let server_port = var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("SERVER_PORT: {e}")))?;

        let risk_free_rate = parse_rate(&var_or("RISK_FREE_RATE", "0.0"))?;

        let volatilities = sanitize_volatilities(&parse_volatility_list(&var_or(
            "VOLATILITIES",
            "0.25,0.35,0.45",
        )))
        .into_iter()
        .map(|s| s.sigma)
        .collect();

        let expiry_date = lookup("EXPIRY_DATE").map(|s| parse_date(&s)).transpose()?;
        let valuation_date = lookup("VALUATION_DATE").map(|s| parse_date(&s)).transpose()?;

        let unknown_type_policy = UnknownTypePolicy::parse(&var_or("UNKNOWN_TYPE_POLICY", "put"))?;

        let top_n = var_or("TOP_N", "10")
            .parse::<usize>()
            .map_err(|e| EngineError::Config(format!("TOP_N: {e}")))?;

        Ok(Self {
            server_port,
            risk_free_rate,
            volatilities,
            expiry_date,
            valuation_date,
            unknown_type_policy,
            input_path: lookup("INPUT_PATH").filter(|p| !p.trim().is_empty()).map(PathBuf::from),
            top_n,
        })
    }

    /// Combine these defaults with per-request overrides into a run config.
    /// The valuation date falls back to today's local date.
    pub fn resolve_run(&self, overrides: &RunOverrides) -> EngineResult<RunConfig> {
        let expiry_date = match overrides.expiry.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => self
                .expiry_date
                .ok_or_else(|| EngineError::Config("expiry date not set".into()))?,
        };

        let valuation_date = match overrides.valuation.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => self
                .valuation_date
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
        };

        let rate = match overrides.rate.as_deref() {
            Some(raw) => parse_rate(raw)?,
            None => self.risk_free_rate,
        };

        let vols = match overrides.vols.as_deref() {
            Some(raw) => parse_volatility_list(raw),
            None => self.volatilities.clone(),
        };

        let policy = match overrides.policy.as_deref() {
            Some(raw) => UnknownTypePolicy::parse(raw)?,
            None => self.unknown_type_policy,
        };

        RunConfig::new(valuation_date, expiry_date, rate, &vols, policy)
    }
}

/// Raw per-run overrides, still unparsed (query string values).
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub expiry: Option<String>,
    pub valuation: Option<String>,
    pub rate: Option<String>,
    pub vols: Option<String>,
    pub policy: Option<String>,
}

/// One volatility assumption and the label its results are keyed by.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VolScenario {
    pub sigma: f64,
    pub label: String,
}

impl VolScenario {
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            label: scenario_label(sigma),
        }
    }
}

/// `ITM @ 25%` for sigma = 0.25.
pub fn scenario_label(sigma: f64) -> String {
    format!("ITM @ {}%", (sigma * 100.0).round() as i64)
}

/// Immutable parameters of a single ranking run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub valuation_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub risk_free_rate: f64,
    pub scenarios: Vec<VolScenario>,
    pub unknown_type_policy: UnknownTypePolicy,
}

impl RunConfig {
    /// Validated construction. A bad rate is rejected; bad volatilities are
    /// dropped, with the default set substituted if nothing usable remains.
    pub fn new(
        valuation_date: NaiveDate,
        expiry_date: NaiveDate,
        risk_free_rate: f64,
        volatilities: &[f64],
        unknown_type_policy: UnknownTypePolicy,
    ) -> EngineResult<Self> {
        check_rate(risk_free_rate)?;
        Ok(Self {
            valuation_date,
            expiry_date,
            risk_free_rate,
            scenarios: sanitize_volatilities(volatilities),
            unknown_type_policy,
        })
    }

    /// Calendar days until expiry, never negative.
    pub fn days_to_expiry(&self) -> i64 {
        (self.expiry_date - self.valuation_date).num_days().max(0)
    }

    pub fn time_to_expiry_years(&self) -> f64 {
        self.days_to_expiry() as f64 / DAYS_PER_YEAR
    }

    /// Time fed to the probability formula: floored at `TIME_EPSILON_YEARS`.
    pub fn effective_time_years(&self) -> f64 {
        self.time_to_expiry_years().max(TIME_EPSILON_YEARS)
    }
}

/// Split a comma-separated volatility list. Tokens that do not parse are
/// skipped; sign and range checks happen in `sanitize_volatilities`.
pub fn parse_volatility_list(raw: &str) -> Vec<f64> {
    raw.split(',')
        .filter_map(|token| token.trim().parse::<f64>().ok())
        .collect()
}

/// Keep finite positive volatilities, drop label collisions (first wins),
/// and fall back to `DEFAULT_VOLATILITIES` if nothing survives.
pub fn sanitize_volatilities(raw: &[f64]) -> Vec<VolScenario> {
    let mut scenarios: Vec<VolScenario> = Vec::with_capacity(raw.len());
    for &sigma in raw {
        if !sigma.is_finite() || sigma <= 0.0 {
            tracing::warn!(sigma, "discarding non-positive volatility scenario");
            continue;
        }
        let scenario = VolScenario::new(sigma);
        if scenarios.iter().any(|s| s.label == scenario.label) {
            tracing::warn!(sigma, label = %scenario.label, "discarding duplicate volatility scenario");
            continue;
        }
        scenarios.push(scenario);
    }

    if scenarios.is_empty() {
        tracing::warn!("no usable volatility scenarios, using defaults");
        return DEFAULT_VOLATILITIES.iter().map(|&s| VolScenario::new(s)).collect();
    }
    scenarios
}

/// Accepts `YYYY-MM-DD` and `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> EngineResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .map_err(|_| EngineError::Config(format!("invalid date '{raw}'")))
}

fn parse_rate(raw: &str) -> EngineResult<f64> {
    let rate = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| EngineError::Config(format!("risk-free rate '{raw}': {e}")))?;
    check_rate(rate)?;
    Ok(rate)
}

fn check_rate(rate: f64) -> EngineResult<()> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(EngineError::Config(format!(
            "risk-free rate {rate} outside [0, 1]"
        )));
    }
    Ok(())
}
