use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::analytics::{AlertThresholds, ScenarioConfig};
use crate::error::{AppError, Result};
use crate::types::ConsumptionUnit;

pub const ADVISORY_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const ADVISORY_MODEL: &str = "gpt-4o-mini";

/// Live feed request timeout (seconds).
pub const FEED_TIMEOUT_SECS: u64 = 30;

/// Default advisory request timeout (seconds).
pub const ADVISORY_TIMEOUT_SECS: u64 = 10;

/// Shown in place of the advisory reply whenever the external service is
/// unconfigured, unreachable, slow, or returns something unusable.
pub const ADVISORY_FALLBACK: &str = "Advisory service is unavailable right now. \
The indicators, alerts and scenario projection above are unaffected; \
please try your question again later.";

/// Days per month used when the feed reports monthly consumption.
pub const DAYS_PER_MONTH: Decimal = dec!(30);

/// Default alert and scenario thresholds.
pub mod thresholds {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    pub const CRITICAL_RUNWAY_DAYS: Decimal = dec!(15);
    pub const WARNING_RUNWAY_DAYS: Decimal = dec!(30);
    /// Export quota (tons) above which supply risk is assumed.
    pub const SHORTAGE_THRESHOLD: Decimal = dec!(300000);
    pub const PROJECTION_PERIODS: u32 = 4;
    /// Upper bound on the projection horizon accepted from config or callers.
    pub const MAX_PROJECTION_PERIODS: u32 = 52;
}

/// Per-period price steps for the scenario projection.
pub mod projection {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Added each period on the AT_RISK branch.
    pub const ESCALATION_STEP: Decimal = dec!(2.50);
    /// Subtracted each period on the STABLE branch.
    pub const EASING_STEP: Decimal = dec!(0.50);
}

/// Bounds on the rendered advisory prompt.
pub mod prompt {
    pub const MAX_QUESTION_CHARS: usize = 500;
    pub const MAX_PARAMETERS: usize = 32;
    pub const MAX_PROMPT_CHARS: usize = 2000;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    /// Live market feed returning a JSON array of rows (FEED_URL). Unset = fallback table only.
    pub feed_url: Option<String>,
    /// Unit of the feed's `consumption_tons` column (CONSUMPTION_UNIT=daily|monthly).
    pub consumption_unit: ConsumptionUnit,
    pub advisory_url: String,
    /// Bearer token for the advisory service (ADVISORY_API_KEY). Unset = always fall back.
    pub advisory_api_key: Option<String>,
    pub advisory_model: String,
    pub advisory_timeout_secs: u64,
    pub alert_thresholds: AlertThresholds,
    pub scenario: ScenarioConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let consumption_unit = match std::env::var("CONSUMPTION_UNIT") {
            Ok(v) => v.parse::<ConsumptionUnit>()?,
            Err(_) => ConsumptionUnit::Daily,
        };

        let critical_spread = match optional_env("CRITICAL_SPREAD") {
            Some(v) => Some(parse_decimal("CRITICAL_SPREAD", &v)?),
            None => None,
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            feed_url: optional_env("FEED_URL"),
            consumption_unit,
            advisory_url: std::env::var("ADVISORY_URL")
                .unwrap_or_else(|_| ADVISORY_URL.to_string()),
            advisory_api_key: optional_env("ADVISORY_API_KEY"),
            advisory_model: std::env::var("ADVISORY_MODEL")
                .unwrap_or_else(|_| ADVISORY_MODEL.to_string()),
            advisory_timeout_secs: match optional_env("ADVISORY_TIMEOUT_SECS") {
                Some(v) => parse_timeout_secs(&v)?,
                None => ADVISORY_TIMEOUT_SECS,
            },
            alert_thresholds: AlertThresholds {
                critical_runway_days: decimal_env(
                    "CRITICAL_RUNWAY_DAYS",
                    thresholds::CRITICAL_RUNWAY_DAYS,
                )?,
                warning_runway_days: decimal_env(
                    "WARNING_RUNWAY_DAYS",
                    thresholds::WARNING_RUNWAY_DAYS,
                )?,
                critical_spread,
            },
            scenario: ScenarioConfig {
                shortage_threshold: decimal_env("SHORTAGE_THRESHOLD", thresholds::SHORTAGE_THRESHOLD)?,
                projection_periods: match optional_env("PROJECTION_PERIODS") {
                    Some(v) => parse_projection_periods(&v)?,
                    None => thresholds::PROJECTION_PERIODS,
                },
            },
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_timeout_secs(raw: &str) -> Result<u64> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(AppError::Config(format!(
            "ADVISORY_TIMEOUT_SECS must be a positive whole number of seconds, got {raw:?}"
        ))),
    }
}

fn parse_projection_periods(raw: &str) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(n) if (1..=thresholds::MAX_PROJECTION_PERIODS).contains(&n) => Ok(n),
        _ => Err(AppError::Config(format!(
            "PROJECTION_PERIODS must be between 1 and {}, got {raw:?}",
            thresholds::MAX_PROJECTION_PERIODS
        ))),
    }
}

fn decimal_env(key: &str, default: Decimal) -> Result<Decimal> {
    match optional_env(key) {
        Some(v) => parse_decimal(key, &v),
        None => Ok(default),
    }
}

fn parse_decimal(key: &str, raw: &str) -> Result<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|_| AppError::Config(format!("{key} must be a decimal number, got {raw:?}")))
}
