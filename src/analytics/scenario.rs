use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analytics::checked_sum;
use crate::config::projection::{EASING_STEP, ESCALATION_STEP};
use crate::config::thresholds::{MAX_PROJECTION_PERIODS, PROJECTION_PERIODS, SHORTAGE_THRESHOLD};
use crate::error::{AppError, Result};
use crate::types::{DerivedRow, ProjectionPoint, ScenarioResult, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Lever value above which supply risk is assumed. The boundary itself is STABLE.
    pub shortage_threshold: Decimal,
    pub projection_periods: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            shortage_threshold: SHORTAGE_THRESHOLD,
            projection_periods: PROJECTION_PERIODS,
        }
    }
}

/// Project the retail price under a policy lever (export quota, tons).
///
/// Two branches, no randomness:
/// - `lever > shortage_threshold`: AT_RISK, price climbs by [`ESCALATION_STEP`] each period.
/// - otherwise: STABLE, price eases by [`EASING_STEP`] each period, floored at zero.
///
/// Both start at the baseline's average retail price in period 1. This is a
/// directional scenario, not a forecast.
pub fn simulate(lever: Decimal, baseline: &[DerivedRow], config: &ScenarioConfig) -> Result<ScenarioResult> {
    if config.projection_periods == 0 || config.projection_periods > MAX_PROJECTION_PERIODS {
        return Err(AppError::InvalidConfig(format!(
            "projection_periods must be between 1 and {MAX_PROJECTION_PERIODS}, got {}",
            config.projection_periods
        )));
    }
    let start = average_retail_price(baseline)?;

    let verdict = if lever > config.shortage_threshold {
        Verdict::AtRisk
    } else {
        Verdict::Stable
    };

    let projection = (1..=config.projection_periods)
        .map(|period_index| {
            Ok(ProjectionPoint {
                period_index,
                projected_price: projected_price(verdict, start, period_index)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ScenarioResult {
        lever_value: lever,
        verdict,
        projection,
    })
}

fn projected_price(verdict: Verdict, start: Decimal, period_index: u32) -> Result<Decimal> {
    let elapsed = Decimal::from(period_index - 1);
    let price = match verdict {
        Verdict::AtRisk => ESCALATION_STEP
            .checked_mul(elapsed)
            .and_then(|step| start.checked_add(step)),
        Verdict::Stable => EASING_STEP
            .checked_mul(elapsed)
            .and_then(|step| start.checked_sub(step))
            .map(|p| p.max(Decimal::ZERO)),
    };
    price.ok_or_else(|| {
        AppError::data_quality(
            "national",
            format!("projected price overflows in period {period_index}"),
        )
    })
}

/// Mean retail price across the baseline, rounded to 2 dp.
pub(crate) fn average_retail_price(baseline: &[DerivedRow]) -> Result<Decimal> {
    if baseline.is_empty() {
        return Err(AppError::InsufficientData(
            "no regions to average a starting price from".to_string(),
        ));
    }
    let total = checked_sum(baseline.iter().map(|r| r.row.retail_price), "retail_price")?;
    Ok((total / Decimal::from(baseline.len())).round_dp(2))
}
