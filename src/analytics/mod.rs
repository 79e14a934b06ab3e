//! Pure, synchronous market analytics. Nothing here does I/O or holds state;
//! every call recomputes from the rows it is given.

pub mod classifier;
pub mod context;
pub mod deriver;
pub mod scenario;
pub mod summary;

pub use classifier::{classify, AlertThresholds};
pub use context::build_context;
pub use deriver::derive;
pub use scenario::{simulate, ScenarioConfig};
pub use summary::summarize;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::types::{Alert, DerivedRow, MarketRow, MarketSummary, ScenarioResult};

/// Everything one evaluation produces for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub derived: Vec<DerivedRow>,
    pub alerts: Vec<Alert>,
    pub scenario: ScenarioResult,
    pub summary: MarketSummary,
}

/// Overflow-checked total of `values`; `what` names the column in the error.
pub(crate) fn checked_sum(values: impl IntoIterator<Item = Decimal>, what: &str) -> Result<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| AppError::data_quality("national", format!("{what} total overflows")))
    })
}

/// Derive, then alert, simulate and summarize from the derived rows only.
/// A snapshot the deriver rejects never reaches the later stages.
pub fn evaluate(
    rows: &[MarketRow],
    lever: Decimal,
    thresholds: &AlertThresholds,
    scenario: &ScenarioConfig,
) -> Result<Evaluation> {
    let derived = derive(rows)?;
    let alerts = classify(&derived, thresholds);
    let scenario = simulate(lever, &derived, scenario)?;
    let summary = summarize(&derived)?;
    Ok(Evaluation {
        derived,
        alerts,
        scenario,
        summary,
    })
}
