use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::DAYS_PER_MONTH;
use crate::error::AppError;

// ---------------------------------------------------------------------------
// Market rows
// ---------------------------------------------------------------------------

/// One region's raw observed values at one point in time.
/// Prices are currency units per kg; stock and consumption are tons.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketRow {
    pub region: String,
    pub retail_price: Decimal,
    pub ex_mill_price: Decimal,
    pub stock_tons: Decimal,
    /// Always per day. Monthly feeds are converted at ingestion, see [`ConsumptionUnit`].
    pub daily_consumption_tons: Decimal,
}

/// A [`MarketRow`] plus the indicators computed from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRow {
    #[serde(flatten)]
    pub row: MarketRow,
    /// retail - ex-mill. Negative means the retail price sits below ex-mill.
    pub spread: Decimal,
    /// Whole days of stock left, truncated toward zero.
    pub runway_days: Decimal,
}

impl DerivedRow {
    pub fn region(&self) -> &str {
        &self.row.region
    }
}

/// Unit of the consumption figure a feed reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumptionUnit {
    Daily,
    Monthly,
}

impl ConsumptionUnit {
    /// Convert a consumption figure in this unit to tons per day.
    pub fn to_daily(self, tons: Decimal) -> Decimal {
        match self {
            ConsumptionUnit::Daily => tons,
            ConsumptionUnit::Monthly => tons / DAYS_PER_MONTH,
        }
    }
}

impl std::str::FromStr for ConsumptionUnit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(ConsumptionUnit::Daily),
            "monthly" | "month" => Ok(ConsumptionUnit::Monthly),
            other => Err(AppError::Config(format!(
                "CONSUMPTION_UNIT must be daily or monthly, got {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for ConsumptionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumptionUnit::Daily => write!(f, "daily"),
            ConsumptionUnit::Monthly => write!(f, "monthly"),
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Ordered: Info < Warning < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Not emitted by the classifier; healthy regions produce no alert at all.
    #[allow(dead_code)]
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// Which indicator raised the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Runway,
    Spread,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Runway => write!(f, "runway"),
            AlertKind::Spread => write!(f, "spread"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub region: String,
    pub severity: Severity,
    pub kind: AlertKind,
    pub message: String,
    pub metric_value: Decimal,
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Stable,
    AtRisk,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Stable => write!(f, "STABLE"),
            Verdict::AtRisk => write!(f, "AT_RISK"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectionPoint {
    /// 1-based.
    pub period_index: u32,
    pub projected_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    pub lever_value: Decimal,
    pub verdict: Verdict,
    pub projection: Vec<ProjectionPoint>,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// National aggregates over one derived snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub regions: usize,
    pub avg_retail_price: Decimal,
    pub avg_ex_mill_price: Decimal,
    pub avg_spread: Decimal,
    pub total_stock_tons: Decimal,
    pub total_daily_consumption_tons: Decimal,
    pub national_runway_days: Decimal,
}

// ---------------------------------------------------------------------------
// Advisory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryContext {
    pub parameters: BTreeMap<String, Decimal>,
    pub question: String,
    pub prompt_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvisoryReply {
    pub text: String,
    /// True when `text` is the static fallback message.
    pub fallback: bool,
    pub latency_ms: u64,
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Where a snapshot came from. Reported to callers, never consulted by the analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedOrigin {
    Live,
    Fallback,
}

impl std::fmt::Display for FeedOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedOrigin::Live => write!(f, "live"),
            FeedOrigin::Fallback => write!(f, "fallback"),
        }
    }
}
