use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, FEED_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::types::{ConsumptionUnit, FeedOrigin, MarketRow};

#[derive(Debug, Default, Clone, Serialize)]
pub struct FeedStats {
    pub api_total: usize,
    pub rejected_not_object: usize,
    pub rejected_no_region: usize,
    pub rejected_missing_field: usize,
    pub rejected_not_numeric: usize,
    pub accepted: usize,
    /// Sample of (region or "?", reason) for rejected rows.
    pub rejection_samples: Vec<(String, String)>,
}

/// Rows plus the parse statistics of the batch that produced them.
#[derive(Debug, Clone)]
pub struct FeedBatch {
    pub rows: Vec<MarketRow>,
    pub stats: FeedStats,
}

/// One snapshot handed to the analytics, labelled with where it came from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub rows: Vec<MarketRow>,
    pub origin: FeedOrigin,
    pub stats: FeedStats,
}

/// A source of market rows.
pub trait MarketSource {
    fn fetch(&self) -> impl Future<Output = Result<FeedBatch>> + Send;
}

// ---------------------------------------------------------------------------
// Live feed
// ---------------------------------------------------------------------------

/// HTTP feed returning a JSON array of region rows.
pub struct LiveFeed {
    client: reqwest::Client,
    url: String,
    unit: ConsumptionUnit,
}

impl LiveFeed {
    pub fn new(url: String, unit: ConsumptionUnit) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, url, unit })
    }
}

impl MarketSource for LiveFeed {
    async fn fetch(&self) -> Result<FeedBatch> {
        let resp = self.client.get(&self.url).send().await?.error_for_status()?;
        let body: serde_json::Value = resp.json().await?;
        let batch = parse_feed(&body, self.unit)?;
        if batch.rows.is_empty() {
            return Err(AppError::Feed(format!(
                "no usable rows in {} feed entries",
                batch.stats.api_total
            )));
        }
        Ok(batch)
    }
}

/// Parse a feed body, keeping usable rows and counting the rest.
/// `consumption_tons` is read in `unit` and converted to per-day here.
pub fn parse_feed(body: &serde_json::Value, unit: ConsumptionUnit) -> Result<FeedBatch> {
    let items = match body.as_array() {
        Some(a) => a,
        None => return Err(AppError::Feed("feed response was not an array".to_string())),
    };

    let mut rows = Vec::with_capacity(items.len());
    let mut stats = FeedStats {
        api_total: items.len(),
        ..FeedStats::default()
    };

    for item in items {
        match parse_feed_row_checked(item, unit) {
            Ok(row) => rows.push(row),
            Err(rejection) => {
                let region = item
                    .get("region")
                    .and_then(|r| r.as_str())
                    .unwrap_or("?")
                    .to_string();
                let reason = rejection.to_string();
                match rejection {
                    Rejection::NotObject => stats.rejected_not_object += 1,
                    Rejection::NoRegion => stats.rejected_no_region += 1,
                    Rejection::MissingField(_) => stats.rejected_missing_field += 1,
                    Rejection::NotNumeric(_) => stats.rejected_not_numeric += 1,
                }
                if stats.rejection_samples.len() < 10 {
                    stats.rejection_samples.push((region, reason));
                }
            }
        }
    }

    stats.accepted = rows.len();
    Ok(FeedBatch { rows, stats })
}

#[derive(Debug)]
enum Rejection {
    NotObject,
    NoRegion,
    MissingField(&'static str),
    NotNumeric(&'static str),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotObject => write!(f, "entry is not an object"),
            Rejection::NoRegion => write!(f, "missing region"),
            Rejection::MissingField(field) => write!(f, "missing {field}"),
            Rejection::NotNumeric(field) => write!(f, "{field} is not a number"),
        }
    }
}

/// Structural checks only. Value checks (zero consumption, negatives,
/// duplicates) belong to the deriver so they reject the whole snapshot.
fn parse_feed_row_checked(v: &serde_json::Value, unit: ConsumptionUnit) -> std::result::Result<MarketRow, Rejection> {
    if !v.is_object() {
        return Err(Rejection::NotObject);
    }

    let region = field(v, "region")
        .and_then(|r| r.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(Rejection::NoRegion)?;

    Ok(MarketRow {
        region,
        retail_price: decimal_field(v, "retail_price")?,
        ex_mill_price: decimal_field(v, "ex_mill_price")?,
        stock_tons: decimal_field(v, "stock_tons")?,
        daily_consumption_tons: unit.to_daily(decimal_field(v, "consumption_tons")?),
    })
}

/// Exact key first, then a case-insensitive match (spreadsheet exports
/// tend to capitalize headers).
fn field<'a>(v: &'a serde_json::Value, name: &str) -> Option<&'a serde_json::Value> {
    let obj = v.as_object()?;
    obj.get(name).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn decimal_field(v: &serde_json::Value, name: &'static str) -> std::result::Result<Decimal, Rejection> {
    let raw = match field(v, name) {
        None | Some(serde_json::Value::Null) => return Err(Rejection::MissingField(name)),
        Some(raw) => raw,
    };
    let text = match raw {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().replace(',', ""),
        _ => return Err(Rejection::NotNumeric(name)),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| Rejection::NotNumeric(name))
}

// ---------------------------------------------------------------------------
// Fallback table
// ---------------------------------------------------------------------------

/// Static regional table used when the live feed is unset or failing.
pub struct FallbackFeed;

impl FallbackFeed {
    /// Consumption here is already per day.
    pub fn rows() -> Vec<MarketRow> {
        let row = |region: &str, retail, ex_mill, stock, daily| MarketRow {
            region: region.to_string(),
            retail_price: retail,
            ex_mill_price: ex_mill,
            stock_tons: stock,
            daily_consumption_tons: daily,
        };
        vec![
            row("Punjab", dec!(165), dec!(140), dec!(520000), dec!(9000)),
            row("Sindh", dec!(162), dec!(138), dec!(210000), dec!(6500)),
            row("KPK", dec!(172), dec!(141), dec!(38000), dec!(1600)),
            row("Balochistan", dec!(178), dec!(142), dec!(6000), dec!(550)),
        ]
    }
}

impl MarketSource for FallbackFeed {
    async fn fetch(&self) -> Result<FeedBatch> {
        let rows = Self::rows();
        let stats = FeedStats {
            api_total: rows.len(),
            accepted: rows.len(),
            ..FeedStats::default()
        };
        Ok(FeedBatch { rows, stats })
    }
}

// ---------------------------------------------------------------------------
// Snapshot loading
// ---------------------------------------------------------------------------

/// Live feed when configured, fallback table otherwise or on any live failure.
pub struct MarketFeed {
    live: Option<LiveFeed>,
    fallback: FallbackFeed,
}

impl MarketFeed {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        match &cfg.feed_url {
            Some(url) => Self::live(url.clone(), cfg.consumption_unit),
            None => Ok(Self::fallback_only()),
        }
    }

    pub fn live(url: String, unit: ConsumptionUnit) -> Result<Self> {
        Ok(Self {
            live: Some(LiveFeed::new(url, unit)?),
            fallback: FallbackFeed,
        })
    }

    pub fn fallback_only() -> Self {
        Self {
            live: None,
            fallback: FallbackFeed,
        }
    }

    pub async fn load(&self) -> Result<Snapshot> {
        if let Some(live) = &self.live {
            match live.fetch().await {
                Ok(batch) => {
                    info!(
                        accepted = batch.stats.accepted,
                        total = batch.stats.api_total,
                        "Live feed: {} of {} rows usable",
                        batch.stats.accepted,
                        batch.stats.api_total,
                    );
                    for (region, reason) in &batch.stats.rejection_samples {
                        debug!("[FEED] rejected {region:?}: {reason}");
                    }
                    return Ok(Snapshot {
                        rows: batch.rows,
                        origin: FeedOrigin::Live,
                        stats: batch.stats,
                    });
                }
                Err(e) => warn!("Live feed {} failed, using fallback table: {e}", live.url),
            }
        }

        let batch = self.fallback.fetch().await?;
        Ok(Snapshot {
            rows: batch.rows,
            origin: FeedOrigin::Fallback,
            stats: batch.stats,
        })
    }
}
