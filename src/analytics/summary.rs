use rust_decimal::Decimal;

use crate::analytics::checked_sum;
use crate::analytics::deriver::runway_days;
use crate::analytics::scenario::average_retail_price;
use crate::error::{AppError, Result};
use crate::types::{DerivedRow, MarketSummary};

/// National headline figures for one derived snapshot.
pub fn summarize(rows: &[DerivedRow]) -> Result<MarketSummary> {
    if rows.is_empty() {
        return Err(AppError::InsufficientData(
            "cannot summarize an empty snapshot".to_string(),
        ));
    }
    let n = Decimal::from(rows.len());

    let total_ex_mill = checked_sum(rows.iter().map(|r| r.row.ex_mill_price), "ex_mill_price")?;
    let total_spread = checked_sum(rows.iter().map(|r| r.spread), "spread")?;
    let total_stock_tons = checked_sum(rows.iter().map(|r| r.row.stock_tons), "stock_tons")?;
    let total_daily_consumption_tons = checked_sum(
        rows.iter().map(|r| r.row.daily_consumption_tons),
        "daily_consumption_tons",
    )?;

    Ok(MarketSummary {
        regions: rows.len(),
        avg_retail_price: average_retail_price(rows)?,
        avg_ex_mill_price: (total_ex_mill / n).round_dp(2),
        avg_spread: (total_spread / n).round_dp(2),
        total_stock_tons,
        total_daily_consumption_tons,
        national_runway_days: runway_days("national", total_stock_tons, total_daily_consumption_tons)?,
    })
}
