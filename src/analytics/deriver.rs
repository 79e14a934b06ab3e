use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::error::{AppError, Result};
use crate::types::{DerivedRow, MarketRow};

/// Compute spread and runway for every row, in input order.
///
/// Whole-batch policy: the first row that fails validation rejects the entire
/// snapshot, so nothing downstream ever sees a partially sanitized dataset.
/// A row is rejected for a blank or repeated region, a negative price or
/// stock figure, or a consumption rate that is not strictly positive.
pub fn derive(rows: &[MarketRow]) -> Result<Vec<DerivedRow>> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(rows.len());
    let mut derived = Vec::with_capacity(rows.len());

    for row in rows {
        validate(row)?;
        if !seen.insert(row.region.as_str()) {
            return Err(AppError::data_quality(&row.region, "region appears more than once"));
        }
        derived.push(derive_row(row)?);
    }

    Ok(derived)
}

fn validate(row: &MarketRow) -> Result<()> {
    if row.region.trim().is_empty() {
        return Err(AppError::data_quality(&row.region, "region is blank"));
    }
    if row.daily_consumption_tons <= Decimal::ZERO {
        return Err(AppError::data_quality(
            &row.region,
            format!(
                "daily_consumption_tons must be > 0, got {}",
                row.daily_consumption_tons
            ),
        ));
    }
    for (field, value) in [
        ("retail_price", row.retail_price),
        ("ex_mill_price", row.ex_mill_price),
        ("stock_tons", row.stock_tons),
    ] {
        if value < Decimal::ZERO {
            return Err(AppError::data_quality(
                &row.region,
                format!("{field} must be >= 0, got {value}"),
            ));
        }
    }
    Ok(())
}

fn derive_row(row: &MarketRow) -> Result<DerivedRow> {
    let spread = row
        .retail_price
        .checked_sub(row.ex_mill_price)
        .ok_or_else(|| AppError::data_quality(&row.region, "spread overflows"))?;

    Ok(DerivedRow {
        row: row.clone(),
        spread,
        runway_days: runway_days(&row.region, row.stock_tons, row.daily_consumption_tons)?,
    })
}

/// `stock / daily consumption`, truncated toward zero. Partial days are not reported.
pub(crate) fn runway_days(region: &str, stock_tons: Decimal, daily_consumption_tons: Decimal) -> Result<Decimal> {
    stock_tons
        .checked_div(daily_consumption_tons)
        .map(|days| days.trunc())
        .ok_or_else(|| AppError::data_quality(region, "runway computation overflows"))
}
