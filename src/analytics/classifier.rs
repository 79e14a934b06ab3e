use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::thresholds::{CRITICAL_RUNWAY_DAYS, WARNING_RUNWAY_DAYS};
use crate::types::{Alert, AlertKind, DerivedRow, Severity};

/// Alert thresholds. Both runway bounds are strict: a region sitting exactly on
/// a bound falls into the less severe band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub critical_runway_days: Decimal,
    pub warning_runway_days: Decimal,
    /// Spread alerting is disabled while this is `None`.
    pub critical_spread: Option<Decimal>,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            critical_runway_days: CRITICAL_RUNWAY_DAYS,
            warning_runway_days: WARNING_RUNWAY_DAYS,
            critical_spread: None,
        }
    }
}

/// Classify every region independently, keeping input order.
/// A region yields zero, one, or two alerts: at most one runway alert,
/// followed by a spread alert when the spread exceeds `critical_spread`.
pub fn classify(rows: &[DerivedRow], thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for row in rows {
        if let Some(alert) = runway_alert(row, thresholds) {
            alerts.push(alert);
        }
        if let Some(alert) = spread_alert(row, thresholds) {
            alerts.push(alert);
        }
    }
    alerts
}

fn runway_alert(row: &DerivedRow, t: &AlertThresholds) -> Option<Alert> {
    let days = row.runway_days;
    let (severity, message) = if days < t.critical_runway_days {
        (
            Severity::Critical,
            format!("{}: stock runs out in {days} days", row.region()),
        )
    } else if days < t.warning_runway_days {
        (
            Severity::Warning,
            format!(
                "{}: {days} days of stock left, below the {}-day warning level",
                row.region(),
                t.warning_runway_days
            ),
        )
    } else {
        return None;
    };

    Some(Alert {
        region: row.region().to_string(),
        severity,
        kind: AlertKind::Runway,
        message,
        metric_value: days,
    })
}

fn spread_alert(row: &DerivedRow, t: &AlertThresholds) -> Option<Alert> {
    let limit = t.critical_spread?;
    if row.spread <= limit {
        return None;
    }
    Some(Alert {
        region: row.region().to_string(),
        severity: Severity::Warning,
        kind: AlertKind::Spread,
        message: format!(
            "{}: retail/ex-mill spread {} exceeds {limit}",
            row.region(),
            row.spread
        ),
        metric_value: row.spread,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketRow;
    use rust_decimal_macros::dec;

    fn derived(region: &str, spread: Decimal, runway_days: Decimal) -> DerivedRow {
        DerivedRow {
            row: MarketRow {
                region: region.to_string(),
                retail_price: dec!(150) + spread,
                ex_mill_price: dec!(150),
                stock_tons: runway_days * dec!(100),
                daily_consumption_tons: dec!(100),
            },
            spread,
            runway_days,
        }
    }

    fn with_spread(limit: Decimal) -> AlertThresholds {
        AlertThresholds {
            critical_spread: Some(limit),
            ..AlertThresholds::default()
        }
    }

    #[test]
    fn defaults_are_fifteen_and_thirty() {
        let t = AlertThresholds::default();
        assert_eq!(t.critical_runway_days, dec!(15));
        assert_eq!(t.warning_runway_days, dec!(30));
        assert!(t.critical_spread.is_none());
    }

    #[test]
    fn below_critical_is_critical() {
        let alerts = classify(&[derived("Quetta", dec!(10), dec!(14))], &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].kind, AlertKind::Runway);
        assert_eq!(alerts[0].metric_value, dec!(14));
        assert!(alerts[0].message.contains("14 days"), "{}", alerts[0].message);
    }

    #[test]
    fn critical_boundary_is_warning() {
        let alerts = classify(&[derived("Quetta", dec!(10), dec!(15))], &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn warning_boundary_emits_nothing() {
        // Quetta: 15000 t stock at 500 t/day = 30 days, and 30 is not < 30.
        let alerts = classify(&[derived("Quetta", dec!(55), dec!(30))], &AlertThresholds::default());
        assert!(alerts.is_empty(), "{alerts:?}");
    }

    #[test]
    fn healthy_region_emits_nothing() {
        let alerts = classify(&[derived("Punjab", dec!(20), dec!(90))], &AlertThresholds::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn spread_alert_needs_strictly_greater() {
        let t = with_spread(dec!(50));
        assert!(classify(&[derived("Sindh", dec!(50), dec!(90))], &t).is_empty());

        let alerts = classify(&[derived("Sindh", dec!(50.01), dec!(90))], &t);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Spread);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].metric_value, dec!(50.01));
    }

    #[test]
    fn critical_and_spread_are_emitted_separately() {
        let alerts = classify(&[derived("KPK", dec!(80), dec!(5))], &with_spread(dec!(50)));
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, AlertKind::Runway);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[1].kind, AlertKind::Spread);
        assert_eq!(alerts[1].severity, Severity::Warning);
    }

    #[test]
    fn output_follows_input_order() {
        let rows = vec![
            derived("Punjab", dec!(10), dec!(20)),
            derived("Sindh", dec!(10), dec!(90)),
            derived("KPK", dec!(10), dec!(3)),
        ];
        let regions: Vec<String> = classify(&rows, &AlertThresholds::default())
            .into_iter()
            .map(|a| a.region)
            .collect();
        assert_eq!(regions, vec!["Punjab", "KPK"]);
    }

    #[test]
    fn shrinking_runway_never_lowers_severity() {
        let t = with_spread(dec!(40));
        let mut previous: Option<Severity> = None;
        for days in (0..=60).rev() {
            let alerts = classify(&[derived("Punjab", dec!(45), Decimal::from(days))], &t);
            let runway = alerts
                .iter()
                .find(|a| a.kind == AlertKind::Runway)
                .map(|a| a.severity);
            if let Some(prev) = previous {
                let now = runway.expect("runway alert disappeared as runway shrank");
                assert!(now >= prev, "severity dropped at {days} days");
            }
            previous = runway.or(previous);
            // the spread alert is independent of runway and always present here
            assert!(alerts.iter().any(|a| a.kind == AlertKind::Spread));
        }
    }

    #[test]
    fn inverted_thresholds_leave_warning_band_empty() {
        let t = AlertThresholds {
            critical_runway_days: dec!(30),
            warning_runway_days: dec!(15),
            critical_spread: None,
        };
        assert_eq!(classify(&[derived("A", dec!(1), dec!(20))], &t)[0].severity, Severity::Critical);
        assert!(classify(&[derived("A", dec!(1), dec!(30))], &t).is_empty());
    }

    #[test]
    fn classify_is_idempotent() {
        let rows = vec![derived("Punjab", dec!(60), dec!(12)), derived("KPK", dec!(10), dec!(25))];
        let t = with_spread(dec!(50));
        assert_eq!(classify(&rows, &t), classify(&rows, &t));
    }
}
