use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::advisory::AdvisoryClient;
use crate::analytics::{
    build_context, derive, evaluate, summarize, AlertThresholds, Evaluation, ScenarioConfig,
};
use crate::api::health::HealthState;
use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::error::AppError;
use crate::fetcher::{FeedStats, MarketFeed};
use crate::types::{AdvisoryReply, DerivedRow, FeedOrigin, MarketSummary};

#[derive(Clone)]
pub struct ApiState {
    pub feed: Arc<MarketFeed>,
    pub advisory: Arc<AdvisoryClient>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub thresholds: AlertThresholds,
    pub scenario: ScenarioConfig,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/regions", get(get_regions))
        .route("/evaluate", post(post_evaluate))
        .route("/advisory", post(post_advisory))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Per-request threshold overrides; unset fields keep the configured value.
#[derive(Debug, Default, Deserialize)]
pub struct ThresholdOverrides {
    pub critical_runway_days: Option<Decimal>,
    pub warning_runway_days: Option<Decimal>,
    pub critical_spread: Option<Decimal>,
}

impl ThresholdOverrides {
    fn apply(&self, base: AlertThresholds) -> AlertThresholds {
        AlertThresholds {
            critical_runway_days: self.critical_runway_days.unwrap_or(base.critical_runway_days),
            warning_runway_days: self.warning_runway_days.unwrap_or(base.warning_runway_days),
            critical_spread: self.critical_spread.or(base.critical_spread),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScenarioOverrides {
    pub shortage_threshold: Option<Decimal>,
    pub projection_periods: Option<u32>,
}

impl ScenarioOverrides {
    fn apply(&self, base: ScenarioConfig) -> ScenarioConfig {
        ScenarioConfig {
            shortage_threshold: self.shortage_threshold.unwrap_or(base.shortage_threshold),
            projection_periods: self.projection_periods.unwrap_or(base.projection_periods),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    /// Export quota in tons.
    pub lever: Decimal,
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
    #[serde(default)]
    pub scenario: ScenarioOverrides,
}

#[derive(Debug, Deserialize)]
pub struct AdvisoryRequest {
    pub question: String,
    pub lever: Option<Decimal>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Decimal>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub last_feed_origin: Option<FeedOrigin>,
    pub last_evaluation_at_ns: u64,
    pub evaluations: u64,
    pub advisory_configured: bool,
    pub advisory_fallbacks: u64,
}

#[derive(Serialize)]
pub struct RegionsResponse {
    pub origin: FeedOrigin,
    pub feed_stats: FeedStats,
    pub derived: Vec<DerivedRow>,
    pub summary: MarketSummary,
}

#[derive(Serialize)]
pub struct EvaluateResponse {
    pub origin: FeedOrigin,
    pub feed_stats: FeedStats,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

#[derive(Serialize)]
pub struct AdvisoryResponse {
    pub reply: AdvisoryReply,
    pub prompt_chars: usize,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub advisory: LatencySnapshot,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        last_feed_origin: state.health.last_origin(),
        last_evaluation_at_ns: state.health.last_evaluation_at_ns(),
        evaluations: state.health.evaluations(),
        advisory_configured: state.advisory.is_configured(),
        advisory_fallbacks: state.health.advisory_fallbacks(),
    })
}

async fn get_regions(State(state): State<ApiState>) -> Result<Json<RegionsResponse>, AppError> {
    let snapshot = state.feed.load().await?;
    state.health.set_last_origin(snapshot.origin);

    let derived = derive(&snapshot.rows)?;
    let summary = summarize(&derived)?;

    Ok(Json(RegionsResponse {
        origin: snapshot.origin,
        feed_stats: snapshot.stats,
        derived,
        summary,
    }))
}

async fn post_evaluate(
    State(state): State<ApiState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let thresholds = req.thresholds.apply(state.thresholds);
    let scenario = req.scenario.apply(state.scenario);

    let snapshot = state.feed.load().await?;
    state.health.set_last_origin(snapshot.origin);

    let evaluation = evaluate(&snapshot.rows, req.lever, &thresholds, &scenario)?;
    state.health.record_evaluation(now_ns());

    info!(
        origin = %snapshot.origin,
        lever = %req.lever,
        regions = evaluation.derived.len(),
        alerts = evaluation.alerts.len(),
        verdict = %evaluation.scenario.verdict,
        "Evaluation: {} regions, {} alerts, verdict {}",
        evaluation.derived.len(),
        evaluation.alerts.len(),
        evaluation.scenario.verdict,
    );

    Ok(Json(EvaluateResponse {
        origin: snapshot.origin,
        feed_stats: snapshot.stats,
        evaluation,
    }))
}

/// Blank question → 204, the advisory service is never contacted.
async fn post_advisory(State(state): State<ApiState>, Json(req): Json<AdvisoryRequest>) -> Response {
    let parameters = advisory_parameters(&req, &state.thresholds, &state.scenario);
    let Some(ctx) = build_context(&req.question, &parameters) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let reply = state.advisory.advise(&ctx).await;
    Json(AdvisoryResponse {
        reply,
        prompt_chars: ctx.prompt_text.chars().count(),
    })
    .into_response()
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(LatencyResponse {
        advisory: state.latency.snapshot(),
    })
}

/// Lever and configured thresholds, then caller-supplied values (which win on clashes).
fn advisory_parameters(
    req: &AdvisoryRequest,
    thresholds: &AlertThresholds,
    scenario: &ScenarioConfig,
) -> BTreeMap<String, Decimal> {
    let mut params = BTreeMap::new();
    if let Some(lever) = req.lever {
        params.insert("export_quota_tons".to_string(), lever);
    }
    params.insert("shortage_threshold_tons".to_string(), scenario.shortage_threshold);
    params.insert("critical_runway_days".to_string(), thresholds.critical_runway_days);
    params.insert("warning_runway_days".to_string(), thresholds.warning_runway_days);
    if let Some(spread) = thresholds.critical_spread {
        params.insert("critical_spread".to_string(), spread);
    }
    params.extend(req.parameters.iter().map(|(k, v)| (k.clone(), *v)));
    params
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConsumptionUnit, Verdict};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn state() -> ApiState {
        let health = Arc::new(HealthState::new());
        let latency = Arc::new(LatencyStats::new());
        let advisory = AdvisoryClient::new(
            "http://127.0.0.1:9/v1/chat/completions".to_string(),
            None,
            "test-model".to_string(),
            Duration::from_secs(1),
            Arc::clone(&latency),
            Arc::clone(&health),
        )
        .unwrap();
        ApiState {
            feed: Arc::new(MarketFeed::fallback_only()),
            advisory: Arc::new(advisory),
            health,
            latency,
            thresholds: AlertThresholds::default(),
            scenario: ScenarioConfig::default(),
        }
    }

    async fn serve(state: ApiState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state);
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    #[test]
    fn overrides_only_touch_set_fields() {
        let o = ThresholdOverrides {
            warning_runway_days: Some(dec!(45)),
            ..ThresholdOverrides::default()
        };
        let t = o.apply(AlertThresholds::default());
        assert_eq!(t.critical_runway_days, dec!(15));
        assert_eq!(t.warning_runway_days, dec!(45));
        assert!(t.critical_spread.is_none());

        let s = ScenarioOverrides {
            projection_periods: Some(6),
            ..ScenarioOverrides::default()
        }
        .apply(ScenarioConfig::default());
        assert_eq!(s.projection_periods, 6);
        assert_eq!(s.shortage_threshold, dec!(300000));
    }

    #[test]
    fn caller_parameters_win_over_defaults() {
        let req = AdvisoryRequest {
            question: "q".to_string(),
            lever: Some(dec!(350000)),
            parameters: [("warning_runway_days".to_string(), dec!(60))].into(),
        };
        let params = advisory_parameters(&req, &AlertThresholds::default(), &ScenarioConfig::default());
        assert_eq!(params["export_quota_tons"], dec!(350000));
        assert_eq!(params["warning_runway_days"], dec!(60));
        assert_eq!(params["shortage_threshold_tons"], dec!(300000));
        assert!(!params.contains_key("critical_spread"));
    }

    #[tokio::test]
    async fn evaluate_over_http() {
        let base = serve(state()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/evaluate"))
            .json(&serde_json::json!({"lever": 400000, "thresholds": {"critical_spread": 35}}))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();

        assert_eq!(body["origin"], "fallback");
        assert_eq!(body["derived"].as_array().unwrap().len(), 4);
        assert_eq!(body["scenario"]["verdict"], serde_json::to_value(Verdict::AtRisk).unwrap());
        assert_eq!(body["scenario"]["projection"].as_array().unwrap().len(), 4);
        // Balochistan: runway 10 days (critical) and spread 36 > 35
        let balochistan: Vec<_> = body["alerts"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["region"] == "Balochistan")
            .collect();
        assert_eq!(balochistan.len(), 2);
    }

    #[tokio::test]
    async fn zero_periods_is_unprocessable() {
        let base = serve(state()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/evaluate"))
            .json(&serde_json::json!({"lever": 1, "scenario": {"projection_periods": 0}}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422);
    }

    #[tokio::test]
    async fn oversized_horizon_is_unprocessable() {
        let base = serve(state()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/evaluate"))
            .json(&serde_json::json!({"lever": 1, "scenario": {"projection_periods": 4000000000u32}}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422);
    }

    #[tokio::test]
    async fn live_row_with_zero_consumption_rejects_the_evaluation() {
        let feed_app = Router::new().route(
            "/rows",
            get(|| async {
                Json(serde_json::json!([
                    {"region": "Quetta", "retail_price": 225, "ex_mill_price": 170, "stock_tons": 15000, "consumption_tons": 500},
                    {"region": "Gwadar", "retail_price": 230, "ex_mill_price": 170, "stock_tons": 100, "consumption_tons": 0}
                ]))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let feed_addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, feed_app).await });

        let mut st = state();
        st.feed = Arc::new(
            MarketFeed::live(format!("http://{feed_addr}/rows"), ConsumptionUnit::Daily).unwrap(),
        );
        let health = Arc::clone(&st.health);
        let base = serve(st).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/evaluate"))
            .json(&serde_json::json!({"lever": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422);
        let body = resp.text().await.unwrap();
        assert!(body.contains("Gwadar"), "{body}");
        assert!(!body.contains("alerts"), "{body}");

        assert_eq!(health.evaluations(), 0);
        assert_eq!(health.last_origin(), Some(FeedOrigin::Live));
    }

    #[tokio::test]
    async fn blank_question_is_no_content() {
        let st = state();
        let health = Arc::clone(&st.health);
        let base = serve(st).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/advisory"))
            .json(&serde_json::json!({"question": "   ", "lever": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 204);
        assert_eq!(health.advisory_fallbacks(), 0);
    }

    #[tokio::test]
    async fn unconfigured_advisory_returns_fallback_reply() {
        let base = serve(state()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/advisory"))
            .json(&serde_json::json!({"question": "Will prices rise?", "lever": 400000}))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["reply"]["fallback"], true);
        assert_eq!(body["reply"]["text"], crate::config::ADVISORY_FALLBACK);
    }

    #[tokio::test]
    async fn health_reflects_evaluations() {
        let st = state();
        let health = Arc::clone(&st.health);
        let base = serve(st).await;
        let client = reqwest::Client::new();
        client
            .post(format!("{base}/evaluate"))
            .json(&serde_json::json!({"lever": 0}))
            .send()
            .await
            .unwrap();

        let body: serde_json::Value = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["evaluations"], 1);
        assert_eq!(body["last_feed_origin"], "fallback");
        assert_eq!(body["advisory_configured"], false);
        assert_eq!(health.evaluations(), 1);
    }
}
