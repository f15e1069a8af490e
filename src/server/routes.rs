use crate::config::{AppConfig, RunOverrides};
use crate::engine::{self, RankingReport};
use crate::errors::{EngineError, EngineResult};
use crate::input::OptionTable;
use crate::models::black_scholes::BlackScholesExercise;
use crate::state::{AppState, CounterSnapshot};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use portable_atomic::Ordering::Relaxed;
use std::sync::Arc;

#[derive(Debug, Default, serde::Deserialize)]
pub struct RankQuery {
    pub expiry: Option<String>,
    pub valuation: Option<String>,
    pub rate: Option<String>,
    pub vols: Option<String>,
    pub policy: Option<String>,
    pub top: Option<usize>,
}

impl RankQuery {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            expiry: self.expiry.clone(),
            valuation: self.valuation.clone(),
            rate: self.rate.clone(),
            vols: self.vols.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Config(_) => StatusCode::BAD_REQUEST,
            EngineError::MissingColumns { .. } | EngineError::Csv(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::Io(_) | EngineError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = match &self {
            EngineError::MissingColumns { missing, expected } => serde_json::json!({
                "error": self.to_string(),
                "missing": missing,
                "expected": expected,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// POST /api/rank -- CSV body in, ranked CALL and PUT tables out
pub async fn post_rank(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankQuery>,
    body: Bytes,
) -> Result<Json<RankingReport>, EngineError> {
    let result = rank_body(&state.config, &query, body).await;

    match &result {
        Ok(report) => {
            state.counters.runs_completed.fetch_add(1, Relaxed);
            state
                .counters
                .rows_processed
                .fetch_add(report.summary.total_rows as u64, Relaxed);
            state
                .counters
                .rows_no_calc
                .fetch_add(report.summary.no_calc as u64, Relaxed);
        }
        Err(e) => {
            state.counters.runs_rejected.fetch_add(1, Relaxed);
            tracing::warn!(error = %e, "ranking request rejected");
        }
    }

    result.map(Json)
}

async fn rank_body(config: &AppConfig, query: &RankQuery, body: Bytes) -> EngineResult<RankingReport> {
    let run = config.resolve_run(&query.overrides())?;

    // Parsing and pricing are CPU-bound; keep them off the async workers.
    let mut report = tokio::task::spawn_blocking(move || -> EngineResult<RankingReport> {
        let table = OptionTable::from_bytes(&body)?;
        let model = BlackScholesExercise::new();
        Ok(engine::run(&table, &run, &model))
    })
    .await
    .map_err(|e| EngineError::Task(e.to_string()))??;

    if let Some(n) = query.top {
        report.truncate(n);
    }
    Ok(report)
}

/// GET /api/config -- effective process defaults
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<AppConfig> {
    Json(state.config.clone())
}

/// GET /api/counters -- service counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<CounterSnapshot> {
    Json(state.counters.snapshot())
}

#[cfg(test)]
mod tests {
    use crate::config::AppConfig;
    use crate::server::router;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const CHAIN: &str = "ACAO CODIGO,OPCAO,VALOR AÇÃO,STRIKE R$,VECTO,TIPO\n\
        BBAS3,BBASJ250,\"R$ 25,00\",\"R$ 25,00\",26/09/2025,CV\n\
        BBAS3,BBASJ220,\"R$ 25,00\",\"R$ 22,00\",26/09/2025,CV\n\
        BBAS3,BBASV270,\"R$ 25,00\",\"R$ 27,00\",26/09/2025,PV\n";

    fn app() -> axum::Router {
        let config = AppConfig::from_lookup(|key| match key {
            "EXPIRY_DATE" => Some("2025-09-26".to_string()),
            "VALUATION_DATE" => Some("2025-06-27".to_string()),
            _ => None,
        })
        .unwrap();
        router(AppState::new(config))
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "text/csv")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_rank_round_trip() {
        let resp = app().oneshot(post("/api/rank", CHAIN)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = json_body(resp).await;
        assert_eq!(json["summary"]["total_rows"], 3);
        assert_eq!(json["parameters"]["days_to_expiry"], 91);
        assert_eq!(json["calls"][0]["option_code"], "BBASJ220");
        assert_eq!(json["calls"][0]["label"], "HIGH");
        assert_eq!(json["calls"][1]["label"], "MEDIUM");
        assert_eq!(json["puts"][0]["contract_type"], "PUT");
        assert_eq!(json["calls"][0]["scenarios"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rank_query_overrides() {
        let resp = app()
            .oneshot(post("/api/rank?vols=0.3&top=1&expiry=2025-07-27", CHAIN))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = json_body(resp).await;
        assert_eq!(json["calls"].as_array().unwrap().len(), 1);
        assert_eq!(json["summary"]["calls"], 2);
        assert_eq!(json["parameters"]["days_to_expiry"], 30);
        assert_eq!(json["calls"][0]["scenarios"][0]["label"], "ITM @ 30%");
    }

    #[tokio::test]
    async fn test_missing_columns_is_unprocessable() {
        let resp = app()
            .oneshot(post("/api/rank", "ACAO CODIGO,OPCAO\nA,B\n"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = json_body(resp).await;
        let missing = json["missing"].as_array().unwrap();
        assert_eq!(missing.len(), 4);
        assert_eq!(json["expected"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_bad_rate_is_bad_request() {
        let resp = app().oneshot(post("/api/rank?rate=2", CHAIN)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_counters_track_runs() {
        let app = app();
        let ok = app.clone().oneshot(post("/api/rank", CHAIN)).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        let bad = app.clone().oneshot(post("/api/rank?rate=x", CHAIN)).await.unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(Request::builder().uri("/api/counters").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(resp).await;
        assert_eq!(json["runs_completed"], 1);
        assert_eq!(json["rows_processed"], 3);
        assert_eq!(json["runs_rejected"], 1);
    }

    #[tokio::test]
    async fn test_config_endpoint() {
        let resp = app()
            .oneshot(Request::builder().uri("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["expiry_date"], "2025-09-26");
        assert_eq!(json["unknown_type_policy"], "put");
    }
}
