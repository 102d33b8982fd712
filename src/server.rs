//! HTTP dashboard: an HTML page driven by a GET form plus a JSON API over the
//! same prediction pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dashboard::{self, DashboardView};
use crate::metrics::RegressionMetrics;
use crate::models::StudentProfile;
use crate::predict::Predictor;
use crate::render::Pages;

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub pages: Arc<Pages>,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Result<Self, minijinja::Error> {
        Ok(Self {
            predictor: Arc::new(predictor),
            pages: Arc::new(Pages::new()?),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ScaledColumn {
    pub name: String,
    pub mean: f64,
    pub scale: f64,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub trees: usize,
    pub max_depth: usize,
    /// Deepest fitted tree.
    pub deepest_tree: usize,
    pub leaves: usize,
    pub train_rows: usize,
    pub target: String,
    pub feature_names: Vec<String>,
    /// Learning style encoded as all zeros.
    pub reference_style: String,
    pub scaled_columns: Vec<ScaledColumn>,
    pub holdout: Option<RegressionMetrics>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/health", get(health_handler))
        .route("/api/model", get(model_handler))
        .route("/api/predict", post(predict_handler))
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "dashboard listening");
    axum::serve(listener, create_router(state))
        .await
        .context("dashboard server stopped")?;
    Ok(())
}

/// Runs the full pipeline for one profile.
fn evaluate(predictor: &Predictor, profile: &StudentProfile) -> Result<DashboardView, String> {
    profile.validate().map_err(|e| e.to_string())?;
    let prediction = predictor.predict(profile).map_err(|e| e.to_string())?;
    Ok(dashboard::build_view(profile, &prediction))
}

/// Forest traversal and TreeSHAP are CPU-bound, so they run on the blocking pool.
async fn evaluate_blocking(
    state: &AppState,
    profile: StudentProfile,
) -> Result<Result<DashboardView, String>, tokio::task::JoinError> {
    let predictor = Arc::clone(&state.predictor);
    tokio::task::spawn_blocking(move || evaluate(&predictor, &profile)).await
}

fn internal_error(error: impl std::fmt::Display) -> Response {
    error!(%error, "dashboard request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}

fn error_page(state: &AppState, profile: &StudentProfile, message: &str) -> Response {
    match state.pages.error_page(profile, message) {
        Ok(page) => (StatusCode::BAD_REQUEST, Html(page)).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn page_handler(
    State(state): State<AppState>,
    query: Result<Query<StudentProfile>, QueryRejection>,
) -> Response {
    let profile = match query {
        Ok(Query(profile)) => profile,
        Err(rejection) => {
            let message = rejection.body_text();
            warn!(error = %message, "rejected dashboard query");
            return error_page(&state, &StudentProfile::default(), &message);
        }
    };

    match evaluate_blocking(&state, profile.clone()).await {
        Ok(Ok(view)) => match state.pages.dashboard_page(&profile, &view) {
            Ok(page) => Html(page).into_response(),
            Err(e) => internal_error(e),
        },
        Ok(Err(message)) => {
            warn!(error = %message, "rejected dashboard profile");
            error_page(&state, &profile, &message)
        }
        Err(e) => internal_error(e),
    }
}

async fn predict_handler(
    State(state): State<AppState>,
    Json(profile): Json<StudentProfile>,
) -> Result<Json<DashboardView>, Response> {
    match evaluate_blocking(&state, profile).await {
        Ok(Ok(view)) => Ok(Json(view)),
        Ok(Err(error)) => {
            warn!(%error, "rejected prediction request");
            Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response())
        }
        Err(e) => Err(internal_error(e)),
    }
}

async fn model_handler(State(state): State<AppState>) -> Json<ModelInfo> {
    let bundle = state.predictor.bundle();
    let info = state.predictor.info();
    let trees = bundle.model.forest.trees();
    let scaler = &bundle.scaler;
    Json(ModelInfo {
        id: info.id,
        created_at: info.created_at,
        trees: trees.len(),
        max_depth: bundle.model.forest.params().max_depth,
        deepest_tree: trees.iter().map(|tree| tree.depth()).max().unwrap_or(0),
        leaves: trees.iter().map(|tree| tree.n_leaves()).sum(),
        train_rows: bundle.model.train_rows,
        target: bundle.model.target.clone(),
        feature_names: bundle.model.feature_names.clone(),
        reference_style: bundle.encoder.dropped().to_string(),
        scaled_columns: scaler
            .columns()
            .iter()
            .zip(scaler.means().iter().zip(scaler.scales()))
            .map(|(name, (&mean, &scale))| ScaledColumn {
                name: name.clone(),
                mean,
                scale,
            })
            .collect(),
        holdout: bundle.model.holdout,
    })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app() -> Router {
        let predictor = Predictor::new(crate::artifacts::tests::fixture_bundle());
        create_router(AppState::new(predictor).unwrap())
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("ok"));
    }

    #[tokio::test]
    async fn page_uses_defaults_without_query() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Personalized Learning Path Generator"));
        assert!(body.contains("40.00"));
    }

    #[tokio::test]
    async fn page_reads_profile_from_query() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/?study_hours=30&gender=female&visual=false&reading_writing=false")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("80.00"));
        assert!(body.contains("<option value=\"female\" selected>Female</option>"));
        assert!(body.contains("No preference"));
    }

    #[tokio::test]
    async fn page_rejects_out_of_range_values() {
        let response = app()
            .oneshot(Request::builder().uri("/?age=5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("age must be between 10 and 100"));
    }

    #[tokio::test]
    async fn api_predict_returns_view_model() {
        let payload = serde_json::json!({
            "study_hours": 10,
            "attendance": 80,
            "stress": 8,
            "social_media": 15,
            "participation": true,
            "kinesthetic": false,
            "reading_writing": false,
            "visual": true
        });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/predict")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let view: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(view["prediction"]["score"], 40.0);
        assert_eq!(view["prediction"]["band"], "NeedsImprovement");
        assert_eq!(view["recommendations"]["dominant_style"], "Visual");
        let groups = view["recommendations"]["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(view["importance"]["bars"].as_array().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn api_predict_rejects_invalid_profile() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/predict")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"sleep": 30}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("sleep must be between 0 and 12"));
    }

    #[tokio::test]
    async fn model_info_lists_feature_layout() {
        let response = app()
            .oneshot(Request::builder().uri("/api/model").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let info: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(info["trees"], 1);
        assert_eq!(info["feature_names"].as_array().unwrap().len(), 11);
        assert_eq!(info["feature_names"][0], "Age");
        assert_eq!(info["deepest_tree"], 1);
        assert_eq!(info["leaves"], 2);
        assert_eq!(info["reference_style"], "Auditory");
        assert_eq!(info["scaled_columns"][0]["name"], "Age");
        assert_eq!(info["scaled_columns"][0]["mean"], 20.0);
        assert_eq!(info["scaled_columns"][1]["scale"], 5.0);
    }

    #[tokio::test]
    async fn unparsable_query_renders_the_form_with_an_error() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/?age=&study_hours=15")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"));
        let body = body_string(response).await;
        assert!(body.contains("class=\"error\""));
        assert!(body.contains("<form method=\"get\""));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_requests_run_on_the_blocking_pool() {
        let router = app();
        let mut handles = Vec::new();
        for study_hours in [10, 30, 60, 15] {
            let router = router.clone();
            handles.push(tokio::spawn(async move {
                let payload = serde_json::json!({ "study_hours": study_hours });
                router
                    .oneshot(
                        Request::builder()
                            .method("POST")
                            .uri("/api/predict")
                            .header("content-type", "application/json")
                            .body(Body::from(payload.to_string()))
                            .unwrap(),
                    )
                    .await
                    .unwrap()
                    .status()
            }));
        }

        let mut statuses = Vec::new();
        for handle in handles {
            statuses.push(handle.await.unwrap());
        }
        assert_eq!(
            statuses,
            vec![
                StatusCode::OK,
                StatusCode::OK,
                StatusCode::BAD_REQUEST,
                StatusCode::OK,
            ]
        );
    }
}
