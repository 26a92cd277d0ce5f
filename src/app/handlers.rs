// Copyright 2021 Datafuse Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{collections::BTreeSet, time::Instant};

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{Method, Request, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::AppError,
    inventory::ClusterSummary,
    model::{EnvoyMetrics, TrafficLogRecord},
    query::{ConditionSet, FilterCondition, parse_window},
};

use super::state::{AppState, NamespaceSide};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/api/logs", get(recent_logs).post(filter_logs))
        .route("/api/logs/namespaces/{namespace}", get(namespace_logs))
        .route("/envoy/metrics", get(envoy_metrics))
        .route("/clusters", get(clusters))
        .route("/clusters/{cluster}", get(cluster))
        .route("/clusters/{cluster}/namespaces", get(cluster_namespaces))
        .with_state(state)
        .layer(cors_layer())
        .layer(middleware::from_fn(log_requests))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

#[derive(Debug, Deserialize)]
struct FilterLogsRequest {
    timerange: Option<String>,
    #[serde(default)]
    namespaces: Vec<FilterCondition>,
}

#[derive(Debug, Deserialize)]
struct NamespaceLogsParams {
    #[serde(rename = "type")]
    side: Option<String>,
}

async fn ping() -> &'static str {
    "pong"
}

async fn recent_logs(
    State(state): State<AppState>,
) -> Result<Json<Vec<TrafficLogRecord>>, AppError> {
    Ok(Json(state.recent_logs().await?))
}

async fn filter_logs(
    State(state): State<AppState>,
    body: Result<Json<FilterLogsRequest>, JsonRejection>,
) -> Result<Json<Vec<TrafficLogRecord>>, AppError> {
    let Json(request) = body.map_err(|err| AppError::BadRequest(err.body_text()))?;
    let window = parse_window(request.timerange.as_deref())?;
    let conditions = ConditionSet::new(request.namespaces)?;
    log::debug!(
        "filter logs received: window={:?} conditions={:?}",
        window,
        conditions
    );
    Ok(Json(state.filtered_logs(window, &conditions).await?))
}

async fn namespace_logs(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(params): Query<NamespaceLogsParams>,
) -> Result<Json<Vec<TrafficLogRecord>>, AppError> {
    let side = NamespaceSide::from_param(params.side.as_deref());
    Ok(Json(state.namespace_logs(&namespace, side).await?))
}

async fn envoy_metrics(
    State(state): State<AppState>,
) -> Result<Json<Vec<EnvoyMetrics>>, AppError> {
    Ok(Json(state.envoy_metrics().await?))
}

async fn clusters(State(state): State<AppState>) -> Result<Json<Vec<ClusterSummary>>, AppError> {
    Ok(Json(state.clusters().await?))
}

async fn cluster(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClusterSummary>, AppError> {
    Ok(Json(state.cluster(&name).await?))
}

async fn cluster_namespaces(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BTreeSet<String>>, AppError> {
    Ok(Json(state.cluster(&name).await?.namespaces))
}

async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    let elapsed = start.elapsed();
    log::info!(
        "method={} path={} status={} duration_ms={:.3}",
        method,
        uri.path(),
        status.as_u16(),
        elapsed.as_secs_f64() * 1000.0
    );
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::to_bytes,
        http::{StatusCode, header::CONTENT_TYPE},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{model::PodRecord, store::CollectionNames, store::memory::MemoryStore};

    fn app(store: Arc<MemoryStore>) -> Router {
        router(AppState::new(
            store,
            CollectionNames::default(),
            "cluster1".into(),
        ))
    }

    fn pods() -> MemoryStore {
        MemoryStore::default().with(
            "Pods",
            &[
                PodRecord {
                    cluster: "east".into(),
                    namespace: "shop".into(),
                    name: "cart-7d9f".into(),
                    ..Default::default()
                },
                PodRecord {
                    cluster: "east".into(),
                    namespace: "payments".into(),
                    name: "ledger-0".into(),
                    ..Default::default()
                },
            ],
        )
    }

    fn post_logs(body: &str) -> Request<Body> {
        Request::post("/api/logs")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let response = app(Arc::new(MemoryStore::default()))
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"pong");
    }

    #[tokio::test]
    async fn malformed_timerange_never_reaches_the_store() {
        let store = Arc::new(pods());
        let response = app(store.clone())
            .oneshot(post_logs(
                r#"{"timerange":"ten minutes","namespaces":[{"cluster":"east","namespace":"shop"}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["errorType"], "bad_data");
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn empty_conditions_are_rejected() {
        let store = Arc::new(pods());
        let response = app(store.clone())
            .oneshot(post_logs(r#"{"timerange":"10m","namespaces":[]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn unparsable_body_is_a_bad_request() {
        let store = Arc::new(pods());
        let response = app(store.clone())
            .oneshot(post_logs("{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["status"], "error");
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn store_outage_is_a_bad_gateway() {
        let store = Arc::new(pods().failing("APILogs"));
        let response = app(store)
            .oneshot(Request::get("/api/logs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["errorType"], "store_error");
    }

    #[tokio::test]
    async fn clusters_routes_serve_inventory() {
        let router = app(Arc::new(pods()));
        let response = router
            .clone()
            .oneshot(Request::get("/clusters").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!([{ "name": "east", "namespaces": ["payments", "shop"] }])
        );

        let response = router
            .clone()
            .oneshot(
                Request::get("/clusters/east/namespaces")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(json_body(response).await, json!(["payments", "shop"]));

        let response = router
            .oneshot(Request::get("/clusters/north").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["errorType"], "not_found");
    }

    #[tokio::test]
    async fn preflight_allows_any_origin() {
        let response = app(Arc::new(MemoryStore::default()))
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/logs")
                    .header(header::ORIGIN, "http://dashboard.local")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
