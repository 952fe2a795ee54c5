//! Handler模块

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::models::AggregateResult;
use crate::service::DecafService;
use crate::state::AppState;

/// 查询托管数据库并提交 Bond 校验
#[utoipa::path(
    get,
    path = "/",
    tag = "decaf",
    responses(
        (status = 200, description = "校验通过的聚合结果", body = AggregateResult),
        (status = 500, description = "配置、连接、查询或校验失败", body = String, content_type = "text/plain")
    )
)]
pub async fn data_driven_decaf(
    State(state): State<AppState>,
) -> Result<Json<AggregateResult>, AppError> {
    let service = DecafService::new(state.config, state.backends, state.bond);
    let result = service.run().await?;
    Ok(Json(result))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use common::config::AppConfig;
    use common::errors::{AppError, AppResult};
    use common::models::ConnectionInfo;
    use http_body_util::BodyExt;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use crate::aggregator::{CoffeeRow, CoffeeSource};
    use crate::backend::{BackendConnector, Backends};
    use crate::bond::{BondClient, VERIFY_PATH};
    use crate::state::AppState;

    #[derive(Default)]
    struct Counters {
        connects: AtomicUsize,
        closes: AtomicUsize,
    }

    struct FakeConnector {
        rows: Option<Vec<CoffeeRow>>,
        counters: Arc<Counters>,
    }

    struct FakeSource {
        rows: Option<Vec<CoffeeRow>>,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl BackendConnector for FakeConnector {
        async fn connect(&self, _info: &ConnectionInfo) -> AppResult<Box<dyn CoffeeSource>> {
            self.counters.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSource {
                rows: self.rows.clone(),
                counters: self.counters.clone(),
            }))
        }
    }

    #[async_trait]
    impl CoffeeSource for FakeSource {
        async fn fetch_rows(&self) -> AppResult<Vec<CoffeeRow>> {
            self.rows
                .clone()
                .ok_or_else(|| AppError::QueryFailed("relation \"coffee\" does not exist".into()))
        }

        async fn close(&self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Starts a fake Bond service answering every verification with `status`.
    async fn fake_bond(status: StatusCode) -> String {
        let app = Router::new().route(VERIFY_PATH, post(move || async move { (status, "{}") }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn test_config(bond_url: &str, overrides: &[(&str, &str)]) -> AppConfig {
        let mut env: HashMap<String, String> = [
            ("GOOGLE_CLOUD_PROJECT", "proj"),
            ("DB_USER", "barista"),
            ("DB_PASS", "s3cret"),
            ("DB_NAME", "coffee"),
            ("DB_REGION", "europe-west1"),
            ("DB_INSTANCE", "decaf"),
            ("DB_TYPE", "CLOUD_SQL_MYSQL"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        env.insert("BOND_SERVICE_URL".into(), bond_url.into());
        for (k, v) in overrides {
            env.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_lookup("decaf-service", |key| env.get(key).cloned())
    }

    fn test_state(config: AppConfig, rows: Option<Vec<CoffeeRow>>) -> (AppState, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let connector: Arc<dyn BackendConnector> = Arc::new(FakeConnector {
            rows,
            counters: counters.clone(),
        });
        let backends = Backends::new(connector.clone(), connector.clone(), connector);
        let bond = BondClient::with_client(config.bond_url.clone(), reqwest::Client::new());
        (AppState::with_backends(config, backends, bond), counters)
    }

    /// 52 rows; the 51st (index 50) is Ethiopian at 4.50 and the integer
    /// parts sum to 230.
    fn seeded_rows() -> Vec<CoffeeRow> {
        let mut rows: Vec<CoffeeRow> = (0..52)
            .map(|i| CoffeeRow::new(format!("bean-{}", i), "4.25"))
            .collect();
        rows[50] = CoffeeRow::new("Ethiopian", "4.50");
        rows[51] = CoffeeRow::new("Jamaica Blue Mountain", "26.00");
        rows
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, String, String) {
        let app = crate::create_router(state);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_mysql_end_to_end() {
        let bond = fake_bond(StatusCode::OK).await;
        let (state, counters) = test_state(test_config(&bond, &[]), Some(seeded_rows()));

        let (status, content_type, body) = get(state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/json");
        assert_eq!(
            body,
            r#"{"magic_coffee":"Ethiopian","total":230,"project":"proj","db":"CLOUD_SQL_MYSQL"}"#
        );
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_sentinel_for_postgres_backends() {
        let bond = fake_bond(StatusCode::OK).await;
        for db_type in ["ALLOY_DB", "CLOUD_SQL_POSTGRES"] {
            let (state, _) = test_state(
                test_config(&bond, &[("DB_TYPE", db_type), ("DB_CLUSTER", "roastery")]),
                Some(seeded_rows()),
            );
            let (status, _, body) = get(state, "/").await;
            assert_eq!(status, StatusCode::OK);
            let json: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(json["magic_coffee"], "Ethiopian");
            assert_eq!(json["total"], 230);
            assert_eq!(json["db"], db_type);
        }
    }

    #[tokio::test]
    async fn test_verification_failure_is_500() {
        let bond = fake_bond(StatusCode::SERVICE_UNAVAILABLE).await;
        let (state, counters) = test_state(test_config(&bond, &[]), Some(seeded_rows()));

        let (status, content_type, body) = get(state, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.starts_with("Error:"), "body was {}", body);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_backend_never_connects() {
        let bond = fake_bond(StatusCode::OK).await;
        let (state, counters) = test_state(test_config(&bond, &[("DB_TYPE", "ORACLE")]), Some(vec![]));

        let (status, _, body) = get(state, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error: unknown backend kind \"ORACLE\"");
        assert_eq!(counters.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_alloydb_without_cluster_never_connects() {
        let bond = fake_bond(StatusCode::OK).await;
        let (state, counters) =
            test_state(test_config(&bond, &[("DB_TYPE", "ALLOY_DB")]), Some(vec![]));

        let (status, _, body) = get(state, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Error: cluster required"));
        assert_eq!(counters.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_configuration_never_connects() {
        let bond = fake_bond(StatusCode::OK).await;
        let (state, counters) = test_state(test_config(&bond, &[("DB_PASS", "")]), Some(vec![]));

        let (status, _, body) = get(state, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Error: missing configuration"));
        assert!(body.contains("DB_PASS"));
        assert_eq!(counters.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_failure_still_closes_pool() {
        let bond = fake_bond(StatusCode::OK).await;
        let (state, counters) = test_state(test_config(&bond, &[]), None);

        let (status, _, body) = get(state, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Error: query failed"));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_total_overflow_is_500() {
        let bond = fake_bond(StatusCode::OK).await;
        let rows = vec![
            CoffeeRow::new("A", "9000000000000000000.00"),
            CoffeeRow::new("B", "9000000000000000000.00"),
        ];
        let (state, counters) = test_state(test_config(&bond, &[]), Some(rows));

        let (status, content_type, body) = get(state, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.starts_with("Error: query failed: price total overflowed"), "body was {}", body);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_table_is_not_an_error() {
        let bond = fake_bond(StatusCode::OK).await;
        let (state, _) = test_state(test_config(&bond, &[]), Some(vec![]));

        let (status, _, body) = get(state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"project":"proj","db":"CLOUD_SQL_MYSQL"}"#);
    }

    #[tokio::test]
    async fn test_health_check() {
        let (state, _) = test_state(test_config("http://127.0.0.1:9", &[]), None);
        let (status, _, body) = get(state, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "decaf-service");
    }
}
