//! Data-Driven Decaf 服务
//!
//! 对外提供单个 GET 端点，处理流程：
//! - 根据 DB_TYPE 选择托管数据库（AlloyDB / Cloud SQL Postgres / Cloud SQL MySQL）
//! - 查询种子表，统计价格总和与哨兵行名称
//! - 将结果提交 Bond 服务校验并返回

mod aggregator;
mod backend;
mod bond;
mod connector;
mod handlers;
mod metadata;
mod pool;
mod routes;
mod service;
mod state;

use std::path::Path;
use std::time::Duration;

use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "decaf-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Data-Driven Decaf API",
        version = "0.1.0",
        description = "查询托管数据库并提交 Bond 校验"
    ),
    paths(
        handlers::data_driven_decaf,
        handlers::health_check,
    ),
    components(schemas(
        common::models::AggregateResult,
        common::models::BackendKind,
        handlers::HealthResponse,
    )),
    tags(
        (name = "decaf", description = "聚合与校验端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if present) before anything else
    load_dotenv(Path::new(".env"));

    init_tracing();

    // 加载配置
    let mut config = AppConfig::load_with_service(SERVICE_NAME);

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    if config.project_id.is_empty() {
        if let Some(project) =
            metadata::detect_project_id(&http_client, metadata::PROJECT_ID_URL).await
        {
            config.project_id = project;
        }
    }

    info!(
        service = SERVICE_NAME,
        project = %config.project_id,
        db_type = config.db_type.as_deref().unwrap_or("<unset>"),
        bond_url = %config.bond_url,
        "配置已加载"
    );

    let addr = format!("{}:{}", config.host, config.port);

    // 创建应用状态
    let state = AppState::new(config, http_client);

    // 创建路由
    let app = create_router(state);

    // 启动服务
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(service = SERVICE_NAME, "服务已停止");
    Ok(())
}

/// 初始化日志追踪；LOG_FORMAT=json 时输出 JSON 日志
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "无法监听 Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "无法监听 SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("收到关闭信号");
}
