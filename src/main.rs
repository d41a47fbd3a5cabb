use std::sync::Arc;

use axum::{Router, http::StatusCode, response::Json, routing::get};
use og_backend::cors::build_cors_layer;
use og_backend::features::keys::handler::create_keys_router;
use og_backend::features::keys::storage::KeyStorage;
use og_backend::features::og::create_og_router;
use og_backend::features::og::raster::prewarm_fonts;
use og_backend::request_id::request_id_middleware;
use og_backend::state::AppState;
use og_backend::{ShutdownManager, config::AppConfig};
use serde_json::json;
use tower_http::compression::CompressionLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn compression_predicate() -> impl tower_http::compression::predicate::Predicate {
    use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};

    // 明确排除不该压缩的响应：PNG 等位图已压缩，再压缩只浪费 CPU；
    // SVG 与 JSON 仍走压缩。保留默认最小大小阈值。
    SizeAbove::default()
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("application/octet-stream"))
        .and(NotForContentType::const_new("application/zip"))
        .and(NotForContentType::const_new("application/gzip"))
}


#[derive(OpenApi)]
#[openapi(
    paths(
        og_backend::features::og::handler::get_og_image,
        og_backend::features::og::handler::post_og_image,
        og_backend::features::og::handler::post_og_batch,
        og_backend::features::og::handler::get_templates,
        og_backend::features::keys::handler::create_key,
        og_backend::features::keys::handler::key_usage,
        health_check,
    ),
    components(
        schemas(
            og_backend::error::ProblemDetails,
            og_backend::features::og::types::OgImageParams,
            og_backend::features::og::types::OgParamsPatch,
            og_backend::features::og::types::BatchImageInput,
            og_backend::features::og::types::BatchRequest,
            og_backend::features::og::types::BatchResultEntry,
            og_backend::features::og::types::BatchSummary,
            og_backend::features::og::types::BatchResponse,
            og_backend::features::og::types::RenderTimings,
            og_backend::features::og::handler::TemplatesResponse,
            og_backend::features::keys::handler::CreateKeyRequest,
            og_backend::features::keys::handler::CreateKeyResponse,
            og_backend::features::keys::handler::UsageResponse,
            og_backend::features::keys::handler::UsageBreakdown,
        )
    ),
    tags(
        (name = "og", description = "OG 图片生成"),
        (name = "keys", description = "API Key 与用量"),
        (name = "Health", description = "Health APIs"),
    ),
    info(
        title = "OG Backend API",
        version = "0.1.0",
        description = "Open Graph 社交预览图生成服务 (Axum)"
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    summary = "健康检查",
    description = "用于探活的健康检查端点，返回服务状态与版本信息。",
    responses((status = 200, description = "服务健康", body = serde_json::Value)),
    tag = "Health"
)]
async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "og-backend",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "og_backend=info,tower_http=info".into()),
        )
        .init();

    let shutdown_manager = ShutdownManager::new();

    if let Err(e) = AppConfig::init_global() {
        tracing::error!("配置初始化失败: {}", e);
        std::process::exit(1);
    }
    let config = AppConfig::global();

    shutdown_manager.start_signal_handler();

    // 字体索引预热放到阻塞线程，不拖慢启动
    tokio::task::spawn_blocking(prewarm_fonts);

    // 密钥存储：连接失败不阻止启动，鉴权降级为 dev 身份
    let key_storage: Option<Arc<KeyStorage>> = if config.database.offline {
        tracing::info!("数据库离线模式，跳过密钥存储初始化");
        None
    } else {
        match KeyStorage::connect_sqlite(&config.database.path, config.database.wal).await {
            Ok(storage) => match storage.init_schema().await {
                Ok(()) => Some(Arc::new(storage)),
                Err(e) => {
                    tracing::warn!("密钥表结构初始化失败：{}（将以降级身份运行）", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("密钥存储连接失败：{}（将以降级身份运行）", e);
                None
            }
        }
    };

    let app_state = AppState::build(config, key_storage);

    let api_router = Router::<AppState>::new()
        .merge(create_og_router())
        .merge(create_keys_router());

    let mut app = Router::<AppState>::new()
        .route("/health", get(health_check))
        .nest(&config.api.prefix, api_router)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    // 请求追踪 ID：透传或生成 x-request-id，错误响应回填 requestId
    app = app.layer(axum::middleware::from_fn(request_id_middleware));

    if let Some(cors) = build_cors_layer(&config.cors) {
        tracing::info!("CORS 已启用");
        app = app.layer(cors);
    }

    app = app.layer(CompressionLayer::new().compress_when(compression_predicate()));

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("监听地址绑定失败 {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("OG API: http://{}{}/og", addr, config.api.prefix);
    tracing::info!("Keys API: http://{}{}/keys", addr, config.api.prefix);

    let shutdown_timeout = config.shutdown.timeout_duration();
    let shutdown_secs = config.shutdown.timeout_secs;
    let shutdown_signal = async move {
        let reason = shutdown_manager.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅退出...", reason);

        match tokio::time::timeout(shutdown_timeout, async move {
            tracing::info!("优雅退出超时时间: {}秒", shutdown_secs);
            // 留出在途请求与后台记账任务的收尾时间
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        })
        .await
        {
            Ok(_) => tracing::info!("优雅退出完成"),
            Err(_) => tracing::warn!("优雅退出超时，强制退出"),
        }
    };

    let graceful = axum::serve(listener, app).with_graceful_shutdown(async {
        shutdown_signal.await;
        tracing::info!("开始优雅关闭HTTP服务器...");
    });

    if let Err(e) = graceful.await {
        tracing::error!("服务器运行错误: {}", e);
        std::process::exit(1);
    }

    tracing::info!("服务器已优雅关闭");
}
