//! OG 图片 HTTP 接口：单图（GET/POST）、批量、模板列表。
//!
//! 请求处理顺序（单图 GET）：
//! 身份解析 → 响应缓存查询 → 配额检查 → 参数归一化 → 渲染 →
//! 后台记账 + 后台写缓存。缓存命中记 cached，不消耗配额。

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, Query, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::features::keys::auth::{Identity, extract_api_key, resolve_identity};
use crate::features::keys::storage::UsageKind;
use crate::state::{AppState, CachedImage};

use super::batch::{run_batch, validate_batch};
use super::render::render_og_image;
use super::templates::{TemplateInfo, list_templates};
use super::types::{BatchRequest, BatchResponse, OgImageParams, RenderTimings};

#[derive(Debug, serde::Deserialize)]
pub struct ApiKeyQuery {
    pub api_key: Option<String>,
}

const CACHE_CONTROL_VALUE: &str = "public, max-age=86400";

fn image_response(
    bytes: Bytes,
    content_type: &str,
    cache_state: &'static str,
    timings: Option<RenderTimings>,
) -> Response {
    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    if let Ok(ct) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, ct);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_VALUE),
    );
    headers.insert("x-cache", HeaderValue::from_static(cache_state));
    if let Some(t) = timings {
        headers.insert("x-render-time-ms", HeaderValue::from(t.total_ms));
        headers.insert("x-svg-time-ms", HeaderValue::from(t.svg_ms));
        headers.insert("x-png-time-ms", HeaderValue::from(t.png_ms));
    }
    response
}

fn spawn_record(state: &AppState, identity: Identity, kind: UsageKind) {
    let ledger = Arc::clone(&state.ledger);
    tokio::spawn(async move {
        ledger.record(&identity, kind).await;
    });
}

async fn resolve_request_identity(
    state: &AppState,
    headers: &HeaderMap,
    query_key: Option<&str>,
) -> Result<Identity, AppError> {
    let api_key = extract_api_key(headers, query_key);
    resolve_identity(state.key_storage.as_deref(), api_key.as_deref()).await
}

/// 渲染一张图并完成记账。单图 GET/POST 共用。
async fn render_and_record(
    state: &AppState,
    identity: &Identity,
    params: OgImageParams,
) -> Result<super::types::RenderedImage, AppError> {
    state.ledger.ensure_capacity(identity, 1).await?;
    let normalized = params.normalize()?;

    match render_og_image(normalized, Arc::clone(&state.render_semaphore)).await {
        Ok(image) => {
            spawn_record(state, identity.clone(), UsageKind::Billable);
            Ok(image)
        }
        Err(e) => {
            spawn_record(state, identity.clone(), UsageKind::Failed);
            Err(e)
        }
    }
}

/// 生成 OG 图（GET，参数经 query string）。成功响应带 24h 缓存头与分段计时头。
#[utoipa::path(
    get,
    path = "/v1/og",
    tag = "og",
    params(
        ("title" = String, Query, description = "主标题（必填）"),
        ("template" = Option<String>, Query, description = "模板 ID，默认 basic"),
        ("format" = Option<String>, Query, description = "png|svg，默认 png"),
        ("width" = Option<u32>, Query, description = "画布宽 [200,2400]"),
        ("height" = Option<u32>, Query, description = "画布高 [200,1260]"),
        ("api_key" = Option<String>, Query, description = "API Key（也可经 X-Api-Key 头传入）"),
    ),
    responses(
        (status = 200, description = "图片字节", content_type = "image/png"),
        (status = 400, description = "参数非法", body = crate::error::ProblemDetails),
        (status = 401, description = "密钥无效", body = crate::error::ProblemDetails),
        (status = 429, description = "月度配额用尽", body = crate::error::ProblemDetails),
    )
)]
pub async fn get_og_image(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(key_query): Query<ApiKeyQuery>,
    Query(params): Query<OgImageParams>,
) -> Result<Response, AppError> {
    let identity = resolve_request_identity(&state, &headers, key_query.api_key.as_deref()).await?;

    // 缓存键 = 完整请求 URI，含全部参数
    let cache_enabled = AppConfig::global().image.cache_enabled;
    let cache_key = uri.to_string();
    if cache_enabled
        && let Some(cached) = state.response_cache.get(&cache_key).await
    {
        tracing::debug!(key = %cache_key, "响应缓存命中");
        spawn_record(&state, identity, UsageKind::Cached);
        return Ok(image_response(
            cached.bytes.clone(),
            &cached.content_type,
            "HIT",
            None,
        ));
    }

    let image = render_and_record(&state, &identity, params).await?;
    let bytes = Bytes::from(image.bytes);

    if cache_enabled {
        let cache = state.response_cache.clone();
        let entry = CachedImage {
            bytes: bytes.clone(),
            content_type: image.format.content_type().to_string(),
        };
        tokio::spawn(async move {
            cache.insert(cache_key, entry).await;
        });
    }

    Ok(image_response(
        bytes,
        image.format.content_type(),
        "MISS",
        Some(image.timings),
    ))
}

/// 生成 OG 图（POST，参数经 JSON body）。不参与响应缓存。
#[utoipa::path(
    post,
    path = "/v1/og",
    tag = "og",
    request_body = OgImageParams,
    responses(
        (status = 200, description = "图片字节", content_type = "image/png"),
        (status = 400, description = "参数非法", body = crate::error::ProblemDetails),
        (status = 401, description = "密钥无效", body = crate::error::ProblemDetails),
        (status = 429, description = "月度配额用尽", body = crate::error::ProblemDetails),
    )
)]
pub async fn post_og_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(key_query): Query<ApiKeyQuery>,
    body: Result<Json<OgImageParams>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(params) = body.map_err(|e| AppError::Json(e.body_text()))?;
    let identity = resolve_request_identity(&state, &headers, key_query.api_key.as_deref()).await?;

    let image = render_and_record(&state, &identity, params).await?;
    let content_type = image.format.content_type();
    Ok(image_response(
        Bytes::from(image.bytes),
        content_type,
        "MISS",
        Some(image.timings),
    ))
}

/// 批量生成。配额按项数整体预留：余量不足时整批 429，不部分执行。
#[utoipa::path(
    post,
    path = "/v1/og/batch",
    tag = "og",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "逐项结果与汇总", body = BatchResponse),
        (status = 400, description = "批量校验失败", body = crate::error::ProblemDetails),
        (status = 429, description = "月度配额不足", body = crate::error::ProblemDetails),
    )
)]
pub async fn post_og_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(key_query): Query<ApiKeyQuery>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, AppError> {
    let Json(request) = body.map_err(|e| AppError::Json(e.body_text()))?;
    let identity = resolve_request_identity(&state, &headers, key_query.api_key.as_deref()).await?;

    validate_batch(&request)?;
    state
        .ledger
        .ensure_capacity(&identity, request.images.len() as i64)
        .await?;

    let response = run_batch(request, Arc::clone(&state.render_semaphore)).await;

    let succeeded = response.summary.succeeded as i64;
    let ledger = Arc::clone(&state.ledger);
    tokio::spawn(async move {
        ledger.record_batch(&identity, succeeded).await;
    });

    Ok(Json(response))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TemplatesResponse {
    pub templates: Vec<TemplateInfo>,
    pub docs: String,
}

/// 模板列表。
#[utoipa::path(
    get,
    path = "/v1/og/templates",
    tag = "og",
    responses((status = 200, description = "可用模板", body = TemplatesResponse))
)]
pub async fn get_templates() -> Json<TemplatesResponse> {
    let domain = &AppConfig::global().branding.default_domain;
    Json(TemplatesResponse {
        templates: list_templates(),
        docs: format!("https://{domain}/docs/templates"),
    })
}

pub fn create_og_router() -> Router<AppState> {
    Router::new()
        .route("/og", get(get_og_image).post(post_og_image))
        .route("/og/batch", post(post_og_batch))
        .route("/og/templates", get(get_templates))
}
