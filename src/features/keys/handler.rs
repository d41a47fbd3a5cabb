//! 密钥自助签发与用量查询接口。

use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::state::AppState;

use super::auth::{extract_api_key, hash_key};
use super::ledger::current_month;
use super::storage::KeyStorage;

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// 小写字母 + 数字的随机串（密钥体与密钥 id 共用）。
fn generate_id(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateKeyRequest {
    /// 联系邮箱（必填，需包含 @）
    pub email: String,
    /// 密钥备注名
    pub name: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateKeyResponse {
    pub id: String,
    /// 明文密钥，仅此一次返回
    pub key: String,
    pub tier: String,
    pub monthly_limit: i64,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UsageBreakdown {
    pub billable_requests: i64,
    pub cached_requests: i64,
    pub failed_requests: i64,
    pub remaining: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UsageResponse {
    pub key_id: String,
    pub name: String,
    pub tier: String,
    pub monthly_limit: i64,
    /// 统计周期（YYYY-MM）
    pub period: String,
    pub usage: UsageBreakdown,
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyQuery {
    pub api_key: Option<String>,
}

fn require_storage(state: &AppState) -> Result<&KeyStorage, AppError> {
    state
        .key_storage
        .as_deref()
        .ok_or_else(|| AppError::Internal("密钥存储不可用".into()))
}

/// 签发新密钥。明文只出现在本次响应中，库里只存哈希。
#[utoipa::path(
    post,
    path = "/v1/keys",
    tag = "keys",
    request_body = CreateKeyRequest,
    responses(
        (status = 200, description = "签发成功", body = CreateKeyResponse),
        (status = 400, description = "邮箱非法", body = crate::error::ProblemDetails),
    )
)]
pub async fn create_key(
    State(state): State<AppState>,
    Json(body): Json<CreateKeyRequest>,
) -> Result<Json<CreateKeyResponse>, AppError> {
    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("email 必填且须为合法邮箱".into()));
    }

    let storage = require_storage(&state)?;
    let quota = &AppConfig::global().quota;

    let raw_key = format!("sk_{}", generate_id(32));
    let id = generate_id(12);
    storage
        .insert_key(
            &id,
            &hash_key(&raw_key),
            body.name.as_deref().unwrap_or("Default"),
            email,
            &quota.default_tier,
            quota.default_monthly_limit,
            Utc::now().timestamp(),
        )
        .await?;

    tracing::info!(key_id = %id, "签发新 API Key");

    Ok(Json(CreateKeyResponse {
        id,
        key: raw_key,
        tier: quota.default_tier.clone(),
        monthly_limit: quota.default_monthly_limit,
        message: "Save this key — it won't be shown again.".to_string(),
    }))
}

/// 查询密钥当月用量。
#[utoipa::path(
    get,
    path = "/v1/keys/usage",
    tag = "keys",
    params(("api_key" = Option<String>, Query, description = "API Key（也可经 X-Api-Key 头传入）")),
    responses(
        (status = 200, description = "当月用量", body = UsageResponse),
        (status = 401, description = "密钥缺失或无效", body = crate::error::ProblemDetails),
    )
)]
pub async fn key_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ApiKeyQuery>,
) -> Result<Json<UsageResponse>, AppError> {
    let api_key = extract_api_key(&headers, query.api_key.as_deref())
        .ok_or_else(|| AppError::Auth("需要 X-Api-Key".into()))?;

    let storage = require_storage(&state)?;
    let record = storage
        .find_active_by_hash(&hash_key(&api_key))
        .await?
        .ok_or_else(|| AppError::Auth("API Key 无效或已停用".into()))?;

    let month = current_month();
    let usage = storage.month_usage(&record.id, &month).await?;

    Ok(Json(UsageResponse {
        key_id: record.id,
        name: record.name,
        tier: record.tier,
        monthly_limit: record.monthly_limit,
        period: month,
        usage: UsageBreakdown {
            billable_requests: usage.billable,
            cached_requests: usage.cached,
            failed_requests: usage.failed,
            remaining: record.monthly_limit - usage.billable,
        },
    }))
}

pub fn create_keys_router() -> Router<AppState> {
    Router::new()
        .route("/keys", post(create_key))
        .route("/keys/usage", get(key_usage))
}
