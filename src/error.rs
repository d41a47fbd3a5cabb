use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum AppError {
    /// 参数校验错误（缺少 title、批量超限、重复 id 等）
    #[error("参数校验错误: {0}")]
    Validation(String),

    /// JSON 解析错误
    #[error("JSON 解析错误: {0}")]
    Json(String),

    /// 认证失败（API Key 无效或已停用）
    #[error("认证失败: {0}")]
    Auth(String),

    /// 月度配额已用尽
    #[error("月度配额已用尽: 已使用 {usage}/{limit}")]
    QuotaExceeded {
        /// 当月已计费次数
        usage: i64,
        /// 月度上限
        limit: i64,
        /// 配额周期起始日（YYYY-MM-01）
        reset_date: String,
    },

    /// 图像渲染错误（布局或栅格化阶段失败）
    #[error("图像渲染错误: {0}")]
    Render(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// RFC7807 风格的错误响应（Problem Details）。
///
/// 设计目标：
/// - 让所有 API 错误返回结构化 JSON，便于 SDK/调用方稳定处理
/// - 与 OpenAPI 一致（content-type = application/problem+json）
/// - 允许在不破坏主结构的前提下扩展字段（如 requestId、配额上下文）
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Validation Failed")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 400)]
    pub status: u16,

    /// 人类可读的详细信息（尽量稳定，不建议依赖解析）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "VALIDATION_FAILED")]
    pub code: String,

    /// 可选：请求追踪 ID。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// 可选：当月已计费次数（仅 QUOTA_EXCEEDED）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<i64>,

    /// 可选：月度上限（仅 QUOTA_EXCEEDED）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    /// 可选：配额周期起始日（仅 QUOTA_EXCEEDED）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_date: Option<String>,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Render(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::Json(_) => "BAD_REQUEST",
            AppError::Auth(_) => "UNAUTHORIZED",
            AppError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            AppError::Render(_) => "IMAGE_RENDER_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::TOO_MANY_REQUESTS => "Monthly Limit Exceeded",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let title = self.title().to_string();
        let code = self.stable_code().to_string();
        let detail = Some(self.to_string());

        // 默认不附加配额上下文；仅在配额超限时回填，调用方可据此展示剩余额度与重置时间。
        let (usage, limit, reset_date) = match self {
            AppError::QuotaExceeded {
                usage,
                limit,
                reset_date,
            } => (Some(usage), Some(limit), Some(reset_date)),
            _ => (None, None, None),
        };

        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title,
            status: status.as_u16(),
            detail,
            code,
            request_id: crate::request_id::current_request_id(),
            usage,
            limit,
            reset_date,
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(format!("数据库错误: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}
