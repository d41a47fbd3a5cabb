use axum::{
    http::{StatusCode, header},
    response::IntoResponse,
};

/// 契约关键点：全局错误必须为 RFC7807 ProblemDetails（application/problem+json）。
#[tokio::test]
async fn app_error_into_response_is_problem_details() {
    let resp = og_backend::AppError::Validation("title 参数必填且不能为空".to_string())
        .into_response();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .expect("missing Content-Type")
        .to_str()
        .expect("invalid Content-Type");
    assert_eq!(content_type, "application/problem+json");

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");

    // 核心字段（强一致契约）
    assert_eq!(v["status"], 400);
    assert_eq!(v["code"], "VALIDATION_FAILED");
    assert!(v.get("type").is_some());
    assert!(v.get("title").is_some());
    assert!(v.get("detail").is_some());
}

/// 配额超限错误必须携带 usage/limit/resetDate 扩展字段（camelCase）。
#[tokio::test]
async fn quota_exceeded_carries_usage_extensions() {
    let resp = og_backend::AppError::QuotaExceeded {
        usage: 500,
        limit: 500,
        reset_date: "2026-08-01".to_string(),
    }
    .into_response();

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");

    assert_eq!(v["code"], "QUOTA_EXCEEDED");
    assert_eq!(v["usage"], 500);
    assert_eq!(v["limit"], 500);
    assert_eq!(v["resetDate"], "2026-08-01");
    // snake_case 形式不得出现
    assert!(v.get("reset_date").is_none());
}

/// 非配额错误不得泄露配额扩展字段。
#[tokio::test]
async fn non_quota_errors_omit_usage_extensions() {
    let resp = og_backend::AppError::Auth("API Key 无效或已停用".to_string()).into_response();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");

    assert_eq!(v["code"], "UNAUTHORIZED");
    assert!(v.get("usage").is_none());
    assert!(v.get("limit").is_none());
    assert!(v.get("resetDate").is_none());
}

/// 对外 JSON 字段命名统一 camelCase。
#[test]
fn og_params_serialize_as_camel_case() {
    use og_backend::features::og::types::OgImageParams;

    let params = OgImageParams {
        title: "t".to_string(),
        bg_color: Some("#112233".to_string()),
        accent_color: Some("#445566".to_string()),
        font_url: Some("https://example.invalid/f.woff2".to_string()),
        ..Default::default()
    };

    let v = serde_json::to_value(params).expect("serialize json");
    assert!(v.get("bgColor").is_some());
    assert!(v.get("bg_color").is_none());
    assert!(v.get("accentColor").is_some());
    assert!(v.get("fontUrl").is_some());
}
