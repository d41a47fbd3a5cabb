use axum::http::{HeaderValue, Method, header};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsConfig;

/// 根据配置构建 CORS 中间件。
///
/// 配置无效时返回 None（跳过启用），而不是让服务带着危险配置启动。
pub fn build_cors_layer(cors: &CorsConfig) -> Option<CorsLayer> {
    if !cors.enabled {
        return None;
    }

    let (any_origin, origins) = split_wildcard(&cors.allowed_origins, |v| {
        HeaderValue::from_str(v)
            .map_err(|_| tracing::warn!("CORS allowed_origins 含无效值: {}", v))
            .ok()
    });
    if !any_origin && origins.is_empty() {
        tracing::warn!("CORS 已启用但 allowed_origins 为空，已跳过启用");
        return None;
    }

    let (any_methods, methods) = split_wildcard(&cors.allowed_methods, |v| {
        Method::from_bytes(v.to_ascii_uppercase().as_bytes())
            .map_err(|_| tracing::warn!("CORS allowed_methods 含无效值: {}", v))
            .ok()
    });
    let (any_headers, headers) = split_wildcard(&cors.allowed_headers, parse_header_name);
    let (any_expose, expose_headers) = split_wildcard(&cors.expose_headers, parse_header_name);

    if cors.allow_credentials && (any_origin || any_methods || any_headers || any_expose) {
        tracing::error!("CORS 配置无效：allow_credentials=true 不能与 \"*\" 同时使用，已跳过启用");
        return None;
    }

    let mut layer = CorsLayer::new();

    if any_origin {
        layer = layer.allow_origin(Any);
    } else {
        layer = layer.allow_origin(origins);
    }

    if any_methods {
        layer = layer.allow_methods(Any);
    } else if !methods.is_empty() {
        layer = layer.allow_methods(methods);
    }

    if any_headers {
        layer = layer.allow_headers(Any);
    } else if !headers.is_empty() {
        layer = layer.allow_headers(headers);
    }

    if any_expose {
        layer = layer.expose_headers(Any);
    } else if !expose_headers.is_empty() {
        layer = layer.expose_headers(expose_headers);
    }

    if cors.allow_credentials {
        layer = layer.allow_credentials(true);
    }

    if let Some(secs) = cors.max_age_secs
        && secs > 0
    {
        layer = layer.max_age(Duration::from_secs(secs));
    }

    Some(layer)
}

fn parse_header_name(v: &str) -> Option<header::HeaderName> {
    header::HeaderName::from_bytes(v.to_ascii_lowercase().as_bytes())
        .map_err(|_| tracing::warn!("CORS 配置含无效请求头: {}", v))
        .ok()
}

/// 拆分配置列表："*" 表示任意，其余逐项解析（解析失败仅告警并跳过）。
fn split_wildcard<T>(values: &[String], parse: impl Fn(&str) -> Option<T>) -> (bool, Vec<T>) {
    let mut any = false;
    let mut parsed = Vec::new();
    for raw in values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        if value == "*" {
            any = true;
            continue;
        }
        if let Some(v) = parse(value) {
            parsed.push(v);
        }
    }
    (any, parsed)
}
