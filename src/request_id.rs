//! 请求追踪 ID。
//!
//! 每个请求都有一个 `X-Request-Id`：客户端携带的合法值原样透传，
//! 否则服务端生成。值存入任务上下文，错误响应体的 `requestId`
//! 字段从这里取。

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_ID_LEN: usize = 128;

tokio::task_local! {
    static TASK_REQUEST_ID: String;
}

/// 当前请求的追踪 ID。中间件作用域之外返回 None。
pub fn current_request_id() -> Option<String> {
    TASK_REQUEST_ID.try_with(|v| v.clone()).ok()
}

/// 客户端传入值仅在字符集安全且长度合理时采信，其余情况一律重新生成。
fn accept_inbound_id(req: &Request) -> Option<String> {
    let raw = req
        .headers()
        .get(REQUEST_ID_HEADER)?
        .to_str()
        .ok()?
        .trim();
    let safe = !raw.is_empty()
        && raw.len() <= MAX_ID_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    safe.then(|| raw.to_string())
}

pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id =
        accept_inbound_id(&req).unwrap_or_else(|| format!("req_{}", Uuid::new_v4().simple()));

    let mut res = TASK_REQUEST_ID
        .scope(request_id.clone(), async move { next.run(req).await })
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, extract::Request};

    use super::accept_inbound_id;

    fn req_with_id(id: &str) -> Request {
        Request::builder()
            .uri("/")
            .header("x-request-id", id)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn inbound_id_passes_through_when_safe() {
        assert_eq!(
            accept_inbound_id(&req_with_id("trace-1_a.b")).as_deref(),
            Some("trace-1_a.b")
        );
    }

    #[test]
    fn unsafe_or_oversized_inbound_ids_are_replaced() {
        assert!(accept_inbound_id(&req_with_id("  ")).is_none());
        assert!(accept_inbound_id(&req_with_id("has space")).is_none());
        assert!(accept_inbound_id(&req_with_id("slash/ed")).is_none());
        assert!(accept_inbound_id(&req_with_id(&"x".repeat(200))).is_none());
        let bare = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert!(accept_inbound_id(&bare).is_none());
    }
}
