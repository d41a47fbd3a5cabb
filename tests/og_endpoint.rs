use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use og_backend::{
    config::AppConfig, features::keys::handler::create_keys_router,
    features::og::create_og_router, state::AppState,
};

fn build_app() -> Router {
    // 贴近生产部署：og/keys 实际挂在 /v1 下
    let state = AppState::build(AppConfig::global(), None);
    Router::<AppState>::new()
        .nest(
            "/v1",
            Router::<AppState>::new()
                .merge(create_og_router())
                .merge(create_keys_router()),
        )
        .with_state(state)
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

#[tokio::test]
async fn missing_title_is_a_400_problem() {
    let app = build_app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/v1/og?template=basic")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v: serde_json::Value =
        serde_json::from_str(&body_string(resp).await).expect("problem json");
    assert_eq!(v["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn svg_output_honors_clamped_dimensions() {
    let app = build_app();
    // width=50 低于下限，height=9999 超上限
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/v1/og?title=Hello&format=svg&width=50&height=9999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "image/svg+xml; charset=utf-8"
    );
    assert_eq!(resp.headers().get("x-cache").unwrap(), "MISS");
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "public, max-age=86400"
    );
    assert!(resp.headers().contains_key("x-render-time-ms"));
    assert!(resp.headers().contains_key("x-svg-time-ms"));
    assert!(resp.headers().contains_key("x-png-time-ms"));

    let svg = body_string(resp).await;
    assert!(svg.contains(r#"width="200""#));
    assert!(svg.contains(r#"height="1260""#));
}

#[tokio::test]
async fn unknown_template_falls_back_to_basic() {
    let app = build_app();
    let known = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/og?title=Same+title&format=svg&template=basic")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let unknown = app
        .oneshot(
            Request::builder()
                .uri("/v1/og?title=Same+title&format=svg&template=does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(known.status(), StatusCode::OK);
    assert_eq!(unknown.status(), StatusCode::OK);
    assert_eq!(body_string(known).await, body_string(unknown).await);
}

#[tokio::test]
async fn repeat_request_hits_response_cache() {
    let app = build_app();
    let uri = "/v1/og?title=Cache+me&format=svg";

    let first = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    let first_body = body_string(first).await;

    // 缓存写入在后台任务完成，稍等片刻
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let second = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");
    assert_eq!(body_string(second).await, first_body);

    // 参数不同 = 不同缓存键
    let other = app
        .oneshot(
            Request::builder()
                .uri("/v1/og?title=Cache+me&format=svg&width=800")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(other.headers().get("x-cache").unwrap(), "MISS");
}

#[tokio::test]
async fn post_og_accepts_json_body() {
    let app = build_app();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/og")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"title":"From body","format":"svg","width":800,"height":420}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let svg = body_string(resp).await;
    assert!(svg.contains(r#"width="800""#));
    assert!(svg.contains(r#"height="420""#));
}

#[tokio::test]
async fn malformed_json_body_is_a_400_problem() {
    let app = build_app();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/og")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"title": unquoted}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v: serde_json::Value =
        serde_json::from_str(&body_string(resp).await).expect("problem json");
    assert_eq!(v["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn templates_endpoint_lists_all_five() {
    let app = build_app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/v1/og/templates")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let v: serde_json::Value = serde_json::from_str(&body_string(resp).await).expect("json");
    let ids: Vec<&str> = v["templates"]
        .as_array()
        .expect("templates array")
        .iter()
        .map(|t| t["id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids, ["basic", "blog", "product", "social", "testimonial"]);
}
