use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use og_backend::{config::AppConfig, features::og::create_og_router, state::AppState};

fn build_app() -> Router {
    let state = AppState::build(AppConfig::global(), None);
    Router::<AppState>::new()
        .nest("/v1", create_og_router())
        .with_state(state)
}

async fn post_batch(app: Router, body: Value) -> (StatusCode, Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/og/batch")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

fn svg_item(id: &str, title: &str) -> Value {
    json!({ "id": id, "title": title, "format": "svg" })
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let images: Vec<Value> = (0..21).map(|i| svg_item(&format!("i{i}"), "t")).collect();
    let (status, v) = post_batch(build_app(), json!({ "images": images })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    let (status, v) = post_batch(
        build_app(),
        json!({ "images": [svg_item("a", "one"), svg_item("a", "two")] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["code"], "VALIDATION_FAILED");
    assert!(v["detail"].as_str().unwrap_or_default().contains('a'));
}

#[tokio::test]
async fn results_preserve_input_order_with_summary() {
    let (status, v) = post_batch(
        build_app(),
        json!({
            "images": [svg_item("x", "First"), svg_item("y", "Second"), svg_item("z", "Third")],
            "defaults": { "width": 640, "height": 320 }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = v["results"].as_array().expect("results");
    let ids: Vec<&str> = results.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["x", "y", "z"]);
    for r in results {
        assert_eq!(r["success"], true);
        // mediatype 无参数：带 charset 的串会让严格的 data URI 解析器拒收
        assert!(
            r["data"]
                .as_str()
                .expect("data uri")
                .starts_with("data:image/svg+xml;base64,")
        );
        assert_eq!(r["contentType"], "image/svg+xml");
        assert!(r["timings"]["totalMs"].is_number());
    }
    assert_eq!(v["summary"]["total"], 3);
    assert_eq!(v["summary"]["succeeded"], 3);
    assert_eq!(v["summary"]["failed"], 0);
}

/// demo 身份月度上限 10：11 项批量在执行前被整体拒绝。
#[tokio::test]
async fn batch_reservation_rejects_before_rendering() {
    let images: Vec<Value> = (0..11).map(|i| svg_item(&format!("i{i}"), "t")).collect();
    let (status, v) = post_batch(build_app(), json!({ "images": images })).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(v["code"], "QUOTA_EXCEEDED");
    assert_eq!(v["usage"], 0);
    assert_eq!(v["limit"], 10);
    assert!(
        v["resetDate"]
            .as_str()
            .expect("resetDate")
            .ends_with("-01")
    );
}

#[tokio::test]
async fn item_overrides_beat_batch_defaults() {
    let mut item = svg_item("a", "Wide one");
    item["width"] = json!(1600);
    let (status, v) = post_batch(
        build_app(),
        json!({ "images": [item], "defaults": { "width": 640, "height": 320 } }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = v["results"][0]["data"].as_str().expect("data uri");
    let payload = data.split(',').nth(1).expect("base64 payload");
    let svg = String::from_utf8(
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, payload)
            .expect("base64"),
    )
    .expect("utf8");
    assert!(svg.contains(r#"width="1600""#));
    assert!(svg.contains(r#"height="320""#));
}
