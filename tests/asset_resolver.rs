use axum::{
    Router,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};

use og_backend::features::og::assets::resolve_image_data_uri;

async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn fetched_image_becomes_data_uri() {
    // 1x1 PNG
    let png: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1f, 0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78,
        0x9c, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];
    let body = png.to_vec();
    let app = Router::new().route(
        "/avatar.png",
        get(move || {
            let body = body.clone();
            async move { ([(header::CONTENT_TYPE, "image/png")], body) }
        }),
    );
    let base = spawn_server(app).await;

    let uri = resolve_image_data_uri(&format!("{base}/avatar.png"))
        .await
        .expect("data uri");
    assert!(uri.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn non_success_status_yields_none() {
    let app = Router::new().route(
        "/missing.png",
        get(|| async { (StatusCode::NOT_FOUND, "gone").into_response() }),
    );
    let base = spawn_server(app).await;

    assert!(
        resolve_image_data_uri(&format!("{base}/missing.png"))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn oversized_asset_yields_none() {
    // 超过 5MB 上限
    let app = Router::new().route(
        "/huge.png",
        get(|| async {
            (
                [(header::CONTENT_TYPE, "image/png")],
                vec![0u8; 6 * 1024 * 1024],
            )
        }),
    );
    let base = spawn_server(app).await;

    assert!(
        resolve_image_data_uri(&format!("{base}/huge.png"))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn unreachable_host_yields_none() {
    assert!(
        resolve_image_data_uri("http://127.0.0.1:1/avatar.png")
            .await
            .is_none()
    );
}

/// 挂起的服务端（accept 后不回包）：抓取必须在硬超时后放弃，而不是悬挂。
#[tokio::test]
async fn hanging_server_times_out_to_none() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let _hold = socket;
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            });
        }
    });

    let started = std::time::Instant::now();
    let result = resolve_image_data_uri(&format!("http://{addr}/slow.png")).await;
    assert!(result.is_none());
    // 默认硬超时 3s，留出调度余量
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}
