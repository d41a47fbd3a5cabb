//! 批量渲染编排：校验、并发扇出、部分失败隔离。
//!
//! 单项失败只影响该项的结果条目，不中断其余项；
//! 结果顺序与输入顺序一致，按 id 一一对应。

use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::error::AppError;

use super::render::render_og_image;
use super::types::{BatchRequest, BatchResponse, BatchResultEntry, BatchSummary, OgParamsPatch};

/// 单次批量请求的项数上限
pub const MAX_BATCH_SIZE: usize = 20;

/// 批量级校验：项数区间、id 唯一且非空、title 非空。
/// 这些错误属于整个请求，直接 400，不进入逐项执行。
pub fn validate_batch(request: &BatchRequest) -> Result<(), AppError> {
    if request.images.is_empty() {
        return Err(AppError::Validation("images 不能为空".into()));
    }
    if request.images.len() > MAX_BATCH_SIZE {
        return Err(AppError::Validation(format!(
            "批量最多 {MAX_BATCH_SIZE} 项，收到 {}",
            request.images.len()
        )));
    }

    let mut seen = std::collections::HashSet::with_capacity(request.images.len());
    for item in &request.images {
        let id = item.id.trim();
        if id.is_empty() {
            return Err(AppError::Validation("每个批量项必须携带非空 id".into()));
        }
        if !seen.insert(id) {
            return Err(AppError::Validation(format!("批量项 id 重复: '{id}'")));
        }
        if item.title.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "批量项 '{id}' 的 title 不能为空"
            )));
        }
    }
    Ok(())
}

async fn run_one(
    id: String,
    params: super::types::OgImageParams,
    semaphore: Arc<Semaphore>,
) -> BatchResultEntry {
    let normalized = match params.normalize() {
        Ok(n) => n,
        Err(e) => {
            return BatchResultEntry {
                id,
                success: false,
                data: None,
                content_type: None,
                timings: None,
                error: Some(e.to_string()),
            };
        }
    };

    match render_og_image(normalized, semaphore).await {
        // data URI 的 mediatype 不允许参数，用无参媒体类型而不是响应头串
        Ok(image) => BatchResultEntry {
            id,
            success: true,
            data: Some(format!(
                "data:{};base64,{}",
                image.format.media_type(),
                BASE64.encode(&image.bytes)
            )),
            content_type: Some(image.format.media_type().to_string()),
            timings: Some(image.timings),
            error: None,
        },
        Err(e) => {
            tracing::warn!("批量项 '{id}' 渲染失败: {e}");
            BatchResultEntry {
                id,
                success: false,
                data: None,
                content_type: None,
                timings: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// 执行已通过校验的批量请求。渲染并发由共享信号量限流。
pub async fn run_batch(request: BatchRequest, semaphore: Arc<Semaphore>) -> BatchResponse {
    let t_start = Instant::now();
    let defaults = request.defaults.unwrap_or_else(OgParamsPatch::default);

    let futures: Vec<_> = request
        .images
        .iter()
        .map(|item| {
            run_one(
                item.id.clone(),
                item.effective_params(&defaults),
                Arc::clone(&semaphore),
            )
        })
        .collect();

    // join_all 保持与输入一致的顺序
    let results = join_all(futures).await;

    let succeeded = results.iter().filter(|r| r.success).count();
    let summary = BatchSummary {
        total: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        total_ms: t_start.elapsed().as_millis() as u64,
    };
    BatchResponse { results, summary }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Semaphore;

    use super::super::types::{BatchImageInput, BatchRequest, OgParamsPatch};
    use super::{MAX_BATCH_SIZE, run_batch, validate_batch};
    use crate::error::AppError;

    fn item(id: &str, title: &str) -> BatchImageInput {
        BatchImageInput {
            id: id.to_string(),
            title: title.to_string(),
            overrides: OgParamsPatch {
                // 测试固定 SVG 输出，不依赖系统字体栅格化
                format: Some("svg".into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn rejects_empty_and_oversized_batches() {
        let empty = BatchRequest {
            images: vec![],
            defaults: None,
        };
        assert!(matches!(
            validate_batch(&empty),
            Err(AppError::Validation(_))
        ));

        let oversized = BatchRequest {
            images: (0..=MAX_BATCH_SIZE).map(|i| item(&format!("i{i}"), "t")).collect(),
            defaults: None,
        };
        assert!(matches!(
            validate_batch(&oversized),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let request = BatchRequest {
            images: vec![item("a", "one"), item("a", "two")],
            defaults: None,
        };
        assert!(matches!(
            validate_batch(&request),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn partial_failure_is_isolated_and_order_preserved() {
        // 第二项 title 仅空白，归一化阶段失败，其余两项照常成功
        let mut bad = item("b", "placeholder");
        bad.title = " ".to_string();
        let request = BatchRequest {
            images: vec![item("a", "first"), bad, item("c", "third")],
            defaults: None,
        };

        let response = run_batch(request, Arc::new(Semaphore::new(2))).await;
        let ids: Vec<_> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(response.summary.total, 3);
        assert_eq!(response.summary.succeeded, 2);
        assert_eq!(response.summary.failed, 1);
        assert!(response.results[0].success);
        assert!(!response.results[1].success);
        assert!(response.results[1].error.is_some());
        assert!(
            response.results[2]
                .data
                .as_deref()
                .is_some_and(|d| d.starts_with("data:image/svg+xml;base64,"))
        );
    }

    /// data URI 的 mediatype 必须无参数无空白（RFC 2397），
    /// 不能复用带 charset 的响应头串。
    #[tokio::test]
    async fn svg_data_uri_media_type_is_parameter_free() {
        let request = BatchRequest {
            images: vec![item("a", "clean uri")],
            defaults: None,
        };
        let response = run_batch(request, Arc::new(Semaphore::new(1))).await;

        let entry = &response.results[0];
        let data = entry.data.as_deref().expect("data uri");
        let head = data.split(',').next().expect("uri head");
        assert_eq!(head, "data:image/svg+xml;base64");
        assert_eq!(entry.content_type.as_deref(), Some("image/svg+xml"));
    }

    #[tokio::test]
    async fn defaults_apply_to_every_item() {
        let request = BatchRequest {
            images: vec![item("a", "first")],
            defaults: Some(OgParamsPatch {
                width: Some(640),
                height: Some(320),
                ..Default::default()
            }),
        };
        let response = run_batch(request, Arc::new(Semaphore::new(1))).await;
        let data = response.results[0].data.as_deref().expect("data uri");
        let svg = String::from_utf8(
            base64::Engine::decode(
                &base64::engine::general_purpose::STANDARD,
                data.split(',').nth(1).expect("payload"),
            )
            .expect("base64"),
        )
        .expect("utf8");
        assert!(svg.contains(r#"width="640""#));
        assert!(svg.contains(r#"height="320""#));
    }
}
