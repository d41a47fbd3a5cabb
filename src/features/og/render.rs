//! 渲染管线编排：素材抓取 → 布局 → 矢量 → 栅格。
//!
//! 并发控制：栅格化是 CPU 密集阶段，经全局 Semaphore 限流后投入
//! `spawn_blocking`，避免占满异步运行时工作线程。

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::error::AppError;

use super::assets::resolve_image_data_uri;
use super::raster::render_svg_to_png;
use super::svg::layout_to_svg;
use super::templates::TemplateId;
use super::types::{ImageFormat, NormalizedParams, RenderTimings, RenderedImage, ResolvedAssets};

/// 并发解析外部素材。单个素材失败不影响整体，对应节点被省略。
async fn resolve_assets(params: &NormalizedParams) -> ResolvedAssets {
    let avatar = async {
        match &params.avatar {
            Some(url) => resolve_image_data_uri(url).await,
            None => None,
        }
    };
    let logo = async {
        match &params.logo {
            Some(url) => resolve_image_data_uri(url).await,
            None => None,
        }
    };
    let (avatar_data_uri, logo_data_uri) = tokio::join!(avatar, logo);
    ResolvedAssets {
        avatar_data_uri,
        logo_data_uri,
    }
}

/// 渲染一张 OG 图。
///
/// 返回产物字节、content-type 与分段计时；任何阶段失败均转为
/// `AppError::Render` 向上传播，由调用方决定是否计为失败请求。
pub async fn render_og_image(
    params: NormalizedParams,
    semaphore: Arc<Semaphore>,
) -> Result<RenderedImage, AppError> {
    let t_start = Instant::now();

    let assets = resolve_assets(&params).await;

    // 布局 + 矢量生成（纯内存计算，无需限流）
    let t_svg = Instant::now();
    let template = TemplateId::from_name(&params.template);
    let tree = template.build(&params, &assets);
    let svg_doc = layout_to_svg(&tree);
    let svg_ms = t_svg.elapsed().as_millis() as u64;

    tracing::debug!(
        template = template.name(),
        width = params.width,
        height = params.height,
        svg_bytes = svg_doc.len(),
        "矢量生成完成"
    );

    if params.format == ImageFormat::Svg {
        return Ok(RenderedImage {
            bytes: svg_doc.into_bytes(),
            format: ImageFormat::Svg,
            timings: RenderTimings {
                svg_ms,
                png_ms: 0,
                total_ms: t_start.elapsed().as_millis() as u64,
            },
        });
    }

    // 栅格化限流：信号量关闭只会发生在进程退出路径
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| AppError::Internal("渲染并发控制已关闭".to_string()))?;

    let t_png = Instant::now();
    let target_width = params.width;
    let png_bytes =
        tokio::task::spawn_blocking(move || render_svg_to_png(&svg_doc, target_width))
            .await
            .map_err(|e| AppError::Internal(format!("栅格化任务 join 失败: {e}")))??;
    let png_ms = t_png.elapsed().as_millis() as u64;

    Ok(RenderedImage {
        bytes: png_bytes,
        format: ImageFormat::Png,
        timings: RenderTimings {
            svg_ms,
            png_ms,
            total_ms: t_start.elapsed().as_millis() as u64,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Semaphore;

    use super::super::types::{ImageFormat, OgImageParams};
    use super::render_og_image;

    #[tokio::test]
    async fn svg_format_short_circuits_rasterization() {
        let params = OgImageParams {
            title: "Vector output".into(),
            format: Some("svg".into()),
            width: Some(800),
            height: Some(400),
            ..Default::default()
        }
        .normalize()
        .expect("normalize");

        let image = render_og_image(params, Arc::new(Semaphore::new(1)))
            .await
            .expect("render");
        assert_eq!(image.format, ImageFormat::Svg);
        assert_eq!(image.timings.png_ms, 0);
        let doc = String::from_utf8(image.bytes).expect("utf8");
        assert!(doc.starts_with("<svg"));
        assert!(doc.contains(r#"width="800""#));
        assert!(doc.contains(r#"height="400""#));
    }
}
