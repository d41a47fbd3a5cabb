//! 栅格引擎：SVG 文档 → PNG 字节。
//!
//! 基于 resvg/tiny-skia，字体数据库全局复用（系统字体 + 可选自定义字体目录）。
//! 本模块是渲染管线中唯一的重 CPU 阶段，调用方必须放在 `spawn_blocking` 中执行。

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use resvg::usvg::{self, Options as UsvgOptions, fontdb};
use resvg::{
    render,
    tiny_skia::{Pixmap, Transform},
};

use crate::config::AppConfig;
use crate::error::AppError;

use super::svg::MAIN_FONT_FAMILY;

static GLOBAL_FONT_DB: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

/// 初始化全局字体数据库：系统字体 + 配置目录下的 ttf/otf。
fn init_global_font_db() -> Arc<fontdb::Database> {
    let mut font_db = fontdb::Database::new();
    font_db.load_system_fonts();

    let fonts_dir = AppConfig::global().fonts_path();
    if fonts_dir.exists()
        && let Ok(entries) = fs::read_dir(&fonts_dir)
    {
        for entry in entries.flatten() {
            let path: PathBuf = entry.path();
            if path.is_file()
                && (path.extension() == Some("ttf".as_ref())
                    || path.extension() == Some("otf".as_ref()))
                && let Err(e) = font_db.load_font_file(&path)
            {
                tracing::error!("加载字体文件失败 '{}': {}", path.display(), e);
            }
        }
    }

    Arc::new(font_db)
}

/// 获取全局字体数据库
pub fn get_global_font_db() -> Arc<fontdb::Database> {
    GLOBAL_FONT_DB.get_or_init(init_global_font_db).clone()
}

/// 启动期预热字体索引，避免首个请求承担目录扫描开销。
pub fn prewarm_fonts() {
    let _ = get_global_font_db();
}

fn usvg_options() -> UsvgOptions<'static> {
    let speed = AppConfig::global().image.optimize_speed;
    UsvgOptions {
        fontdb: get_global_font_db(),
        font_family: MAIN_FONT_FAMILY.to_string(),
        font_size: 16.0,
        languages: vec!["en".to_string(), "zh-CN".to_string()],
        shape_rendering: if speed {
            usvg::ShapeRendering::OptimizeSpeed
        } else {
            usvg::ShapeRendering::GeometricPrecision
        },
        text_rendering: if speed {
            usvg::TextRendering::OptimizeSpeed
        } else {
            usvg::TextRendering::OptimizeLegibility
        },
        image_rendering: if speed {
            usvg::ImageRendering::OptimizeSpeed
        } else {
            usvg::ImageRendering::OptimizeQuality
        },
        ..Default::default()
    }
}

/// 按目标宽度栅格化 SVG 并编码为 PNG。
///
/// SVG 自带画布尺寸；`target_width` 与画布宽度不一致时按宽度等比缩放
/// （单图路径恒等于画布宽度，保留缩放逻辑是为了未来的下采样输出）。
pub fn render_svg_to_png(svg_data: &str, target_width: u32) -> Result<Vec<u8>, AppError> {
    let t0 = std::time::Instant::now();

    let opts = usvg_options();
    let tree = usvg::Tree::from_data(svg_data.as_bytes(), &opts)
        .map_err(|e| AppError::Render(format!("SVG 解析失败: {e}")))?;
    let t_parse = t0.elapsed();

    let size = tree.size();
    if size.width() <= 0.0 || size.height() <= 0.0 {
        return Err(AppError::Render("SVG 画布尺寸非法".to_string()));
    }
    let scale = target_width.max(1) as f32 / size.width();
    let out_w = target_width.max(1);
    let out_h = ((size.height() * scale).round() as u32).max(1);

    let mut pixmap = Pixmap::new(out_w, out_h)
        .ok_or_else(|| AppError::Render("创建像素画布失败".to_string()))?;
    render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());
    let t_raster = t0.elapsed();

    // 使用 png crate 直接编码，速度优先时关闭过滤器
    let mut out = Vec::with_capacity((out_w * out_h * 4) as usize);
    {
        let mut encoder = png::Encoder::new(&mut out, out_w, out_h);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        if AppConfig::global().image.optimize_speed {
            encoder.set_compression(png::Compression::Fast);
            encoder.set_filter(png::FilterType::NoFilter);
        } else {
            encoder.set_compression(png::Compression::Default);
            encoder.set_filter(png::FilterType::Paeth);
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| AppError::Render(format!("PNG write_header 失败: {e}")))?;
        writer
            .write_image_data(pixmap.data())
            .map_err(|e| AppError::Render(format!("PNG write_image_data 失败: {e}")))?;
        writer
            .finish()
            .map_err(|e| AppError::Render(format!("PNG finish 失败: {e}")))?;
    }
    let t_encode = t0.elapsed();

    tracing::debug!(
        target: "og_backend::raster",
        "PNG 栅格化分段: 解析={:?}, 栅格化={:?}, 编码={:?}",
        t_parse,
        t_raster - t_parse,
        t_encode - t_raster,
    );

    Ok(out)
}
