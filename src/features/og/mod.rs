//! OG 图片生成管线。
//!
//! 数据流：参数归一化（types）→ 素材解析（assets）→ 模板布局（templates/layout）
//! → 矢量生成（svg）→ 栅格化（raster），由 render 编排、handler 暴露 HTTP 面。

pub mod assets;
pub mod batch;
pub mod handler;
pub mod layout;
pub mod raster;
pub mod render;
pub mod svg;
pub mod templates;
pub mod types;

pub use handler::create_og_router;
