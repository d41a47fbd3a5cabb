use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 画布宽度允许区间（像素）
pub const WIDTH_RANGE: (u32, u32) = (200, 2400);
/// 画布高度允许区间（像素）
pub const HEIGHT_RANGE: (u32, u32) = (200, 1260);
/// 默认画布尺寸（OG 图标准尺寸）
pub const DEFAULT_WIDTH: u32 = 1200;
pub const DEFAULT_HEIGHT: u32 = 630;

/// 输出图片格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// PNG（默认，栅格化输出）
    #[default]
    Png,
    /// SVG（矢量输出，跳过栅格化阶段）
    Svg,
}

impl ImageFormat {
    /// 宽容解析：仅 "svg"（不区分大小写）选择矢量输出，其余一律按 PNG 处理。
    pub fn from_code(code: Option<&str>) -> Self {
        if code.is_some_and(|c| c.eq_ignore_ascii_case("svg")) {
            ImageFormat::Svg
        } else {
            ImageFormat::Png
        }
    }

    /// HTTP 响应头用的 Content-Type（SVG 带 charset 参数）。
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Svg => "image/svg+xml; charset=utf-8",
            ImageFormat::Png => "image/png",
        }
    }

    /// 无参数的媒体类型。data URI 的 mediatype 不允许空白与参数，
    /// 必须用这个而不是 `content_type()`。
    pub fn media_type(self) -> &'static str {
        match self {
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::Png => "image/png",
        }
    }
}

/// 单图渲染参数（GET query 与 POST body 共用同一形状）
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OgImageParams {
    /// 模板 ID：basic|blog|product|social|testimonial（未知值回退 basic）
    #[schema(example = "basic")]
    pub template: Option<String>,
    /// 主标题（必填，非空）
    #[schema(example = "Ship faster with OG images")]
    pub title: String,
    /// 副标题
    pub subtitle: Option<String>,
    /// 标题上方的小字引导（分类/栏目名等）
    pub eyebrow: Option<String>,
    /// 作者名
    pub author: Option<String>,
    /// 头像图片 URL（抓取失败则省略对应节点）
    pub avatar: Option<String>,
    /// Logo 图片 URL（抓取失败则省略对应节点）
    pub logo: Option<String>,
    /// 水印域名（缺省使用品牌配置）
    pub domain: Option<String>,
    /// 背景色（hex）
    pub bg_color: Option<String>,
    /// 文字色（hex）
    pub text_color: Option<String>,
    /// 强调色（hex）
    pub accent_color: Option<String>,
    /// 自定义字体 URL。接口层接受该参数，当前渲染管线使用固定内嵌字体集。
    pub font_url: Option<String>,
    /// 输出格式：png|svg（默认 png，未知值按 png）
    pub format: Option<String>,
    /// 画布宽度（像素，[200,2400]，默认 1200）
    pub width: Option<u32>,
    /// 画布高度（像素，[200,1260]，默认 630）
    pub height: Option<u32>,
}

/// 归一化后的渲染参数：尺寸已钳制、标题已验证非空。
/// 渲染引擎只接受该类型，保证钳制与校验不会被绕过。
#[derive(Debug, Clone)]
pub struct NormalizedParams {
    pub template: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub eyebrow: Option<String>,
    pub author: Option<String>,
    pub avatar: Option<String>,
    pub logo: Option<String>,
    pub domain: Option<String>,
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
    pub accent_color: Option<String>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

impl OgImageParams {
    /// 校验并归一化：title 非空，宽高钳制到允许区间。
    pub fn normalize(self) -> Result<NormalizedParams, AppError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("title 参数必填且不能为空".into()));
        }

        Ok(NormalizedParams {
            template: self
                .template
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("basic")
                .to_string(),
            title,
            subtitle: non_empty(self.subtitle),
            eyebrow: non_empty(self.eyebrow),
            author: non_empty(self.author),
            avatar: non_empty(self.avatar),
            logo: non_empty(self.logo),
            domain: non_empty(self.domain),
            bg_color: non_empty(self.bg_color),
            text_color: non_empty(self.text_color),
            accent_color: non_empty(self.accent_color),
            format: ImageFormat::from_code(self.format.as_deref()),
            width: self
                .width
                .unwrap_or(DEFAULT_WIDTH)
                .clamp(WIDTH_RANGE.0, WIDTH_RANGE.1),
            height: self
                .height
                .unwrap_or(DEFAULT_HEIGHT)
                .clamp(HEIGHT_RANGE.0, HEIGHT_RANGE.1),
        })
    }
}

/// 渲染阶段计时（毫秒）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderTimings {
    /// 布局 + 矢量生成耗时
    pub svg_ms: u64,
    /// 栅格化耗时（SVG 输出时为 0）
    pub png_ms: u64,
    /// 从进入渲染到产物字节可用的全程耗时
    pub total_ms: u64,
}

/// 单次渲染产物。所有权移交给 HTTP 响应；缓存由调用方负责。
/// 产物格式以 `format` 携带，响应头与 data URI 各取所需的类型串。
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub timings: RenderTimings,
}

/// 已抓取的外部素材（data URI）。作为独立参数传入模板，
/// 避免往请求对象上挂可变字段造成并发批量项之间的意外共享。
#[derive(Debug, Clone, Default)]
pub struct ResolvedAssets {
    pub avatar_data_uri: Option<String>,
    pub logo_data_uri: Option<String>,
}

/// 批量项可覆盖的参数（同时用作批量级默认值）
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OgParamsPatch {
    pub template: Option<String>,
    pub subtitle: Option<String>,
    pub eyebrow: Option<String>,
    pub author: Option<String>,
    pub avatar: Option<String>,
    pub logo: Option<String>,
    pub domain: Option<String>,
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
    pub accent_color: Option<String>,
    pub font_url: Option<String>,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl OgParamsPatch {
    fn merged_over(&self, defaults: &OgParamsPatch) -> OgParamsPatch {
        fn pick<T: Clone>(item: &Option<T>, default: &Option<T>) -> Option<T> {
            item.clone().or_else(|| default.clone())
        }
        OgParamsPatch {
            template: pick(&self.template, &defaults.template),
            subtitle: pick(&self.subtitle, &defaults.subtitle),
            eyebrow: pick(&self.eyebrow, &defaults.eyebrow),
            author: pick(&self.author, &defaults.author),
            avatar: pick(&self.avatar, &defaults.avatar),
            logo: pick(&self.logo, &defaults.logo),
            domain: pick(&self.domain, &defaults.domain),
            bg_color: pick(&self.bg_color, &defaults.bg_color),
            text_color: pick(&self.text_color, &defaults.text_color),
            accent_color: pick(&self.accent_color, &defaults.accent_color),
            font_url: pick(&self.font_url, &defaults.font_url),
            format: pick(&self.format, &defaults.format),
            width: pick(&self.width, &defaults.width),
            height: pick(&self.height, &defaults.height),
        }
    }
}

/// 批量请求中的单个图片项
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BatchImageInput {
    /// 调用方自定义 id，用于匹配结果（请求内唯一）
    pub id: String,
    /// 主标题（每项必填）
    pub title: String,
    /// 其余可选字段，覆盖批量级默认值
    #[serde(flatten)]
    pub overrides: OgParamsPatch,
}

impl BatchImageInput {
    /// 生效参数 = 批量默认值被项级字段浅覆盖。
    pub fn effective_params(&self, defaults: &OgParamsPatch) -> OgImageParams {
        let merged = self.overrides.merged_over(defaults);
        OgImageParams {
            template: merged.template,
            title: self.title.clone(),
            subtitle: merged.subtitle,
            eyebrow: merged.eyebrow,
            author: merged.author,
            avatar: merged.avatar,
            logo: merged.logo,
            domain: merged.domain,
            bg_color: merged.bg_color,
            text_color: merged.text_color,
            accent_color: merged.accent_color,
            font_url: merged.font_url,
            format: merged.format,
            width: merged.width,
            height: merged.height,
        }
    }
}

/// POST /og/batch 请求体
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BatchRequest {
    /// 待渲染的图片项（1-20 个，id 唯一）
    pub images: Vec<BatchImageInput>,
    /// 应用到每个项的默认参数
    #[serde(default)]
    pub defaults: Option<OgParamsPatch>,
}

/// 批量响应中的单个结果，与输入项按 id 一一对应、保持输入顺序
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchResultEntry {
    pub id: String,
    pub success: bool,
    /// 成功时：base64 data URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<RenderTimings>,
    /// 失败时：错误描述（不泄露引擎内部细节）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 批量汇总
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_ms: u64,
}

/// POST /og/batch 响应体
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BatchResponse {
    pub results: Vec<BatchResultEntry>,
    pub summary: BatchSummary,
}
