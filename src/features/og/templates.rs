//! 模板注册表：五套内置版式，输入归一化参数与已解析素材，输出布局树。
//!
//! 约定：
//! - 模板函数是纯函数，相同输入产出相同布局树；
//! - 未知模板 ID 回退 basic，不报错；
//! - 素材缺失（avatar/logo 抓取失败）时省略对应节点或使用占位头像；
//! - 标题字号按字符数阶梯下调，换行按显示宽度估算。

use serde::Serialize;
use unicode_width::UnicodeWidthChar;

use crate::config::AppConfig;

use super::layout::{
    CircleNode, Fill, FontWeight, GradientDirection, ImageNode, LayoutNode, LayoutTree, RectNode,
    TextAnchor, TextNode,
};
use super::types::{NormalizedParams, ResolvedAssets};

/// 内置模板
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    Basic,
    Blog,
    Product,
    Social,
    Testimonial,
}

impl TemplateId {
    /// 名称解析，未知值回退 Basic。
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "blog" => TemplateId::Blog,
            "product" => TemplateId::Product,
            "social" => TemplateId::Social,
            "testimonial" => TemplateId::Testimonial,
            _ => TemplateId::Basic,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TemplateId::Basic => "basic",
            TemplateId::Blog => "blog",
            TemplateId::Product => "product",
            TemplateId::Social => "social",
            TemplateId::Testimonial => "testimonial",
        }
    }

    fn description(self) -> &'static str {
        match self {
            TemplateId::Basic => "渐变背景居中排版，适合落地页与通用分享图",
            TemplateId::Blog => "文章风格，含分类徽章与作者栏",
            TemplateId::Product => "左对齐产品版式，带强调色侧边条",
            TemplateId::Social => "社媒卡片，装饰圆与作者行",
            TemplateId::Testimonial => "引用/评价版式，大引号与署名",
        }
    }

    /// 构建布局树。
    pub fn build(self, params: &NormalizedParams, assets: &ResolvedAssets) -> LayoutTree {
        match self {
            TemplateId::Basic => basic(params, assets),
            TemplateId::Blog => blog(params, assets),
            TemplateId::Product => product(params, assets),
            TemplateId::Social => social(params, assets),
            TemplateId::Testimonial => testimonial(params, assets),
        }
    }
}

/// 模板列表项（GET /og/templates）
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TemplateInfo {
    /// 模板 ID（template 参数取值）
    pub id: &'static str,
    /// 适用场景说明
    pub description: &'static str,
}

pub fn list_templates() -> Vec<TemplateInfo> {
    [
        TemplateId::Basic,
        TemplateId::Blog,
        TemplateId::Product,
        TemplateId::Social,
        TemplateId::Testimonial,
    ]
    .into_iter()
    .map(|t| TemplateInfo {
        id: t.name(),
        description: t.description(),
    })
    .collect()
}

// ---------- 几何辅助 ----------

/// 平均字形宽度系数：像素宽 ≈ 显示列数 * 字号 * 0.6。
/// 估算用于换行，不追求逐字精确。
const GLYPH_W: f32 = 0.6;

fn display_width(text: &str) -> usize {
    text.chars()
        .map(|c| UnicodeWidthChar::width(c).unwrap_or(0).max(1))
        .sum()
}

/// 按显示宽度在单词边界附近换行（CJK 按字符折行）。
fn wrap_by_display_width(text: &str, max_width: usize, max_lines: usize) -> Vec<String> {
    if max_width == 0 || max_lines == 0 {
        return vec![text.to_string()];
    }

    let mut out = Vec::<String>::new();
    let mut current = String::new();
    let mut current_w = 0usize;

    for word in text.split_whitespace() {
        let word_w = display_width(word);
        let sep_w = if current.is_empty() { 0 } else { 1 };

        if current_w + sep_w + word_w <= max_width {
            if sep_w == 1 {
                current.push(' ');
            }
            current.push_str(word);
            current_w += sep_w + word_w;
            continue;
        }

        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
            current_w = 0;
            if out.len() >= max_lines {
                return out;
            }
        }

        // 超长单词（或 CJK 长串）按字符折行
        if word_w > max_width {
            for ch in word.chars() {
                let ch_w = UnicodeWidthChar::width(ch).unwrap_or(0).max(1);
                if current_w + ch_w > max_width && !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                    current_w = 0;
                    if out.len() >= max_lines {
                        return out;
                    }
                }
                current.push(ch);
                current_w += ch_w;
            }
        } else {
            current.push_str(word);
            current_w = word_w;
        }
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out.truncate(max_lines);
    out
}

/// 在可用像素宽内按字号换行。
fn wrap_text(text: &str, size: f32, avail_px: f32, max_lines: usize) -> Vec<String> {
    let cols = ((avail_px / (size * GLYPH_W)).floor() as usize).max(4);
    wrap_by_display_width(text, cols, max_lines)
}

fn text_px_width(text: &str, size: f32) -> f32 {
    display_width(text) as f32 * size * GLYPH_W
}

fn domain_text(params: &NormalizedParams) -> String {
    params
        .domain
        .clone()
        .unwrap_or_else(|| AppConfig::global().branding.default_domain.clone())
}

fn author_initial(author: Option<&str>) -> String {
    author
        .and_then(|a| a.chars().next())
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "A".to_string())
}

fn color_or<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value.as_deref().unwrap_or(default)
}

// 文本基线 ≈ 行顶 + 字号 * 0.8
const BASELINE: f32 = 0.8;

// ---------- 模板实现 ----------

/// basic：对角渐变背景，全部内容水平居中。
fn basic(params: &NormalizedParams, assets: &ResolvedAssets) -> LayoutTree {
    let w = params.width as f32;
    let h = params.height as f32;
    let bg = color_or(&params.bg_color, "#667eea");
    let accent = color_or(&params.accent_color, "#764ba2");
    let text_color = color_or(&params.text_color, "#ffffff");

    let mut tree = LayoutTree::new(
        params.width,
        params.height,
        Fill::LinearGradient {
            start: bg.to_string(),
            end: accent.to_string(),
            direction: GradientDirection::Diagonal,
        },
    );

    let avail = (w - 120.0).min(1000.0);
    let title_size = if params.title.chars().count() > 40 {
        48.0
    } else {
        64.0
    };
    let title_lines = wrap_text(&params.title, title_size, avail, 3);
    let subtitle_lines = params
        .subtitle
        .as_deref()
        .map(|s| wrap_text(s, 28.0, avail, 2))
        .unwrap_or_default();

    // 垂直居中：先量整块高度再逐项落位
    let mut block_h = title_lines.len() as f32 * title_size * 1.2;
    if assets.logo_data_uri.is_some() {
        block_h += 48.0 + 24.0;
    }
    if params.eyebrow.is_some() {
        block_h += 20.0 + 16.0;
    }
    if !subtitle_lines.is_empty() {
        block_h += 20.0 + subtitle_lines.len() as f32 * 28.0 * 1.4;
    }

    let cx = w / 2.0;
    let mut y = ((h - block_h) / 2.0).max(40.0);

    if let Some(logo) = &assets.logo_data_uri {
        tree.push(LayoutNode::Image(ImageNode {
            x: cx - 24.0,
            y,
            width: 48.0,
            height: 48.0,
            href: logo.clone(),
            circle: false,
        }));
        y += 48.0 + 24.0;
    }

    if let Some(eyebrow) = &params.eyebrow {
        tree.push(LayoutNode::Text(TextNode {
            x: cx,
            y: y + 20.0 * BASELINE,
            size: 20.0,
            fill: text_color.to_string(),
            opacity: 0.8,
            letter_spacing: 3.0,
            anchor: TextAnchor::Middle,
            lines: vec![eyebrow.to_uppercase()],
            ..Default::default()
        }));
        y += 20.0 + 16.0;
    }

    tree.push(LayoutNode::Text(TextNode {
        x: cx,
        y: y + title_size * BASELINE,
        size: title_size,
        weight: FontWeight::Bold,
        fill: text_color.to_string(),
        anchor: TextAnchor::Middle,
        line_height: 1.2,
        lines: title_lines.clone(),
        ..Default::default()
    }));
    y += title_lines.len() as f32 * title_size * 1.2;

    if !subtitle_lines.is_empty() {
        y += 20.0;
        tree.push(LayoutNode::Text(TextNode {
            x: cx,
            y: y + 28.0 * BASELINE,
            size: 28.0,
            fill: text_color.to_string(),
            opacity: 0.85,
            anchor: TextAnchor::Middle,
            line_height: 1.4,
            lines: subtitle_lines,
            ..Default::default()
        }));
    }

    // 右下角水印
    tree.push(LayoutNode::Text(TextNode {
        x: w - 40.0,
        y: h - 30.0,
        size: 16.0,
        fill: text_color.to_string(),
        opacity: 0.5,
        anchor: TextAnchor::End,
        lines: vec![domain_text(params)],
        ..Default::default()
    }));

    tree
}

/// blog：深色文章版式，顶部分类徽章 + 底部作者栏。
fn blog(params: &NormalizedParams, assets: &ResolvedAssets) -> LayoutTree {
    let w = params.width as f32;
    let h = params.height as f32;
    let bg = color_or(&params.bg_color, "#0f172a");
    let text_color = color_or(&params.text_color, "#f8fafc");
    let accent = color_or(&params.accent_color, "#3b82f6");

    let mut tree = LayoutTree::new(params.width, params.height, Fill::Solid(bg.to_string()));

    // 顶部徽章
    let badge_text = params.eyebrow.clone().unwrap_or_else(|| "Blog".to_string());
    let badge_w = text_px_width(&badge_text, 16.0) + 32.0;
    tree.push(LayoutNode::Rect(RectNode {
        x: 70.0,
        y: 60.0,
        width: badge_w,
        height: 32.0,
        fill: Fill::Solid(accent.to_string()),
        radius: 16.0,
        ..Default::default()
    }));
    tree.push(LayoutNode::Text(TextNode {
        x: 70.0 + badge_w / 2.0,
        y: 60.0 + 16.0 + 16.0 * 0.35,
        size: 16.0,
        weight: FontWeight::SemiBold,
        fill: "#ffffff".to_string(),
        anchor: TextAnchor::Middle,
        lines: vec![badge_text],
        ..Default::default()
    }));

    // 中部标题 + 副标题
    let title_size = if params.title.chars().count() > 50 {
        42.0
    } else {
        52.0
    };
    let avail = (w - 140.0).min(900.0);
    let title_lines = wrap_text(&params.title, title_size, avail, 3);
    let subtitle_lines = params
        .subtitle
        .as_deref()
        .map(|s| wrap_text(s, 24.0, avail, 2))
        .unwrap_or_default();

    let mut block_h = title_lines.len() as f32 * title_size * 1.2;
    if !subtitle_lines.is_empty() {
        block_h += 16.0 + subtitle_lines.len() as f32 * 24.0 * 1.4;
    }
    let mut y = ((h - block_h) / 2.0).max(120.0);

    tree.push(LayoutNode::Text(TextNode {
        x: 70.0,
        y: y + title_size * BASELINE,
        size: title_size,
        weight: FontWeight::Bold,
        fill: text_color.to_string(),
        letter_spacing: -0.02 * title_size,
        line_height: 1.2,
        lines: title_lines.clone(),
        ..Default::default()
    }));
    y += title_lines.len() as f32 * title_size * 1.2;

    if !subtitle_lines.is_empty() {
        y += 16.0;
        tree.push(LayoutNode::Text(TextNode {
            x: 70.0,
            y: y + 24.0 * BASELINE,
            size: 24.0,
            fill: text_color.to_string(),
            opacity: 0.7,
            line_height: 1.4,
            lines: subtitle_lines,
            ..Default::default()
        }));
    }

    // 底部作者栏
    let bottom_cy = h - 60.0 - 20.0;
    let mut author_x = 70.0;
    if let Some(avatar) = &assets.avatar_data_uri {
        tree.push(LayoutNode::Image(ImageNode {
            x: 70.0,
            y: bottom_cy - 20.0,
            width: 40.0,
            height: 40.0,
            href: avatar.clone(),
            circle: true,
        }));
        author_x += 40.0 + 12.0;
    }
    if let Some(author) = &params.author {
        tree.push(LayoutNode::Text(TextNode {
            x: author_x,
            y: bottom_cy + 20.0 * 0.3,
            size: 20.0,
            weight: FontWeight::SemiBold,
            fill: text_color.to_string(),
            lines: vec![author.clone()],
            ..Default::default()
        }));
    }
    tree.push(LayoutNode::Text(TextNode {
        x: w - 70.0,
        y: bottom_cy + 18.0 * 0.3,
        size: 18.0,
        fill: text_color.to_string(),
        opacity: 0.5,
        anchor: TextAnchor::End,
        lines: vec![domain_text(params)],
        ..Default::default()
    }));

    tree
}

/// product：浅色左对齐版式，左侧强调色竖条。
fn product(params: &NormalizedParams, _assets: &ResolvedAssets) -> LayoutTree {
    let w = params.width as f32;
    let h = params.height as f32;
    let bg = color_or(&params.bg_color, "#ffffff");
    let text_color = color_or(&params.text_color, "#0f172a");
    let accent = color_or(&params.accent_color, "#6366f1");

    let mut tree = LayoutTree::new(params.width, params.height, Fill::Solid(bg.to_string()));

    // 左侧竖条
    tree.push(LayoutNode::Rect(RectNode {
        x: 0.0,
        y: 0.0,
        width: 8.0,
        height: h,
        fill: Fill::Solid(accent.to_string()),
        ..Default::default()
    }));

    let left = 78.0;
    let title_size = if params.title.chars().count() > 40 {
        48.0
    } else {
        60.0
    };
    let title_lines = wrap_text(&params.title, title_size, (w - left - 70.0).min(900.0), 3);
    let subtitle_lines = params
        .subtitle
        .as_deref()
        .map(|s| wrap_text(s, 24.0, (w - left - 70.0).min(700.0), 2))
        .unwrap_or_default();

    let mut block_h = title_lines.len() as f32 * title_size * 1.15;
    if params.eyebrow.is_some() {
        block_h += 18.0 + 20.0;
    }
    if !subtitle_lines.is_empty() {
        block_h += 20.0 + subtitle_lines.len() as f32 * 24.0 * 1.4;
    }
    let mut y = ((h - block_h) / 2.0).max(60.0);

    if let Some(eyebrow) = &params.eyebrow {
        tree.push(LayoutNode::Text(TextNode {
            x: left,
            y: y + 18.0 * BASELINE,
            size: 18.0,
            weight: FontWeight::SemiBold,
            fill: accent.to_string(),
            letter_spacing: 2.0,
            lines: vec![eyebrow.to_uppercase()],
            ..Default::default()
        }));
        y += 18.0 + 20.0;
    }

    tree.push(LayoutNode::Text(TextNode {
        x: left,
        y: y + title_size * BASELINE,
        size: title_size,
        weight: FontWeight::Bold,
        fill: text_color.to_string(),
        letter_spacing: -0.03 * title_size,
        line_height: 1.15,
        lines: title_lines.clone(),
        ..Default::default()
    }));
    y += title_lines.len() as f32 * title_size * 1.15;

    if !subtitle_lines.is_empty() {
        y += 20.0;
        tree.push(LayoutNode::Text(TextNode {
            x: left,
            y: y + 24.0 * BASELINE,
            size: 24.0,
            fill: text_color.to_string(),
            opacity: 0.6,
            line_height: 1.4,
            lines: subtitle_lines,
            ..Default::default()
        }));
    }

    tree.push(LayoutNode::Text(TextNode {
        x: left,
        y: h - 60.0,
        size: 18.0,
        fill: text_color.to_string(),
        opacity: 0.4,
        lines: vec![domain_text(params)],
        ..Default::default()
    }));

    tree
}

/// social：深色社媒卡片，装饰圆 + 作者行 + 底部强调条。
fn social(params: &NormalizedParams, assets: &ResolvedAssets) -> LayoutTree {
    let w = params.width as f32;
    let h = params.height as f32;
    let bg = color_or(&params.bg_color, "#1a1a2e");
    let accent = color_or(&params.accent_color, "#e94560");
    let text_color = color_or(&params.text_color, "#ffffff");

    let mut tree = LayoutTree::new(params.width, params.height, Fill::Solid(bg.to_string()));

    // 装饰圆（右上 / 左下，低不透明度）
    tree.push(LayoutNode::Circle(CircleNode {
        cx: w - 100.0,
        cy: 100.0,
        r: 200.0,
        fill: accent.to_string(),
        opacity: 0.13,
    }));
    tree.push(LayoutNode::Circle(CircleNode {
        cx: 70.0,
        cy: h - 70.0,
        r: 150.0,
        fill: accent.to_string(),
        opacity: 0.08,
    }));

    let left = 80.0;
    let title_size = if params.title.chars().count() > 40 {
        48.0
    } else {
        56.0
    };
    let title_lines = wrap_text(&params.title, title_size, (w - 160.0).min(800.0), 3);
    let subtitle_lines = params
        .subtitle
        .as_deref()
        .map(|s| wrap_text(s, 24.0, (w - 160.0).min(650.0), 2))
        .unwrap_or_default();

    let mut block_h = title_lines.len() as f32 * title_size * 1.15;
    if params.eyebrow.is_some() {
        block_h += 18.0 + 24.0;
    }
    if !subtitle_lines.is_empty() {
        block_h += 20.0 + subtitle_lines.len() as f32 * 24.0 * 1.5;
    }
    if params.author.is_some() {
        block_h += 32.0 + 36.0;
    }
    let mut y = ((h - block_h) / 2.0).max(70.0);

    if let Some(eyebrow) = &params.eyebrow {
        // 引导行前置短横条
        tree.push(LayoutNode::Rect(RectNode {
            x: left,
            y: y + 9.0 - 2.0,
            width: 40.0,
            height: 4.0,
            fill: Fill::Solid(accent.to_string()),
            ..Default::default()
        }));
        tree.push(LayoutNode::Text(TextNode {
            x: left + 40.0 + 12.0,
            y: y + 18.0 * BASELINE,
            size: 18.0,
            weight: FontWeight::SemiBold,
            fill: accent.to_string(),
            letter_spacing: 2.0,
            lines: vec![eyebrow.to_uppercase()],
            ..Default::default()
        }));
        y += 18.0 + 24.0;
    }

    tree.push(LayoutNode::Text(TextNode {
        x: left,
        y: y + title_size * BASELINE,
        size: title_size,
        weight: FontWeight::Bold,
        fill: text_color.to_string(),
        line_height: 1.15,
        lines: title_lines.clone(),
        ..Default::default()
    }));
    y += title_lines.len() as f32 * title_size * 1.15;

    if !subtitle_lines.is_empty() {
        y += 20.0;
        tree.push(LayoutNode::Text(TextNode {
            x: left,
            y: y + 24.0 * BASELINE,
            size: 24.0,
            fill: text_color.to_string(),
            opacity: 0.7,
            line_height: 1.5,
            lines: subtitle_lines.clone(),
            ..Default::default()
        }));
        y += subtitle_lines.len() as f32 * 24.0 * 1.5;
    }

    if let Some(author) = &params.author {
        y += 32.0;
        let avatar_cy = y + 18.0;
        if let Some(avatar) = &assets.avatar_data_uri {
            tree.push(LayoutNode::Image(ImageNode {
                x: left,
                y,
                width: 36.0,
                height: 36.0,
                href: avatar.clone(),
                circle: true,
            }));
        } else {
            // 占位头像：强调色圆 + 首字母
            tree.push(LayoutNode::Circle(CircleNode {
                cx: left + 18.0,
                cy: avatar_cy,
                r: 18.0,
                fill: accent.to_string(),
                opacity: 1.0,
            }));
            tree.push(LayoutNode::Text(TextNode {
                x: left + 18.0,
                y: avatar_cy + 16.0 * 0.35,
                size: 16.0,
                weight: FontWeight::Bold,
                fill: "#ffffff".to_string(),
                anchor: TextAnchor::Middle,
                lines: vec![author_initial(Some(author))],
                ..Default::default()
            }));
        }
        tree.push(LayoutNode::Text(TextNode {
            x: left + 36.0 + 12.0,
            y: avatar_cy + 18.0 * 0.3,
            size: 18.0,
            weight: FontWeight::SemiBold,
            fill: text_color.to_string(),
            lines: vec![author.clone()],
            ..Default::default()
        }));
    }

    // 底部强调条
    tree.push(LayoutNode::Rect(RectNode {
        x: 0.0,
        y: h - 6.0,
        width: w,
        height: 6.0,
        fill: Fill::LinearGradient {
            start: accent.to_string(),
            end: bg.to_string(),
            direction: GradientDirection::Horizontal,
        },
        ..Default::default()
    }));

    tree
}

/// testimonial：浅色引用版式，标题即引文。
fn testimonial(params: &NormalizedParams, assets: &ResolvedAssets) -> LayoutTree {
    let w = params.width as f32;
    let h = params.height as f32;
    let bg = color_or(&params.bg_color, "#fffbeb");
    let accent = color_or(&params.accent_color, "#f59e0b");
    let text_color = color_or(&params.text_color, "#1c1917");

    let mut tree = LayoutTree::new(params.width, params.height, Fill::Solid(bg.to_string()));

    // 大引号
    tree.push(LayoutNode::Text(TextNode {
        x: 80.0,
        y: 70.0 + 120.0 * BASELINE,
        size: 120.0,
        weight: FontWeight::Bold,
        fill: accent.to_string(),
        opacity: 0.3,
        line_height: 0.8,
        lines: vec!["\u{201c}".to_string()],
        ..Default::default()
    }));

    let title_len = params.title.chars().count();
    let quote_size = if title_len > 80 {
        32.0
    } else if title_len > 50 {
        38.0
    } else {
        44.0
    };
    let quote_lines = wrap_text(&params.title, quote_size, (w - 160.0).min(950.0), 4);

    let quote_h = quote_lines.len() as f32 * quote_size * 1.4;
    let quote_y = ((h - quote_h) / 2.0).max(180.0);
    tree.push(LayoutNode::Text(TextNode {
        x: 80.0,
        y: quote_y + quote_size * BASELINE,
        size: quote_size,
        weight: FontWeight::SemiBold,
        fill: text_color.to_string(),
        italic: true,
        line_height: 1.4,
        lines: quote_lines,
        ..Default::default()
    }));

    // 底部署名行
    let bottom_cy = h - 70.0 - 24.0;
    if let Some(avatar) = &assets.avatar_data_uri {
        tree.push(LayoutNode::Image(ImageNode {
            x: 80.0,
            y: bottom_cy - 24.0,
            width: 48.0,
            height: 48.0,
            href: avatar.clone(),
            circle: true,
        }));
    } else {
        tree.push(LayoutNode::Circle(CircleNode {
            cx: 80.0 + 24.0,
            cy: bottom_cy,
            r: 24.0,
            fill: accent.to_string(),
            opacity: 1.0,
        }));
        tree.push(LayoutNode::Text(TextNode {
            x: 80.0 + 24.0,
            y: bottom_cy + 20.0 * 0.35,
            size: 20.0,
            weight: FontWeight::Bold,
            fill: "#ffffff".to_string(),
            anchor: TextAnchor::Middle,
            lines: vec![author_initial(params.author.as_deref())],
            ..Default::default()
        }));
    }

    let name_x = 80.0 + 48.0 + 16.0;
    if let Some(author) = &params.author {
        let name_y = if params.subtitle.is_some() {
            bottom_cy - 6.0
        } else {
            bottom_cy + 20.0 * 0.3
        };
        tree.push(LayoutNode::Text(TextNode {
            x: name_x,
            y: name_y,
            size: 20.0,
            weight: FontWeight::Bold,
            fill: text_color.to_string(),
            lines: vec![author.clone()],
            ..Default::default()
        }));
    }
    if let Some(subtitle) = &params.subtitle {
        tree.push(LayoutNode::Text(TextNode {
            x: name_x,
            y: bottom_cy + 16.0,
            size: 16.0,
            fill: text_color.to_string(),
            opacity: 0.6,
            lines: vec![subtitle.clone()],
            ..Default::default()
        }));
    }

    tree.push(LayoutNode::Text(TextNode {
        x: w - 80.0,
        y: bottom_cy + 14.0 * 0.3,
        size: 14.0,
        fill: text_color.to_string(),
        opacity: 0.3,
        anchor: TextAnchor::End,
        lines: vec![domain_text(params)],
        ..Default::default()
    }));

    tree
}

#[cfg(test)]
mod tests {
    use super::super::types::OgImageParams;
    use super::*;

    fn params(title: &str) -> NormalizedParams {
        OgImageParams {
            title: title.to_string(),
            ..Default::default()
        }
        .normalize()
        .expect("normalize")
    }

    #[test]
    fn unknown_template_falls_back_to_basic() {
        assert_eq!(TemplateId::from_name("nope"), TemplateId::Basic);
        assert_eq!(TemplateId::from_name("BLOG"), TemplateId::Blog);
    }

    #[test]
    fn same_input_builds_same_tree() {
        let p = params("Deterministic output");
        let assets = ResolvedAssets::default();
        assert_eq!(
            TemplateId::Social.build(&p, &assets),
            TemplateId::Social.build(&p, &assets)
        );
    }

    #[test]
    fn missing_avatar_omits_image_node_in_blog() {
        let mut p = params("A post");
        p.author = Some("Ada".to_string());
        let no_assets = ResolvedAssets::default();
        let with_assets = ResolvedAssets {
            avatar_data_uri: Some("data:image/png;base64,AAAA".to_string()),
            ..Default::default()
        };
        assert_eq!(TemplateId::Blog.build(&p, &no_assets).image_count(), 0);
        assert_eq!(TemplateId::Blog.build(&p, &with_assets).image_count(), 1);
    }

    #[test]
    fn title_length_steps_down_font_size() {
        let short = params("Short title");
        let long = params(&"x".repeat(41));
        let assets = ResolvedAssets::default();

        let find_title_size = |tree: &LayoutTree| {
            tree.nodes
                .iter()
                .filter_map(|n| match n {
                    LayoutNode::Text(t) if t.weight == FontWeight::Bold && t.size >= 40.0 => {
                        Some(t.size)
                    }
                    _ => None,
                })
                .next()
                .expect("title node")
        };
        assert_eq!(find_title_size(&TemplateId::Basic.build(&short, &assets)), 64.0);
        assert_eq!(find_title_size(&TemplateId::Basic.build(&long, &assets)), 48.0);
    }

    #[test]
    fn testimonial_quote_size_has_three_steps() {
        let assets = ResolvedAssets::default();
        let size_of = |len: usize| {
            let tree = TemplateId::Testimonial.build(&params(&"y".repeat(len)), &assets);
            tree.nodes
                .iter()
                .filter_map(|n| match n {
                    LayoutNode::Text(t) if t.italic => Some(t.size),
                    _ => None,
                })
                .next()
                .expect("quote node")
        };
        assert_eq!(size_of(30), 44.0);
        assert_eq!(size_of(60), 38.0);
        assert_eq!(size_of(100), 32.0);
    }

    #[test]
    fn social_without_avatar_uses_initial_placeholder() {
        let mut p = params("hello");
        p.author = Some("grace".to_string());
        let tree = TemplateId::Social.build(&p, &ResolvedAssets::default());
        let has_initial = tree.nodes.iter().any(|n| match n {
            LayoutNode::Text(t) => t.lines == vec!["G".to_string()],
            _ => false,
        });
        assert!(has_initial);
        assert_eq!(tree.image_count(), 0);
    }
}
