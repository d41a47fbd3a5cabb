//! 矢量引擎：LayoutTree → SVG 文档。
//!
//! 输出对相同输入逐字节一致（id 按节点顺序编号，不引入随机性），
//! 这是响应缓存与确定性测试的前提。

use std::fmt::Write;

use super::layout::{Fill, GradientDirection, LayoutNode, LayoutTree};

/// 固定内嵌字体集的 font-family 声明（栅格化端按同名字体解析）
pub const MAIN_FONT_FAMILY: &str = "Inter";

/// XML 文本转义
pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn gradient_coords(direction: GradientDirection) -> (&'static str, &'static str) {
    // (x2, y2)；x1/y1 恒为 0
    match direction {
        GradientDirection::Diagonal => ("1", "1"),
        GradientDirection::Vertical => ("0", "1"),
        GradientDirection::Horizontal => ("1", "0"),
    }
}

fn write_gradient_def(out: &mut String, id: &str, start: &str, end: &str, dir: GradientDirection) {
    let (x2, y2) = gradient_coords(dir);
    let _ = write!(
        out,
        r#"<linearGradient id="{id}" x1="0" y1="0" x2="{x2}" y2="{y2}"><stop offset="0%" stop-color="{}"/><stop offset="100%" stop-color="{}"/></linearGradient>"#,
        escape_xml(start),
        escape_xml(end),
    );
}

/// 把布局树序列化为完整 SVG 文档。
pub fn layout_to_svg(tree: &LayoutTree) -> String {
    let mut defs = String::new();
    let mut grad_seq = 0usize;
    let mut clip_seq = 0usize;

    // 背景渐变固定使用 id "bg"，节点渐变/裁剪按出现顺序编号。
    if let Fill::LinearGradient {
        start,
        end,
        direction,
    } = &tree.background
    {
        write_gradient_def(&mut defs, "bg", start, end, *direction);
    }

    // 第一遍：为需要 defs 的节点分配 id
    let mut node_grad_ids: Vec<Option<String>> = Vec::with_capacity(tree.nodes.len());
    let mut node_clip_ids: Vec<Option<String>> = Vec::with_capacity(tree.nodes.len());
    for node in &tree.nodes {
        match node {
            LayoutNode::Rect(rect) => {
                if let Fill::LinearGradient {
                    start,
                    end,
                    direction,
                } = &rect.fill
                {
                    let id = format!("grad{grad_seq}");
                    grad_seq += 1;
                    write_gradient_def(&mut defs, &id, start, end, *direction);
                    node_grad_ids.push(Some(id));
                } else {
                    node_grad_ids.push(None);
                }
                node_clip_ids.push(None);
            }
            LayoutNode::Image(img) if img.circle => {
                let id = format!("clip{clip_seq}");
                clip_seq += 1;
                let r = img.width.min(img.height) / 2.0;
                let _ = write!(
                    defs,
                    r#"<clipPath id="{id}"><circle cx="{}" cy="{}" r="{r}"/></clipPath>"#,
                    img.x + img.width / 2.0,
                    img.y + img.height / 2.0,
                );
                node_grad_ids.push(None);
                node_clip_ids.push(Some(id));
            }
            _ => {
                node_grad_ids.push(None);
                node_clip_ids.push(None);
            }
        }
    }

    let mut svg = String::with_capacity(4096);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = tree.width,
        h = tree.height,
    );
    if !defs.is_empty() {
        let _ = write!(svg, "<defs>{defs}</defs>");
    }

    // 背景
    let bg_fill = match &tree.background {
        Fill::Solid(color) => escape_xml(color),
        Fill::LinearGradient { .. } => "url(#bg)".to_string(),
    };
    let _ = write!(
        svg,
        r#"<rect x="0" y="0" width="{}" height="{}" fill="{bg_fill}"/>"#,
        tree.width, tree.height,
    );

    for (i, node) in tree.nodes.iter().enumerate() {
        match node {
            LayoutNode::Rect(rect) => {
                let fill = match &rect.fill {
                    Fill::Solid(color) => escape_xml(color),
                    Fill::LinearGradient { .. } => {
                        format!("url(#{})", node_grad_ids[i].as_deref().unwrap_or("bg"))
                    }
                };
                let _ = write!(
                    svg,
                    r#"<rect x="{}" y="{}" width="{}" height="{}""#,
                    rect.x, rect.y, rect.width, rect.height,
                );
                if rect.radius > 0.0 {
                    let _ = write!(svg, r#" rx="{}""#, rect.radius);
                }
                if rect.opacity < 1.0 {
                    let _ = write!(svg, r#" opacity="{}""#, rect.opacity);
                }
                let _ = write!(svg, r#" fill="{fill}"/>"#);
            }
            LayoutNode::Circle(c) => {
                let _ = write!(
                    svg,
                    r#"<circle cx="{}" cy="{}" r="{}" fill="{}""#,
                    c.cx,
                    c.cy,
                    c.r,
                    escape_xml(&c.fill),
                );
                if c.opacity < 1.0 {
                    let _ = write!(svg, r#" opacity="{}""#, c.opacity);
                }
                svg.push_str("/>");
            }
            LayoutNode::Image(img) => {
                let _ = write!(
                    svg,
                    r#"<image x="{}" y="{}" width="{}" height="{}" href="{}" preserveAspectRatio="xMidYMid slice""#,
                    img.x,
                    img.y,
                    img.width,
                    img.height,
                    escape_xml(&img.href),
                );
                if let Some(clip) = node_clip_ids[i].as_deref() {
                    let _ = write!(svg, r#" clip-path="url(#{clip})""#);
                }
                svg.push_str("/>");
            }
            LayoutNode::Text(text) => {
                let _ = write!(
                    svg,
                    r#"<text font-family="{MAIN_FONT_FAMILY}" font-size="{}" font-weight="{}" fill="{}""#,
                    text.size,
                    text.weight.css_value(),
                    escape_xml(&text.fill),
                );
                if text.opacity < 1.0 {
                    let _ = write!(svg, r#" opacity="{}""#, text.opacity);
                }
                if text.letter_spacing != 0.0 {
                    let _ = write!(svg, r#" letter-spacing="{}""#, text.letter_spacing);
                }
                if text.italic {
                    svg.push_str(r#" font-style="italic""#);
                }
                if text.anchor.svg_value() != "start" {
                    let _ = write!(svg, r#" text-anchor="{}""#, text.anchor.svg_value());
                }
                svg.push('>');
                for (line_idx, line) in text.lines.iter().enumerate() {
                    if line_idx == 0 {
                        let _ = write!(
                            svg,
                            r#"<tspan x="{}" y="{}">{}</tspan>"#,
                            text.x,
                            text.y,
                            escape_xml(line),
                        );
                    } else {
                        let _ = write!(
                            svg,
                            r#"<tspan x="{}" dy="{}">{}</tspan>"#,
                            text.x,
                            text.size * text.line_height,
                            escape_xml(line),
                        );
                    }
                }
                svg.push_str("</text>");
            }
        }
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::super::layout::*;
    use super::{escape_xml, layout_to_svg};

    #[test]
    fn escape_xml_covers_special_chars() {
        assert_eq!(
            escape_xml(r#"<a & "b">"#),
            "&lt;a &amp; &quot;b&quot;&gt;"
        );
    }

    #[test]
    fn identical_trees_serialize_identically() {
        let build = || {
            let mut tree = LayoutTree::new(
                1200,
                630,
                Fill::LinearGradient {
                    start: "#667eea".into(),
                    end: "#764ba2".into(),
                    direction: GradientDirection::Diagonal,
                },
            );
            tree.push(LayoutNode::Text(TextNode {
                x: 600.0,
                y: 300.0,
                size: 64.0,
                anchor: TextAnchor::Middle,
                lines: vec!["Hello".into()],
                ..Default::default()
            }));
            tree
        };
        assert_eq!(layout_to_svg(&build()), layout_to_svg(&build()));
    }

    #[test]
    fn circle_image_gets_clip_path() {
        let mut tree = LayoutTree::new(100, 100, Fill::Solid("#000".into()));
        tree.push(LayoutNode::Image(ImageNode {
            x: 10.0,
            y: 10.0,
            width: 40.0,
            height: 40.0,
            href: "data:image/png;base64,AAAA".into(),
            circle: true,
        }));
        let svg = layout_to_svg(&tree);
        assert!(svg.contains("clipPath"));
        assert!(svg.contains(r#"clip-path="url(#clip0)""#));
    }
}
