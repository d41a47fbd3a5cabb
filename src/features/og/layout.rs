//! 布局树：模板输出的中间表示。
//!
//! 设计原则：
//! - 模板负责全部几何计算（坐标/字号/换行），节点只携带最终几何；
//! - 树一经构建不再修改，由发起渲染的调用独占所有权；
//! - 与矢量引擎解耦：`svg` 模块把树翻译为 SVG，替换引擎不影响模板。

/// 填充方式
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    /// 纯色（hex，如 "#0f172a"）
    Solid(String),
    /// 双色线性渐变
    LinearGradient {
        start: String,
        end: String,
        direction: GradientDirection,
    },
}

/// 渐变方向（对应 CSS 135deg/180deg/90deg 三种用法）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientDirection {
    /// 左上到右下
    Diagonal,
    /// 上到下
    Vertical,
    /// 左到右
    Horizontal,
}

/// 字重（固定字体集只提供这几档）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontWeight {
    #[default]
    Regular,
    SemiBold,
    Bold,
}

impl FontWeight {
    pub fn css_value(self) -> u32 {
        match self {
            FontWeight::Regular => 400,
            FontWeight::SemiBold => 600,
            FontWeight::Bold => 700,
        }
    }
}

/// 文本水平对齐
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn svg_value(self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

/// 多行文本节点。`y` 是首行基线；后续行按 `size * line_height` 下移。
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub weight: FontWeight,
    pub fill: String,
    pub opacity: f32,
    pub letter_spacing: f32,
    pub italic: bool,
    pub anchor: TextAnchor,
    pub line_height: f32,
    pub lines: Vec<String>,
}

impl Default for TextNode {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            size: 16.0,
            weight: FontWeight::Regular,
            fill: "#ffffff".to_string(),
            opacity: 1.0,
            letter_spacing: 0.0,
            italic: false,
            anchor: TextAnchor::Start,
            line_height: 1.2,
            lines: Vec::new(),
        }
    }
}

/// 图片节点（href 为 data URI）。`circle=true` 时按内切圆裁剪。
#[derive(Debug, Clone, PartialEq)]
pub struct ImageNode {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub href: String,
    pub circle: bool,
}

/// 矩形节点（装饰条、徽章底等）
#[derive(Debug, Clone, PartialEq)]
pub struct RectNode {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fill: Fill,
    pub radius: f32,
    pub opacity: f32,
}

impl Default for RectNode {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            fill: Fill::Solid("#000000".to_string()),
            radius: 0.0,
            opacity: 1.0,
        }
    }
}

/// 圆形节点（装饰用）
#[derive(Debug, Clone, PartialEq)]
pub struct CircleNode {
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
    pub fill: String,
    pub opacity: f32,
}

/// 布局节点
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutNode {
    Text(TextNode),
    Image(ImageNode),
    Rect(RectNode),
    Circle(CircleNode),
}

/// 一张图的完整布局：画布尺寸 + 背景 + 节点列表（绘制顺序即列表顺序）。
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutTree {
    pub width: u32,
    pub height: u32,
    pub background: Fill,
    pub nodes: Vec<LayoutNode>,
}

impl LayoutTree {
    pub fn new(width: u32, height: u32, background: Fill) -> Self {
        Self {
            width,
            height,
            background,
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, node: LayoutNode) {
        self.nodes.push(node);
    }

    /// 统计图片节点数量（测试用：断言素材缺失时节点被省略）。
    pub fn image_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, LayoutNode::Image(_)))
            .count()
    }
}
