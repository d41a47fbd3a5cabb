/// OG 图片生成（单图/批量/模板列表）
pub mod og;

/// API Key 签发、认证与用量台账
pub mod keys;
