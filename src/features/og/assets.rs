//! 外部素材解析：头像/Logo URL → base64 data URI。
//!
//! 失败从不中断渲染：超时、非 2xx、超大、网络错误一律返回 None，
//! 模板据此省略对应图片节点，其余内容正常出图。

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::AppConfig;
use crate::http::client_asset;

/// 抓取远端图片并编码为 data URI。
///
/// 超时由共享 Client 统一控制（assets.fetch_timeout_secs），
/// 大小上限取 assets.max_bytes，超限视同失败。
pub async fn resolve_image_data_uri(url: &str) -> Option<String> {
    let max_bytes = AppConfig::global().assets.max_bytes;

    let client = match client_asset() {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("素材抓取 Client 初始化失败: {e}");
            return None;
        }
    };
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!("素材抓取失败 '{url}': {e}");
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::debug!("素材抓取非 2xx '{url}': {}", response.status());
        return None;
    }

    // Content-Length 先行拦截，缺失时仍由实际字节数兜底
    if let Some(len) = response.content_length()
        && len > max_bytes as u64
    {
        tracing::debug!("素材超过大小上限 '{url}': {len} bytes");
        return None;
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or_else(|| "image/png".to_string());

    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!("素材读取失败 '{url}': {e}");
            return None;
        }
    };
    if bytes.len() > max_bytes {
        tracing::debug!("素材超过大小上限 '{url}': {} bytes", bytes.len());
        return None;
    }

    Some(format!(
        "data:{content_type};base64,{}",
        BASE64.encode(&bytes)
    ))
}
