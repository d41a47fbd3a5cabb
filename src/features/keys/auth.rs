//! 访问控制：API Key 提取、哈希、身份解析。
//!
//! 三类身份：
//! - 真实密钥：数据库中启用的 api_keys 行；
//! - demo（未携带密钥）：哨兵 id `__demo__`，极低月度额度；
//! - dev（数据库不可用时的降级）：哨兵 id `__dev__`，宽松额度且不落库。

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::error::AppError;

use super::storage::KeyStorage;

pub const DEMO_KEY_ID: &str = "__demo__";
pub const DEV_KEY_ID: &str = "__dev__";

/// 请求身份。后续配额检查与用量记账都以此为准。
#[derive(Debug, Clone)]
pub struct Identity {
    pub key_id: String,
    pub tier: String,
    pub monthly_limit: i64,
}

impl Identity {
    pub fn is_demo(&self) -> bool {
        self.key_id == DEMO_KEY_ID
    }

    pub fn is_dev(&self) -> bool {
        self.key_id == DEV_KEY_ID
    }

    fn demo() -> Self {
        Identity {
            key_id: DEMO_KEY_ID.to_string(),
            tier: "free".to_string(),
            monthly_limit: AppConfig::global().quota.demo_monthly_limit,
        }
    }

    fn dev() -> Self {
        Identity {
            key_id: DEV_KEY_ID.to_string(),
            tier: "free".to_string(),
            monthly_limit: AppConfig::global().quota.dev_monthly_limit,
        }
    }
}

/// 密钥哈希：SHA-256 十六进制小写。数据库只存哈希。
pub fn hash_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)
}

/// 从请求提取 API Key：X-Api-Key 头优先，其次 api_key 查询参数。
pub fn extract_api_key(headers: &HeaderMap, query_key: Option<&str>) -> Option<String> {
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            query_key
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
}

/// 解析请求身份。
///
/// - 无密钥 → demo 身份；
/// - 有密钥但存储不可用（未初始化或查询出错）→ dev 降级，不拒绝请求；
/// - 有密钥且查无启用记录 → 401。
pub async fn resolve_identity(
    storage: Option<&KeyStorage>,
    api_key: Option<&str>,
) -> Result<Identity, AppError> {
    let Some(api_key) = api_key else {
        return Ok(Identity::demo());
    };

    let Some(storage) = storage else {
        tracing::debug!("密钥存储未初始化，按 dev 身份放行");
        return Ok(Identity::dev());
    };

    match storage.find_active_by_hash(&hash_key(api_key)).await {
        Ok(Some(record)) => Ok(Identity {
            key_id: record.id,
            tier: record.tier,
            monthly_limit: record.monthly_limit,
        }),
        Ok(None) => Err(AppError::Auth("API Key 无效或已停用".into())),
        Err(e) => {
            tracing::warn!("密钥查询失败，按 dev 身份降级: {e}");
            Ok(Identity::dev())
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{extract_api_key, hash_key};

    #[test]
    fn hash_is_sha256_hex() {
        // echo -n "sk_test" | sha256sum
        assert_eq!(
            hash_key("sk_test"),
            "12b2820cf1639904311da5771de1e5bb65c77073fdc7c555df395942df42896b"
        );
        assert_eq!(hash_key("").len(), 64);
    }

    #[test]
    fn header_takes_precedence_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("sk_header"));
        assert_eq!(
            extract_api_key(&headers, Some("sk_query")).as_deref(),
            Some("sk_header")
        );
        assert_eq!(
            extract_api_key(&HeaderMap::new(), Some("sk_query")).as_deref(),
            Some("sk_query")
        );
        assert_eq!(extract_api_key(&HeaderMap::new(), None), None);
        assert_eq!(extract_api_key(&HeaderMap::new(), Some("  ")), None);
    }
}
