use axum::body::Bytes;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::features::keys::ledger::UsageLedger;
use crate::features::keys::storage::KeyStorage;

/// 响应缓存条目：渲染产物字节 + Content-Type。
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// Key/用量存储。离线模式或连接失败时为 None（鉴权降级为 dev 身份）。
    pub key_storage: Option<Arc<KeyStorage>>,
    /// 用量台账（配额检查 + 尽力而为的用量记账）
    pub ledger: Arc<UsageLedger>,
    /// 单图 GET 响应缓存（键 = 完整请求 URI，按字节大小加权）
    pub response_cache: Cache<String, CachedImage>,
    /// 控制并发渲染的信号量（限制 CPU 密集型任务数量）
    pub render_semaphore: Arc<Semaphore>,
}

impl AppState {
    /// 按配置构建共享状态。
    pub fn build(config: &AppConfig, key_storage: Option<Arc<KeyStorage>>) -> Self {
        let img = &config.image;
        let response_cache: Cache<String, CachedImage> = Cache::builder()
            .weigher(|_k, v: &CachedImage| v.bytes.len() as u32)
            .max_capacity(img.cache_max_bytes)
            .time_to_live(Duration::from_secs(img.cache_ttl_secs))
            .build();

        let ledger = Arc::new(UsageLedger::new(key_storage.clone()));

        Self {
            key_storage,
            ledger,
            response_cache,
            render_semaphore: Arc::new(Semaphore::new({
                let m = img.max_parallel as usize;
                if m == 0 { num_cpus::get() } else { m }
            })),
        }
    }
}
