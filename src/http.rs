use once_cell::sync::OnceCell;
use reqwest::Client;
use std::time::Duration;

use crate::config::AppConfig;

/// 全局复用的素材抓取 Client（统一连接池/Keep-Alive），避免每次请求重复创建。
static CLIENT_ASSET: OnceCell<Client> = OnceCell::new();

/// 素材抓取 Client：硬超时（默认 3s），覆盖连接与读取全过程。
/// 超时即按素材缺失处理，调用方不得把超时当作错误传播。
pub fn client_asset() -> Result<&'static Client, reqwest::Error> {
    CLIENT_ASSET.get_or_try_init(|| {
        let secs = AppConfig::global().assets.fetch_timeout_secs;
        Client::builder()
            .timeout(Duration::from_secs(secs))
            .user_agent(concat!("og-backend/", env!("CARGO_PKG_VERSION")))
            .build()
    })
}
