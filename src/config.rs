use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 日志格式
    pub format: String,
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀
    pub prefix: String,
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default = "CorsConfig::default_enabled")]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// 允许的方法列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_methods: Vec<String>,
    /// 允许的请求头列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    /// 暴露的响应头列表（支持 "*" 表示任意）
    #[serde(default)]
    pub expose_headers: Vec<String>,
    /// 是否允许携带凭证（Cookie/Authorization）
    #[serde(default = "CorsConfig::default_allow_credentials")]
    pub allow_credentials: bool,
    /// 预检缓存时间（秒）
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    fn default_enabled() -> bool {
        false
    }

    fn default_allow_credentials() -> bool {
        false
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allowed_origins: Vec::new(),
            allowed_methods: Vec::new(),
            allowed_headers: Vec::new(),
            expose_headers: Vec::new(),
            allow_credentials: Self::default_allow_credentials(),
            max_age_secs: None,
        }
    }
}

/// 品牌/展示配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandingConfig {
    /// 未传 domain 参数时模板水印展示的默认域名
    pub default_domain: String,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            default_domain: "shotog.com".to_string(),
        }
    }
}

/// 外部素材抓取配置（头像/Logo 等）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// 抓取硬超时（秒）。超时即视为素材缺失，不会失败整个渲染。
    pub fetch_timeout_secs: u64,
    /// 单个素材体积上限（字节），超过则丢弃
    pub max_bytes: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 3,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// 图片渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRenderConfig {
    /// 并发渲染上限（0 = CPU 核心数）
    pub max_parallel: u32,
    /// 栅格化走速度优先路径（牺牲少量画质换取延迟）
    pub optimize_speed: bool,
    /// 是否启用响应缓存
    pub cache_enabled: bool,
    /// 响应缓存容量（按字节加权）
    pub cache_max_bytes: u64,
    /// 响应缓存 TTL（秒）。对外 Cache-Control 使用同一时长。
    pub cache_ttl_secs: u64,
    /// 自定义字体目录（ttf/otf），与系统字体合并加载
    pub fonts_path: String,
}

impl Default for ImageRenderConfig {
    fn default() -> Self {
        Self {
            max_parallel: 0,
            optimize_speed: true,
            cache_enabled: true,
            cache_max_bytes: 256 * 1024 * 1024,
            cache_ttl_secs: 86400,
            fonts_path: "./resources/fonts".to_string(),
        }
    }
}

/// 配额配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// 匿名（demo）身份的月度上限
    pub demo_monthly_limit: i64,
    /// 存储降级（dev）身份的月度上限
    pub dev_monthly_limit: i64,
    /// 自助签发 Key 的默认月度上限
    pub default_monthly_limit: i64,
    /// 自助签发 Key 的默认套餐
    pub default_tier: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            demo_monthly_limit: 10,
            dev_monthly_limit: 500,
            default_monthly_limit: 500,
            default_tier: "free".to_string(),
        }
    }
}

/// 持久化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite 数据库文件路径
    pub path: String,
    /// 是否开启 WAL
    pub wal: bool,
    /// 离线模式：不连接存储，Key 请求统一降级为 dev 身份
    pub offline: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./data/og_backend.db".to_string(),
            wal: true,
            offline: false,
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时（秒）
    pub timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl ShutdownConfig {
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// 聚合应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    /// CORS 配置
    pub cors: CorsConfig,
    /// 品牌/展示配置
    pub branding: BrandingConfig,
    /// 外部素材抓取配置
    pub assets: AssetsConfig,
    /// 图片渲染配置
    pub image: ImageRenderConfig,
    /// 配额配置
    pub quota: QuotaConfig,
    /// 持久化配置
    pub database: DatabaseConfig,
    /// 优雅退出配置
    pub shutdown: ShutdownConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3900,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: "/v1".to_string(),
        }
    }
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            // 配置文件可缺省（全部字段有默认值），便于本地快速启动
            .add_source(File::with_name(config_path.to_str().unwrap()).required(false))
            // 支持环境变量覆盖，例如：APP_API_PREFIX
            .add_source(
                Environment::with_prefix("APP")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例。未显式初始化时退回默认值（测试场景）。
    pub fn global() -> &'static AppConfig {
        CONFIG.get_or_init(AppConfig::default)
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径
    fn get_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 获取字体目录路径
    pub fn fonts_path(&self) -> PathBuf {
        PathBuf::from(&self.image.fonts_path)
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    #[test]
    fn default_config_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.assets.fetch_timeout_secs, 3);
        assert_eq!(cfg.quota.demo_monthly_limit, 10);
        assert_eq!(cfg.image.cache_ttl_secs, 86400);
        assert_eq!(cfg.api.prefix, "/v1");
    }
}
