//! API Key 与用量的 SQLite 持久层。
//!
//! 表结构：
//! - api_keys: 密钥只存 SHA-256 哈希，明文仅在签发响应中出现一次；
//! - usage: 按 (api_key_id, date) 记日粒度行，月度用量以 date 前缀聚合。

use std::path::Path;

use sqlx::{ConnectOptions, Row, SqlitePool, sqlite::SqliteConnectOptions};

use crate::error::AppError;

/// 用量计数类别，对应 usage 表的三列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    /// 计费请求（计入月度配额）
    Billable,
    /// 缓存命中（不计配额，单独统计）
    Cached,
    /// 渲染失败（不计配额，单独统计）
    Failed,
}

impl UsageKind {
    fn column(self) -> &'static str {
        match self {
            UsageKind::Billable => "requests_count",
            UsageKind::Cached => "cached_count",
            UsageKind::Failed => "failed_count",
        }
    }
}

/// api_keys 行（不含 key_hash，哈希只用于查询条件）
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: String,
    pub name: String,
    pub tier: String,
    pub monthly_limit: i64,
}

/// 某自然月的用量汇总
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthUsage {
    pub billable: i64,
    pub cached: i64,
    pub failed: i64,
}

#[derive(Clone)]
pub struct KeyStorage {
    pub pool: SqlitePool,
}

impl KeyStorage {
    pub async fn connect_sqlite(path: &str, wal: bool) -> Result<Self, AppError> {
        let opt = SqliteConnectOptions::new()
            .filename(Path::new(path))
            .create_if_missing(true)
            .log_statements(tracing::log::LevelFilter::Off);
        let pool = SqlitePool::connect_with(opt)
            .await
            .map_err(|e| AppError::Internal(format!("sqlite connect: {e}")))?;
        if wal {
            sqlx::query("PRAGMA journal_mode=WAL;")
                .execute(&pool)
                .await
                .ok();
        }
        sqlx::query("PRAGMA synchronous=NORMAL;")
            .execute(&pool)
            .await
            .ok();
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<(), AppError> {
        let ddl = r#"
        CREATE TABLE IF NOT EXISTS api_keys (
          id TEXT PRIMARY KEY,
          key_hash TEXT NOT NULL UNIQUE,
          name TEXT NOT NULL DEFAULT 'Default',
          email TEXT NOT NULL,
          tier TEXT NOT NULL DEFAULT 'free',
          monthly_limit INTEGER NOT NULL DEFAULT 500,
          is_active INTEGER NOT NULL DEFAULT 1,
          created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_api_keys_key_hash ON api_keys(key_hash);

        CREATE TABLE IF NOT EXISTS usage (
          api_key_id TEXT NOT NULL,
          date TEXT NOT NULL,
          requests_count INTEGER NOT NULL DEFAULT 0,
          cached_count INTEGER NOT NULL DEFAULT 0,
          failed_count INTEGER NOT NULL DEFAULT 0,
          PRIMARY KEY (api_key_id, date)
        );

        CREATE INDEX IF NOT EXISTS idx_usage_date ON usage(date);
        "#;

        sqlx::query(ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("init schema: {e}")))?;
        Ok(())
    }

    /// 按哈希查找启用中的密钥。
    pub async fn find_active_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, tier, monthly_limit FROM api_keys
             WHERE key_hash = ? AND is_active = 1 LIMIT 1",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| ApiKeyRecord {
            id: r.get("id"),
            name: r.get("name"),
            tier: r.get("tier"),
            monthly_limit: r.get("monthly_limit"),
        }))
    }

    pub async fn insert_key(
        &self,
        id: &str,
        key_hash: &str,
        name: &str,
        email: &str,
        tier: &str,
        monthly_limit: i64,
        now_ts: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO api_keys (id, key_hash, name, email, tier, monthly_limit, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(key_hash)
        .bind(name)
        .bind(email)
        .bind(tier)
        .bind(monthly_limit)
        .bind(now_ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 当月计费用量：date 前缀聚合（month 形如 "2026-08"）。
    pub async fn month_billable(&self, api_key_id: &str, month: &str) -> Result<i64, AppError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(requests_count), 0) AS total
             FROM usage WHERE api_key_id = ? AND date LIKE ?",
        )
        .bind(api_key_id)
        .bind(format!("{month}%"))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("total"))
    }

    /// 当月三类计数的汇总。
    pub async fn month_usage(&self, api_key_id: &str, month: &str) -> Result<MonthUsage, AppError> {
        let row = sqlx::query(
            "SELECT
               COALESCE(SUM(requests_count), 0) AS billable,
               COALESCE(SUM(cached_count), 0) AS cached,
               COALESCE(SUM(failed_count), 0) AS failed
             FROM usage WHERE api_key_id = ? AND date LIKE ?",
        )
        .bind(api_key_id)
        .bind(format!("{month}%"))
        .fetch_one(&self.pool)
        .await?;
        Ok(MonthUsage {
            billable: row.get("billable"),
            cached: row.get("cached"),
            failed: row.get("failed"),
        })
    }

    /// 单次用量 +1（upsert 日行）。
    pub async fn record_usage(
        &self,
        api_key_id: &str,
        date: &str,
        kind: UsageKind,
    ) -> Result<(), AppError> {
        let column = kind.column();
        let sql = format!(
            "INSERT INTO usage (api_key_id, date, {column})
             VALUES (?, ?, 1)
             ON CONFLICT(api_key_id, date)
             DO UPDATE SET {column} = {column} + 1"
        );
        sqlx::query(&sql)
            .bind(api_key_id)
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// 批量计费用量 +count，单条 SQL 完成。
    pub async fn record_batch_usage(
        &self,
        api_key_id: &str,
        date: &str,
        count: i64,
    ) -> Result<(), AppError> {
        if count <= 0 {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO usage (api_key_id, date, requests_count)
             VALUES (?, ?, ?)
             ON CONFLICT(api_key_id, date)
             DO UPDATE SET requests_count = requests_count + ?",
        )
        .bind(api_key_id)
        .bind(date)
        .bind(count)
        .bind(count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
