//! 用量台账：配额检查与事后记账。
//!
//! 记账永远是尽力而为：数据库故障只降低计量精度，不影响出图。
//! demo 身份从不落库，额度用进程内月度计数器约束。

use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::error::AppError;

use super::auth::Identity;
use super::storage::{KeyStorage, UsageKind};

pub fn current_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// demo 身份的进程内月度计数（month, count）。跨月自动清零。
#[derive(Debug, Default)]
struct DemoCounter {
    month: String,
    count: i64,
}

pub struct UsageLedger {
    storage: Option<Arc<KeyStorage>>,
    demo: Mutex<DemoCounter>,
}

impl UsageLedger {
    pub fn new(storage: Option<Arc<KeyStorage>>) -> Self {
        Self {
            storage,
            demo: Mutex::new(DemoCounter::default()),
        }
    }

    fn demo_count(&self, month: &str) -> i64 {
        let Ok(mut guard) = self.demo.lock() else {
            return 0;
        };
        if guard.month != month {
            guard.month = month.to_string();
            guard.count = 0;
        }
        guard.count
    }

    fn demo_add(&self, month: &str, delta: i64) {
        if let Ok(mut guard) = self.demo.lock() {
            if guard.month != month {
                guard.month = month.to_string();
                guard.count = 0;
            }
            guard.count += delta;
        }
    }

    /// 检查当月余量能否容纳 `needed` 次计费请求。
    ///
    /// 返回当前用量（供响应扩展字段使用）。dev 身份与查询故障时跳过检查，
    /// 宁可放行也不因计量层故障拒绝服务。
    pub async fn ensure_capacity(
        &self,
        identity: &Identity,
        needed: i64,
    ) -> Result<i64, AppError> {
        if identity.is_dev() {
            return Ok(0);
        }

        let month = current_month();
        let usage = if identity.is_demo() {
            self.demo_count(&month)
        } else {
            let Some(storage) = &self.storage else {
                return Ok(0);
            };
            match storage.month_billable(&identity.key_id, &month).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("月度用量查询失败，跳过配额检查: {e}");
                    return Ok(0);
                }
            }
        };

        if usage + needed > identity.monthly_limit {
            return Err(AppError::QuotaExceeded {
                usage,
                limit: identity.monthly_limit,
                reset_date: format!("{month}-01"),
            });
        }
        Ok(usage)
    }

    /// 记一次用量。调用方通常 spawn 后台执行，不阻塞响应。
    pub async fn record(&self, identity: &Identity, kind: UsageKind) {
        if identity.is_dev() {
            return;
        }
        if identity.is_demo() {
            if kind == UsageKind::Billable {
                self.demo_add(&current_month(), 1);
            }
            return;
        }
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = storage
            .record_usage(&identity.key_id, &today(), kind)
            .await
        {
            tracing::warn!("用量记账失败 key_id={}: {e}", identity.key_id);
        }
    }

    /// 批量记账：一次累加 `succeeded` 个计费请求。
    pub async fn record_batch(&self, identity: &Identity, succeeded: i64) {
        if succeeded <= 0 || identity.is_dev() {
            return;
        }
        if identity.is_demo() {
            self.demo_add(&current_month(), succeeded);
            return;
        }
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = storage
            .record_batch_usage(&identity.key_id, &today(), succeeded)
            .await
        {
            tracing::warn!("批量用量记账失败 key_id={}: {e}", identity.key_id);
        }
    }
}
