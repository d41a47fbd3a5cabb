//! 优雅退出管理模块
//!
//! 提供跨平台的信号处理和优雅退出协调机制，
//! 支持 SIGINT、SIGTERM 信号和 Windows Ctrl+C 处理。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户中断信号 (Ctrl+C)
    Interrupt,
    /// 终止信号 (SIGTERM)
    Terminate,
    /// 应用请求退出
    Application,
}

/// 优雅退出管理器
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug)]
struct ShutdownInner {
    notify: Notify,
    shutting_down: AtomicBool,
    last_reason: std::sync::Mutex<Option<ShutdownReason>>,
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownInner {
                notify: Notify::new(),
                shutting_down: AtomicBool::new(false),
                last_reason: std::sync::Mutex::new(None),
            }),
        }
    }

    /// 等待退出信号，返回退出原因。
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        debug!("等待退出信号...");
        if !self.is_shutting_down() {
            self.inner.notify.notified().await;
        }
        self.inner
            .last_reason
            .lock()
            .ok()
            .and_then(|g| *g)
            .unwrap_or(ShutdownReason::Application)
    }

    /// 触发优雅退出（只有第一次触发生效）。
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("已在退出流程中，忽略重复触发: {:?}", reason);
            return;
        }
        info!("触发优雅退出: {:?}", reason);
        if let Ok(mut guard) = self.inner.last_reason.lock() {
            *guard = Some(reason);
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// 启动信号监听任务（Unix: SIGINT/SIGTERM；其他平台: Ctrl+C）。
    pub fn start_signal_handler(&self) {
        let manager = self.clone();

        #[cfg(unix)]
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("注册 SIGINT 处理器失败: {}", e);
                    return;
                }
            };
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("注册 SIGTERM 处理器失败: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigint.recv() => manager.trigger_shutdown(ShutdownReason::Interrupt),
                _ = sigterm.recv() => manager.trigger_shutdown(ShutdownReason::Terminate),
            }
        });

        #[cfg(not(unix))]
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                manager.trigger_shutdown(ShutdownReason::Interrupt);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{ShutdownManager, ShutdownReason};

    #[tokio::test]
    async fn trigger_then_wait_returns_reason() {
        let manager = ShutdownManager::new();
        manager.trigger_shutdown(ShutdownReason::Application);
        assert!(manager.is_shutting_down());
        assert_eq!(
            manager.wait_for_shutdown().await,
            ShutdownReason::Application
        );
    }

    #[tokio::test]
    async fn duplicate_trigger_keeps_first_reason() {
        let manager = ShutdownManager::new();
        manager.trigger_shutdown(ShutdownReason::Terminate);
        manager.trigger_shutdown(ShutdownReason::Interrupt);
        assert_eq!(manager.wait_for_shutdown().await, ShutdownReason::Terminate);
    }
}
