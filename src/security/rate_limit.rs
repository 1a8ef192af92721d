//! 速率限制模块
//!
//! 提供基于滑动窗口算法的速率限制实现，用于防止暴力破解攻击。
//!
//! ## 滑动窗口语义
//!
//! 每次检查先丢弃窗口之外的时间戳，再把剩余数量与上限比较：
//!
//! - 窗口未饱和：记录本次尝试的时间戳并放行
//! - 窗口已饱和：拒绝，且**不**占用新的尝试槽位
//!
//! 整个检查-记录在单个写锁内完成，两个并发尝试不会因丢失更新而绕过限制。
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use smartauth::security::rate_limit::{RateLimitConfig, RateLimiter};
//! use std::time::Duration;
//!
//! // 每 60 秒最多 5 次尝试
//! let config = RateLimitConfig::new()
//!     .with_max_requests(5)
//!     .with_window(Duration::from_secs(60));
//! let limiter = RateLimiter::new(config);
//!
//! let info = limiter.check("login:alice").await.unwrap();
//! assert_eq!(info.remaining, 4);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// 速率限制配置
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 时间窗口内允许的最大请求数
    pub max_requests: u32,
    /// 时间窗口大小
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // 登录场景的默认值：15 分钟内最多 5 次尝试
        Self {
            max_requests: 5,
            window: Duration::from_secs(15 * 60),
        }
    }
}

impl RateLimitConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最大请求数
    pub fn with_max_requests(mut self, max: u32) -> Self {
        self.max_requests = max;
        self
    }

    /// 设置时间窗口
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// 登录场景的预设配置（15 分钟内最多 5 次尝试）
    pub fn for_login() -> Self {
        Self::default()
    }
}

/// 速率限制信息
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// 剩余请求次数
    pub remaining: u32,
    /// 总限制次数
    pub limit: u32,
    /// 窗口重置时间（距现在）
    pub reset_after: Duration,
}

/// 速率限制存储接口
///
/// 实现此 trait 以提供自定义的存储后端。注意：内存实现的计数仅在
/// 本进程内有效，多实例部署需要共享后端才能保证全局限制。
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// 检查并记录请求
    ///
    /// 允许时返回 `Ok(RateLimitInfo)` 并占用一个槽位；
    /// 窗口饱和时返回 [`Error::RateLimitExceeded`]，不占用槽位。
    async fn check_and_record(&self, key: &str, config: &RateLimitConfig) -> Result<RateLimitInfo>;

    /// 重置某个 key 的限制
    async fn reset(&self, key: &str) -> Result<()>;

    /// 清理所有窗口外的记录
    async fn cleanup(&self, config: &RateLimitConfig) -> Result<usize>;
}

/// 内存滑动窗口存储
#[derive(Debug, Default)]
pub struct InMemorySlidingWindowStore {
    records: RwLock<HashMap<String, Vec<Instant>>>,
}

impl InMemorySlidingWindowStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemorySlidingWindowStore {
    async fn check_and_record(&self, key: &str, config: &RateLimitConfig) -> Result<RateLimitInfo> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("rate limit lock poisoned"))?;

        let now = Instant::now();
        let timestamps = records.entry(key.to_string()).or_default();

        // 丢弃窗口之外的时间戳
        timestamps.retain(|&ts| now.duration_since(ts) < config.window);

        if timestamps.len() >= config.max_requests as usize {
            // 最旧的在窗口内的尝试离开窗口后即可重试
            let retry_after = timestamps
                .first()
                .map(|&oldest| config.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(config.window);
            return Err(Error::rate_limited(retry_after));
        }

        timestamps.push(now);
        let used = timestamps.len() as u32;
        let reset_after = timestamps
            .first()
            .map(|&oldest| config.window.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(config.window);

        Ok(RateLimitInfo {
            remaining: config.max_requests.saturating_sub(used),
            limit: config.max_requests,
            reset_after,
        })
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("rate limit lock poisoned"))?;
        records.remove(key);
        Ok(())
    }

    async fn cleanup(&self, config: &RateLimitConfig) -> Result<usize> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("rate limit lock poisoned"))?;
        let now = Instant::now();
        let before = records.len();
        records.retain(|_, timestamps| {
            timestamps.retain(|&ts| now.duration_since(ts) < config.window);
            !timestamps.is_empty()
        });
        Ok(before - records.len())
    }
}

/// 速率限制器
///
/// 把配置与存储组合成单一入口。
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// 使用默认内存存储创建限制器
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            store: Arc::new(InMemorySlidingWindowStore::new()),
            config,
        }
    }

    /// 使用自定义存储创建限制器
    pub fn with_store(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// 检查并记录一次请求
    pub async fn check(&self, key: &str) -> Result<RateLimitInfo> {
        self.store.check_and_record(key, &self.config).await
    }

    /// 重置某个 key 的限制
    pub async fn reset(&self, key: &str) -> Result<()> {
        self.store.reset(key).await
    }

    /// 清理所有窗口外的记录
    pub async fn cleanup(&self) -> Result<usize> {
        self.store.cleanup(&self.config).await
    }

    /// 获取配置
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}
