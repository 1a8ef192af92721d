//! 密码认证模块
//!
//! 提供带速率限制的注册/登录验证，密码以 Argon2id 哈希存储在
//! [`Namespace::User`](crate::storage::Namespace) 命名空间。
//!
//! ## 速率限制
//!
//! `login` 在进入哈希比较之前先咨询滑动窗口限制器（默认 15 分钟内最多
//! 5 次）：窗口饱和的尝试被拒绝且不占用槽位；进入比较的尝试无论结果
//! 如何都占用一个槽位。
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use smartauth::password::{PasswordAuthenticator, PasswordConfig};
//! use smartauth::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let auth = PasswordAuthenticator::new(
//!     Arc::new(MemoryStorage::new()),
//!     PasswordConfig::default(),
//! );
//!
//! auth.register("alice", "S3cret!pass").await.unwrap();
//! assert!(auth.login("alice", "S3cret!pass").await.is_ok());
//! assert!(auth.login("alice", "wrong").await.is_err());
//! # });
//! ```

pub mod hasher;

pub use hasher::PasswordHasher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{CredentialError, Result, StorageError};
use crate::security::rate_limit::{RateLimitConfig, RateLimiter};
use crate::storage::{Namespace, StorageAdapter};

/// 存储的密码记录
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PasswordRecord {
    password_hash: String,
    created_at: DateTime<Utc>,
}

/// 密码认证配置
#[derive(Debug, Clone, Default)]
pub struct PasswordConfig {
    /// 登录尝试的速率限制策略
    pub rate_limit: RateLimitConfig,
}

impl PasswordConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置速率限制策略
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// 密码认证器
#[derive(Clone)]
pub struct PasswordAuthenticator {
    adapter: Arc<dyn StorageAdapter>,
    hasher: PasswordHasher,
    limiter: RateLimiter,
}

impl PasswordAuthenticator {
    /// 创建密码认证器
    pub fn new(adapter: Arc<dyn StorageAdapter>, config: PasswordConfig) -> Self {
        Self {
            adapter,
            hasher: PasswordHasher::new(),
            limiter: RateLimiter::new(config.rate_limit),
        }
    }

    /// 注册新用户
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InvalidIdentifier`] - 标识符为空
    /// - [`CredentialError::AlreadyExists`] - 用户已存在
    pub async fn register(&self, identifier: &str, password: &str) -> Result<()> {
        if identifier.is_empty() {
            return Err(CredentialError::InvalidIdentifier.into());
        }
        if self.get_record(identifier).await?.is_some() {
            return Err(CredentialError::AlreadyExists.into());
        }

        let record = PasswordRecord {
            password_hash: self.hasher.hash(password)?,
            created_at: Utc::now(),
        };
        self.put_record(identifier, &record).await
    }

    /// 验证登录
    ///
    /// # Errors
    ///
    /// - [`Error::RateLimitExceeded`](crate::Error::RateLimitExceeded) - 窗口饱和
    /// - [`CredentialError::NotFound`] - 用户不存在
    /// - [`CredentialError::InvalidPassword`] - 密码不匹配
    pub async fn login(&self, identifier: &str, password: &str) -> Result<()> {
        if identifier.is_empty() {
            return Err(CredentialError::InvalidIdentifier.into());
        }

        // 先过速率限制；被放行的尝试此刻已占用一个槽位
        self.limiter.check(identifier).await?;

        let record = self
            .get_record(identifier)
            .await?
            .ok_or(CredentialError::NotFound)?;

        if !self.hasher.verify(password, &record.password_hash)? {
            return Err(CredentialError::InvalidPassword.into());
        }
        Ok(())
    }

    /// 修改密码
    ///
    /// 验证旧密码后写入新哈希。
    pub async fn change_password(
        &self,
        identifier: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let record = self
            .get_record(identifier)
            .await?
            .ok_or(CredentialError::NotFound)?;

        if !self.hasher.verify(old_password, &record.password_hash)? {
            return Err(CredentialError::InvalidPassword.into());
        }

        let updated = PasswordRecord {
            password_hash: self.hasher.hash(new_password)?,
            created_at: record.created_at,
        };
        self.put_record(identifier, &updated).await
    }

    /// 删除用户记录（账户注销）
    pub async fn remove(&self, identifier: &str) -> Result<()> {
        self.adapter.delete(Namespace::User, identifier).await
    }

    /// 判断用户是否存在
    pub async fn exists(&self, identifier: &str) -> Result<bool> {
        Ok(self.get_record(identifier).await?.is_some())
    }

    async fn get_record(&self, identifier: &str) -> Result<Option<PasswordRecord>> {
        match self.adapter.get(Namespace::User, identifier).await? {
            Some(raw) => {
                let record = serde_json::from_value(raw).map_err(|e| {
                    StorageError::OperationFailed(format!("corrupt user record: {}", e))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn put_record(&self, identifier: &str, record: &PasswordRecord) -> Result<()> {
        let raw = serde_json::to_value(record).map_err(|e| {
            StorageError::OperationFailed(format!("failed to serialize user record: {}", e))
        })?;
        self.adapter.set(Namespace::User, identifier, raw, None).await
    }
}
