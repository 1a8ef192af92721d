//! 一次性验证码 (OTP) 实现
//!
//! 服务端生成随机数字验证码，通过邮件/短信发给用户，验证一次后失效。
//!
//! ## 语义
//!
//! - 每个标识符至多一个存活验证码：重新生成会静默作废旧码
//! - 验证**匹配**时消费验证码；**不匹配**时保留（合法持有者可以重试
//!   直到过期），且不重置过期时间
//! - 不存在、已消费、过期后被清除这三种情况对外同样报告
//!   [`CredentialError::NotRequested`]，不向攻击者泄露状态
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use smartauth::passwordless::{OtpConfig, OtpManager};
//! use smartauth::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let manager = OtpManager::new(Arc::new(MemoryStorage::new()), OtpConfig::default());
//!
//! let otp = manager.generate("user@example.com").await.unwrap();
//! assert_eq!(otp.code.len(), 6);
//!
//! manager.verify("user@example.com", &otp.code).await.unwrap();
//!
//! // 验证码已被消费，再次验证失败
//! assert!(manager.verify("user@example.com", &otp.code).await.is_err());
//! # });
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CredentialError, Result};
use crate::random::{constant_time_compare_str, generate_random_in_range};
use crate::store::{CredentialStore, Lookup};
use crate::storage::{Namespace, StorageAdapter};

/// OTP 配置
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// 验证码长度（数字位数）
    pub code_length: usize,

    /// 验证码有效期
    pub ttl: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl: Duration::from_secs(5 * 60), // 5 分钟
        }
    }
}

impl OtpConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置验证码长度
    pub fn with_code_length(mut self, length: usize) -> Self {
        assert!(
            (4..=10).contains(&length),
            "code length must be between 4 and 10"
        );
        self.code_length = length;
        self
    }

    /// 设置有效期
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// OTP 数据
#[derive(Debug, Clone)]
pub struct OtpData {
    /// 生成的验证码
    pub code: String,

    /// 关联的用户标识
    pub identifier: String,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 过期时间
    pub expires_at: DateTime<Utc>,
}

/// 存储的 OTP 记录
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OtpRecord {
    code: String,
    expires_at: DateTime<Utc>,
}

/// OTP 管理器
#[derive(Clone)]
pub struct OtpManager {
    codes: CredentialStore<OtpRecord>,
    config: OtpConfig,
}

impl OtpManager {
    /// 创建 OTP 管理器
    pub fn new(adapter: Arc<dyn StorageAdapter>, config: OtpConfig) -> Self {
        Self {
            codes: CredentialStore::new(adapter, Namespace::Otp),
            config,
        }
    }

    /// 生成均匀随机的零填充数字验证码
    fn generate_code(&self) -> String {
        let bound = 10u64.pow(self.config.code_length as u32);
        let code = generate_random_in_range(0, bound);
        format!("{:0>width$}", code, width = self.config.code_length)
    }

    /// 为用户生成验证码
    ///
    /// 替换该标识符之前未消费的验证码（last-write-wins）。
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InvalidIdentifier`] - 标识符为空
    pub async fn generate(&self, identifier: &str) -> Result<OtpData> {
        if identifier.is_empty() {
            return Err(CredentialError::InvalidIdentifier.into());
        }

        let code = self.generate_code();
        let created_at = Utc::now();
        let expires_at =
            created_at + ChronoDuration::milliseconds(self.config.ttl.as_millis() as i64);

        let record = OtpRecord {
            code: code.clone(),
            expires_at,
        };
        self.codes.put_until(identifier, &record, expires_at).await?;

        Ok(OtpData {
            code,
            identifier: identifier.to_string(),
            created_at,
            expires_at,
        })
    }

    /// 验证用户输入的验证码
    ///
    /// 使用常量时间比较防止时序攻击。匹配时消费验证码；不匹配时保留。
    ///
    /// # Errors
    ///
    /// - [`CredentialError::NotRequested`] - 无存活验证码（未生成/已消费/过期后已清除）
    /// - [`CredentialError::Expired`] - 验证码已过期（随之清除）
    /// - [`CredentialError::Mismatch`] - 验证码不匹配（保留，可重试）
    pub async fn verify(&self, identifier: &str, candidate: &str) -> Result<()> {
        let record = match self.codes.get(identifier).await? {
            Lookup::Live(record) => record,
            Lookup::Expired => return Err(CredentialError::Expired.into()),
            Lookup::Missing => return Err(CredentialError::NotRequested.into()),
        };

        if !constant_time_compare_str(&record.code, candidate) {
            return Err(CredentialError::Mismatch.into());
        }

        // 匹配成功后原子消费；并发验证同一验证码时只有一个调用者拿到记录
        match self.codes.take(identifier).await? {
            Lookup::Live(taken) if constant_time_compare_str(&taken.code, candidate) => Ok(()),
            Lookup::Live(newer) => {
                // take 到的是期间新生成的验证码：放回去，本次按不匹配处理
                self.codes
                    .put_until(identifier, &newer, newer.expires_at)
                    .await?;
                Err(CredentialError::Mismatch.into())
            }
            Lookup::Expired => Err(CredentialError::Expired.into()),
            Lookup::Missing => Err(CredentialError::NotRequested.into()),
        }
    }

    /// 作废某个标识符的存活验证码
    pub async fn revoke(&self, identifier: &str) -> Result<()> {
        self.codes.delete(identifier).await
    }

    /// 获取配置
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::MemoryStorage;
    use std::thread::sleep;

    fn manager() -> OtpManager {
        OtpManager::new(Arc::new(MemoryStorage::new()), OtpConfig::default())
    }

    #[tokio::test]
    async fn test_generate_returns_six_digit_code() {
        let manager = manager();
        let otp = manager.generate("alice").await.unwrap();

        assert_eq!(otp.code.len(), 6);
        assert!(otp.code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_verify_consumes_code() {
        let manager = manager();
        let otp = manager.generate("alice").await.unwrap();

        manager.verify("alice", &otp.code).await.unwrap();

        let err = manager.verify("alice", &otp.code).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::NotRequested));
    }

    #[tokio::test]
    async fn test_mismatch_does_not_consume() {
        let manager = manager();
        let otp = manager.generate("alice").await.unwrap();

        let err = manager.verify("alice", "000000").await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::Mismatch));

        // 合法持有者仍可用正确验证码通过
        manager.verify("alice", &otp.code).await.unwrap();
    }

    #[tokio::test]
    async fn test_new_code_invalidates_previous() {
        let manager = manager();
        let old = manager.generate("alice").await.unwrap();
        let new = manager.generate("alice").await.unwrap();

        if old.code != new.code {
            let err = manager.verify("alice", &old.code).await.unwrap_err();
            assert_eq!(err, Error::Credential(CredentialError::Mismatch));
        }
        manager.verify("alice", &new.code).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_without_generate() {
        let manager = manager();
        let err = manager.verify("ghost", "123456").await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::NotRequested));
    }

    #[tokio::test]
    async fn test_expired_code_rejected_then_purged() {
        let manager = OtpManager::new(
            Arc::new(MemoryStorage::new()),
            OtpConfig::new().with_ttl(Duration::from_millis(30)),
        );
        let otp = manager.generate("alice").await.unwrap();
        sleep(Duration::from_millis(50));

        // 第一次撞见过期记录：Expired 并清除
        let err = manager.verify("alice", &otp.code).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::Expired));

        // 记录已清除，之后与从未生成无法区分
        let err = manager.verify("alice", &otp.code).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::NotRequested));
    }

    #[tokio::test]
    async fn test_garbage_candidate_is_mismatch() {
        let manager = manager();
        manager.generate("alice").await.unwrap();

        for garbage in ["", "abc", "not-a-code", "１２３４５６", "12345678901234"] {
            let err = manager.verify("alice", garbage).await.unwrap_err();
            assert_eq!(err, Error::Credential(CredentialError::Mismatch));
        }
    }

    #[tokio::test]
    async fn test_generate_empty_identifier_fails() {
        let manager = manager();
        let err = manager.generate("").await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::InvalidIdentifier));
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let manager = manager();
        let a = manager.generate("alice").await.unwrap();
        let b = manager.generate("bob").await.unwrap();

        manager.verify("alice", &a.code).await.unwrap();
        manager.verify("bob", &b.code).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_verify_exactly_one_success() {
        let manager = manager();
        let otp = manager.generate("alice").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let code = otp.code.clone();
            handles.push(tokio::spawn(async move {
                manager.verify("alice", &code).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_revoke() {
        let manager = manager();
        let otp = manager.generate("alice").await.unwrap();

        manager.revoke("alice").await.unwrap();

        let err = manager.verify("alice", &otp.code).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::NotRequested));
    }

    #[tokio::test]
    async fn test_custom_code_length() {
        let manager = OtpManager::new(
            Arc::new(MemoryStorage::new()),
            OtpConfig::new().with_code_length(8),
        );
        let otp = manager.generate("alice").await.unwrap();
        assert_eq!(otp.code.len(), 8);
    }
}
