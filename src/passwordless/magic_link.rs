//! Magic Link（魔法链接）实现
//!
//! 生成带认证加密载荷的一次性登录链接，验证一次后失效。
//!
//! ## 两道关卡
//!
//! 链接上有意叠加了两层保护，各司其职：
//!
//! 1. **存储层**把关新鲜度与单次使用：token 为键的记录被原子地
//!    take-and-delete，两个并发验证恰好一个成功
//! 2. **认证加密层**把关完整性：URL 携带的载荷经 ChaCha20-Poly1305
//!    加密，任何篡改独立于存储查询被检测
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use smartauth::passwordless::{MagicLinkConfig, MagicLinkManager};
//! use smartauth::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let manager = MagicLinkManager::new(
//!     Arc::new(MemoryStorage::new()),
//!     &[7u8; 32],
//!     MagicLinkConfig::default(),
//! ).unwrap();
//!
//! let link = manager
//!     .generate("user@example.com", "https://example.com/auth/magic")
//!     .await
//!     .unwrap();
//! assert!(link.url.starts_with("https://example.com/auth/magic?token="));
//!
//! // 用户点击链接后，用 URL 中的载荷验证
//! let payload = link.url.split("token=").nth(1).unwrap();
//! let identifier = manager.verify(payload).await.unwrap();
//! assert_eq!(identifier, "user@example.com");
//!
//! // 严格单次使用
//! assert!(manager.verify(payload).await.is_err());
//! # });
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::crypto::seal::PayloadSealer;
use crate::error::{CredentialError, Result};
use crate::random::generate_random_hex;
use crate::store::{CredentialStore, Lookup};
use crate::storage::{Namespace, StorageAdapter};

/// Magic Link 配置
#[derive(Debug, Clone)]
pub struct MagicLinkConfig {
    /// Token 长度（字节数；32 字节 = 256 位熵）
    pub token_length: usize,

    /// 链接有效期
    pub ttl: Duration,
}

impl Default for MagicLinkConfig {
    fn default() -> Self {
        Self {
            token_length: 32,
            ttl: Duration::from_secs(10 * 60), // 10 分钟
        }
    }
}

impl MagicLinkConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 token 长度（字节）
    ///
    /// # Panics
    ///
    /// 低于 16 字节（128 位熵下限）时 panic。
    pub fn with_token_length(mut self, length: usize) -> Self {
        assert!(length >= 16, "token length must be at least 16 bytes");
        self.token_length = length;
        self
    }

    /// 设置有效期
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// 生成的 Magic Link 数据
#[derive(Debug, Clone)]
pub struct MagicLinkData {
    /// 完整的登录 URL（含加密载荷）
    pub url: String,

    /// 存储键 token（服务端侧使用，不直接出现在 URL 中）
    pub token: String,

    /// 关联的用户标识
    pub identifier: String,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 过期时间
    pub expires_at: DateTime<Utc>,
}

/// 存储的链接记录（以 token 为键）
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinkRecord {
    identifier: String,
}

/// URL 载荷（加密前的明文）
#[derive(Debug, Serialize, Deserialize)]
struct LinkPayload {
    identifier: String,
    token: String,
    expires_at: DateTime<Utc>,
}

/// Magic Link 管理器
///
/// 加密密钥是必需的构造输入（32 字节），没有默认值。
#[derive(Clone)]
pub struct MagicLinkManager {
    /// token -> 链接记录
    links: CredentialStore<LinkRecord>,
    /// `ident:{identifier}` -> 最近一次签发的 token；用于在重新生成时
    /// 作废前一个未消费的链接（token 是十六进制，不会与前缀键冲突）
    index: CredentialStore<String>,
    sealer: PayloadSealer,
    config: MagicLinkConfig,
}

impl MagicLinkManager {
    /// 创建 Magic Link 管理器
    ///
    /// # Errors
    ///
    /// 密钥长度不是 32 字节时返回配置性的加密错误。
    pub fn new(
        adapter: Arc<dyn StorageAdapter>,
        sealing_key: &[u8],
        config: MagicLinkConfig,
    ) -> Result<Self> {
        Ok(Self {
            links: CredentialStore::new(adapter.clone(), Namespace::MagicLink),
            index: CredentialStore::new(adapter, Namespace::MagicLink),
            sealer: PayloadSealer::new(sealing_key)?,
            config,
        })
    }

    fn index_key(identifier: &str) -> String {
        format!("ident:{}", identifier)
    }

    /// 为用户生成魔法链接
    ///
    /// 为同一标识符重新生成会静默作废前一个未消费的链接。
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InvalidIdentifier`] - 标识符为空
    pub async fn generate(&self, identifier: &str, base_url: &str) -> Result<MagicLinkData> {
        if identifier.is_empty() {
            return Err(CredentialError::InvalidIdentifier.into());
        }

        // 作废该标识符之前签发、尚未消费的链接
        if let Lookup::Live(previous) = self.index.get(&Self::index_key(identifier)).await? {
            self.links.delete(&previous).await?;
        }

        let token = generate_random_hex(self.config.token_length)?;
        let created_at = Utc::now();
        let expires_at =
            created_at + ChronoDuration::milliseconds(self.config.ttl.as_millis() as i64);

        let record = LinkRecord {
            identifier: identifier.to_string(),
        };
        self.links.put_until(&token, &record, expires_at).await?;
        self.index
            .put_until(&Self::index_key(identifier), &token, expires_at)
            .await?;

        let payload = LinkPayload {
            identifier: identifier.to_string(),
            token: token.clone(),
            expires_at,
        };
        let plaintext = serde_json::to_string(&payload)
            .map_err(|e| crate::error::Error::internal(format!("payload encode: {}", e)))?;
        let sealed = self.sealer.seal(&plaintext)?;

        Ok(MagicLinkData {
            url: format!("{}?token={}", base_url, sealed),
            token,
            identifier: identifier.to_string(),
            created_at,
            expires_at,
        })
    }

    /// 验证魔法链接载荷
    ///
    /// 成功时消费链接并返回关联的用户标识。对同一载荷的并发验证恰好一个
    /// 成功，其余得到 [`CredentialError::NotFoundOrUsed`] —— 已消费的
    /// token 绝不会被复活或二次通过。
    ///
    /// # Errors
    ///
    /// - [`CredentialError::Corrupted`] - 解密或解析失败（被篡改/伪造的载荷）
    /// - [`CredentialError::NotFoundOrUsed`] - token 不在存储中（已用过或凭空捏造）
    /// - [`CredentialError::Expired`] - 链接已过期（随之清除）
    pub async fn verify(&self, sealed_payload: &str) -> Result<String> {
        let plaintext = self
            .sealer
            .open(sealed_payload)
            .map_err(|_| CredentialError::Corrupted)?;
        let payload: LinkPayload =
            serde_json::from_str(&plaintext).map_err(|_| CredentialError::Corrupted)?;

        match self.links.take(&payload.token).await? {
            Lookup::Live(record) => Ok(record.identifier),
            Lookup::Expired => Err(CredentialError::Expired.into()),
            Lookup::Missing => Err(CredentialError::NotFoundOrUsed.into()),
        }
    }

    /// 手动作废一个未消费的链接
    pub async fn revoke(&self, token: &str) -> Result<()> {
        self.links.delete(token).await
    }

    /// 获取配置
    pub fn config(&self) -> &MagicLinkConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::MemoryStorage;
    use std::thread::sleep;

    const KEY: [u8; 32] = [42u8; 32];
    const BASE_URL: &str = "https://example.com/auth/magic";

    fn manager() -> MagicLinkManager {
        MagicLinkManager::new(
            Arc::new(MemoryStorage::new()),
            &KEY,
            MagicLinkConfig::default(),
        )
        .unwrap()
    }

    fn payload_of(link: &MagicLinkData) -> &str {
        link.url.split("token=").nth(1).unwrap()
    }

    #[tokio::test]
    async fn test_generate_and_verify() {
        let manager = manager();
        let link = manager.generate("alice", BASE_URL).await.unwrap();

        assert!(link.url.starts_with("https://example.com/auth/magic?token="));
        assert_eq!(link.token.len(), 64); // 32 bytes hex

        let identifier = manager.verify(payload_of(&link)).await.unwrap();
        assert_eq!(identifier, "alice");
    }

    #[tokio::test]
    async fn test_single_use() {
        let manager = manager();
        let link = manager.generate("alice", BASE_URL).await.unwrap();

        manager.verify(payload_of(&link)).await.unwrap();

        let err = manager.verify(payload_of(&link)).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::NotFoundOrUsed));
    }

    #[tokio::test]
    async fn test_tampered_payload_is_corrupted() {
        let manager = manager();
        let link = manager.generate("alice", BASE_URL).await.unwrap();

        let mut tampered = payload_of(&link).to_string();
        tampered.pop();
        tampered.push('A');

        let err = manager.verify(&tampered).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::Corrupted));
    }

    #[tokio::test]
    async fn test_fabricated_payload() {
        let manager = manager();

        // 无法解密的垃圾
        let err = manager.verify("garbage!!").await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::Corrupted));

        // 能解密但 token 不存在：用另一个实例伪造结构合法的载荷
        let forged = manager.sealer.seal(
            r#"{"identifier":"alice","token":"deadbeef","expires_at":"2999-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let err = manager.verify(&forged).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::NotFoundOrUsed));
    }

    #[tokio::test]
    async fn test_wrong_key_payload_is_corrupted() {
        let manager = manager();
        let other = MagicLinkManager::new(
            Arc::new(MemoryStorage::new()),
            &[9u8; 32],
            MagicLinkConfig::default(),
        )
        .unwrap();

        let link = other.generate("alice", BASE_URL).await.unwrap();
        let err = manager.verify(payload_of(&link)).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::Corrupted));
    }

    #[tokio::test]
    async fn test_expired_link() {
        let manager = MagicLinkManager::new(
            Arc::new(MemoryStorage::new()),
            &KEY,
            MagicLinkConfig::new().with_ttl(Duration::from_millis(30)),
        )
        .unwrap();

        let link = manager.generate("alice", BASE_URL).await.unwrap();
        sleep(Duration::from_millis(50));

        let err = manager.verify(payload_of(&link)).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::Expired));

        // 过期记录已被清除，二次验证与伪造无法区分
        let err = manager.verify(payload_of(&link)).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::NotFoundOrUsed));
    }

    #[tokio::test]
    async fn test_new_link_invalidates_previous() {
        let manager = manager();
        let old = manager.generate("alice", BASE_URL).await.unwrap();
        let new = manager.generate("alice", BASE_URL).await.unwrap();

        // 旧链接已被作废
        let err = manager.verify(payload_of(&old)).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::NotFoundOrUsed));

        // 新链接正常可用
        assert_eq!(manager.verify(payload_of(&new)).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_links_for_different_users_independent() {
        let manager = manager();
        let a = manager.generate("alice", BASE_URL).await.unwrap();
        let b = manager.generate("bob", BASE_URL).await.unwrap();

        assert_eq!(manager.verify(payload_of(&a)).await.unwrap(), "alice");
        assert_eq!(manager.verify(payload_of(&b)).await.unwrap(), "bob");
    }

    #[tokio::test]
    async fn test_revoke() {
        let manager = manager();
        let link = manager.generate("alice", BASE_URL).await.unwrap();

        manager.revoke(&link.token).await.unwrap();

        let err = manager.verify(payload_of(&link)).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::NotFoundOrUsed));
    }

    #[tokio::test]
    async fn test_concurrent_verify_exactly_one_success() {
        let manager = manager();
        let link = manager.generate("alice", BASE_URL).await.unwrap();
        let payload = payload_of(&link).to_string();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let payload = payload.clone();
            handles.push(tokio::spawn(async move {
                manager.verify(&payload).await.is_ok()
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
    async fn test_generate_empty_identifier_fails() {
        let manager = manager();
        let err = manager.generate("", BASE_URL).await.unwrap_err();
        assert_eq!(err, Error::Credential(CredentialError::InvalidIdentifier));
    }

    #[tokio::test]
    async fn test_invalid_key_length_rejected() {
        let result = MagicLinkManager::new(
            Arc::new(MemoryStorage::new()),
            &[0u8; 8],
            MagicLinkConfig::default(),
        );
        assert!(result.is_err());
    }
}
