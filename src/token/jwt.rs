//! JWT 访问/刷新令牌
//!
//! HS256 签名的双令牌方案：短寿命访问令牌 + 长寿命刷新令牌。签发不写
//! 存储（纯函数：claims + 密钥 + 时钟），撤销把 token 的 SHA-256 指纹
//! 写入 [`Namespace::Session`]（`revoked:` 前缀），验证时先查指纹。
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use smartauth::token::{TokenConfig, TokenManager};
//! use smartauth::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let manager = TokenManager::new(
//!     Arc::new(MemoryStorage::new()),
//!     TokenConfig::new(b"an-example-secret-of-32-bytes-ok".to_vec()),
//! )
//! .unwrap();
//!
//! let token = manager
//!     .create_access_token("alice", Default::default())
//!     .unwrap();
//! let claims = manager.verify_access_token(&token).await.unwrap();
//! assert_eq!(claims.sub, "alice");
//!
//! manager.revoke_token(&token).await.unwrap();
//! assert!(manager.verify_access_token(&token).await.is_err());
//! # });
//! ```

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, Result, TokenError};
use crate::random::{generate_random_hex, hex_encode};
use crate::storage::{Namespace, StorageAdapter};

/// 访问令牌标记
const USE_ACCESS: &str = "access";
/// 刷新令牌标记
const USE_REFRESH: &str = "refresh";

/// Token 配置
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC 签名密钥（至少 32 字节）
    pub secret: Vec<u8>,

    /// 访问令牌有效期
    pub access_ttl: Duration,

    /// 刷新令牌有效期
    pub refresh_ttl: Duration,

    /// 签发者（写入并校验 `iss`）
    pub issuer: Option<String>,
}

impl TokenConfig {
    /// 用签名密钥创建配置
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            access_ttl: Duration::from_secs(15 * 60),        // 15 分钟
            refresh_ttl: Duration::from_secs(7 * 24 * 3600), // 7 天
            issuer: None,
        }
    }

    /// 设置访问令牌有效期
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// 设置刷新令牌有效期
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// 设置签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 主题（用户标识）
    pub sub: String,

    /// 签发者
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// 过期时间（Unix 秒）
    pub exp: i64,

    /// 签发时间（Unix 秒）
    pub iat: i64,

    /// 唯一 token ID
    pub jti: String,

    /// 令牌用途（`"access"` 或 `"refresh"`）
    pub token_use: String,

    /// 自定义 claims
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

/// JWT 管理器
#[derive(Clone)]
pub struct TokenManager {
    adapter: Arc<dyn StorageAdapter>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: TokenConfig,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager").finish_non_exhaustive()
    }
}

impl TokenManager {
    /// 创建 Token 管理器
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidValue`] - 密钥短于 32 字节
    pub fn new(adapter: Arc<dyn StorageAdapter>, config: TokenConfig) -> Result<Self> {
        if config.secret.len() < 32 {
            return Err(ConfigError::InvalidValue {
                key: "secret".to_string(),
                message: "token secret must be at least 32 bytes".to_string(),
            }
            .into());
        }

        Ok(Self {
            adapter,
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            config,
        })
    }

    /// 签发访问令牌
    pub fn create_access_token(&self, subject: &str, custom: Map<String, Value>) -> Result<String> {
        self.mint(subject, custom, USE_ACCESS, self.config.access_ttl)
    }

    /// 签发刷新令牌
    pub fn create_refresh_token(
        &self,
        subject: &str,
        custom: Map<String, Value>,
    ) -> Result<String> {
        self.mint(subject, custom, USE_REFRESH, self.config.refresh_ttl)
    }

    /// 验证访问令牌
    ///
    /// # Errors
    ///
    /// - [`TokenError::Revoked`] - token 在撤销集合中
    /// - [`TokenError::InvalidOrExpired`] - 签名无效、已过期或用途不符
    pub async fn verify_access_token(&self, token: &str) -> Result<Claims> {
        self.verify(token, USE_ACCESS).await
    }

    /// 验证刷新令牌
    pub async fn verify_refresh_token(&self, token: &str) -> Result<Claims> {
        self.verify(token, USE_REFRESH).await
    }

    /// 撤销 token（幂等）
    ///
    /// 把 token 指纹写入撤销集合。TTL 提示取刷新令牌寿命上限，此后
    /// token 自身必然过期，指纹无需保留。
    pub async fn revoke_token(&self, token: &str) -> Result<()> {
        let marker = json!({ "revoked_at": Utc::now() });
        self.adapter
            .set(
                Namespace::Session,
                &Self::revocation_key(token),
                marker,
                Some(self.config.refresh_ttl),
            )
            .await
    }

    /// 判断 token 是否已被撤销
    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        let marker = self
            .adapter
            .get(Namespace::Session, &Self::revocation_key(token))
            .await?;
        Ok(marker.is_some())
    }

    /// 获取配置
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    fn mint(
        &self,
        subject: &str,
        custom: Map<String, Value>,
        token_use: &str,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::milliseconds(ttl.as_millis() as i64);

        let claims = Claims {
            sub: subject.to_string(),
            iss: self.config.issuer.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: generate_random_hex(16)?,
            token_use: token_use.to_string(),
            custom,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::EncodingFailed(e.to_string()).into())
    }

    async fn verify(&self, token: &str, expected_use: &str) -> Result<Claims> {
        // 撤销检查先于验签：已撤销的有效签名也不放行
        if self.is_revoked(token).await? {
            return Err(TokenError::Revoked.into());
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::InvalidOrExpired)?;

        // 恰好到期的瞬间视为已过期
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::InvalidOrExpired.into());
        }
        if data.claims.token_use != expected_use {
            return Err(TokenError::InvalidOrExpired.into());
        }
        Ok(data.claims)
    }

    /// token 指纹对应的撤销集合键
    fn revocation_key(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        format!("revoked:{}", hex_encode(&digest))
    }
}
