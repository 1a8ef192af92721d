//! # SmartAuth
//!
//! 凭证与会话生命周期引擎。
//!
//! ## 功能特性
//!
//! - **密码认证**: Argon2id 哈希 + 滑动窗口速率限制
//! - **一次性验证码 (OTP)**: 时间受限、单次使用的数字验证码
//! - **魔法链接**: ChaCha20-Poly1305 密封的单次登录链接
//! - **MFA 编排**: 密码 + 第二因子的多步认证协议
//! - **JWT Token**: 访问/刷新双令牌，撤销优先于验签
//! - **Session 管理**: 服务端显式会话记录
//! - **可插拔存储**: `StorageAdapter` 契约 + 内存实现
//! - **身份归一化**: 外部 IdP 资料压平成统一结构
//!
//! ## 设计原则
//!
//! 所有凭证共享同一套生命周期语义：时间受限（惰性过期，无后台定时
//! 器）、单次使用（原子消费，并发下恰好一次）、每个标识符至多一条
//! 存活记录。预期内的认证失败是带类型的 `Err` 值；MFA 层进一步把
//! 子原因折叠成粗粒度拒绝，避免向攻击者泄露状态。
//!
//! ## 密码认证示例
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
//! # });
//! ```
//!
//! ## OTP 示例
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
//! manager.verify("user@example.com", &otp.code).await.unwrap();
//! # });
//! ```
//!
//! ## JWT 示例
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
//! let token = manager.create_access_token("user123", Default::default()).unwrap();
//! let claims = manager.verify_access_token(&token).await.unwrap();
//! assert_eq!(claims.sub, "user123");
//! # });
//! ```

pub mod crypto;
pub mod error;
pub mod identity;
pub mod mfa;
pub mod notify;
pub mod password;
pub mod passwordless;
pub mod random;
pub mod security;
pub mod storage;
pub mod store;
pub mod token;

pub use error::{Error, Result};

// ============================================================================
// 凭证相关导出
// ============================================================================

pub use password::{PasswordAuthenticator, PasswordConfig};
pub use passwordless::{
    MagicLinkConfig, MagicLinkData, MagicLinkManager, OtpConfig, OtpData, OtpManager,
};

// ============================================================================
// MFA 相关导出
// ============================================================================

pub use mfa::{
    MfaChallenge, MfaOrchestrator, MfaOutcome, MfaPolicy, MfaRejection, MfaStep, SecondFactor,
};

// ============================================================================
// Token 与会话导出
// ============================================================================

pub use token::{Claims, SessionRecord, SessionStore, TokenConfig, TokenManager};

// ============================================================================
// 存储与协作方导出
// ============================================================================

pub use identity::{normalize_profile, NormalizedProfile};
pub use notify::{render_template, ConsoleNotifier, Notifier};
pub use storage::{MemoryStorage, Namespace, StorageAdapter};

// ============================================================================
// 随机数与安全工具导出
// ============================================================================

pub use random::{
    constant_time_compare, constant_time_compare_str, generate_random_base64_url,
    generate_random_bytes, generate_random_hex,
};
pub use security::rate_limit::{RateLimitConfig, RateLimitInfo, RateLimiter};
