//! 统一错误类型模块
//!
//! 提供 smartauth 库中所有操作的错误类型定义。
//!
//! 预期内的失败（凭证错误、过期/已消费的 token、速率限制）都以类型化的
//! `Err` 返回给调用方；只有配置错误和存储故障属于非预期的致命错误。

use std::fmt;
use std::time::Duration;

/// smartauth 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// smartauth 库的错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 凭证相关错误（密码、OTP、Magic Link）
    Credential(CredentialError),

    /// Token 相关错误
    Token(TokenError),

    /// 速率限制超出
    RateLimitExceeded {
        /// 重试等待时间
        retry_after: Duration,
    },

    /// 认证数据不足（未匹配任何已知的认证步骤）
    InsufficientData,

    /// 配置错误
    Config(ConfigError),

    /// 存储错误
    Storage(StorageError),

    /// 加密错误
    Crypto(CryptoError),

    /// 内部错误
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个速率限制错误
    pub fn rate_limited(retry_after: Duration) -> Self {
        Error::RateLimitExceeded { retry_after }
    }

    /// 判断是否为预期内的认证失败（而非系统故障）
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            Error::Credential(_)
                | Error::Token(_)
                | Error::RateLimitExceeded { .. }
                | Error::InsufficientData
        )
    }
}

/// 凭证验证相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// 记录已存在（重复注册）
    AlreadyExists,
    /// 记录不存在
    NotFound,
    /// 密码不匹配
    InvalidPassword,
    /// 标识符为空或非法
    InvalidIdentifier,
    /// 未请求过 OTP（包括已消费与过期后被清除的情况）
    NotRequested,
    /// 验证码不匹配
    Mismatch,
    /// 凭证已过期
    Expired,
    /// Magic Link 不存在或已被使用
    NotFoundOrUsed,
    /// 载荷损坏（解密或解析失败）
    Corrupted,
}

/// Token 相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token 已被撤销
    Revoked,
    /// Token 签名无效或已过期
    InvalidOrExpired,
    /// Token 编码失败
    EncodingFailed(String),
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 缺少必需的配置
    MissingRequired(String),
    /// 无效的配置值
    InvalidValue { key: String, message: String },
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 连接失败
    ConnectionFailed(String),
    /// 操作失败
    OperationFailed(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
    /// 密钥无效
    InvalidKey(String),
    /// 加密失败
    EncryptionFailed(String),
    /// 解密失败
    DecryptionFailed(String),
    /// 密码哈希失败
    HashingFailed(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Credential(e) => write!(f, "Credential error: {}", e),
            Error::Token(e) => write!(f, "Token error: {}", e),
            Error::RateLimitExceeded { retry_after } => {
                write!(f, "Rate limit exceeded, retry after {:?}", retry_after)
            }
            Error::InsufficientData => write!(f, "Insufficient authentication data"),
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::AlreadyExists => write!(f, "record already exists"),
            CredentialError::NotFound => write!(f, "record not found"),
            CredentialError::InvalidPassword => write!(f, "invalid password"),
            CredentialError::InvalidIdentifier => write!(f, "identifier must not be empty"),
            CredentialError::NotRequested => write!(f, "no code requested for this identifier"),
            CredentialError::Mismatch => write!(f, "code does not match"),
            CredentialError::Expired => write!(f, "credential has expired"),
            CredentialError::NotFoundOrUsed => {
                write!(f, "magic link not found or already used")
            }
            CredentialError::Corrupted => write!(f, "invalid or corrupted payload"),
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Revoked => write!(f, "token has been revoked"),
            TokenError::InvalidOrExpired => write!(f, "invalid or expired token"),
            TokenError::EncodingFailed(msg) => write!(f, "token encoding failed: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(key) => {
                write!(f, "missing required configuration: {}", key)
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid configuration value for '{}': {}", key, message)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => write!(f, "storage connection failed: {}", msg),
            StorageError::OperationFailed(msg) => write!(f, "storage operation failed: {}", msg),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "random number generation failed: {}", msg),
            CryptoError::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
            CryptoError::EncryptionFailed(msg) => write!(f, "encryption failed: {}", msg),
            CryptoError::DecryptionFailed(msg) => write!(f, "decryption failed: {}", msg),
            CryptoError::HashingFailed(msg) => write!(f, "password hashing failed: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::error::Error for CredentialError {}
impl std::error::Error for TokenError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
impl std::error::Error for CryptoError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<CredentialError> for Error {
    fn from(err: CredentialError) -> Self {
        Error::Credential(err)
    }
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        Error::Token(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}
