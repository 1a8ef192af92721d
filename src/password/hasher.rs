//! 密码哈希实现
//!
//! 基于 Argon2id（慢速、加盐、内存困难）的密码哈希与验证。
//! 快速通用哈希（SHA-256 之类）不适合存储密码，这里不提供。

use argon2::Argon2;
use password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};

use crate::error::{CryptoError, Result};
use crate::random::generate_random_bytes;

/// 盐长度（字节）
const SALT_LEN: usize = 16;

/// 密码哈希器
///
/// 使用 Argon2id 的推荐参数；输出 PHC 格式的哈希字符串，盐随机生成
/// 并编码在哈希内。
///
/// # Example
///
/// ```rust
/// use smartauth::password::PasswordHasher;
///
/// let hasher = PasswordHasher::new();
/// let hash = hasher.hash("hunter2!").unwrap();
/// assert!(hasher.verify("hunter2!", &hash).unwrap());
/// assert!(!hasher.verify("wrong", &hash).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    /// 创建新的密码哈希器
    pub fn new() -> Self {
        Self
    }

    /// 哈希密码
    ///
    /// 每次调用生成新的随机盐，同一密码的两次哈希结果不同。
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt_bytes = generate_random_bytes(SALT_LEN)?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| CryptoError::HashingFailed(format!("salt encoding: {}", e)))?;
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CryptoError::HashingFailed(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// 验证密码是否与哈希匹配
    ///
    /// 比较失败返回 `Ok(false)`；哈希字符串本身不合法才返回 `Err`。
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| CryptoError::HashingFailed(format!("invalid hash format: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
