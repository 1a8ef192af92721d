//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成 token、验证码等敏感数据。

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use crate::error::{CryptoError, Error, Result};

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Example
///
/// ```rust
/// use smartauth::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定长度的十六进制随机字符串
///
/// # Arguments
///
/// * `byte_length` - 要生成的字节数（最终字符串长度为字节数的两倍）
///
/// # Example
///
/// ```rust
/// use smartauth::random::generate_random_hex;
///
/// let hex = generate_random_hex(32).unwrap();
/// assert_eq!(hex.len(), 64); // 32 bytes = 64 hex chars
/// ```
pub fn generate_random_hex(byte_length: usize) -> Result<String> {
    let bytes = generate_random_bytes(byte_length)?;
    Ok(hex_encode(&bytes))
}

/// 生成指定长度的 Base64 URL 安全随机字符串
///
/// 使用 URL 安全的 Base64 编码（不含填充），可直接嵌入 URL 参数。
pub fn generate_random_base64_url(byte_length: usize) -> Result<String> {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// 生成指定范围内的均匀随机数
///
/// # Arguments
///
/// * `min` - 最小值（包含）
/// * `max` - 最大值（不包含）
pub fn generate_random_in_range(min: u64, max: u64) -> u64 {
    rand::thread_rng().gen_range(min..max)
}

/// 将字节数组编码为十六进制字符串
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 常量时间比较两个字节切片
///
/// 用于防止时序攻击。长度不同的输入直接返回 false。
///
/// # Example
///
/// ```rust
/// use smartauth::random::constant_time_compare;
///
/// assert!(constant_time_compare(b"secret", b"secret"));
/// assert!(!constant_time_compare(b"secret", b"other!"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}
