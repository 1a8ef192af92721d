//! 认证加密载荷信封
//!
//! 使用 ChaCha20-Poly1305 对明文进行认证加密，输出
//! `base64url(nonce || ciphertext)`。任何篡改（包括截断和单比特翻转）
//! 都会在解密时被检测到。
//!
//! Magic Link 用它保护嵌入 URL 的载荷：存储层把关新鲜度与单次使用，
//! 加密层把关客户端携带数据的完整性，两道关都必须通过。

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::error::{CryptoError, Result};
use crate::random::generate_random_bytes;

/// ChaCha20-Poly1305 的 nonce 长度（字节）
const NONCE_LEN: usize = 12;

/// 密钥长度（字节）
const KEY_LEN: usize = 32;

/// 认证加密载荷信封
///
/// 密钥是必需的构造输入，没有默认值。
#[derive(Clone)]
pub struct PayloadSealer {
    cipher: ChaCha20Poly1305,
}

impl PayloadSealer {
    /// 使用 32 字节密钥创建信封
    ///
    /// # Errors
    ///
    /// 密钥长度不是 32 字节时返回 [`CryptoError::InvalidKey`]。
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "sealing key must be {} bytes, got {}",
                KEY_LEN,
                key.len()
            ))
            .into());
        }
        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        })
    }

    /// 加密明文，返回 `base64url(nonce || ciphertext)`
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes = generate_random_bytes(NONCE_LEN)?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(&sealed))
    }

    /// 解密 `base64url(nonce || ciphertext)`，返回明文
    ///
    /// 任何解码、长度或认证标签错误都映射为
    /// [`CryptoError::DecryptionFailed`]。
    pub fn open(&self, sealed: &str) -> Result<String> {
        let data = URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|e| CryptoError::DecryptionFailed(format!("invalid encoding: {}", e)))?;
        if data.len() < NONCE_LEN {
            return Err(
                CryptoError::DecryptionFailed("ciphertext too short".to_string()).into(),
            );
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::DecryptionFailed(format!("invalid utf-8: {}", e)).into())
    }
}
