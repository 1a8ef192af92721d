//! 密码学工具模块
//!
//! 提供认证加密 (AEAD) 原语，用于保护经由不可信信道（URL）传递的数据。
//!
//! ## 示例
//!
//! ```rust
//! use smartauth::crypto::seal::PayloadSealer;
//!
//! let sealer = PayloadSealer::new(&[7u8; 32]).unwrap();
//! let sealed = sealer.seal("hello").unwrap();
//! assert_eq!(sealer.open(&sealed).unwrap(), "hello");
//! ```

pub mod seal;

pub use seal::PayloadSealer;
