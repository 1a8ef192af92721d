//! 无密码凭证模块
//!
//! 提供一次性验证码 (OTP) 与魔法链接 (Magic Link) 的生成和验证逻辑。
//!
//! ## 设计原则
//!
//! 本模块只负责凭证的生成和验证，**不包含**实际的邮件/短信发送；发送由
//! 应用层通过 [`notify`](crate::notify) 协作方完成。
//!
//! 两种凭证共享同一套底层语义（[`CredentialStore`](crate::store::CredentialStore)）：
//! 时间受限、单次使用、惰性过期、每个标识符至多一条存活记录。

pub mod magic_link;
pub mod otp;

pub use magic_link::{MagicLinkConfig, MagicLinkData, MagicLinkManager};
pub use otp::{OtpConfig, OtpData, OtpManager};
