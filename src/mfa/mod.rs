//! 多因素认证 (MFA) 编排模块
//!
//! 把密码验证与第二因子（OTP 或 Magic Link）串联成多步认证协议：
//!
//! ```text
//! AwaitingPassword -> AwaitingSecondFactor{OTP|MagicLink} -> Authenticated
//! ```
//!
//! 任何一步失败都得到 `Rejected`，调用方应重试同一步而不是前进。
//!
//! ## 无服务端流程状态
//!
//! 编排器在步骤之间不保存任何状态：存活的 OTP/链接记录本身就是
//! 「第二因子待验证」状态——记录存在表示待验证，消费后消失表示完成。
//! 这样凭证存储就是唯一事实来源，不存在可能失步的第二份状态。
//!
//! ## 输入为带标签的步骤
//!
//! 每次调用携带一个 [`MfaStep`] 变体而非一组可选字段，非法组合
//! （同时带 OTP 和 Magic Link）在类型层面不可表达。
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use smartauth::mfa::{MfaChallenge, MfaOrchestrator, MfaOutcome, MfaPolicy, MfaStep, SecondFactor};
//! use smartauth::password::{PasswordAuthenticator, PasswordConfig};
//! use smartauth::passwordless::{MagicLinkConfig, MagicLinkManager, OtpConfig, OtpManager};
//! use smartauth::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let passwords = PasswordAuthenticator::new(storage.clone(), PasswordConfig::default());
//! let otp = OtpManager::new(storage.clone(), OtpConfig::default());
//! let links = MagicLinkManager::new(storage, &[7u8; 32], MagicLinkConfig::default()).unwrap();
//! let mfa = MfaOrchestrator::new(passwords.clone(), otp, links);
//!
//! passwords.register("alice", "S3cret!").await.unwrap();
//! let policy = MfaPolicy::new(SecondFactor::Otp);
//!
//! // 第一步：密码
//! let outcome = mfa
//!     .step(MfaStep::password("alice", "S3cret!"), &policy)
//!     .await
//!     .unwrap();
//! let code = match outcome {
//!     MfaOutcome::Pending(MfaChallenge::Otp { code, .. }) => code,
//!     other => panic!("unexpected: {:?}", other),
//! };
//!
//! // 第二步：OTP
//! let outcome = mfa
//!     .step(MfaStep::otp("alice", &code), &policy)
//!     .await
//!     .unwrap();
//! assert!(matches!(outcome, MfaOutcome::Authenticated { .. }));
//! # });
//! ```

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::password::PasswordAuthenticator;
use crate::passwordless::{MagicLinkManager, OtpManager};

/// 单次调用携带的认证步骤
///
/// 带标签的和类型让「同时带多种凭证」的非法状态不可表达。
#[derive(Debug, Clone)]
pub enum MfaStep {
    /// 第一步：密码
    Password {
        /// 用户标识
        username: String,
        /// 明文密码
        password: String,
    },
    /// 第二步：一次性验证码
    Otp {
        /// 用户标识
        username: String,
        /// 用户输入的验证码
        code: String,
    },
    /// 第二步：魔法链接载荷
    MagicLink {
        /// URL 中携带的加密载荷
        payload: String,
    },
}

impl MfaStep {
    /// 构造密码步骤
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        MfaStep::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// 构造 OTP 步骤
    pub fn otp(username: impl Into<String>, code: impl Into<String>) -> Self {
        MfaStep::Otp {
            username: username.into(),
            code: code.into(),
        }
    }

    /// 构造 Magic Link 步骤
    pub fn magic_link(payload: impl Into<String>) -> Self {
        MfaStep::MagicLink {
            payload: payload.into(),
        }
    }
}

/// 第二因子策略
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SecondFactor {
    /// 仅密码（密码通过即认证完成）
    #[default]
    None,
    /// 密码之后要求 OTP
    Otp,
    /// 密码之后要求魔法链接
    MagicLink {
        /// 链接的基础 URL
        base_url: String,
    },
}

/// 每次调用的 MFA 策略
#[derive(Debug, Clone, Default)]
pub struct MfaPolicy {
    /// 要求的第二因子
    pub second_factor: SecondFactor,
}

impl MfaPolicy {
    /// 创建策略
    pub fn new(second_factor: SecondFactor) -> Self {
        Self { second_factor }
    }

    /// 仅密码策略
    pub fn password_only() -> Self {
        Self::new(SecondFactor::None)
    }

    /// OTP 策略
    pub fn with_otp() -> Self {
        Self::new(SecondFactor::Otp)
    }

    /// Magic Link 策略
    pub fn with_magic_link(base_url: impl Into<String>) -> Self {
        Self::new(SecondFactor::MagicLink {
            base_url: base_url.into(),
        })
    }
}

/// 待完成的第二因子挑战
///
/// 挑战中的秘密（验证码、链接）交给调用方的通知协作方发送，
/// 不直接展示给最终用户。
#[derive(Debug, Clone)]
pub enum MfaChallenge {
    /// 已生成 OTP，等待用户回填
    Otp {
        /// 生成的验证码
        code: String,
        /// 过期时间
        expires_at: DateTime<Utc>,
    },
    /// 已生成魔法链接，等待用户点击
    MagicLink {
        /// 完整链接 URL
        url: String,
        /// 过期时间
        expires_at: DateTime<Utc>,
    },
}

/// 拒绝原因
///
/// 故意保持粗粒度：第二因子失败不区分「未请求过 / 已过期 / 已消费 /
/// 输错」，避免预言机攻击；调用方向最终用户展示统一的
/// 「无效或已过期，请重试」。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MfaRejection {
    /// 密码错误（也覆盖账号不存在，不泄露账号存在性）
    InvalidPassword,
    /// 第二因子无效或已过期
    InvalidSecondFactor,
    /// 尝试过于频繁
    TooManyAttempts {
        /// 重试等待时间
        retry_after: Duration,
    },
    /// 提供的凭证组合不匹配任何已知步骤
    InsufficientData,
}

impl std::fmt::Display for MfaRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MfaRejection::InvalidPassword => write!(f, "Invalid password"),
            MfaRejection::InvalidSecondFactor => {
                write!(f, "Invalid or expired second factor")
            }
            MfaRejection::TooManyAttempts { .. } => {
                write!(f, "Too many attempts. Please try again later.")
            }
            MfaRejection::InsufficientData => write!(f, "Insufficient authentication data"),
        }
    }
}

/// 一次编排调用的结果
#[derive(Debug, Clone)]
pub enum MfaOutcome {
    /// 认证完成
    Authenticated {
        /// 认证通过的用户标识
        identifier: String,
    },
    /// 等待第二因子
    Pending(MfaChallenge),
    /// 本步骤被拒绝（重试同一步骤，不要前进）
    Rejected(MfaRejection),
}

impl MfaOutcome {
    /// 是否认证完成
    pub fn is_authenticated(&self) -> bool {
        matches!(self, MfaOutcome::Authenticated { .. })
    }
}

/// MFA 编排器
///
/// 把密码、OTP、Magic Link 三个验证器按策略串联。编排器自身无状态，
/// 可随意克隆；全部可变状态都在底层存储中。
#[derive(Clone)]
pub struct MfaOrchestrator {
    passwords: PasswordAuthenticator,
    otp: OtpManager,
    magic_links: MagicLinkManager,
}

impl MfaOrchestrator {
    /// 组合三个验证器创建编排器
    pub fn new(
        passwords: PasswordAuthenticator,
        otp: OtpManager,
        magic_links: MagicLinkManager,
    ) -> Self {
        Self {
            passwords,
            otp,
            magic_links,
        }
    }

    /// 推进认证流程一步
    ///
    /// 预期内的认证失败以 `Ok(MfaOutcome::Rejected(..))` 返回；
    /// 只有存储/配置故障才返回 `Err`。
    pub async fn step(&self, step: MfaStep, policy: &MfaPolicy) -> Result<MfaOutcome> {
        match (step, &policy.second_factor) {
            // 第一步：密码
            (MfaStep::Password { username, password }, second_factor) => {
                match self.passwords.login(&username, &password).await {
                    Ok(()) => self.issue_challenge(&username, second_factor).await,
                    Err(Error::RateLimitExceeded { retry_after }) => Ok(MfaOutcome::Rejected(
                        MfaRejection::TooManyAttempts { retry_after },
                    )),
                    Err(e) if e.is_credential_failure() => {
                        // 账号不存在与密码错误对外同样表现
                        Ok(MfaOutcome::Rejected(MfaRejection::InvalidPassword))
                    }
                    Err(e) => Err(e),
                }
            }

            // 第二步：OTP（仅在策略要求 OTP 时可用）
            (MfaStep::Otp { username, code }, SecondFactor::Otp) => {
                match self.otp.verify(&username, &code).await {
                    Ok(()) => Ok(MfaOutcome::Authenticated {
                        identifier: username,
                    }),
                    Err(e) if e.is_credential_failure() => {
                        // 不区分未请求/过期/已消费/输错
                        Ok(MfaOutcome::Rejected(MfaRejection::InvalidSecondFactor))
                    }
                    Err(e) => Err(e),
                }
            }

            // 第二步：Magic Link（仅在策略要求 Magic Link 时可用）
            (MfaStep::MagicLink { payload }, SecondFactor::MagicLink { .. }) => {
                match self.magic_links.verify(&payload).await {
                    Ok(identifier) => Ok(MfaOutcome::Authenticated { identifier }),
                    Err(e) if e.is_credential_failure() => {
                        Ok(MfaOutcome::Rejected(MfaRejection::InvalidSecondFactor))
                    }
                    Err(e) => Err(e),
                }
            }

            // 步骤与策略不匹配
            _ => Ok(MfaOutcome::Rejected(MfaRejection::InsufficientData)),
        }
    }

    /// 密码通过后按策略签发第二因子挑战
    async fn issue_challenge(
        &self,
        username: &str,
        second_factor: &SecondFactor,
    ) -> Result<MfaOutcome> {
        match second_factor {
            SecondFactor::None => Ok(MfaOutcome::Authenticated {
                identifier: username.to_string(),
            }),
            SecondFactor::Otp => {
                let otp = self.otp.generate(username).await?;
                Ok(MfaOutcome::Pending(MfaChallenge::Otp {
                    code: otp.code,
                    expires_at: otp.expires_at,
                }))
            }
            SecondFactor::MagicLink { base_url } => {
                let link = self.magic_links.generate(username, base_url).await?;
                Ok(MfaOutcome::Pending(MfaChallenge::MagicLink {
                    url: link.url,
                    expires_at: link.expires_at,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::PasswordConfig;
    use crate::passwordless::{MagicLinkConfig, OtpConfig};
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    const BASE_URL: &str = "https://example.com/auth/magic";

    fn orchestrator() -> MfaOrchestrator {
        let storage = Arc::new(MemoryStorage::new());
        let passwords = PasswordAuthenticator::new(storage.clone(), PasswordConfig::default());
        let otp = OtpManager::new(storage.clone(), OtpConfig::default());
        let links =
            MagicLinkManager::new(storage, &[42u8; 32], MagicLinkConfig::default()).unwrap();
        MfaOrchestrator::new(passwords, otp, links)
    }

    async fn with_user(username: &str, password: &str) -> MfaOrchestrator {
        let mfa = orchestrator();
        mfa.passwords.register(username, password).await.unwrap();
        mfa
    }

    #[tokio::test]
    async fn test_password_only_policy() {
        let mfa = with_user("alice", "pw").await;

        let outcome = mfa
            .step(MfaStep::password("alice", "pw"), &MfaPolicy::password_only())
            .await
            .unwrap();
        assert!(outcome.is_authenticated());
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let mfa = with_user("alice", "pw").await;

        let outcome = mfa
            .step(
                MfaStep::password("alice", "wrong"),
                &MfaPolicy::password_only(),
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MfaOutcome::Rejected(MfaRejection::InvalidPassword)
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_looks_like_wrong_password() {
        let mfa = orchestrator();

        let outcome = mfa
            .step(
                MfaStep::password("ghost", "pw"),
                &MfaPolicy::password_only(),
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MfaOutcome::Rejected(MfaRejection::InvalidPassword)
        ));
    }

    #[tokio::test]
    async fn test_full_otp_flow() {
        let mfa = with_user("alice", "pw").await;
        let policy = MfaPolicy::with_otp();

        let outcome = mfa
            .step(MfaStep::password("alice", "pw"), &policy)
            .await
            .unwrap();
        let code = match outcome {
            MfaOutcome::Pending(MfaChallenge::Otp { code, .. }) => {
                assert_eq!(code.len(), 6);
                assert!(code.chars().all(|c| c.is_ascii_digit()));
                code
            }
            other => panic!("expected OTP challenge, got {:?}", other),
        };

        let outcome = mfa.step(MfaStep::otp("alice", &code), &policy).await.unwrap();
        match outcome {
            MfaOutcome::Authenticated { identifier } => assert_eq!(identifier, "alice"),
            other => panic!("expected authenticated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_magic_link_flow() {
        let mfa = with_user("alice", "pw").await;
        let policy = MfaPolicy::with_magic_link(BASE_URL);

        let outcome = mfa
            .step(MfaStep::password("alice", "pw"), &policy)
            .await
            .unwrap();
        let url = match outcome {
            MfaOutcome::Pending(MfaChallenge::MagicLink { url, .. }) => url,
            other => panic!("expected link challenge, got {:?}", other),
        };
        let payload = url.split("token=").nth(1).unwrap();

        let outcome = mfa
            .step(MfaStep::magic_link(payload), &policy)
            .await
            .unwrap();
        assert!(outcome.is_authenticated());
    }

    #[tokio::test]
    async fn test_wrong_otp_rejected_and_retryable() {
        let mfa = with_user("alice", "pw").await;
        let policy = MfaPolicy::with_otp();

        let outcome = mfa
            .step(MfaStep::password("alice", "pw"), &policy)
            .await
            .unwrap();
        let code = match outcome {
            MfaOutcome::Pending(MfaChallenge::Otp { code, .. }) => code,
            other => panic!("unexpected: {:?}", other),
        };

        // 输错：拒绝，但验证码保留
        let outcome = mfa
            .step(MfaStep::otp("alice", "000000"), &policy)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MfaOutcome::Rejected(MfaRejection::InvalidSecondFactor)
        ));

        // 重试同一步骤成功
        let outcome = mfa.step(MfaStep::otp("alice", &code), &policy).await.unwrap();
        assert!(outcome.is_authenticated());
    }

    #[tokio::test]
    async fn test_otp_without_password_first() {
        let mfa = with_user("alice", "pw").await;

        // 从未生成过 OTP：拒绝（不泄露具体原因）
        let outcome = mfa
            .step(MfaStep::otp("alice", "123456"), &MfaPolicy::with_otp())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MfaOutcome::Rejected(MfaRejection::InvalidSecondFactor)
        ));
    }

    #[tokio::test]
    async fn test_step_policy_mismatch_is_insufficient_data() {
        let mfa = with_user("alice", "pw").await;

        // 策略要求 Magic Link，却提交了 OTP 步骤
        let outcome = mfa
            .step(
                MfaStep::otp("alice", "123456"),
                &MfaPolicy::with_magic_link(BASE_URL),
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MfaOutcome::Rejected(MfaRejection::InsufficientData)
        ));

        // 策略仅密码，却提交了 OTP 步骤
        let outcome = mfa
            .step(MfaStep::otp("alice", "123456"), &MfaPolicy::password_only())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MfaOutcome::Rejected(MfaRejection::InsufficientData)
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_password_step() {
        let mfa = with_user("bob", "pw").await;
        let policy = MfaPolicy::password_only();

        for _ in 0..5 {
            mfa.step(MfaStep::password("bob", "wrong"), &policy)
                .await
                .unwrap();
        }

        let outcome = mfa
            .step(MfaStep::password("bob", "pw"), &policy)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MfaOutcome::Rejected(MfaRejection::TooManyAttempts { .. })
        ));
    }

    #[tokio::test]
    async fn test_used_otp_cannot_authenticate_twice() {
        let mfa = with_user("alice", "pw").await;
        let policy = MfaPolicy::with_otp();

        let code = match mfa
            .step(MfaStep::password("alice", "pw"), &policy)
            .await
            .unwrap()
        {
            MfaOutcome::Pending(MfaChallenge::Otp { code, .. }) => code,
            other => panic!("unexpected: {:?}", other),
        };

        assert!(mfa
            .step(MfaStep::otp("alice", &code), &policy)
            .await
            .unwrap()
            .is_authenticated());

        // 已消费：重放被拒绝
        let outcome = mfa.step(MfaStep::otp("alice", &code), &policy).await.unwrap();
        assert!(matches!(
            outcome,
            MfaOutcome::Rejected(MfaRejection::InvalidSecondFactor)
        ));
    }

    #[tokio::test]
    async fn test_rejection_messages_are_generic() {
        assert_eq!(MfaRejection::InvalidPassword.to_string(), "Invalid password");
        assert_eq!(
            MfaRejection::InvalidSecondFactor.to_string(),
            "Invalid or expired second factor"
        );
        assert_eq!(
            MfaRejection::InsufficientData.to_string(),
            "Insufficient authentication data"
        );
    }
}
