//! 安全防护模块
//!
//! 提供防暴力破解的速率限制实现。

pub mod rate_limit;

pub use rate_limit::{
    InMemorySlidingWindowStore, RateLimitConfig, RateLimitInfo, RateLimitStore, RateLimiter,
};
