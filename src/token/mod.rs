//! Token 与会话模块
//!
//! 两种互补的会话形态：
//!
//! - [`TokenManager`]：无状态 JWT（访问/刷新双令牌），签发是纯函数，
//!   撤销通过存储中的指纹集合实现
//! - [`SessionStore`]：服务端显式会话记录，由调用方管理生命周期
//!
//! ## 撤销优先
//!
//! 验证时先查撤销集合再验签名：签名仍然有效但已被撤销的 token
//! 永远不会被接受。

pub mod jwt;
pub mod session;

pub use jwt::{Claims, TokenConfig, TokenManager};
pub use session::{SessionRecord, SessionStore};
