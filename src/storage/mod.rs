//! 存储契约模块
//!
//! 定义所有凭证组件共用的存储契约（§外部接口），以及默认的内存实现。
//!
//! ## 设计原则
//!
//! - 所有可变状态都通过 [`StorageAdapter`] 访问，核心不持有进程级全局可变状态
//! - `get` 在 `delete` 之后必须返回空；`set` 为 last-write-wins
//! - 后端不要求自行强制 TTL（核心按记录中的过期字段惰性判定），但后端可以
//!   将 TTL 作为服务端优化来实现，前提是绝不复活已删除的键
//! - 单次使用凭证的「恰好一次消费」依赖 [`StorageAdapter::take`] 的原子性
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use smartauth::storage::{MemoryStorage, Namespace, StorageAdapter};
//! use serde_json::json;
//!
//! let storage = MemoryStorage::new();
//! storage.set(Namespace::User, "alice", json!({"active": true}), None).await.unwrap();
//!
//! let record = storage.get(Namespace::User, "alice").await.unwrap();
//! assert!(record.is_some());
//!
//! storage.delete(Namespace::User, "alice").await.unwrap();
//! assert!(storage.get(Namespace::User, "alice").await.unwrap().is_none());
//! # });
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{Error, Result};

/// 存储命名空间
///
/// 每类凭证记录独占一个命名空间；持久化后端通常将其映射为键前缀、
/// 表名或集合名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// 用户密码记录
    User,
    /// 服务端会话与撤销集合
    Session,
    /// 一次性验证码
    Otp,
    /// Magic Link token
    MagicLink,
}

impl Namespace {
    /// 返回命名空间的规范字符串形式（用作后端键前缀）
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::User => "user",
            Namespace::Session => "session",
            Namespace::Otp => "otp",
            Namespace::MagicLink => "magiclink",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 存储适配器接口
///
/// 实现此 trait 以提供自定义的存储后端（文档型数据库、关系型数据库、
/// 键值缓存等）。所有后端必须满足相同语义：`get` 在 `delete` 之后返回
/// 空，`set` 为 last-write-wins。
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// 读取记录，不存在时返回 `None`
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>>;

    /// 写入记录（last-write-wins）
    ///
    /// `ttl` 是给后端的过期提示；后端可以忽略它，核心始终按记录内的
    /// 过期字段惰性判定。
    async fn set(
        &self,
        namespace: Namespace,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// 删除记录（幂等）
    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()>;

    /// 原子地读取并删除记录
    ///
    /// 同一个键上的并发 `take` 至多只有一个调用得到记录，其余得到
    /// `None`。默认实现是非原子的 get-then-delete，仅作为保底；拥有
    /// 原子删除原语的后端（进程内锁、`GETDEL`、`DELETE ... RETURNING`）
    /// 必须覆盖此方法。
    async fn take(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        match self.get(namespace, key).await? {
            Some(value) => {
                self.delete(namespace, key).await?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// 内存存储实现
///
/// 适用于单实例部署或测试环境。显式构造、显式清理，绝非单例；
/// 多实例部署需要共享后端（由外部适配器提供）。
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: Arc<RwLock<HashMap<(Namespace, String), Value>>>,
}

impl MemoryStorage {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空全部记录
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }

    /// 当前存储的记录总数
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        Ok(records.get(&(namespace, key.to_string())).cloned())
    }

    async fn set(
        &self,
        namespace: Namespace,
        key: &str,
        value: Value,
        _ttl: Option<Duration>,
    ) -> Result<()> {
        // TTL 提示被忽略：过期由核心按记录字段惰性判定
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        records.insert((namespace, key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        records.remove(&(namespace, key.to_string()));
        Ok(())
    }

    async fn take(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        // 单个写锁内完成读取与删除，保证恰好一次消费
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        Ok(records.remove(&(namespace, key.to_string())))
    }
}
