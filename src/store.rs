//! 通用的时间受限单次使用凭证存储
//!
//! [`CredentialStore`] 把一个 [`StorageAdapter`](crate::storage::StorageAdapter)
//! 命名空间包装成带过期语义的类型化存储，是 OTP 与 Magic Link 存储的共同
//! 底层。
//!
//! ## 语义
//!
//! - `put` 为 last-write-wins：同一个键的旧记录被新记录静默替换
//! - `take` 原子地读取并删除；已过期的记录视同不存在，且作为副作用被清除
//! - 惰性过期：没有后台清扫线程，任何一次读到过期记录都会报告缺失并物理
//!   清除，过期记录不可能被复活
//! - 记录在 `now >= expires_at` 的瞬间即视为过期（恰好到期即失效）
//! - 缺失（首次使用、已消费、已过期）是正常结果，不是系统故障

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, StorageError};
use crate::storage::{Namespace, StorageAdapter};

/// 带过期时间的存储信封
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// 读取结果
///
/// `Expired` 仅在本次读取恰好撞见过期记录时出现；记录随之被清除，
/// 之后的读取报告 `Missing`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// 记录存在且未过期
    Live(T),
    /// 记录存在但已过期（已被清除）
    Expired,
    /// 记录不存在
    Missing,
}

impl<T> Lookup<T> {
    /// 是否为存活记录
    pub fn is_live(&self) -> bool {
        matches!(self, Lookup::Live(_))
    }
}

/// 通用的过期、单次使用凭证存储
///
/// 以标识符为键存储任意可序列化的值，值在指定的 TTL 之后逻辑消失。
pub struct CredentialStore<T> {
    adapter: Arc<dyn StorageAdapter>,
    namespace: Namespace,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CredentialStore<T> {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
            namespace: self.namespace,
            _marker: PhantomData,
        }
    }
}

impl<T> CredentialStore<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    /// 在指定命名空间上创建存储
    pub fn new(adapter: Arc<dyn StorageAdapter>, namespace: Namespace) -> Self {
        Self {
            adapter,
            namespace,
            _marker: PhantomData,
        }
    }

    /// 写入记录，`ttl` 之后过期（last-write-wins）
    pub async fn put(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let expires_at = Utc::now() + ChronoDuration::milliseconds(ttl.as_millis() as i64);
        self.put_until(key, value, expires_at).await
    }

    /// 写入记录并指定绝对过期时间
    pub async fn put_until(&self, key: &str, value: &T, expires_at: DateTime<Utc>) -> Result<()> {
        let envelope = Envelope {
            value: serde_json::to_value(value).map_err(|e| {
                StorageError::OperationFailed(format!("failed to serialize record: {}", e))
            })?,
            expires_at,
        };
        let raw = serde_json::to_value(&envelope).map_err(|e| {
            StorageError::OperationFailed(format!("failed to serialize envelope: {}", e))
        })?;
        let ttl = (expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.adapter
            .set(self.namespace, key, raw, Some(ttl))
            .await
    }

    /// 原子地读取并删除记录
    ///
    /// 并发调用同一个键时至多一个调用者得到 `Live`，其余得到 `Missing`。
    /// 取出的记录若已过期则报告 `Expired`（此时记录已被删除，不会复活）。
    pub async fn take(&self, key: &str) -> Result<Lookup<T>> {
        match self.adapter.take(self.namespace, key).await? {
            Some(raw) => Ok(Self::unwrap_envelope(raw)?),
            None => Ok(Lookup::Missing),
        }
    }

    /// 读取记录但不消费存活的记录
    ///
    /// 惰性过期：读到过期记录时将其清除并报告 `Expired`。
    pub async fn get(&self, key: &str) -> Result<Lookup<T>> {
        match self.adapter.get(self.namespace, key).await? {
            Some(raw) => {
                let lookup = Self::unwrap_envelope(raw)?;
                if matches!(lookup, Lookup::Expired) {
                    self.adapter.delete(self.namespace, key).await?;
                }
                Ok(lookup)
            }
            None => Ok(Lookup::Missing),
        }
    }

    /// 删除记录（幂等）
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.adapter.delete(self.namespace, key).await
    }

    fn unwrap_envelope(raw: serde_json::Value) -> Result<Lookup<T>> {
        let envelope: Envelope<serde_json::Value> = serde_json::from_value(raw).map_err(|e| {
            StorageError::OperationFailed(format!("corrupt stored record: {}", e))
        })?;
        if Utc::now() >= envelope.expires_at {
            return Ok(Lookup::Expired);
        }
        let value: T = serde_json::from_value(envelope.value).map_err(|e| {
            StorageError::OperationFailed(format!("corrupt stored record: {}", e))
        })?;
        Ok(Lookup::Live(value))
    }
}
