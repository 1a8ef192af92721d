//! 服务端会话记录
//!
//! 与无状态 JWT 互补的显式会话：调用方自己生成会话 ID（通常是随机
//! token），数据以 JSON 值整体存取。核心不做隐式过期，生命周期完全
//! 由调用方的 `create`/`destroy` 决定。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Result, StorageError};
use crate::storage::{Namespace, StorageAdapter};

/// 会话记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// 会话数据
    pub data: Value,

    /// 创建时间
    pub created_at: DateTime<Utc>,
}

/// 会话存储
#[derive(Clone)]
pub struct SessionStore {
    adapter: Arc<dyn StorageAdapter>,
}

impl SessionStore {
    /// 创建会话存储
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }

    /// 创建或覆盖会话（last-write-wins）
    pub async fn create(&self, id: &str, data: Value) -> Result<()> {
        let record = SessionRecord {
            data,
            created_at: Utc::now(),
        };
        let raw = serde_json::to_value(&record).map_err(|e| {
            StorageError::OperationFailed(format!("failed to serialize session: {}", e))
        })?;
        self.adapter.set(Namespace::Session, id, raw, None).await
    }

    /// 读取会话；不存在返回 `None` 而非错误
    pub async fn get(&self, id: &str) -> Result<Option<SessionRecord>> {
        match self.adapter.get(Namespace::Session, id).await? {
            Some(raw) => {
                let record = serde_json::from_value(raw).map_err(|e| {
                    StorageError::OperationFailed(format!("corrupt session record: {}", e))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// 销毁会话（对不存在的会话同样成功）
    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.adapter.delete(Namespace::Session, id).await
    }
}
