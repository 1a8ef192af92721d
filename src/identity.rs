//! 外部身份归一化
//!
//! OAuth/OIDC 等外部身份提供方返回的资料结构各不相同，本模块把常见
//! 的 passport 风格资料压平成统一的 [`NormalizedProfile`]。归一化是
//! 纯函数，不访问网络或存储；策略适配器本身是调用方的事。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 归一化后的外部身份资料
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedProfile {
    /// 提供方内的用户 ID
    pub id: String,

    /// 提供方名称（如 `"google"`、`"github"`）
    pub provider: String,

    /// 展示名
    pub display_name: String,

    /// 主邮箱
    pub email: String,

    /// 头像 URL
    pub avatar: String,
}

/// 把原始资料 JSON 归一化
///
/// 容忍缺失字段：取不到的值落到空字符串。识别的形状：
///
/// - `id`：`id`（字符串或数字）
/// - `provider`：`provider`
/// - `display_name`：`displayName`，退回 `username`
/// - `email`：`emails[0].value`，退回顶层 `email`
/// - `avatar`：`photos[0].value`，退回顶层 `avatar`
pub fn normalize_profile(raw: &Value) -> NormalizedProfile {
    NormalizedProfile {
        id: string_or_number(raw.get("id")),
        provider: string_at(raw.get("provider")),
        display_name: first_of(&[raw.get("displayName"), raw.get("username")]),
        email: first_of(&[value_in_array(raw, "emails"), raw.get("email")]),
        avatar: first_of(&[value_in_array(raw, "photos"), raw.get("avatar")]),
    }
}

fn string_at(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_or_number(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// 取 `{field}[0].value`（passport 的 emails/photos 形状）
fn value_in_array<'a>(raw: &'a Value, field: &str) -> Option<&'a Value> {
    raw.get(field)?.as_array()?.first()?.get("value")
}

fn first_of(candidates: &[Option<&Value>]) -> String {
    candidates
        .iter()
        .filter_map(|v| v.and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}
