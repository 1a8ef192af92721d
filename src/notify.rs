//! 通知投递协作方
//!
//! 凭证模块只负责生成验证码/链接，实际投递通过 [`Notifier`] 接口交给
//! 应用层：Ok 表示已接受投递，不保证送达。附带一个把 `{{var}}` 替换
//! 成变量值的极简模板渲染器和一个开发用的 [`ConsoleNotifier`]。

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

/// 通知投递接口
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 发送邮件；`template` 经 [`render_template`] 渲染后作为正文
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        vars: &HashMap<String, String>,
    ) -> Result<()>;

    /// 发送短信
    async fn send_sms(
        &self,
        to: &str,
        template: &str,
        vars: &HashMap<String, String>,
    ) -> Result<()>;
}

/// 渲染 `{{var}}` 模板
///
/// 占位符两侧允许空白（`{{ code }}`）；未提供的变量渲染为空字符串；
/// 未闭合的 `{{` 按字面输出。
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                if let Some(value) = vars.get(name) {
                    output.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

/// 打印到标准输出的开发用通知器
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// 创建控制台通知器
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        vars: &HashMap<String, String>,
    ) -> Result<()> {
        println!(
            "[email] to={} subject={}\n{}",
            to,
            subject,
            render_template(template, vars)
        );
        Ok(())
    }

    async fn send_sms(
        &self,
        to: &str,
        template: &str,
        vars: &HashMap<String, String>,
    ) -> Result<()> {
        println!("[sms] to={}\n{}", to, render_template(template, vars));
        Ok(())
    }
}
