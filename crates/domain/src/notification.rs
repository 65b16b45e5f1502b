//! # 通知
//!
//! 案内メールの生成に関するエラーを定義する。

use thiserror::Error;

/// 通知生成エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),
}
