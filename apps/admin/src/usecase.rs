//! # ユースケース
//!
//! - [`roster`] - 案内対象会員の名簿取得
//! - [`auth_refresh`] - 認証切れ時のトークン再発行と回復方針
//! - [`template_renderer`] - tera による案内メール本文の生成
//! - [`dispatcher`] - 選択された受信者への逐次配信
//! - [`workflow`] - 配信ダイアログ全体の状態管理

pub mod auth_refresh;
pub mod dispatcher;
pub mod roster;
pub mod template_renderer;
pub mod workflow;

pub use auth_refresh::{AuthRefreshPolicy, Recovery, RefreshError};
pub use dispatcher::{
    AbortReason,
    BatchDispatcher,
    DeliveryError,
    DispatchError,
    DispatchOutcome,
    DispatchProgress,
};
pub use roster::RosterLoader;
pub use template_renderer::TemplateRenderer;
pub use workflow::{CouponEmailWorkflow, LoadOutcome, WorkflowError, WorkflowEvent};
