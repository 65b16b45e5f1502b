//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! ログフィールドの命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.coupon_id`: 対象クーポン ID
/// - `event.run_id`: 配信ラン ID
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const DISPATCH: &str = "dispatch";
        pub const ROSTER: &str = "roster";
        pub const AUTH: &str = "auth";
    }

    /// イベントアクション
    pub mod action {
        // 配信
        pub const COUPON_EMAIL_SENT: &str = "coupon_email.sent";
        pub const COUPON_EMAIL_FAILED: &str = "coupon_email.failed";
        pub const DISPATCH_COMPLETED: &str = "dispatch.completed";
        pub const DISPATCH_ABORTED: &str = "dispatch.aborted";

        // 名簿
        pub const ROSTER_LOADED: &str = "roster.loaded";
        pub const ROSTER_LOAD_FAILED: &str = "roster.load_failed";

        // 認証
        pub const TOKEN_REFRESHED: &str = "auth.token_refreshed";
        pub const TOKEN_REFRESH_FAILED: &str = "auth.token_refresh_failed";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// 外部サービス呼び出し（クーポン管理 API、認証 API）
        pub const EXTERNAL_SERVICE: &str = "external_service";
        /// 内部処理（テンプレートレンダリングなど）
        pub const INTERNAL: &str = "internal";
    }

    /// エラー種別
    pub mod kind {
        pub const CREDENTIAL_EXPIRED: &str = "credential_expired";
        pub const SERVICE_COMMUNICATION: &str = "service_communication";
        pub const TEMPLATE: &str = "template";
    }
}
