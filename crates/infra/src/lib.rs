//! # CouponMail インフラ層
//!
//! 外部システムとの通信とプロセス全体で共有する認証状態を担当する。
//!
//! ## 責務
//!
//! - **クーポン管理 API クライアント**: 名簿取得と案内メール送信（[`client::coupon_api`]）
//! - **認証 API クライアント**: アクセストークンの再発行（[`client::auth_api`]）
//! - **認証情報ストア**: Bearer トークンを保持するプロセス全体のセッション状態（[`credentials`]）
//!
//! ## 依存関係
//!
//! ```text
//! admin → infra → domain
//! ```
//!
//! ## テスト用モック
//!
//! `test-utils` feature を有効にすると [`mock`] モジュールが公開される。

pub mod client;
pub mod credentials;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::{
    AuthApiError,
    CouponAdminClient,
    CouponAdminClientImpl,
    CouponApiError,
    MemberDto,
    TokenRefreshClient,
    TokenRefreshClientImpl,
};
pub use credentials::CredentialStore;
