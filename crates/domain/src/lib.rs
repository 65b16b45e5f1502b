//! # CouponMail ドメイン層
//!
//! クーポン案内メール配信のドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **値オブジェクト**: メールアドレスやクーポン名は生成時に検証し、不正値を型で排除
//! - **I/O を持たない**: 名簿取得・送信・認証更新はインフラ層・ユースケース層の責務
//! - **ドメインエラー**: ビジネスルール違反は [`DomainError`] で表現
//!
//! ## 依存関係の方向
//!
//! ```text
//! admin → infra → domain
//!    ↘             ↑
//!      ────────────
//! ```
//!
//! ## モジュール構成
//!
//! - [`coupon`] - 案内対象のクーポン（オファー）
//! - [`recipient`] - 受信者と名簿
//! - [`selection`] - 配信対象の選択台帳
//! - [`dispatch`] - 配信ランの状態と配信リクエスト
//! - [`notification`] - テンプレート・送信まわりのエラー
//! - [`error`] - ドメインエラー

#[macro_use]
mod macros;

pub mod coupon;
pub mod dispatch;
pub mod error;
pub mod notification;
pub mod recipient;
pub mod selection;

pub use error::DomainError;
