//! # CouponMail 管理ツール
//!
//! クーポンの案内メールを、選択した会員に 1 件ずつ配信する管理ツール。
//!
//! ## 構成
//!
//! ```text
//! ┌────────────┐  名簿取得   ┌──────────────────┐
//! │  Workflow  │───────────▶│ Coupon Admin API │
//! │ (ダイアログ) │  1件ずつ送信 │                  │
//! └────────────┘───────────▶└──────────────────┘
//!        │ 401
//!        ▼
//! ┌────────────┐  再発行     ┌──────────────────┐
//! │ AuthRefresh│───────────▶│     Auth API     │
//! └────────────┘            └──────────────────┘
//! ```
//!
//! ## モジュール構成
//!
//! - [`config`] - 環境変数からの設定読み込み
//! - [`app_builder`] - 依存関係の組み立て
//! - [`usecase`] - 名簿取得・選択・一括配信・認証更新のユースケース

pub mod app_builder;
pub mod config;
pub mod usecase;
