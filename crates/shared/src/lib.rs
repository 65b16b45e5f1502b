//! # CouponMail 共有ユーティリティ
//!
//! 管理ツール・ドメイン層・インフラ層で共通して使うユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - ビジネスロジックを含まない純粋なユーティリティのみを配置
//! - 外部クレートへの依存は feature で切り替え、最小限に抑える

pub mod event_log;
pub mod observability;
