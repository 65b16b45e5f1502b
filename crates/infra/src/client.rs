//! # 外部 API クライアント
//!
//! クーポン管理 API と認証 API との通信を担当する。

pub mod auth_api;
pub mod coupon_api;
mod error;
mod response;

pub use auth_api::{TokenRefreshClient, TokenRefreshClientImpl};
pub use coupon_api::{CouponAdminClient, CouponAdminClientImpl, MemberDto};
pub use error::{AuthApiError, CouponApiError};
