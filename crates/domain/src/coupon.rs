//! # クーポン
//!
//! 案内メールの対象となるクーポン（オファー）を定義する。
//!
//! クーポンは呼び出し側が所有し、配信処理には読み取り専用で渡される。
//! 配信ラン開始時に一度だけ複製され、ラン中の変更は反映されない。

use chrono::NaiveDate;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// クーポン ID
///
/// 管理 API のパス（`/coupons/{id}/...`）と配信リクエストの `couponId` に使われる。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct CouponId(i64);

impl CouponId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

define_validated_string! {
    /// クーポン名（値オブジェクト）
    ///
    /// メール件名・本文の見出しに使用する。最大 100 文字。
    pub struct CouponName {
        label: "クーポン名",
        max_length: 100,
    }
}

/// 割引内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Discount {
    /// 定率割引（パーセント）
    Rate(u8),
    /// 定額割引（円）
    Amount(u64),
}

impl std::fmt::Display for Discount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discount::Rate(rate) => write!(f, "{rate}% OFF"),
            Discount::Amount(amount) => write!(f, "{amount}円 OFF"),
        }
    }
}

/// クーポン（案内対象のオファー）
///
/// 通知本文のレンダリングに必要なフィールドを持つ。
/// CLI では JSON ファイル（camelCase）から読み込む。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id:          CouponId,
    pub name:        CouponName,
    pub discount:    Discount,
    #[serde(default)]
    pub expires_on:  Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}
