//! # 配信ラン
//!
//! 一括配信 1 回分の一時的な状態と、受信者ごとの配信リクエストを定義する。
//!
//! ## 状態遷移
//!
//! ```text
//! Idle ──▶ Running ──┬──▶ Completed
//!                    └──▶ Aborted
//! ```
//!
//! `Running` 中に新しいランは開始できない。終端状態（`Completed` / `Aborted`）
//! からは次のランを開始できる。
//!
//! [`DispatchRun`] は配信開始時に作られ、完了・中断・ダイアログを閉じた時点で破棄される。
//! 永続化はしない。

use serde::Serialize;
use strum::IntoStaticStr;

use crate::{coupon::CouponId, recipient::EmailAddress};

define_uuid_id! {
    /// 配信ラン ID
    ///
    /// ログ上で同じランの送信イベントを紐付けるために使う。
    pub struct DispatchRunId;
}

/// 配信ランのフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DispatchPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Aborted,
}

/// 配信ランの進捗
///
/// `progress_percent = completed / total * 100`。`total > 0` の間のみ定義される。
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRun {
    id:          DispatchRunId,
    total:       usize,
    completed:   usize,
    in_progress: bool,
}

impl DispatchRun {
    /// 新しいランを開始する
    pub fn start(total: usize) -> Self {
        Self {
            id: DispatchRunId::new(),
            total,
            completed: 0,
            in_progress: true,
        }
    }

    pub fn id(&self) -> DispatchRunId {
        self.id
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// 1 件の配信成功を記録し、更新後の進捗率を返す
    pub fn record_delivery(&mut self) -> Option<f64> {
        if self.completed < self.total {
            self.completed += 1;
        }
        self.progress_percent()
    }

    /// 進捗率（0〜100）
    pub fn progress_percent(&self) -> Option<f64> {
        (self.total > 0).then(|| self.completed as f64 / self.total as f64 * 100.0)
    }

    pub fn finish(&mut self) {
        self.in_progress = false;
    }
}

/// 配信リクエスト
///
/// 受信者ごとに送信直前に組み立てる。バッチ全体で事前計算はしない。
/// `POST /coupons/email` のリクエストボディになる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    pub coupon_id: CouponId,
    pub address:   EmailAddress,
    pub template:  String,
}
