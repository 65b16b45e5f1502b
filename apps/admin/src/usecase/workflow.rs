//! # 案内メール配信ワークフロー
//!
//! クーポン 1 件分の配信ダイアログの状態を管理する。
//! 名簿・選択台帳・直近のエラーを保持し、画面（CLI）への通知は
//! [`WorkflowEvent`] としてチャネルに流す。
//!
//! ## フロー
//!
//! ```text
//! present ──▶ 名簿取得 ──▶ 選択 ──▶ dispatch ──┬──▶ Completed ──▶ close
//!                 ▲                              ├──▶ Error（台帳はそのまま）
//!                 │                              └──▶ RestartRequired
//!                 └──────────── restart ◀────────────────┘
//! ```
//!
//! `dispatch` は `&mut self` を取るため、配信中に台帳を変更することはできない。

use std::sync::Arc;

use couponmail_domain::{
    coupon::{Coupon, CouponId},
    dispatch::DispatchPhase,
    recipient::{EmailAddress, Roster},
    selection::SelectionLedger,
};
use couponmail_infra::CouponApiError;
use couponmail_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use super::{
    AbortReason,
    AuthRefreshPolicy,
    BatchDispatcher,
    DispatchError,
    DispatchOutcome,
    DispatchProgress,
    Recovery,
    RosterLoader,
};

/// 画面に通知するイベント
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    RosterLoaded {
        count: usize,
    },
    Progress {
        completed: usize,
        total:     usize,
        percent:   f64,
    },
    Completed {
        delivered: usize,
    },
    Error {
        message: String,
    },
    /// 認証を再発行した。`restart` を呼び出す必要がある
    RestartRequired,
    /// ダイアログを閉じる
    CloseRequested,
}

impl From<DispatchProgress> for WorkflowEvent {
    fn from(progress: DispatchProgress) -> Self {
        WorkflowEvent::Progress {
            completed: progress.completed,
            total:     progress.total,
            percent:   progress.percent,
        }
    }
}

/// 名簿取得の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    RestartRequired,
    Failed(CouponApiError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("クーポンが選択されていません")]
    NotPresented,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// 案内メール配信ワークフロー
pub struct CouponEmailWorkflow {
    roster_loader:  RosterLoader,
    dispatcher:     Arc<BatchDispatcher>,
    refresh_policy: Arc<AuthRefreshPolicy>,
    events:         UnboundedSender<WorkflowEvent>,
    coupon:         Option<Coupon>,
    roster:         Roster,
    selection:      SelectionLedger,
    last_error:     Option<String>,
}

impl CouponEmailWorkflow {
    pub fn new(
        roster_loader: RosterLoader,
        dispatcher: Arc<BatchDispatcher>,
        refresh_policy: Arc<AuthRefreshPolicy>,
        events: UnboundedSender<WorkflowEvent>,
    ) -> Self {
        Self {
            roster_loader,
            dispatcher,
            refresh_policy,
            events,
            coupon: None,
            roster: Roster::empty(),
            selection: SelectionLedger::new(),
            last_error: None,
        }
    }

    /// クーポンを表示し、名簿を取得する
    pub async fn present(&mut self, coupon: Coupon) -> LoadOutcome {
        let coupon_id = coupon.id;
        self.coupon = Some(coupon);
        self.last_error = None;
        self.load_roster(coupon_id, true).await
    }

    /// 現在のクーポンの名簿を取り直す（選択はリセットされる）
    pub async fn reload(&mut self) -> Result<LoadOutcome, WorkflowError> {
        let coupon_id = self.current_coupon_id()?;
        Ok(self.load_roster(coupon_id, true).await)
    }

    /// 認証更新後にワークフローを最初からやり直す
    ///
    /// 選択・エラー・進捗を破棄して名簿を取り直す。ここでの失敗は
    /// 再発行を試みずにそのまま表示する。
    pub async fn restart(&mut self) -> Result<LoadOutcome, WorkflowError> {
        let coupon_id = self.current_coupon_id()?;
        self.last_error = None;
        self.dispatcher.reset();
        Ok(self.load_roster(coupon_id, false).await)
    }

    fn current_coupon_id(&self) -> Result<CouponId, WorkflowError> {
        self.coupon
            .as_ref()
            .map(|c| c.id)
            .ok_or(WorkflowError::NotPresented)
    }

    async fn load_roster(&mut self, coupon_id: CouponId, allow_refresh: bool) -> LoadOutcome {
        self.selection.clear();
        self.roster = Roster::empty();

        match self.roster_loader.load(coupon_id).await {
            Ok(roster) => {
                let count = roster.len();
                self.roster = roster;
                log_business_event!(
                    event.category = event::category::ROSTER,
                    event.action = event::action::ROSTER_LOADED,
                    event.result = event::result::SUCCESS,
                    event.coupon_id = %coupon_id,
                    roster.count = count,
                    "名簿を読み込み"
                );
                self.emit(WorkflowEvent::RosterLoaded { count });
                LoadOutcome::Loaded { count }
            }
            Err(e) => {
                let kind = if e.is_credential_expired() {
                    log_error::kind::CREDENTIAL_EXPIRED
                } else {
                    log_error::kind::SERVICE_COMMUNICATION
                };
                log_business_event!(
                    event.category = event::category::ROSTER,
                    event.action = event::action::ROSTER_LOAD_FAILED,
                    event.result = event::result::FAILURE,
                    event.coupon_id = %coupon_id,
                    error.category = log_error::category::EXTERNAL_SERVICE,
                    error.kind = kind,
                    error = %e,
                    "名簿の読み込みに失敗"
                );

                if allow_refresh && self.refresh_policy.recover(&e).await == Recovery::Restart {
                    self.emit(WorkflowEvent::RestartRequired);
                    return LoadOutcome::RestartRequired;
                }

                self.fail(format!("会員一覧の取得に失敗しました: {e}"));
                LoadOutcome::Failed(e)
            }
        }
    }

    /// 名簿内のアドレスの選択を切り替える
    ///
    /// 名簿にないアドレスと配信中の操作は無視し、`false` を返す。
    pub fn toggle(&mut self, address: &EmailAddress) -> bool {
        if !self.accepts_selection(address) {
            return false;
        }
        self.selection.toggle(address);
        true
    }

    /// 名簿内のアドレスを選択する（選択済みならそのまま）
    ///
    /// 宛先を明示的に指定する場合に使う。同じアドレスを何度指定しても外れない。
    pub fn select(&mut self, address: &EmailAddress) -> bool {
        if !self.accepts_selection(address) {
            return false;
        }
        self.selection.select(address);
        true
    }

    fn accepts_selection(&self, address: &EmailAddress) -> bool {
        if self.dispatcher.is_running() || !self.roster.contains(address) {
            tracing::debug!(%address, "選択の変更を無視");
            return false;
        }
        true
    }

    /// 名簿の全員を選択する
    pub fn select_all(&mut self) {
        if self.dispatcher.is_running() {
            return;
        }
        self.selection.select_all(self.roster.addresses());
    }

    pub fn clear_selection(&mut self) {
        if self.dispatcher.is_running() {
            return;
        }
        self.selection.clear();
    }

    /// 配信を開始できるか（選択があり、配信中でない）
    pub fn can_dispatch(&self) -> bool {
        !self.selection.is_empty() && !self.dispatcher.is_running()
    }

    /// 選択された受信者に配信する
    pub async fn dispatch(&mut self) -> Result<DispatchOutcome, WorkflowError> {
        let coupon = self.coupon.clone().ok_or(WorkflowError::NotPresented)?;
        let recipients = self.selection.resolve(&self.roster);

        self.last_error = None;
        let events = self.events.clone();
        let outcome = self
            .dispatcher
            .dispatch(&coupon, &recipients, move |progress| {
                let _ = events.send(progress.into());
            })
            .await?;

        match &outcome {
            DispatchOutcome::Completed { delivered } => {
                self.emit(WorkflowEvent::Completed {
                    delivered: *delivered,
                });
                self.emit(WorkflowEvent::CloseRequested);
                self.close();
            }
            DispatchOutcome::Aborted {
                reason: AbortReason::RestartRequired,
                ..
            } => {
                self.emit(WorkflowEvent::RestartRequired);
            }
            DispatchOutcome::Aborted {
                at,
                reason: AbortReason::Failed(error),
                ..
            } => {
                self.fail(format!("{at} への送信に失敗しました: {error}"));
            }
        }

        Ok(outcome)
    }

    /// ダイアログを閉じる（選択と配信状態を破棄する）
    pub fn close(&mut self) {
        self.selection.clear();
        self.last_error = None;
        self.dispatcher.reset();
    }

    pub fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn selection(&self) -> &SelectionLedger {
        &self.selection
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn phase(&self) -> DispatchPhase {
        self.dispatcher.phase()
    }

    /// 進捗率（配信中のみ）
    pub fn progress(&self) -> Option<f64> {
        self.dispatcher.progress().map(|p| p.percent)
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(%message, "ワークフローエラー");
        self.last_error = Some(message.clone());
        self.emit(WorkflowEvent::Error { message });
    }

    fn emit(&self, event: WorkflowEvent) {
        // 受信側がいなくなっていても処理は続ける
        let _ = self.events.send(event);
    }
}
