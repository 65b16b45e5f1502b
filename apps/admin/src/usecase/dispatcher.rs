//! # 一括配信
//!
//! 選択された受信者に、クーポン案内メールを 1 件ずつ順番に送信する。
//!
//! ## 設計方針
//!
//! - **逐次送信**: 送信リクエストは常に高々 1 件。前の送信が終わるまで次を始めない
//! - **固定ペーシング**: 送信成功ごとに短い待機（既定 50ms）を挟んでから次の受信者へ進む
//! - **初回失敗で中断**: 失敗した受信者以降は送信しない。個別リトライはしない
//! - **認証切れ**: [`AuthRefreshPolicy`] に回復方針を委ね、再発行できたら
//!   [`AbortReason::RestartRequired`] で中断する（途中再開はしない）
//! - **同時実行禁止**: 実行中に呼び出すと [`DispatchError::AlreadyRunning`]
//!
//! ラン終了時（完了・中断・Future の drop）には必ず実行中状態を解除する。

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use couponmail_domain::{
    coupon::Coupon,
    dispatch::{DeliveryRequest, DispatchPhase, DispatchRun, DispatchRunId},
    notification::NotificationError,
    recipient::{EmailAddress, Recipient},
};
use couponmail_infra::{CouponAdminClient, CouponApiError};
use couponmail_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};
use thiserror::Error;

use super::{AuthRefreshPolicy, Recovery, TemplateRenderer};

/// 送信間の既定ペーシング
pub const DEFAULT_PACING: Duration = Duration::from_millis(50);

/// 1 受信者分の配信失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Api(#[from] CouponApiError),

    #[error(transparent)]
    Template(#[from] NotificationError),
}

/// 中断理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// 認証を再発行した。ワークフローを最初からやり直す
    RestartRequired,
    /// 失敗をユーザーに表示する
    Failed(DeliveryError),
}

/// 配信結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed {
        delivered: usize,
    },
    Aborted {
        /// 失敗した受信者
        at:        EmailAddress,
        /// 中断までに送信できた件数
        delivered: usize,
        reason:    AbortReason,
    },
}

/// 配信を開始できない
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("配信対象が選択されていません")]
    EmptySelection,

    #[error("配信を実行中です")]
    AlreadyRunning,
}

/// 進捗通知
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchProgress {
    pub run_id:    DispatchRunId,
    pub completed: usize,
    pub total:     usize,
    pub percent:   f64,
}

#[derive(Debug, Default)]
struct DispatchStatus {
    phase: DispatchPhase,
    run:   Option<DispatchRun>,
}

/// 一括配信
pub struct BatchDispatcher {
    client:         Arc<dyn CouponAdminClient>,
    renderer:       Arc<TemplateRenderer>,
    refresh_policy: Arc<AuthRefreshPolicy>,
    pacing:         Duration,
    status:         Mutex<DispatchStatus>,
}

impl BatchDispatcher {
    pub fn new(
        client: Arc<dyn CouponAdminClient>,
        renderer: Arc<TemplateRenderer>,
        refresh_policy: Arc<AuthRefreshPolicy>,
        pacing: Duration,
    ) -> Self {
        Self {
            client,
            renderer,
            refresh_policy,
            pacing,
            status: Mutex::new(DispatchStatus::default()),
        }
    }

    /// 現在のフェーズ
    pub fn phase(&self) -> DispatchPhase {
        self.lock_status().phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == DispatchPhase::Running
    }

    /// 実行中のランの進捗（実行中以外は `None`）
    pub fn progress(&self) -> Option<DispatchProgress> {
        self.lock_status().run.as_ref().and_then(progress_of)
    }

    /// 終端状態を破棄して `Idle` に戻す（ダイアログを閉じたとき）
    ///
    /// 実行中のランには影響しない。
    pub fn reset(&self) {
        let mut status = self.lock_status();
        if status.phase != DispatchPhase::Running {
            *status = DispatchStatus::default();
        }
    }

    /// 受信者に順番に案内メールを送信する
    ///
    /// クーポンはラン開始時に一度だけ複製し、以降の変更は反映しない。
    /// `on_progress` は送信成功のたびに呼ばれる。
    #[tracing::instrument(skip_all, fields(coupon_id = %coupon.id, total = recipients.len()))]
    pub async fn dispatch<F>(
        &self,
        coupon: &Coupon,
        recipients: &[Recipient],
        mut on_progress: F,
    ) -> Result<DispatchOutcome, DispatchError>
    where
        F: FnMut(DispatchProgress) + Send,
    {
        if recipients.is_empty() {
            return Err(DispatchError::EmptySelection);
        }

        let guard = self.begin(recipients.len())?;
        let coupon = coupon.clone();
        let run_id = guard.run_id;

        for (index, recipient) in recipients.iter().enumerate() {
            if let Err(error) = self.deliver(&coupon, recipient).await {
                let delivered = guard.completed();
                log_business_event!(
                    event.category = event::category::DISPATCH,
                    event.action = event::action::COUPON_EMAIL_FAILED,
                    event.result = event::result::FAILURE,
                    event.coupon_id = %coupon.id,
                    event.run_id = %run_id,
                    dispatch.recipient = %recipient.address(),
                    error.category = error_category(&error),
                    error.kind = error_kind(&error),
                    error = %error,
                    "案内メール送信失敗"
                );

                let reason = self.abort_reason(error).await;
                guard.finish(DispatchPhase::Aborted);

                log_business_event!(
                    event.category = event::category::DISPATCH,
                    event.action = event::action::DISPATCH_ABORTED,
                    event.result = event::result::FAILURE,
                    event.coupon_id = %coupon.id,
                    event.run_id = %run_id,
                    dispatch.delivered = delivered,
                    dispatch.total = recipients.len(),
                    dispatch.restart = matches!(reason, AbortReason::RestartRequired),
                    "一括配信を中断"
                );

                return Ok(DispatchOutcome::Aborted {
                    at: recipient.address().clone(),
                    delivered,
                    reason,
                });
            }

            log_business_event!(
                event.category = event::category::DISPATCH,
                event.action = event::action::COUPON_EMAIL_SENT,
                event.result = event::result::SUCCESS,
                event.coupon_id = %coupon.id,
                event.run_id = %run_id,
                dispatch.recipient = %recipient.address(),
                dispatch.position = index + 1,
                dispatch.total = recipients.len(),
                "案内メール送信成功"
            );
            if let Some(progress) = guard.record_delivery() {
                on_progress(progress);
            }

            if index + 1 < recipients.len() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        guard.finish(DispatchPhase::Completed);

        log_business_event!(
            event.category = event::category::DISPATCH,
            event.action = event::action::DISPATCH_COMPLETED,
            event.result = event::result::SUCCESS,
            event.coupon_id = %coupon.id,
            event.run_id = %run_id,
            dispatch.delivered = recipients.len(),
            "一括配信完了"
        );

        Ok(DispatchOutcome::Completed {
            delivered: recipients.len(),
        })
    }

    /// 1 受信者分のテンプレートを生成して送信する
    async fn deliver(&self, coupon: &Coupon, recipient: &Recipient) -> Result<(), DeliveryError> {
        let template = self.renderer.render(coupon, recipient)?;
        let request = DeliveryRequest {
            coupon_id: coupon.id,
            address: recipient.address().clone(),
            template,
        };

        self.client.send_coupon_email(&request).await?;
        Ok(())
    }

    async fn abort_reason(&self, error: DeliveryError) -> AbortReason {
        match &error {
            DeliveryError::Api(api_error) => match self.refresh_policy.recover(api_error).await {
                Recovery::Restart => AbortReason::RestartRequired,
                Recovery::Surface => AbortReason::Failed(error),
            },
            DeliveryError::Template(_) => AbortReason::Failed(error),
        }
    }

    fn begin(&self, total: usize) -> Result<RunGuard<'_>, DispatchError> {
        let mut status = self.lock_status();
        if status.phase == DispatchPhase::Running {
            return Err(DispatchError::AlreadyRunning);
        }

        let run = DispatchRun::start(total);
        let run_id = run.id();
        status.phase = DispatchPhase::Running;
        status.run = Some(run);

        Ok(RunGuard {
            status: &self.status,
            run_id,
            finished: false,
        })
    }

    fn lock_status(&self) -> MutexGuard<'_, DispatchStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn progress_of(run: &DispatchRun) -> Option<DispatchProgress> {
    run.progress_percent().map(|percent| DispatchProgress {
        run_id: run.id(),
        completed: run.completed(),
        total: run.total(),
        percent,
    })
}

fn error_category(error: &DeliveryError) -> &'static str {
    match error {
        DeliveryError::Api(_) => log_error::category::EXTERNAL_SERVICE,
        DeliveryError::Template(_) => log_error::category::INTERNAL,
    }
}

fn error_kind(error: &DeliveryError) -> &'static str {
    match error {
        DeliveryError::Api(e) if e.is_credential_expired() => log_error::kind::CREDENTIAL_EXPIRED,
        DeliveryError::Api(_) => log_error::kind::SERVICE_COMMUNICATION,
        DeliveryError::Template(_) => log_error::kind::TEMPLATE,
    }
}

/// 実行中のランを保持するガード
///
/// `finish` されずに drop された場合（Future のキャンセルなど）は `Idle` に戻す。
struct RunGuard<'a> {
    status:   &'a Mutex<DispatchStatus>,
    run_id:   DispatchRunId,
    finished: bool,
}

impl RunGuard<'_> {
    fn lock(&self) -> MutexGuard<'_, DispatchStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn completed(&self) -> usize {
        self.lock().run.as_ref().map_or(0, DispatchRun::completed)
    }

    fn record_delivery(&self) -> Option<DispatchProgress> {
        let mut status = self.lock();
        let run = status.run.as_mut()?;
        run.record_delivery();
        progress_of(run)
    }

    fn finish(mut self, phase: DispatchPhase) {
        let mut status = self.lock();
        if let Some(run) = status.run.as_mut() {
            run.finish();
        }
        status.phase = phase;
        status.run = None;
        drop(status);
        self.finished = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut status = self.lock();
            *status = DispatchStatus::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use couponmail_domain::{
        coupon::{CouponId, CouponName, Discount},
        recipient::Roster,
    };
    use couponmail_infra::{
        AuthApiError,
        CredentialStore,
        mock::{MockCouponAdminClient, MockTokenRefreshClient},
    };
    use pretty_assertions::assert_eq;

    use super::*;

    fn make_coupon() -> Coupon {
        Coupon {
            id:          CouponId::new(7),
            name:        CouponName::new("新規会員クーポン").unwrap(),
            discount:    Discount::Amount(1000),
            expires_on:  None,
            description: None,
        }
    }

    fn make_recipients(addresses: &[&str]) -> Vec<Recipient> {
        Roster::new(addresses.iter().map(|a| {
            Recipient::new(
                a.split('@').next().unwrap_or_default(),
                EmailAddress::new(*a).unwrap(),
            )
        }))
        .recipients()
        .to_vec()
    }

    fn make_dispatcher(
        client: &MockCouponAdminClient,
        refresh: MockTokenRefreshClient,
    ) -> BatchDispatcher {
        let credentials = CredentialStore::new(Some("token".to_string()), Some("refresh".to_string()));
        let policy = AuthRefreshPolicy::new(Arc::new(refresh), credentials);
        BatchDispatcher::new(
            Arc::new(client.clone()),
            Arc::new(TemplateRenderer::new().unwrap()),
            Arc::new(policy),
            Duration::ZERO,
        )
    }

    fn collect_progress() -> (Arc<StdMutex<Vec<f64>>>, impl FnMut(DispatchProgress) + Send) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |p: DispatchProgress| sink.lock().unwrap().push(p.percent))
    }

    #[tokio::test]
    async fn 全件成功すると進捗が単調増加して完了する() {
        let client = MockCouponAdminClient::new();
        let dispatcher = make_dispatcher(&client, MockTokenRefreshClient::succeeding("new"));
        let recipients = make_recipients(&["a@x.com", "b@x.com", "c@x.com", "d@x.com"]);
        let (seen, on_progress) = collect_progress();

        let outcome = dispatcher
            .dispatch(&make_coupon(), &recipients, on_progress)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Completed { delivered: 4 });
        assert_eq!(*seen.lock().unwrap(), vec![25.0, 50.0, 75.0, 100.0]);
        assert_eq!(dispatcher.phase(), DispatchPhase::Completed);
        assert!(dispatcher.progress().is_none());
    }

    #[tokio::test]
    async fn 選択順に1件ずつ送信し高々1件しか同時に送らない() {
        let client = MockCouponAdminClient::new();
        let dispatcher = make_dispatcher(&client, MockTokenRefreshClient::succeeding("new"));
        let recipients = make_recipients(&["c@x.com", "a@x.com", "b@x.com"]);

        dispatcher
            .dispatch(&make_coupon(), &recipients, |_| {})
            .await
            .unwrap();

        assert_eq!(
            client.attempted_addresses(),
            vec!["c@x.com", "a@x.com", "b@x.com"]
        );
        assert_eq!(client.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn 配信リクエストは受信者ごとにレンダリングした本文を持つ() {
        let client = MockCouponAdminClient::new();
        let dispatcher = make_dispatcher(&client, MockTokenRefreshClient::succeeding("new"));
        let recipients = make_recipients(&["ann@x.com", "bo@x.com"]);

        dispatcher
            .dispatch(&make_coupon(), &recipients, |_| {})
            .await
            .unwrap();

        let sent = client.sent_requests();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|r| r.coupon_id == CouponId::new(7)));
        assert!(sent[0].template.contains("ann 様"));
        assert!(sent[1].template.contains("bo 様"));
    }

    #[tokio::test]
    async fn j件目で失敗するとそれ以降は送信せずに中断する() {
        let client = MockCouponAdminClient::new();
        client.fail_send_to(
            "c@x.com",
            CouponApiError::Server {
                status: 500,
                body:   "boom".to_string(),
            },
        );
        let refresh = MockTokenRefreshClient::succeeding("new");
        let dispatcher = make_dispatcher(&client, refresh.clone());
        let recipients = make_recipients(&["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"]);
        let (seen, on_progress) = collect_progress();

        let outcome = dispatcher
            .dispatch(&make_coupon(), &recipients, on_progress)
            .await
            .unwrap();

        match outcome {
            DispatchOutcome::Aborted {
                at,
                delivered,
                reason: AbortReason::Failed(DeliveryError::Api(CouponApiError::Server { status, .. })),
            } => {
                assert_eq!(at.as_str(), "c@x.com");
                assert_eq!(delivered, 2);
                assert_eq!(status, 500);
            }
            other => panic!("Aborted(Failed) を期待したが {other:?} を受け取った"),
        }
        assert_eq!(client.sent_requests().len(), 2);
        assert_eq!(
            client.attempted_addresses(),
            vec!["a@x.com", "b@x.com", "c@x.com"]
        );
        assert_eq!(*seen.lock().unwrap(), vec![20.0, 40.0]);
        assert_eq!(refresh.call_count(), 0);
        assert_eq!(dispatcher.phase(), DispatchPhase::Aborted);
    }

    #[tokio::test]
    async fn 認証切れで再発行できたら再起動を要求して中断する() {
        let client = MockCouponAdminClient::new();
        client.fail_send_to("b@x.com", CouponApiError::CredentialExpired);
        let refresh = MockTokenRefreshClient::succeeding("new");
        let dispatcher = make_dispatcher(&client, refresh.clone());
        let recipients = make_recipients(&["a@x.com", "b@x.com", "c@x.com"]);

        let outcome = dispatcher
            .dispatch(&make_coupon(), &recipients, |_| {})
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Aborted {
                at:        EmailAddress::new("b@x.com").unwrap(),
                delivered: 1,
                reason:    AbortReason::RestartRequired,
            }
        );
        assert_eq!(refresh.call_count(), 1);
        assert_eq!(client.attempted_addresses(), vec!["a@x.com", "b@x.com"]);
    }

    #[tokio::test]
    async fn 認証切れで再発行に失敗したら元のエラーで中断する() {
        let client = MockCouponAdminClient::new();
        client.fail_send_to("a@x.com", CouponApiError::CredentialExpired);
        let refresh = MockTokenRefreshClient::failing(AuthApiError::RefreshRejected);
        let dispatcher = make_dispatcher(&client, refresh.clone());
        let recipients = make_recipients(&["a@x.com", "b@x.com"]);

        let outcome = dispatcher
            .dispatch(&make_coupon(), &recipients, |_| {})
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Aborted {
                at:        EmailAddress::new("a@x.com").unwrap(),
                delivered: 0,
                reason:    AbortReason::Failed(DeliveryError::Api(
                    CouponApiError::CredentialExpired
                )),
            }
        );
        assert_eq!(refresh.call_count(), 1);
    }

    #[tokio::test]
    async fn 受信者が空なら開始できない() {
        let client = MockCouponAdminClient::new();
        let dispatcher = make_dispatcher(&client, MockTokenRefreshClient::succeeding("new"));

        let result = dispatcher.dispatch(&make_coupon(), &[], |_| {}).await;

        assert_eq!(result, Err(DispatchError::EmptySelection));
        assert_eq!(dispatcher.phase(), DispatchPhase::Idle);
    }

    #[tokio::test]
    async fn 実行中は二重に開始できず終了後は再度開始できる() {
        let client = MockCouponAdminClient::new();
        client.hold_sends();
        let dispatcher = Arc::new(make_dispatcher(
            &client,
            MockTokenRefreshClient::succeeding("new"),
        ));
        let recipients = make_recipients(&["a@x.com", "b@x.com"]);

        let first = {
            let dispatcher = dispatcher.clone();
            let recipients = recipients.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch(&make_coupon(), &recipients, |_| {})
                    .await
            })
        };

        while !dispatcher.is_running() {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            dispatcher.progress().map(|p| (p.completed, p.total)),
            Some((0, 2))
        );

        let second = dispatcher
            .dispatch(&make_coupon(), &recipients, |_| {})
            .await;
        assert_eq!(second, Err(DispatchError::AlreadyRunning));

        client.release_sends(2);
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed { delivered: 2 });
        assert!(!dispatcher.is_running());

        client.release_sends(2);
        let again = dispatcher
            .dispatch(&make_coupon(), &recipients, |_| {})
            .await
            .unwrap();
        assert_eq!(again, DispatchOutcome::Completed { delivered: 2 });
    }

    #[tokio::test]
    async fn キャンセルされたランは実行中状態を解除する() {
        let client = MockCouponAdminClient::new();
        client.hold_sends();
        let dispatcher = Arc::new(make_dispatcher(
            &client,
            MockTokenRefreshClient::succeeding("new"),
        ));
        let recipients = make_recipients(&["a@x.com"]);

        let handle = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch(&make_coupon(), &recipients, |_| {})
                    .await
            })
        };
        while !dispatcher.is_running() {
            tokio::task::yield_now().await;
        }

        handle.abort();
        let _ = handle.await;

        assert_eq!(dispatcher.phase(), DispatchPhase::Idle);
    }

    #[tokio::test]
    async fn resetで終端状態からidleに戻る() {
        let client = MockCouponAdminClient::new();
        let dispatcher = make_dispatcher(&client, MockTokenRefreshClient::succeeding("new"));

        dispatcher
            .dispatch(&make_coupon(), &make_recipients(&["a@x.com"]), |_| {})
            .await
            .unwrap();
        dispatcher.reset();

        assert_eq!(dispatcher.phase(), DispatchPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn 送信成功の間に固定のペーシングを挟む() {
        let client = MockCouponAdminClient::new();
        let credentials = CredentialStore::default();
        let policy = AuthRefreshPolicy::new(
            Arc::new(MockTokenRefreshClient::succeeding("new")),
            credentials,
        );
        let dispatcher = BatchDispatcher::new(
            Arc::new(client.clone()),
            Arc::new(TemplateRenderer::new().unwrap()),
            Arc::new(policy),
            DEFAULT_PACING,
        );
        let recipients = make_recipients(&["a@x.com", "b@x.com", "c@x.com"]);

        let started = tokio::time::Instant::now();
        dispatcher
            .dispatch(&make_coupon(), &recipients, |_| {})
            .await
            .unwrap();

        // 最後の受信者の後には待機しない
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_PACING * 2, "{elapsed:?}");
        assert!(elapsed < DEFAULT_PACING * 3, "{elapsed:?}");
    }
}
