//! # テスト用モッククライアント
//!
//! ユースケーステストで使用するインメモリモック。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! couponmail-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use couponmail_domain::{coupon::CouponId, dispatch::DeliveryRequest};
use tokio::sync::Semaphore;

use crate::{
    client::{AuthApiError, CouponAdminClient, CouponApiError, MemberDto, TokenRefreshClient},
    credentials::CredentialStore,
};

// ===== MockCouponAdminClient =====

#[derive(Default)]
struct MockCouponAdminState {
    members:         Vec<MemberDto>,
    member_results:  VecDeque<Result<Vec<MemberDto>, CouponApiError>>,
    member_calls:    Vec<CouponId>,
    send_failures:   HashMap<String, CouponApiError>,
    sent:            Vec<DeliveryRequest>,
    attempted:       Vec<String>,
    observed_tokens: Vec<Option<String>>,
}

/// クーポン管理 API のモック
///
/// - 名簿: [`with_members`](Self::with_members) の内容を返す。
///   [`push_members_result`](Self::push_members_result) で積んだ結果があればそちらを先に返す
/// - 送信: [`fail_send_to`](Self::fail_send_to) で指定したアドレスは失敗、それ以外は成功
/// - [`hold_sends`](Self::hold_sends) を呼ぶと、送信は [`release_sends`](Self::release_sends)
///   で許可されるまで待機する
#[derive(Clone, Default)]
pub struct MockCouponAdminClient {
    state:       Arc<Mutex<MockCouponAdminState>>,
    gate:        Arc<Mutex<Option<Arc<Semaphore>>>>,
    in_flight:   Arc<AtomicUsize>,
    max_flight:  Arc<AtomicUsize>,
    credentials: Option<CredentialStore>,
}

impl MockCouponAdminClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各リクエスト時点のアクセストークンを記録する
    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// 名簿を設定する（`(userName, email)` の組）
    pub fn with_members(self, members: &[(&str, &str)]) -> Self {
        self.state.lock().unwrap().members = members
            .iter()
            .map(|(name, email)| MemberDto {
                user_name: (*name).to_string(),
                email:     (*email).to_string(),
            })
            .collect();
        self
    }

    /// 次回の名簿取得で返す結果を積む
    pub fn push_members_result(&self, result: Result<Vec<MemberDto>, CouponApiError>) {
        self.state.lock().unwrap().member_results.push_back(result);
    }

    /// 指定アドレスへの送信を失敗させる
    pub fn fail_send_to(&self, address: &str, error: CouponApiError) {
        self.state
            .lock()
            .unwrap()
            .send_failures
            .insert(address.to_string(), error);
    }

    /// 指定アドレスへの送信失敗設定を解除する
    pub fn clear_send_failure(&self, address: &str) {
        self.state.lock().unwrap().send_failures.remove(address);
    }

    /// 以降の送信を保留する
    pub fn hold_sends(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// 保留中の送信を `count` 件許可する
    pub fn release_sends(&self, count: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    /// 成功した送信リクエスト
    pub fn sent_requests(&self) -> Vec<DeliveryRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    /// 送信を試みたアドレス（成功・失敗を問わず、試行順）
    pub fn attempted_addresses(&self) -> Vec<String> {
        self.state.lock().unwrap().attempted.clone()
    }

    /// 名簿取得の呼び出し履歴
    pub fn member_calls(&self) -> Vec<CouponId> {
        self.state.lock().unwrap().member_calls.clone()
    }

    /// リクエストごとに観測したアクセストークン
    pub fn observed_tokens(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().observed_tokens.clone()
    }

    /// 同時に処理中だった送信リクエスト数の最大値
    pub fn max_in_flight(&self) -> usize {
        self.max_flight.load(Ordering::SeqCst)
    }

    fn observe_token(&self, state: &mut MockCouponAdminState) {
        if let Some(credentials) = &self.credentials {
            state.observed_tokens.push(credentials.access_token());
        }
    }
}

#[async_trait]
impl CouponAdminClient for MockCouponAdminClient {
    async fn list_members(&self, coupon_id: CouponId) -> Result<Vec<MemberDto>, CouponApiError> {
        let mut state = self.state.lock().unwrap();
        self.observe_token(&mut state);
        state.member_calls.push(coupon_id);
        match state.member_results.pop_front() {
            Some(result) => result,
            None => Ok(state.members.clone()),
        }
    }

    async fn send_coupon_email(&self, request: &DeliveryRequest) -> Result<(), CouponApiError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_flight.fetch_max(current, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let result = {
            let mut state = self.state.lock().unwrap();
            self.observe_token(&mut state);
            let address = request.address.as_str().to_string();
            state.attempted.push(address.clone());
            match state.send_failures.get(&address).cloned() {
                Some(error) => Err(error),
                None => {
                    state.sent.push(request.clone());
                    Ok(())
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ===== MockTokenRefreshClient =====

/// トークン再発行 API のモック
#[derive(Clone)]
pub struct MockTokenRefreshClient {
    result: Arc<Mutex<Result<String, AuthApiError>>>,
    calls:  Arc<Mutex<Vec<String>>>,
}

impl MockTokenRefreshClient {
    /// 常に指定トークンを返す
    pub fn succeeding(token: &str) -> Self {
        Self {
            result: Arc::new(Mutex::new(Ok(token.to_string()))),
            calls:  Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 常に指定エラーを返す
    pub fn failing(error: AuthApiError) -> Self {
        Self {
            result: Arc::new(Mutex::new(Err(error))),
            calls:  Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 呼び出し回数
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 渡されたリフレッシュトークン
    pub fn received_refresh_tokens(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenRefreshClient for MockTokenRefreshClient {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthApiError> {
        self.calls.lock().unwrap().push(refresh_token.to_string());
        self.result.lock().unwrap().clone()
    }
}
