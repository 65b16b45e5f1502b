//! # クーポン管理 API クライアント
//!
//! ## エンドポイント
//!
//! - `GET /coupons/{id}/members` - クーポン案内の対象になる会員一覧
//! - `POST /coupons/email` - 1 受信者分の案内メール送信
//!
//! どちらのリクエストも [`CredentialStore`] の現在のアクセストークンを
//! Bearer 認証ヘッダーに載せる。

use async_trait::async_trait;
use couponmail_domain::{coupon::CouponId, dispatch::DeliveryRequest};
use serde::Deserialize;

use super::{
    error::CouponApiError,
    response::{handle_empty_response, handle_response},
};
use crate::credentials::CredentialStore;

/// 会員 DTO
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub user_name: String,
    pub email:     String,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    members: Vec<MemberDto>,
}

/// クーポン管理 API クライアントトレイト
///
/// テスト時にスタブを使用できるようトレイトで定義。
#[async_trait]
pub trait CouponAdminClient: Send + Sync {
    /// クーポンの案内対象会員を取得する
    ///
    /// `GET /coupons/{id}/members` を呼び出す。順序はバックエンドの返却順。
    async fn list_members(&self, coupon_id: CouponId) -> Result<Vec<MemberDto>, CouponApiError>;

    /// 1 受信者分の案内メールを送信する
    ///
    /// `POST /coupons/email` を呼び出す。2xx 以外は送信失敗。
    async fn send_coupon_email(&self, request: &DeliveryRequest) -> Result<(), CouponApiError>;
}

/// クーポン管理 API クライアント実装
#[derive(Clone)]
pub struct CouponAdminClientImpl {
    base_url:    String,
    client:      reqwest::Client,
    credentials: CredentialStore,
}

impl CouponAdminClientImpl {
    /// 新しいクライアントを作成する
    ///
    /// - `base_url`: 管理 API のベース URL（例: `http://localhost:8080/api/admin`）
    /// - `credentials`: Bearer トークンを読み出す共有ストア
    pub fn new(base_url: &str, credentials: CredentialStore) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            credentials,
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl CouponAdminClient for CouponAdminClientImpl {
    #[tracing::instrument(skip_all, level = "debug", fields(%coupon_id))]
    async fn list_members(&self, coupon_id: CouponId) -> Result<Vec<MemberDto>, CouponApiError> {
        let url = format!("{}/coupons/{}/members", self.base_url, coupon_id);

        let response = self.authorize(self.client.get(&url)).send().await?;
        let body: MembersResponse = handle_response(response).await?;
        Ok(body.members)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(coupon_id = %request.coupon_id, address = %request.address))]
    async fn send_coupon_email(&self, request: &DeliveryRequest) -> Result<(), CouponApiError> {
        let url = format!("{}/coupons/email", self.base_url);

        let response = self
            .authorize(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        handle_empty_response(response).await
    }
}
