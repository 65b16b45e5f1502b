//! # 認証更新ポリシー
//!
//! 管理 API が認証切れ（401）を返したときに、アクセストークンを黙って再発行し、
//! 呼び出し側がワークフローを再起動すべきかを判断する。
//!
//! ## 方針
//!
//! - 認証切れを示す失敗 1 件につき、再発行は 1 回だけ試みる（再帰・ループしない）
//! - 再発行に成功したら新しいアクセストークンを [`CredentialStore`] に保存し、
//!   [`Recovery::Restart`] を返す。処理中のバッチは途中から再開せず、名簿の取得から
//!   やり直す。途中まで送信済みの受信者に再送される可能性は既知の制約として受け入れる
//! - 再発行に失敗したら、元のエラーを呼び出し側が表示する（[`Recovery::Surface`]）

use std::sync::Arc;

use couponmail_infra::{AuthApiError, CouponApiError, CredentialStore, TokenRefreshClient};
use couponmail_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};
use thiserror::Error;

/// 失敗後の回復方針
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// 認証を更新した。ワークフローを最初からやり直す
    Restart,
    /// 元のエラーを表示して終了する
    Surface,
}

/// トークン再発行の失敗（回復不能）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("リフレッシュトークンが設定されていません")]
    MissingRefreshToken,

    #[error("トークンの再発行に失敗: {0}")]
    Rejected(#[from] AuthApiError),
}

/// 認証更新ポリシー
pub struct AuthRefreshPolicy {
    client:      Arc<dyn TokenRefreshClient>,
    credentials: CredentialStore,
}

impl AuthRefreshPolicy {
    pub fn new(client: Arc<dyn TokenRefreshClient>, credentials: CredentialStore) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// アクセストークンを再発行して保存する
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let refresh_token = self
            .credentials
            .refresh_token()
            .ok_or(RefreshError::MissingRefreshToken)?;

        let access_token = self.client.refresh_access_token(&refresh_token).await?;
        self.credentials.store_access_token(access_token);
        Ok(())
    }

    /// 失敗したリクエストのエラーから回復方針を決める
    ///
    /// 名簿取得と送信の両方の失敗がここを通る。認証切れ以外は再発行せずに
    /// [`Recovery::Surface`] を返す。
    pub async fn recover(&self, error: &CouponApiError) -> Recovery {
        if !error.is_credential_expired() {
            return Recovery::Surface;
        }

        match self.refresh().await {
            Ok(()) => {
                log_business_event!(
                    event.category = event::category::AUTH,
                    event.action = event::action::TOKEN_REFRESHED,
                    event.result = event::result::SUCCESS,
                    "アクセストークンを再発行"
                );
                Recovery::Restart
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::AUTH,
                    event.action = event::action::TOKEN_REFRESH_FAILED,
                    event.result = event::result::FAILURE,
                    error.category = log_error::category::EXTERNAL_SERVICE,
                    error.kind = log_error::kind::CREDENTIAL_EXPIRED,
                    error = %e,
                    "アクセストークンの再発行に失敗"
                );
                Recovery::Surface
            }
        }
    }
}
