//! API クライアントのエラー型

use thiserror::Error;

/// クーポン管理 API クライアントエラー
///
/// 名簿取得と案内メール送信の両方で使う。
/// [`CredentialExpired`](CouponApiError::CredentialExpired) だけが認証更新の対象になる。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponApiError {
    /// 認証の有効期限切れ（401）
    #[error("認証の有効期限が切れています")]
    CredentialExpired,

    /// サーバーが 2xx 以外を返した
    #[error("サーバーエラー（ステータス {status}）: {body}")]
    Server { status: u16, body: String },

    /// ネットワークエラー（接続失敗・レスポンス解析失敗を含む）
    #[error("ネットワークエラー: {0}")]
    Network(String),
}

impl CouponApiError {
    pub fn is_credential_expired(&self) -> bool {
        matches!(self, CouponApiError::CredentialExpired)
    }
}

impl From<reqwest::Error> for CouponApiError {
    fn from(err: reqwest::Error) -> Self {
        CouponApiError::Network(err.to_string())
    }
}

/// 認証 API クライアントエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthApiError {
    /// リフレッシュトークンが拒否された（401 / 403）
    #[error("リフレッシュトークンが拒否されました")]
    RefreshRejected,

    /// ネットワークエラー
    #[error("ネットワークエラー: {0}")]
    Network(String),

    /// 予期しないエラー
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for AuthApiError {
    fn from(err: reqwest::Error) -> Self {
        AuthApiError::Network(err.to_string())
    }
}
