//! # 認証 API クライアント
//!
//! ## エンドポイント
//!
//! - `POST /auth/refresh` - リフレッシュトークンで新しいアクセストークンを発行する

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::AuthApiError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// トークン再発行クライアントトレイト
#[async_trait]
pub trait TokenRefreshClient: Send + Sync {
    /// リフレッシュトークンから新しいアクセストークンを取得する
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthApiError>;
}

/// トークン再発行クライアント実装
pub struct TokenRefreshClientImpl {
    base_url: String,
    client:   reqwest::Client,
}

impl TokenRefreshClientImpl {
    /// - `base_url`: 認証 API のベース URL（例: `http://localhost:8080/api`）
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client:   reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TokenRefreshClient for TokenRefreshClientImpl {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthApiError> {
        let url = format!("{}/auth/refresh", self.base_url);
        let request = RefreshRequest { refresh_token };

        let response = self.client.post(&url).json(&request).send().await?;

        match response.status() {
            status if status.is_success() => {
                let body = response.json::<RefreshResponse>().await?;
                Ok(body.access_token)
            }
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(AuthApiError::RefreshRejected)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AuthApiError::Unexpected(format!(
                    "予期しないステータス {}: {}",
                    status, body
                )))
            }
        }
    }
}
