//! # アプリケーション構築
//!
//! 設定から API クライアント・認証情報ストア・ユースケースを組み立てる。
//! `main.rs` はコマンドの解釈と結果の表示に集中する。

use std::sync::Arc;

use couponmail_domain::notification::NotificationError;
use couponmail_infra::{
    CouponAdminClient,
    CouponAdminClientImpl,
    CredentialStore,
    TokenRefreshClient,
    TokenRefreshClientImpl,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::AdminConfig,
    usecase::{
        AuthRefreshPolicy,
        BatchDispatcher,
        CouponEmailWorkflow,
        RosterLoader,
        TemplateRenderer,
        WorkflowEvent,
    },
};

/// 組み立て済みの依存関係
pub struct AdminApp {
    pub credentials:    CredentialStore,
    pub roster_loader:  RosterLoader,
    pub refresh_policy: Arc<AuthRefreshPolicy>,
    pub dispatcher:     Arc<BatchDispatcher>,
}

impl AdminApp {
    /// 設定から本番用クライアントで組み立てる
    pub fn build(config: &AdminConfig) -> Result<Self, NotificationError> {
        let credentials =
            CredentialStore::new(config.access_token.clone(), config.refresh_token.clone());
        let coupon_client: Arc<dyn CouponAdminClient> = Arc::new(CouponAdminClientImpl::new(
            &config.api_url,
            credentials.clone(),
        ));
        let refresh_client: Arc<dyn TokenRefreshClient> =
            Arc::new(TokenRefreshClientImpl::new(&config.auth_url));

        Self::with_clients(config, credentials, coupon_client, refresh_client)
    }

    /// 任意のクライアントで組み立てる
    pub fn with_clients(
        config: &AdminConfig,
        credentials: CredentialStore,
        coupon_client: Arc<dyn CouponAdminClient>,
        refresh_client: Arc<dyn TokenRefreshClient>,
    ) -> Result<Self, NotificationError> {
        let renderer = Arc::new(TemplateRenderer::new()?);
        let refresh_policy = Arc::new(AuthRefreshPolicy::new(refresh_client, credentials.clone()));
        let dispatcher = Arc::new(BatchDispatcher::new(
            coupon_client.clone(),
            renderer,
            refresh_policy.clone(),
            config.pacing,
        ));

        Ok(Self {
            credentials,
            roster_loader: RosterLoader::new(coupon_client),
            refresh_policy,
            dispatcher,
        })
    }

    /// 配信ワークフローを作成する
    pub fn workflow(&self, events: UnboundedSender<WorkflowEvent>) -> CouponEmailWorkflow {
        CouponEmailWorkflow::new(
            self.roster_loader.clone(),
            self.dispatcher.clone(),
            self.refresh_policy.clone(),
            events,
        )
    }
}
