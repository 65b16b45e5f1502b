//! # 認証情報ストア
//!
//! 管理 API 呼び出しに使う Bearer トークンを保持するプロセス全体のセッション状態。
//!
//! ## アクセス規約
//!
//! | 操作 | 呼び出し元 |
//! |------|-----------|
//! | アクセストークンの読み取り | すべての送信リクエスト（[`CouponAdminClientImpl`](crate::CouponAdminClientImpl)） |
//! | リフレッシュトークンの読み取り | 認証更新ポリシー |
//! | アクセストークンの書き込み | 認証更新ポリシーのみ（起動時の設定読み込みを除く） |
//!
//! ハンドルは `Clone` で共有する。暗黙のグローバル変数にはしない。

use std::sync::{Arc, PoisonError, RwLock};

#[derive(Default)]
struct Credentials {
    access_token:  Option<String>,
    refresh_token: Option<String>,
}

/// 認証情報ストア（共有ハンドル）
#[derive(Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Credentials>>,
}

impl CredentialStore {
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Credentials {
                access_token,
                refresh_token,
            })),
        }
    }

    /// 現在のアクセストークン
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    /// 現在のリフレッシュトークン
    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh_token
            .clone()
    }

    /// 新しいアクセストークンを保存する
    pub fn store_access_token(&self, token: impl Into<String>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token = Some(token.into());
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mask = |t: &Option<String>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("CredentialStore")
            .field("access_token", &mask(&guard.access_token))
            .field("refresh_token", &mask(&guard.refresh_token))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn 保存したアクセストークンを読み取れる() {
        let store = CredentialStore::new(Some("old".to_string()), Some("refresh".to_string()));

        store.store_access_token("new");

        assert_eq!(store.access_token().as_deref(), Some("new"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
    }

    #[test]
    fn クローンしたハンドルは同じ状態を共有する() {
        let store = CredentialStore::default();
        let other = store.clone();

        other.store_access_token("shared");

        assert_eq!(store.access_token().as_deref(), Some("shared"));
    }

    #[test]
    fn debug出力はトークンをマスクする() {
        let store = CredentialStore::new(Some("secret-token".to_string()), None);

        let debug = format!("{store:?}");

        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
