//! # 管理ツール設定
//!
//! 環境変数から管理ツールの設定を読み込む。
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `COUPON_API_URL` | **Yes** | クーポン管理 API のベース URL |
//! | `AUTH_API_URL` | No | 認証 API のベース URL（デフォルト: `COUPON_API_URL`） |
//! | `COUPON_ACCESS_TOKEN` | No | 起動時のアクセストークン |
//! | `COUPON_REFRESH_TOKEN` | No | アクセストークン再発行用のリフレッシュトークン |
//! | `DISPATCH_PACING_MS` | No | 送信間の待機ミリ秒（デフォルト: 50） |

use std::{env, time::Duration};

use thiserror::Error;

use crate::usecase::dispatcher::DEFAULT_PACING;

/// 設定読み込みエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    #[error("{name} の値が不正です: {value}")]
    Invalid { name: &'static str, value: String },
}

/// 管理ツールの設定
#[derive(Clone)]
pub struct AdminConfig {
    pub api_url:       String,
    pub auth_url:      String,
    pub access_token:  Option<String>,
    pub refresh_token: Option<String>,
    pub pacing:        Duration,
}

impl AdminConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の参照関数から設定を読み込む
    ///
    /// 空文字列は未設定として扱う。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_url = get("COUPON_API_URL").ok_or(ConfigError::Missing("COUPON_API_URL"))?;
        let auth_url = get("AUTH_API_URL").unwrap_or_else(|| api_url.clone());

        let pacing = match get("DISPATCH_PACING_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::Invalid {
                    name: "DISPATCH_PACING_MS",
                    value,
                })?,
            None => DEFAULT_PACING,
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_url: auth_url.trim_end_matches('/').to_string(),
            access_token: get("COUPON_ACCESS_TOKEN"),
            refresh_token: get("COUPON_REFRESH_TOKEN"),
            pacing,
        })
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |t: &Option<String>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("AdminConfig")
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("pacing", &self.pacing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AdminConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AdminConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_必須項目のみで既定値が入る() {
        let config = load(&[("COUPON_API_URL", "http://api.local/")]).unwrap();

        assert_eq!(config.api_url, "http://api.local");
        assert_eq!(config.auth_url, "http://api.local");
        assert_eq!(config.access_token, None);
        assert_eq!(config.refresh_token, None);
        assert_eq!(config.pacing, Duration::from_millis(50));
    }

    #[test]
    fn test_全項目を読み込む() {
        let config = load(&[
            ("COUPON_API_URL", "http://api.local"),
            ("AUTH_API_URL", "http://auth.local"),
            ("COUPON_ACCESS_TOKEN", "access"),
            ("COUPON_REFRESH_TOKEN", "refresh"),
            ("DISPATCH_PACING_MS", "200"),
        ])
        .unwrap();

        assert_eq!(config.auth_url, "http://auth.local");
        assert_eq!(config.access_token.as_deref(), Some("access"));
        assert_eq!(config.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(config.pacing, Duration::from_millis(200));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[("COUPON_API_URL", "  ")])]
    fn test_api_urlがなければエラー(#[case] vars: &[(&str, &str)]) {
        assert_eq!(load(vars).unwrap_err(), ConfigError::Missing("COUPON_API_URL"));
    }

    #[rstest]
    #[case("abc")]
    #[case("-1")]
    fn test_ペーシングが数値でなければエラー(#[case] value: &str) {
        let result = load(&[
            ("COUPON_API_URL", "http://api.local"),
            ("DISPATCH_PACING_MS", value),
        ]);

        assert_eq!(
            result.unwrap_err(),
            ConfigError::Invalid {
                name:  "DISPATCH_PACING_MS",
                value: value.to_string(),
            }
        );
    }

    #[test]
    fn test_debug出力でトークンを伏せる() {
        let config = load(&[
            ("COUPON_API_URL", "http://api.local"),
            ("COUPON_ACCESS_TOKEN", "secret-access"),
        ])
        .unwrap();

        let debug = format!("{config:?}");

        assert!(!debug.contains("secret-access"));
        assert!(debug.contains("[REDACTED]"));
    }
}
