//! # ログ出力の初期化
//!
//! 管理ツールのログは常に stderr に出す。stdout は名簿一覧や配信結果の表示に使う。
//!
//! | 変数名 | 既定値 | 説明 |
//! |--------|--------|------|
//! | `LOG_FORMAT` | `pretty` | `json` で 1 行 1 イベントの JSON を出力 |
//! | `RUST_LOG` | `info,couponmail=debug` | `EnvFilter` の指定 |
//!
//! 起動時に [`init_tracing`] を呼び、[`TracingConfig::root_span`] に入ってから
//! サブコマンドを実行する。以降のイベントにはツール名が `app` として付く。

/// 既定のフィルタ指定
pub const DEFAULT_FILTER: &str = "info,couponmail=debug";

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON（ログ収集向け）
    Json,
    /// 端末向け
    #[default]
    Pretty,
}

impl LogFormat {
    /// `LOG_FORMAT` の値を解釈する
    ///
    /// 大文字小文字と前後の空白は無視する。未知の値は `Pretty` として扱い、
    /// tracing 初期化前なので stderr に直接警告を書く。
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "" | "pretty" => Self::Pretty,
            _ => {
                eprintln!("警告: LOG_FORMAT={value:?} は未対応のため pretty で出力します");
                Self::Pretty
            }
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }
}

/// ログ初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// ツール名（ルートスパンの `app` フィールド）
    pub app_name:   String,
    pub log_format: LogFormat,
}

impl TracingConfig {
    pub fn new(app_name: impl Into<String>, log_format: LogFormat) -> Self {
        Self {
            app_name: app_name.into(),
            log_format,
        }
    }

    pub fn from_env(app_name: impl Into<String>) -> Self {
        Self::new(app_name, LogFormat::from_env())
    }

    /// ツール全体を包むルートスパン
    #[cfg(feature = "observability")]
    pub fn root_span(&self) -> tracing::Span {
        tracing::info_span!("app", app = %self.app_name)
    }
}

/// グローバルサブスクライバーを登録する
///
/// `RUST_LOG` が未設定または不正なら [`DEFAULT_FILTER`] を使う。
#[cfg(feature = "observability")]
pub fn init_tracing(config: &TracingConfig) {
    use tracing_subscriber::{EnvFilter, Layer as _, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let output = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .init();
}
