//! # CouponMail 管理ツール CLI
//!
//! クーポンの案内対象会員を確認し、選択した会員に案内メールを配信する。
//!
//! ## 環境変数
//!
//! `.env` ファイルまたは環境変数で設定する。一覧は [`couponmail_admin::config`] を参照。
//!
//! ## 使い方
//!
//! ```bash
//! # 案内対象会員の一覧
//! couponmail-admin members --coupon-id 42
//!
//! # 全員に配信
//! couponmail-admin send --coupon coupon.json --all
//!
//! # 指定した会員だけに配信
//! couponmail-admin send --coupon coupon.json --to a@example.com --to b@example.com
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use couponmail_admin::{
    app_builder::AdminApp,
    config::AdminConfig,
    usecase::{AbortReason, DispatchOutcome, LoadOutcome, Recovery, WorkflowEvent},
};
use couponmail_domain::{
    coupon::{Coupon, CouponId},
    recipient::{EmailAddress, Roster},
};
use couponmail_shared::observability::{TracingConfig, init_tracing};
use tokio::sync::mpsc;

/// クーポン案内メール配信ツール
#[derive(Parser, Debug)]
#[command(name = "couponmail-admin", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 案内対象会員の一覧を表示する
    Members {
        /// クーポン ID
        #[arg(long)]
        coupon_id: i64,
    },
    /// 案内メールを配信する
    Send {
        /// クーポン定義（JSON）
        #[arg(long)]
        coupon: PathBuf,

        /// 名簿の全員に配信する
        #[arg(long, conflicts_with = "to")]
        all: bool,

        /// 配信先メールアドレス（複数指定可、指定順に配信。重複は 1 件にまとめる）
        #[arg(long, required_unless_present = "all")]
        to: Vec<String>,
    },
}

/// 管理ツールのエントリーポイント
///
/// 1. 環境変数の読み込み（.env ファイル）
/// 2. トレーシングの初期化
/// 3. 設定の読み込みと依存関係の組み立て
/// 4. サブコマンドの実行
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let tracing_config = TracingConfig::from_env("couponmail-admin");
    init_tracing(&tracing_config);
    let _root_span = tracing_config.root_span().entered();

    let cli = Cli::parse();

    let config = AdminConfig::from_env().context("設定の読み込みに失敗しました")?;
    tracing::debug!(?config, "設定を読み込み");

    let app = AdminApp::build(&config).context("依存関係の初期化に失敗しました")?;

    match cli.command {
        Command::Members { coupon_id } => list_members(&app, CouponId::new(coupon_id)).await,
        Command::Send { coupon, all, to } => send(&app, &coupon, all, &to).await,
    }
}

async fn list_members(app: &AdminApp, coupon_id: CouponId) -> anyhow::Result<()> {
    let roster = match app.roster_loader.load(coupon_id).await {
        Ok(roster) => roster,
        Err(e) => match app.refresh_policy.recover(&e).await {
            Recovery::Restart => app
                .roster_loader
                .load(coupon_id)
                .await
                .context("会員一覧の取得に失敗しました")?,
            Recovery::Surface => {
                return Err(e).context("会員一覧の取得に失敗しました");
            }
        },
    };

    print_roster(&roster);
    Ok(())
}

fn print_roster(roster: &Roster) {
    for recipient in roster.recipients() {
        println!("{}\t{}", recipient.address(), recipient.display_name());
    }
    println!("合計 {} 名", roster.len());
}

async fn send(app: &AdminApp, coupon_path: &Path, all: bool, to: &[String]) -> anyhow::Result<()> {
    let coupon = read_coupon(coupon_path).await?;
    let targets = to
        .iter()
        .map(|address| {
            EmailAddress::new(address.as_str())
                .with_context(|| format!("メールアドレスが不正です: {address}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            report(&event);
        }
    });

    let mut workflow = app.workflow(tx);

    let loaded = match workflow.present(coupon).await {
        LoadOutcome::RestartRequired => workflow.restart().await?,
        outcome => outcome,
    };
    if let LoadOutcome::Failed(e) = loaded {
        bail!("会員一覧の取得に失敗しました: {e}");
    }

    if all {
        workflow.select_all();
    } else {
        for address in &targets {
            if !workflow.select(address) {
                bail!("{address} はこのクーポンの案内対象ではありません");
            }
        }
    }

    let outcome = workflow.dispatch().await?;
    let restart = matches!(
        outcome,
        DispatchOutcome::Aborted {
            reason: AbortReason::RestartRequired,
            ..
        }
    );
    if restart {
        workflow.restart().await?;
    }
    let last_error = workflow.last_error().map(str::to_string);

    drop(workflow);
    reporter.await.context("進捗表示タスクが異常終了しました")?;

    match outcome {
        DispatchOutcome::Completed { delivered } => {
            println!("{delivered} 件の案内メールを送信しました");
            Ok(())
        }
        DispatchOutcome::Aborted { delivered, .. } if restart => bail!(
            "認証を更新しました（{delivered} 件送信済み）。送信済みの会員を確認のうえ再実行してください"
        ),
        DispatchOutcome::Aborted { at, .. } => {
            bail!(last_error.unwrap_or_else(|| format!("{at} への送信に失敗しました")))
        }
    }
}

async fn read_coupon(path: &Path) -> anyhow::Result<Coupon> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("クーポン定義を読み込めません: {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("クーポン定義の形式が不正です: {}", path.display()))
}

fn report(event: &WorkflowEvent) {
    match event {
        WorkflowEvent::RosterLoaded { count } => tracing::info!(count, "名簿を読み込みました"),
        WorkflowEvent::Progress {
            completed,
            total,
            percent,
        } => tracing::info!(completed, total, "送信中 {percent:.0}%"),
        WorkflowEvent::Completed { delivered } => tracing::info!(delivered, "配信が完了しました"),
        WorkflowEvent::Error { message } => tracing::error!("{message}"),
        WorkflowEvent::RestartRequired => tracing::warn!("認証を更新しました。最初からやり直します"),
        WorkflowEvent::CloseRequested => tracing::debug!("ダイアログを閉じます"),
    }
}
