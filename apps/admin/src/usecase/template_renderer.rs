//! # テンプレートレンダラー
//!
//! tera テンプレートエンジンでクーポン案内メールの HTML 本文を生成する。
//!
//! ## 設計方針
//!
//! - **`include_str!` によるコンパイル時埋め込み**: テンプレートはバイナリに埋め込まれる
//! - **受信者ごとにレンダリング**: 本文はバッチ全体で事前計算せず、送信直前に 1 件ずつ生成する
//! - **自動エスケープ**: `.html` テンプレートとして登録し、会員名などをエスケープする

use couponmail_domain::{coupon::Coupon, notification::NotificationError, recipient::Recipient};
use tera::{Context, Tera};

const TEMPLATE_NAME: &str = "coupon_email.html";

/// テンプレートレンダラー
pub struct TemplateRenderer {
    engine: Tera,
}

impl TemplateRenderer {
    /// 新しいレンダラーインスタンスを作成
    pub fn new() -> Result<Self, NotificationError> {
        let mut engine = Tera::default();

        engine
            .add_raw_template(
                TEMPLATE_NAME,
                include_str!("../../templates/coupon_email.html"),
            )
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(Self { engine })
    }

    /// クーポンと受信者から案内メールの HTML 本文を生成する
    pub fn render(
        &self,
        coupon: &Coupon,
        recipient: &Recipient,
    ) -> Result<String, NotificationError> {
        let context = build_context(coupon, recipient);

        self.engine
            .render(TEMPLATE_NAME, &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))
    }
}

fn build_context(coupon: &Coupon, recipient: &Recipient) -> Context {
    let mut context = Context::new();
    context.insert("coupon_name", coupon.name.as_str());
    context.insert("discount", &coupon.discount.to_string());
    context.insert(
        "expires_on",
        &coupon
            .expires_on
            .map(|date| date.format("%Y年%m月%d日").to_string()),
    );
    context.insert("description", &coupon.description);
    context.insert("recipient_name", recipient.display_name());
    context.insert("recipient_address", recipient.address().as_str());
    context
}
