//! # 名簿取得
//!
//! クーポンの案内対象会員を取得し、ドメインの [`Roster`] に変換する。
//!
//! - 選択台帳には触れない（台帳のリセットは呼び出し側の責務）
//! - 何度呼び出しても同じクーポンなら名簿を取り直して置き換えるだけ
//! - 認証切れを含む失敗はそのまま返す。認証更新の判断は呼び出し側が行う

use std::sync::Arc;

use couponmail_domain::{
    coupon::CouponId,
    recipient::{EmailAddress, Recipient, Roster},
};
use couponmail_infra::{CouponAdminClient, CouponApiError, MemberDto};

/// 名簿ローダー
#[derive(Clone)]
pub struct RosterLoader {
    client: Arc<dyn CouponAdminClient>,
}

impl RosterLoader {
    pub fn new(client: Arc<dyn CouponAdminClient>) -> Self {
        Self { client }
    }

    /// 名簿を取得する
    ///
    /// メールアドレスが不正な会員は除外し、警告ログを出す。
    pub async fn load(&self, coupon_id: CouponId) -> Result<Roster, CouponApiError> {
        let members = self.client.list_members(coupon_id).await?;
        let fetched = members.len();

        let roster = Roster::new(members.into_iter().filter_map(into_recipient));

        tracing::debug!(
            %coupon_id,
            fetched,
            loaded = roster.len(),
            "名簿を取得"
        );
        Ok(roster)
    }
}

fn into_recipient(member: MemberDto) -> Option<Recipient> {
    match EmailAddress::new(member.email) {
        Ok(address) => Some(Recipient::new(member.user_name, address)),
        Err(e) => {
            tracing::warn!(error = %e, "メールアドレスが不正な会員を名簿から除外");
            None
        }
    }
}
