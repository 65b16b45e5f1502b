//! # 受信者と名簿
//!
//! クーポン案内メールの受信者（[`Recipient`]）と、クーポンごとの受信可能者一覧
//! （[`Roster`]）を定義する。
//!
//! ## 設計方針
//!
//! - **メールアドレスが一意キー**: 名簿内で同じアドレスは 1 件のみ（先勝ち）
//! - **順序保持**: 名簿はバックエンドが返した順序（挿入順）を保つ
//! - **丸ごと置換**: 名簿は再取得時に差分更新せず、新しい [`Roster`] で置き換える

use std::collections::{HashMap, hash_map::Entry};

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// メールアドレス（値オブジェクト）
///
/// # バリデーション
///
/// - 空文字列ではない（前後の空白は除去）
/// - `local@domain` の形式（どちらも空でない）
/// - 最大 255 文字
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::Validation(format!(
                "メールアドレスの形式が不正です: {value}"
            )));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::Validation(format!(
                "メールアドレスの形式が不正です: {value}"
            )));
        }

        if value.len() > 255 {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 受信者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    display_name: String,
    address:      EmailAddress,
}

impl Recipient {
    /// 受信者を作成する
    ///
    /// 表示名が空の場合はメールアドレスを表示名として使う。
    pub fn new(display_name: impl Into<String>, address: EmailAddress) -> Self {
        let display_name = display_name.into().trim().to_string();
        let display_name = if display_name.is_empty() {
            address.as_str().to_string()
        } else {
            display_name
        };

        Self {
            display_name,
            address,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn address(&self) -> &EmailAddress {
        &self.address
    }
}

/// 名簿（クーポンごとの受信可能者一覧）
///
/// # 不変条件
///
/// - メールアドレスは重複しない
/// - 要素の順序は構築時の入力順
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    recipients: Vec<Recipient>,
    /// アドレス → `recipients` の添字
    index:      HashMap<EmailAddress, usize>,
}

impl Roster {
    /// 受信者の列から名簿を構築する
    ///
    /// 同じアドレスが複数回現れた場合は最初のものを残す。
    pub fn new(recipients: impl IntoIterator<Item = Recipient>) -> Self {
        let mut roster = Self::default();
        for recipient in recipients {
            if let Entry::Vacant(slot) = roster.index.entry(recipient.address.clone()) {
                slot.insert(roster.recipients.len());
                roster.recipients.push(recipient);
            }
        }
        roster
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// 名簿順のメールアドレス一覧
    pub fn addresses(&self) -> impl Iterator<Item = &EmailAddress> {
        self.recipients.iter().map(Recipient::address)
    }

    pub fn find(&self, address: &EmailAddress) -> Option<&Recipient> {
        self.index.get(address).map(|&i| &self.recipients[i])
    }

    pub fn contains(&self, address: &EmailAddress) -> bool {
        self.index.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}
