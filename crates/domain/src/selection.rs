//! # 選択台帳
//!
//! 今回の配信ランで案内メールを送る受信者（メールアドレス）の集合を管理する。
//!
//! ## 不変条件
//!
//! - 同じアドレスは 1 度しか含まれない（集合セマンティクス）
//! - 反復順序は追加順（トグルは末尾に追加、全選択は名簿順）
//! - 直近に読み込んだ名簿の部分集合であること。名簿を再読み込みしたら
//!   台帳はリセットし、古いエントリとの突き合わせは行わない
//!
//! 名簿に存在しないアドレスを弾くのは台帳を保持する側（ワークフロー）の責務。

use std::collections::HashSet;

use crate::recipient::{EmailAddress, Recipient, Roster};

/// 選択台帳
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionLedger {
    addresses: Vec<EmailAddress>,
}

impl SelectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未選択なら追加し、選択済みなら外す
    pub fn toggle(&mut self, address: &EmailAddress) {
        if let Some(pos) = self.addresses.iter().position(|a| a == address) {
            self.addresses.remove(pos);
        } else {
            self.addresses.push(address.clone());
        }
    }

    /// 未選択なら末尾に追加する（選択済みなら何もしない）
    ///
    /// 追加した場合は `true` を返す。
    pub fn select(&mut self, address: &EmailAddress) -> bool {
        if self.contains(address) {
            return false;
        }
        self.addresses.push(address.clone());
        true
    }

    /// 台帳の内容を渡されたアドレス全件で置き換える
    pub fn select_all<'a>(&mut self, roster_addresses: impl IntoIterator<Item = &'a EmailAddress>) {
        let mut seen = HashSet::new();
        self.addresses = roster_addresses
            .into_iter()
            .filter(|address| seen.insert(*address))
            .cloned()
            .collect();
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
    }

    pub fn contains(&self, address: &EmailAddress) -> bool {
        self.addresses.contains(address)
    }

    /// 選択順のアドレス一覧
    pub fn addresses(&self) -> &[EmailAddress] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// 選択中のアドレスを名簿の受信者に解決する（選択順）
    ///
    /// 名簿にないアドレスは含めない。
    pub fn resolve(&self, roster: &Roster) -> Vec<Recipient> {
        self.addresses
            .iter()
            .filter_map(|address| roster.find(address).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn addr(s: &str) -> EmailAddress {
        EmailAddress::new(s).unwrap()
    }

    fn roster(entries: &[(&str, &str)]) -> Roster {
        Roster::new(
            entries
                .iter()
                .map(|(name, address)| Recipient::new(*name, addr(address))),
        )
    }

    fn as_strs(ledger: &SelectionLedger) -> Vec<&str> {
        ledger.addresses().iter().map(EmailAddress::as_str).collect()
    }

    #[test]
    fn トグルで追加と削除が切り替わる() {
        let mut ledger = SelectionLedger::new();

        ledger.toggle(&addr("a@x.com"));
        assert!(ledger.contains(&addr("a@x.com")));

        ledger.toggle(&addr("a@x.com"));
        assert!(ledger.is_empty());
    }

    #[rstest]
    #[case(&[])]
    #[case(&["a@x.com"])]
    #[case(&["a@x.com", "b@x.com", "c@x.com"])]
    fn 同じアドレスを2回トグルすると元の状態に戻る(#[case] initial: &[&str]) {
        let mut ledger = SelectionLedger::new();
        for a in initial {
            ledger.toggle(&addr(a));
        }
        let before = ledger.clone();

        for target in ["a@x.com", "b@x.com", "z@x.com"] {
            ledger.toggle(&addr(target));
            ledger.toggle(&addr(target));
            assert_eq!(
                ledger.addresses().len(),
                before.addresses().len(),
                "{target} の 2 回トグル後に件数が変わった"
            );
            for a in before.addresses() {
                assert!(ledger.contains(a));
            }
        }
    }

    #[test]
    fn selectは選択済みのアドレスを外さない() {
        let mut ledger = SelectionLedger::new();

        assert!(ledger.select(&addr("a@x.com")));
        assert!(ledger.select(&addr("b@x.com")));
        assert!(!ledger.select(&addr("a@x.com")));

        assert_eq!(as_strs(&ledger), vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn 全選択は重複したアドレスを1件にまとめる() {
        let mut ledger = SelectionLedger::new();
        let a = addr("a@x.com");
        let b = addr("b@x.com");

        ledger.select_all([&a, &b, &a]);

        assert_eq!(as_strs(&ledger), vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn トグルは末尾に追加する() {
        let mut ledger = SelectionLedger::new();
        ledger.toggle(&addr("b@x.com"));
        ledger.toggle(&addr("a@x.com"));

        assert_eq!(as_strs(&ledger), vec!["b@x.com", "a@x.com"]);
    }

    #[rstest]
    #[case(&[])]
    #[case(&[("Ann", "a@x.com")])]
    #[case(&[("Ann", "a@x.com"), ("Bo", "b@x.com"), ("Cy", "c@x.com")])]
    fn 全選択してから全解除すると空になり常に名簿の部分集合(
        #[case] entries: &[(&str, &str)],
    ) {
        let roster = roster(entries);
        let mut ledger = SelectionLedger::new();

        ledger.select_all(roster.addresses());
        assert_eq!(ledger.len(), roster.len());
        assert!(ledger.addresses().iter().all(|a| roster.contains(a)));

        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn 全選択は既存の選択を名簿順で置き換える() {
        let roster = roster(&[("Ann", "a@x.com"), ("Bo", "b@x.com")]);
        let mut ledger = SelectionLedger::new();
        ledger.toggle(&addr("b@x.com"));

        ledger.select_all(roster.addresses());

        assert_eq!(as_strs(&ledger), vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn 選択を名簿の受信者に選択順で解決する() {
        let roster = roster(&[("Ann", "a@x.com"), ("Bo", "b@x.com")]);
        let mut ledger = SelectionLedger::new();
        ledger.toggle(&addr("b@x.com"));
        ledger.toggle(&addr("a@x.com"));

        let names: Vec<String> = ledger
            .resolve(&roster)
            .iter()
            .map(|r| r.display_name().to_string())
            .collect();

        assert_eq!(names, vec!["Bo", "Ann"]);
    }
}
