//! Derived Fields Module
//!
//! 行の既存フィールドから合成フィールドを計算するモジュール。
//! 複数債務者の「option」サフィックスの判定ロジックを提供します。

use crate::types::MergeFieldMap;

/// 第1債務者の正規化済みフィールドキー
const BORROWER_1: &str = "Borrowers_Name";
/// 第2債務者の正規化済みフィールドキー
const BORROWER_2: &str = "Borrower_2_Name";
/// 第3債務者の正規化済みフィールドキー
const BORROWER_3: &str = "Borrower_3_Name";

/// 欠損値を空文字列に変換し、前後の空白を取り除く
///
/// フィールドが存在しない場合は空文字列として扱います。
pub(crate) fn clean_value(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or("")
}

/// 債務者フィールドから「option」サフィックスを計算
///
/// 3つの債務者名フィールドの有無を`clean_value`で個別に判定し、
/// 以下の決定表をこの順序で評価します。
///
/// | 債務者1 | 債務者2 | 債務者3 | 結果 |
/// |---------|---------|---------|------|
/// | あり | あり | あり | `AND ORS` |
/// | あり | あり | なし | `AND ANR` |
/// | あり | なし | なし | （空文字列） |
/// | それ以外の組み合わせ | | | `AND ANR` |
pub(crate) fn compute_option(fields: &MergeFieldMap) -> &'static str {
    let b1 = !clean_value(fields.get(BORROWER_1)).is_empty();
    let b2 = !clean_value(fields.get(BORROWER_2)).is_empty();
    let b3 = !clean_value(fields.get(BORROWER_3)).is_empty();

    match (b1, b2, b3) {
        (true, true, true) => "AND ORS",
        (true, true, false) => "AND ANR",
        (true, false, false) => "",
        _ => "AND ANR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(b1: Option<&str>, b2: Option<&str>, b3: Option<&str>) -> MergeFieldMap {
        let mut map = MergeFieldMap::new();
        if let Some(v) = b1 {
            map.insert(BORROWER_1.to_string(), v.to_string());
        }
        if let Some(v) = b2 {
            map.insert(BORROWER_2.to_string(), v.to_string());
        }
        if let Some(v) = b3 {
            map.insert(BORROWER_3.to_string(), v.to_string());
        }
        map
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value(None), "");
        assert_eq!(clean_value(Some("")), "");
        assert_eq!(clean_value(Some("  Alice  ")), "Alice");
    }

    #[test]
    fn test_all_three_borrowers() {
        let map = fields(Some("Alice"), Some("Bob"), Some("Carol"));
        assert_eq!(compute_option(&map), "AND ORS");
    }

    #[test]
    fn test_two_borrowers() {
        let map = fields(Some("Alice"), Some("Bob"), None);
        assert_eq!(compute_option(&map), "AND ANR");

        // 空文字列は欠損として扱われる
        let map = fields(Some("Alice"), Some("Bob"), Some(""));
        assert_eq!(compute_option(&map), "AND ANR");
    }

    #[test]
    fn test_single_borrower() {
        let map = fields(Some("Alice"), None, None);
        assert_eq!(compute_option(&map), "");
    }

    #[test]
    fn test_irregular_combinations() {
        // 債務者1なし・債務者2あり
        let map = fields(None, Some("Bob"), None);
        assert_eq!(compute_option(&map), "AND ANR");

        // 債務者1と3のみ（2が欠損）
        let map = fields(Some("Alice"), None, Some("Carol"));
        assert_eq!(compute_option(&map), "AND ANR");

        // すべて欠損
        let map = fields(None, None, None);
        assert_eq!(compute_option(&map), "AND ANR");
    }

    #[test]
    fn test_whitespace_only_is_missing() {
        let map = fields(Some("Alice"), Some("   "), None);
        assert_eq!(compute_option(&map), "");
    }
}
