//! Column Normalizer Module
//!
//! スプレッドシートの生ヘッダー文字列を、差し込みフィールドとして
//! 安全なキーに正規化する純粋関数を提供するモジュール。

/// 生ヘッダー文字列を差し込みフィールドキーに正規化
///
/// 以下の規則をこの順序で適用します。
///
/// 1. 空白文字（スペース）をすべて`_`に置換する
/// 2. 先頭以外に改行を含む場合、すべての改行を`_`に置換する
/// 3. そうでなく先頭が改行の場合、最初の改行のみを`M__`に置換する
/// 4. 括弧文字`(` `)`を削除する（括弧内の内容は残す。例: `13(2)` → `132`）
/// 5. `/`と`.`を削除する
///
/// 入力のみから決定される純粋関数であり、正規化済みの入力に再適用しても
/// 結果は変わりません（冪等）。
///
/// # 使用例
///
/// ```rust
/// use docxmerge::normalize_header;
///
/// assert_eq!(normalize_header("Loan No"), "Loan_No");
/// assert_eq!(normalize_header("Loan (13)/Date."), "Loan_13Date");
/// ```
pub fn normalize_header(header: &str) -> String {
    // 1. スペースをアンダースコアに置換
    let col = header.replace(' ', "_");

    // 2-3. 改行の処理（先頭改行は別規則）
    let col = if col.contains('\n') && !col.starts_with('\n') {
        col.replace('\n', "_")
    } else if col.starts_with('\n') {
        col.replacen('\n', "M__", 1)
    } else {
        col
    };

    // 4-5. 括弧・スラッシュ・ピリオドの削除
    col.chars()
        .filter(|c| !matches!(c, '(' | ')' | '/' | '.'))
        .collect()
}
