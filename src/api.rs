//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

/// 日付の出力形式
///
/// スプレッドシートの日付セルを差し込み値に変換する際の出力形式を指定します。
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DateFormat {
    /// DD-MM-YYYY形式（デフォルト）
    ///
    /// 例: `07-03-2024`
    DayMonthYear,

    /// カスタム形式（chrono互換フォーマット文字列）
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use docxmerge::{DateFormat, MergerBuilder};
    ///
    /// # fn main() -> Result<(), docxmerge::DocxMergeError> {
    /// let merger = MergerBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%Y/%m/%d".to_string()))
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    Custom(String),
}

impl DateFormat {
    /// chrono互換のフォーマット文字列を取得
    pub(crate) fn pattern(&self) -> &str {
        match self {
            DateFormat::DayMonthYear => "%d-%m-%Y",
            DateFormat::Custom(s) => s.as_str(),
        }
    }
}

/// 正規化後の列キーが衝突した場合の処理方針
///
/// 異なる生ヘッダー（例: `Loan No`と`Loan.No`）が同一のキーに
/// 正規化されることがあります。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CollisionPolicy {
    /// エラーとして処理を中断する（デフォルト）
    ///
    /// 衝突した両方の生ヘッダーを`DocxMergeError::ColumnCollision`で報告します。
    Error,

    /// 後の列の値で上書きする
    ///
    /// 衝突したキーについては、右側（後に出現した）列の値が使用されます。
    Overwrite,
}
