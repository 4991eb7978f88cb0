//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// docxmergeクレート全体で使用するエラー型
///
/// テンプレートの読み込み、スプレッドシートの解析、差し込み処理、
/// アーカイブ生成中に発生するすべてのエラーを統一的に扱います。
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー
/// - `Spreadsheet`: Excelファイルの解析中に発生したエラー（calamine由来）
/// - `Template`: DOCXテンプレートの構造が不正な場合のエラー
/// - `Zip`: ZIPアーカイブ（DOCX/XLSXコンテナ）の解析エラー
/// - `Xml`: XMLパートの解析エラー（quick-xml由来）
/// - `ColumnCollision`: 正規化後の列キーが衝突した場合のエラー
/// - `Row`: 特定の行の差し込み処理に失敗した場合のエラー
/// - `Config`: 設定の検証に失敗したエラー
/// - `Packaging`: 出力アーカイブの生成に失敗したエラー
/// - `SecurityViolation`: セキュリティ制限に違反したエラー
#[derive(Error, Debug)]
pub enum DocxMergeError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Excelファイルの解析中に発生したエラー
    ///
    /// calamineクレートがスプレッドシートを解析する際に発生したエラーです。
    /// ファイル形式が不正、破損したファイルなどが原因となります。
    #[error("Failed to parse spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// DOCXテンプレートの構造が不正な場合のエラー
    ///
    /// `word/document.xml`が存在しない、必須パートが読み込めないなど、
    /// テンプレートがWord文書として成立していない場合に発生します。
    #[error("Invalid DOCX template: {0}")]
    Template(String),

    /// ZIPアーカイブ（DOCX/XLSXコンテナ）の解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// XMLパートの解析エラー
    ///
    /// `#[from]`属性により、`quick_xml::Error`から自動的に変換されます。
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// UTF-8文字列の変換エラー
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// 正規化後の列キーが衝突した場合のエラー
    ///
    /// 異なる2つの生ヘッダーが同一のキーに正規化された場合に発生します。
    /// `CollisionPolicy::Overwrite`を指定した場合、このエラーは発生せず
    /// 後の列が優先されます。
    #[error("Column collision: headers '{first}' and '{second}' both normalize to '{key}'")]
    ColumnCollision {
        /// 衝突した正規化後のキー
        key: String,
        /// 先に出現した生ヘッダー
        first: String,
        /// 後に出現した生ヘッダー
        second: String,
    },

    /// 特定の行の差し込み処理に失敗した場合のエラー
    ///
    /// 行番号は1始まりです。バッチ処理はフェイルファストであり、
    /// 最初に失敗した行（最小の行番号）のエラーが報告されます。
    #[error("Failed to generate document for row {row}: {source}")]
    Row {
        /// 失敗した行番号（1始まり）
        row: usize,
        /// 失敗の原因
        #[source]
        source: Box<DocxMergeError>,
    },

    /// 設定の検証に失敗したエラー
    ///
    /// `MergerBuilder::build()`時に設定を検証し、無効な設定が検出された
    /// 場合に発生します。例えば、カスタム日付形式が不正な場合などです。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 出力アーカイブの生成に失敗したエラー
    #[error("Failed to package output archive: {0}")]
    Packaging(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限などの
    /// セキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: DocxMergeError = io_err.into();

        match error {
            DocxMergeError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_spreadsheet_error_conversion() {
        let parse_err = calamine::Error::Msg("Invalid file format");
        let error: DocxMergeError = parse_err.into();

        match error {
            DocxMergeError::Spreadsheet(_) => {}
            _ => panic!("Expected Spreadsheet error"),
        }
    }

    #[test]
    fn test_column_collision_display() {
        let error = DocxMergeError::ColumnCollision {
            key: "Loan_No".to_string(),
            first: "Loan No".to_string(),
            second: "Loan.No".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("Loan_No"));
        assert!(msg.contains("Loan No"));
        assert!(msg.contains("Loan.No"));
    }

    #[test]
    fn test_row_error_display() {
        let inner = DocxMergeError::Template("missing word/document.xml".to_string());
        let error = DocxMergeError::Row {
            row: 3,
            source: Box::new(inner),
        };

        let msg = error.to_string();
        assert!(msg.contains("row 3"));
    }

    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), DocxMergeError> {
            let _file = std::fs::File::open("nonexistent_template.docx")?;
            Ok(())
        }

        let result = io_operation();
        match result {
            Err(DocxMergeError::Io(_)) => {}
            _ => panic!("Expected Io error from ? operator"),
        }
    }

    #[test]
    fn test_all_error_formats() {
        let config_err = DocxMergeError::Config("test config".to_string());
        assert!(config_err.to_string().starts_with("Configuration error"));

        let template_err = DocxMergeError::Template("test template".to_string());
        assert!(template_err.to_string().starts_with("Invalid DOCX template"));

        let packaging_err = DocxMergeError::Packaging("test packaging".to_string());
        assert!(packaging_err
            .to_string()
            .starts_with("Failed to package output archive"));

        let security_err = DocxMergeError::SecurityViolation("test".to_string());
        assert!(security_err.to_string().starts_with("Security violation"));
    }
}
