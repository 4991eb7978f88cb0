//! Security Module
//!
//! セキュリティ対策を実装するモジュール。
//! 入力のDOCX/XLSXはいずれもZIPコンテナであるため、
//! ZIP bomb攻撃やパストラバーサル攻撃への対策を提供します。

use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::error::DocxMergeError;

/// セキュリティ設定
///
/// 入力ファイル処理時のセキュリティ制限を定義します。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// 展開後の最大サイズ（バイト）
    /// デフォルト: 1GB (1_073_741_824 bytes)
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大エントリ数
    /// デフォルト: 10000
    pub max_entry_count: usize,
    /// 単一エントリの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_entry_size: u64,
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 256MB (268_435_456 bytes)
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 1_073_741_824, // 1GB
            max_entry_count: 10_000,
            max_entry_size: 104_857_600,       // 100MB
            max_input_file_size: 268_435_456, // 256MB
        }
    }
}

impl SecurityConfig {
    /// 入力ファイルサイズの上限をチェック
    pub fn check_input_size(&self, bytes_read: usize) -> Result<(), DocxMergeError> {
        if bytes_read as u64 > self.max_input_file_size {
            return Err(DocxMergeError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                bytes_read, self.max_input_file_size
            )));
        }
        Ok(())
    }

    /// ZIPアーカイブ全体の制限をチェック
    ///
    /// エントリ数・各エントリのパスとサイズ・展開後の累計サイズを検証します。
    pub fn check_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), DocxMergeError> {
        // 1. エントリ数の上限
        if archive.len() > self.max_entry_count {
            return Err(DocxMergeError::SecurityViolation(format!(
                "ZIP archive contains too many entries: {} (max: {})",
                archive.len(),
                self.max_entry_count
            )));
        }

        // 2. 各エントリのパス検証とサイズチェック
        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|e| DocxMergeError::Zip(format!("{}", e)))?;

            // パストラバーサル対策
            let entry_name = entry.name();
            validate_zip_path(entry_name).map_err(|e| {
                DocxMergeError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;

            // エントリサイズチェック
            let entry_size = entry.size();
            if entry_size > self.max_entry_size {
                return Err(DocxMergeError::SecurityViolation(format!(
                    "Entry '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    entry_name, entry_size, self.max_entry_size
                )));
            }

            // 展開後のサイズ累計をチェック
            total_decompressed_size = total_decompressed_size
                .checked_add(entry_size)
                .ok_or_else(|| {
                    DocxMergeError::SecurityViolation(
                        "Total decompressed size calculation overflow".to_string(),
                    )
                })?;

            if total_decompressed_size > self.max_decompressed_size {
                return Err(DocxMergeError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, self.max_decompressed_size
                )));
            }
        }

        Ok(())
    }
}

/// ファイルパスの検証
///
/// パストラバーサル攻撃を防ぐため、ZIPエントリのパスを検証します。
///
/// # 引数
///
/// * `path` - 検証するエントリパス
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    // 空のパスは拒否
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式の`C:\`やUnix形式の`/`で始まるパス）
    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    // `..`を含むパスを拒否（ディレクトリトラバーサル攻撃）
    if path.contains("..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    // `\`を含むパスを拒否（Windows形式のパスセパレータ）
    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_zip_path_valid() {
        assert!(validate_zip_path("word/document.xml").is_ok());
        assert!(validate_zip_path("word/header1.xml").is_ok());
        assert!(validate_zip_path("[Content_Types].xml").is_ok());
        assert!(validate_zip_path("xl/worksheets/sheet1.xml").is_ok());
    }

    #[test]
    fn test_validate_zip_path_empty() {
        assert!(validate_zip_path("").is_err());
    }

    #[test]
    fn test_validate_zip_path_absolute() {
        assert!(validate_zip_path("/etc/passwd").is_err());
        assert!(validate_zip_path("C:\\Windows\\system32").is_err());
    }

    #[test]
    fn test_validate_zip_path_traversal() {
        assert!(validate_zip_path("../etc/passwd").is_err());
        assert!(validate_zip_path("word/../../etc/passwd").is_err());
        assert!(validate_zip_path("..").is_err());
    }

    #[test]
    fn test_validate_zip_path_backslash() {
        assert!(validate_zip_path("word\\document.xml").is_err());
    }

    #[test]
    fn test_check_input_size() {
        let config = SecurityConfig::default();
        assert!(config.check_input_size(1024).is_ok());
        assert!(config
            .check_input_size(config.max_input_file_size as usize + 1)
            .is_err());
    }
}
