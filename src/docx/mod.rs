//! DOCX Module
//!
//! DOCXテンプレートの解析と差し込み処理を提供するモジュール。
//!
//! DOCXファイルはXMLパートを格納したZIPコンテナです。差し込みは
//! アーカイブのラウンドトリップとして実装されます。本文
//! （`word/document.xml`）とヘッダー・フッターパートだけをXML
//! イベントストリームとして書き換え、その他のエントリ（スタイル、
//! フォント、画像、リレーションシップ等）はバイト列のまま
//! コピーします。これにより、置換箇所以外の書式とレイアウトは
//! 完全に維持されます。

pub mod inspect;
pub(crate) mod rewrite;

use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::DocxMergeError;
use crate::security::SecurityConfig;
use crate::types::MergeFieldMap;

/// 解析済みのDOCXテンプレート
///
/// 1つのテンプレートから複数の行に対して差し込みを行えるよう、
/// 元のバイト列と検出済みのMERGEFIELDキー一覧を保持します。
/// `fill`は`&self`のみを要求するため、複数スレッドから並列に
/// 呼び出せます。
///
/// # 使用例
///
/// ```no_run
/// use docxmerge::{DocxTemplate, MergeFieldMap};
///
/// let bytes = std::fs::read("template.docx")?;
/// let template = DocxTemplate::from_bytes(bytes)?;
///
/// let mut fields = MergeFieldMap::new();
/// fields.insert("Borrowers_Name".to_string(), "Alice".to_string());
///
/// let filled = template.fill(&fields, &[])?;
/// std::fs::write("output.docx", filled)?;
/// # Ok::<(), docxmerge::DocxMergeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DocxTemplate {
    bytes: Vec<u8>,
    merge_fields: Vec<String>,
}

impl DocxTemplate {
    /// リーダーからテンプレートを解析
    ///
    /// # 引数
    ///
    /// * `reader` - DOCXファイルのリーダー
    ///
    /// # 戻り値
    ///
    /// * `Ok(DocxTemplate)` - 解析済みテンプレート
    /// * `Err(DocxMergeError)` - 読み込み失敗、ZIP/XMLの破損、
    ///   またはセキュリティ制限違反
    pub fn parse<R: Read>(mut reader: R) -> Result<Self, DocxMergeError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    /// バイト列からテンプレートを解析
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DocxMergeError> {
        let security = SecurityConfig::default();
        security.check_input_size(bytes.len())?;

        // 1. ZIPコンテナとして開き、セキュリティ制限を検証
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))
            .map_err(|e| DocxMergeError::Zip(format!("failed to open DOCX container: {}", e)))?;
        security.check_archive(&mut archive)?;

        // 2. 本文パートの存在確認（DOCXとしての最低条件）
        let part_names: Vec<String> = archive.file_names().map(str::to_string).collect();
        if !part_names.iter().any(|name| name == "word/document.xml") {
            return Err(DocxMergeError::Template(
                "not a DOCX file: word/document.xml is missing".to_string(),
            ));
        }

        // 3. 書き換え対象パートからMERGEFIELDキーを収集（文書順・重複除去）
        let mut merge_fields: Vec<String> = Vec::new();
        for name in &part_names {
            if !is_rewritable_part(name) {
                continue;
            }
            let mut entry = archive
                .by_name(name)
                .map_err(|e| DocxMergeError::Zip(format!("failed to read '{}': {}", name, e)))?;
            let mut xml = Vec::new();
            entry.read_to_end(&mut xml)?;

            for key in rewrite::scan_merge_fields(&xml)? {
                if !merge_fields.contains(&key) {
                    merge_fields.push(key);
                }
            }
        }

        Ok(Self {
            bytes,
            merge_fields,
        })
    }

    /// テンプレート内で検出されたMERGEFIELDキーの一覧
    ///
    /// 文書順で、重複は除去されています。テンプレートの検査や
    /// スプレッドシート列との突き合わせに利用できます。
    pub fn merge_fields(&self) -> &[String] {
        &self.merge_fields
    }

    /// テンプレートに差し込みを適用し、完成したDOCXのバイト列を返す
    ///
    /// # 引数
    ///
    /// * `fields` - MERGEFIELDキー → 置換値のマッピング。
    ///   テンプレートにあってマッピングにないキーはそのまま残されます
    /// * `literals` - ランテキスト内で置換するリテラルマーカーのペア
    ///
    /// # 戻り値
    ///
    /// * `Ok(Vec<u8>)` - 差し込み済みDOCXのバイト列
    /// * `Err(DocxMergeError)` - ZIP/XML処理に失敗した場合
    pub fn fill(
        &self,
        fields: &MergeFieldMap,
        literals: &[(String, String)],
    ) -> Result<Vec<u8>, DocxMergeError> {
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))
            .map_err(|e| DocxMergeError::Zip(format!("failed to open DOCX container: {}", e)))?;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| DocxMergeError::Zip(format!("failed to read entry {}: {}", i, e)))?;
            let name = entry.name().to_string();

            if entry.is_dir() {
                writer
                    .add_directory(name.as_str(), options)
                    .map_err(|e| DocxMergeError::Zip(format!("failed to write directory: {}", e)))?;
                continue;
            }

            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;

            // 本文・ヘッダー・フッターのみ書き換え、他は無変更でコピー
            let data = if is_rewritable_part(&name) {
                rewrite::substitute(&data, fields, literals)?
            } else {
                data
            };

            writer
                .start_file(name.as_str(), options)
                .map_err(|e| DocxMergeError::Zip(format!("failed to write '{}': {}", name, e)))?;
            writer.write_all(&data)?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| DocxMergeError::Zip(format!("failed to finalize DOCX: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

/// 差し込み対象のXMLパートかどうかを判定
///
/// 本文（`word/document.xml`）とヘッダー・フッター
/// （`word/header*.xml`、`word/footer*.xml`）が対象です。
fn is_rewritable_part(name: &str) -> bool {
    if name == "word/document.xml" {
        return true;
    }
    (name.starts_with("word/header") || name.starts_with("word/footer")) && name.ends_with(".xml")
}
