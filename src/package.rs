//! Package Module
//!
//! 生成された文書群を単一のZIPアーカイブにまとめるモジュール。
//! エントリは生成順（＝データ行順）で書き込まれます。

use std::io::{Seek, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::DocxMergeError;
use crate::types::GeneratedDocument;

/// 生成済み文書群をZIPアーカイブとして書き出す
///
/// # 引数
///
/// * `documents` - 生成済みの文書（ファイル名とバイト列）
/// * `writer` - 出力先（ファイル、メモリバッファ等）
///
/// # 戻り値
///
/// * `Ok(())` - 書き込み成功
/// * `Err(DocxMergeError::Packaging)` - ZIP書き込みに失敗した場合
///
/// # エッジケース
///
/// `documents`が空の場合も有効な（エントリを持たない）ZIPを出力します。
pub(crate) fn write_bundle<W: Write + Seek>(
    documents: &[GeneratedDocument],
    writer: W,
) -> Result<(), DocxMergeError> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for document in documents {
        zip.start_file(document.filename.as_str(), options)
            .map_err(|e| {
                DocxMergeError::Packaging(format!(
                    "failed to add '{}' to output archive: {}",
                    document.filename, e
                ))
            })?;
        zip.write_all(&document.bytes)?;
    }

    zip.finish()
        .map_err(|e| DocxMergeError::Packaging(format!("failed to finalize output archive: {}", e)))?;
    Ok(())
}
