//! Inspect Module
//!
//! 差し込み済みDOCXの内容を検証するための読み取り専用モデル。
//! 本文（`word/document.xml`）を段落・ラン・テーブルの階層に
//! 展開し、テキストと太字書式を確認できるようにします。
//!
//! 完全なWordprocessingMLモデルではありません。差し込み結果の
//! 検証に必要な範囲（テキスト内容、ランの太字、テーブル構造）に
//! 限定しています。

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::DocxMergeError;

/// 文書本文のブロック要素
#[derive(Debug, Clone)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// テキストのラン（書式が均一な最小単位）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// ランのテキスト内容
    pub text: String,
    /// 太字書式が設定されているか
    pub bold: bool,
}

/// 段落
#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// 段落内の全ランを連結したテキスト
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// テーブル
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

/// テーブル行
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

/// テーブルセル
#[derive(Debug, Clone, Default)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
}

impl TableCell {
    /// セル内の全段落を連結したテキスト
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<String>>()
            .join("\n")
    }
}

/// 解析済みのDOCX本文
#[derive(Debug, Clone, Default)]
pub struct InspectedDocument {
    pub blocks: Vec<Block>,
}

impl InspectedDocument {
    /// DOCXバイト列から本文を解析
    ///
    /// # 引数
    ///
    /// * `docx` - DOCXファイルのバイト列
    ///
    /// # 戻り値
    ///
    /// * `Ok(InspectedDocument)` - 解析済みの本文モデル
    /// * `Err(DocxMergeError)` - ZIP/XMLの解析に失敗した場合
    pub fn parse(docx: &[u8]) -> Result<Self, DocxMergeError> {
        let mut archive = ZipArchive::new(Cursor::new(docx))
            .map_err(|e| DocxMergeError::Zip(format!("failed to open DOCX container: {}", e)))?;
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|e| DocxMergeError::Zip(format!("failed to read word/document.xml: {}", e)))?;
        let mut xml = Vec::new();
        entry.read_to_end(&mut xml)?;
        Self::parse_xml(&xml)
    }

    /// WordprocessingMLパートのバイト列から本文を解析
    pub fn parse_xml(xml: &[u8]) -> Result<Self, DocxMergeError> {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();

        let mut blocks: Vec<Block> = Vec::new();
        // ネストしたテーブルは最も内側のセルに畳み込まれる
        let mut tables: Vec<Table> = Vec::new();
        let mut paragraph: Option<Paragraph> = None;
        let mut run: Option<Run> = None;
        let mut in_rpr = false;
        let mut in_ppr = false;
        let mut in_t = false;

        loop {
            let event = reader.read_event_into(&mut buf)?;
            match &event {
                Event::Eof => break,

                Event::Start(e) => match e.name().as_ref() {
                    b"w:tbl" => tables.push(Table::default()),
                    b"w:tr" => {
                        if let Some(table) = tables.last_mut() {
                            table.rows.push(TableRow::default());
                        }
                    }
                    b"w:tc" => {
                        if let Some(row) = tables.last_mut().and_then(|t| t.rows.last_mut()) {
                            row.cells.push(TableCell::default());
                        }
                    }
                    b"w:p" => paragraph = Some(Paragraph::default()),
                    b"w:pPr" => in_ppr = true,
                    b"w:r" if !in_ppr => {
                        run = Some(Run {
                            text: String::new(),
                            bold: false,
                        })
                    }
                    b"w:rPr" if !in_ppr => in_rpr = true,
                    b"w:b" if in_rpr => {
                        if let Some(run) = run.as_mut() {
                            run.bold = bold_attribute_value(e)?;
                        }
                    }
                    b"w:t" => in_t = true,
                    _ => {}
                },

                Event::Empty(e) => match e.name().as_ref() {
                    b"w:b" if in_rpr => {
                        if let Some(run) = run.as_mut() {
                            run.bold = bold_attribute_value(e)?;
                        }
                    }
                    _ => {}
                },

                Event::Text(t) => {
                    if in_t {
                        if let Some(run) = run.as_mut() {
                            run.text.push_str(&t.unescape()?);
                        }
                    }
                }

                Event::End(e) => match e.name().as_ref() {
                    b"w:t" => in_t = false,
                    b"w:rPr" => in_rpr = false,
                    b"w:pPr" => in_ppr = false,
                    b"w:r" => {
                        if let (Some(p), Some(r)) = (paragraph.as_mut(), run.take()) {
                            p.runs.push(r);
                        }
                    }
                    b"w:p" => {
                        if let Some(p) = paragraph.take() {
                            match tables.last_mut().and_then(|t| t.rows.last_mut()).and_then(
                                |row| row.cells.last_mut(),
                            ) {
                                Some(cell) => cell.paragraphs.push(p),
                                None => blocks.push(Block::Paragraph(p)),
                            }
                        }
                    }
                    b"w:tbl" => {
                        if let Some(table) = tables.pop() {
                            match tables.last_mut().and_then(|t| t.rows.last_mut()).and_then(
                                |row| row.cells.last_mut(),
                            ) {
                                // ネストしたテーブルは親セルの段落に畳み込む
                                Some(cell) => {
                                    for row in table.rows {
                                        for inner in row.cells {
                                            cell.paragraphs.extend(inner.paragraphs);
                                        }
                                    }
                                }
                                None => blocks.push(Block::Table(table)),
                            }
                        }
                    }
                    _ => {}
                },

                _ => {}
            }
            buf.clear();
        }

        Ok(Self { blocks })
    }

    /// 文書内の全段落（テーブルセル内を含む）
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut result = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(p) => result.push(p),
                Block::Table(table) => {
                    for row in &table.rows {
                        for cell in &row.cells {
                            result.extend(cell.paragraphs.iter());
                        }
                    }
                }
            }
        }
        result
    }

    /// 文書内の全ラン（テーブルセル内を含む）
    pub fn runs(&self) -> Vec<&Run> {
        self.paragraphs()
            .into_iter()
            .flat_map(|p| p.runs.iter())
            .collect()
    }

    /// 文書全体のテキスト（段落ごとに改行区切り）
    pub fn text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(|p| p.text())
            .collect::<Vec<String>>()
            .join("\n")
    }

    /// 文書内のテーブル一覧
    pub fn tables(&self) -> Vec<&Table> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Table(t) => Some(t),
                Block::Paragraph(_) => None,
            })
            .collect()
    }
}

/// `w:b`要素の有効値を判定
///
/// `w:val`属性が存在しない場合は有効（太字）、
/// `0`/`false`/`off`の場合は無効と解釈します。
fn bold_attribute_value(e: &BytesStart<'_>) -> Result<bool, DocxMergeError> {
    for attr in e.attributes() {
        let attr = attr
            .map_err(|e| DocxMergeError::Template(format!("bad attribute in w:b: {}", e)))?;
        if attr.key.as_ref() == b"w:val" {
            return Ok(!matches!(attr.value.as_ref(), b"0" | b"false" | b"off"));
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paragraph_with_bold_run() {
        let xml = concat!(
            "<w:document><w:body>",
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Bold</w:t></w:r><w:r><w:t> plain</w:t></w:r></w:p>"#,
            "</w:body></w:document>"
        );
        let doc = InspectedDocument::parse_xml(xml.as_bytes()).unwrap();

        let runs = doc.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "Bold");
        assert!(runs[0].bold);
        assert_eq!(runs[1].text, " plain");
        assert!(!runs[1].bold);
        assert_eq!(doc.text(), "Bold plain");
    }

    #[test]
    fn test_bold_val_zero_is_not_bold() {
        let xml = r#"<w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>x</w:t></w:r></w:p>"#;
        let doc = InspectedDocument::parse_xml(xml.as_bytes()).unwrap();
        assert!(!doc.runs()[0].bold);

        let xml = r#"<w:p><w:r><w:rPr><w:b w:val="false"/></w:rPr><w:t>x</w:t></w:r></w:p>"#;
        let doc = InspectedDocument::parse_xml(xml.as_bytes()).unwrap();
        assert!(!doc.runs()[0].bold);
    }

    #[test]
    fn test_ppr_rpr_does_not_mark_runs_bold() {
        // 段落プロパティ内のランプロパティ（段落マーク書式）は無視される
        let xml = concat!(
            "<w:p>",
            "<w:pPr><w:rPr><w:b/></w:rPr></w:pPr>",
            "<w:r><w:t>plain</w:t></w:r>",
            "</w:p>"
        );
        let doc = InspectedDocument::parse_xml(xml.as_bytes()).unwrap();

        let runs = doc.runs();
        assert_eq!(runs.len(), 1);
        assert!(!runs[0].bold);
    }

    #[test]
    fn test_parse_table() {
        let xml = concat!(
            "<w:tbl><w:tr>",
            r#"<w:tc><w:p><w:r><w:t>A1</w:t></w:r></w:p></w:tc>"#,
            r#"<w:tc><w:p><w:r><w:t>B1</w:t></w:r></w:p></w:tc>"#,
            "</w:tr></w:tbl>"
        );
        let doc = InspectedDocument::parse_xml(xml.as_bytes()).unwrap();

        let tables = doc.tables();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 1);
        assert_eq!(tables[0].rows[0].cells.len(), 2);
        assert_eq!(tables[0].rows[0].cells[0].text(), "A1");
        assert_eq!(tables[0].rows[0].cells[1].text(), "B1");
    }

    #[test]
    fn test_parse_rejects_non_zip() {
        assert!(InspectedDocument::parse(b"not a zip").is_err());
    }
}
