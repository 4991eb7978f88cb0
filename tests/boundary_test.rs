//! 境界値テスト
//!
//! 空のデータセット、欠損列、不正な入力など、
//! 通常の差し込みから外れたケースの動作を検証する。

use std::io::{Cursor, Read, Write};

use docxmerge::{DocxMergeError, DocxTemplate, InspectedDocument, Merger};
use rust_xlsxwriter::Workbook;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// ヘッダー行（とデータ行）からテスト用XLSXを生成
fn xlsx(headers: &[&str], rows: &[Vec<&str>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet
                    .write_string((row_idx + 1) as u32, col as u16, *value)
                    .unwrap();
            }
        }
    }

    workbook.save_to_buffer().unwrap()
}

/// 最小限のDOCXテンプレートを生成
fn docx(document_xml: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();

    writer.start_file("[Content_Types].xml", options).unwrap();
    writer
        .write_all(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                r#"</Types>"#
            )
            .as_bytes(),
        )
        .unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document_xml.as_bytes()).unwrap();

    writer.finish().unwrap().into_inner()
}

/// `<<option>>`マーカー入りのテンプレート
fn option_template() -> Vec<u8> {
    docx(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        r#"<w:body><w:p><w:r><w:t>Suffix: &lt;&lt;option&gt;&gt;</w:t></w:r></w:p></w:body></w:document>"#
    ))
}

#[test]
fn test_empty_dataset_produces_empty_archive() {
    // ヘッダー行のみでデータ行なし
    let merger = Merger::builder().build().unwrap();
    let spreadsheet = xlsx(&["Borrowers Name"], &[]);

    let (bundle, report) = merger
        .merge_to_buffer(Cursor::new(option_template()), Cursor::new(spreadsheet))
        .unwrap();

    assert_eq!(report.rows, 0);
    assert!(report.filenames.is_empty());

    // 出力はエントリを持たない有効なZIP
    let archive = ZipArchive::new(Cursor::new(bundle)).unwrap();
    assert_eq!(archive.len(), 0);
}

#[test]
fn test_completely_empty_sheet() {
    let merger = Merger::builder().build().unwrap();
    let spreadsheet = xlsx(&[], &[]);

    let (bundle, report) = merger
        .merge_to_buffer(Cursor::new(option_template()), Cursor::new(spreadsheet))
        .unwrap();

    assert_eq!(report.rows, 0);
    let archive = ZipArchive::new(Cursor::new(bundle)).unwrap();
    assert_eq!(archive.len(), 0);
}

#[test]
fn test_single_row() {
    let merger = Merger::builder().build().unwrap();
    let spreadsheet = xlsx(&["Borrowers Name"], &[vec!["Alice"]]);

    let (bundle, report) = merger
        .merge_to_buffer(Cursor::new(option_template()), Cursor::new(spreadsheet))
        .unwrap();

    assert_eq!(report.rows, 1);
    assert_eq!(report.filenames, vec!["Document_1.docx"]);

    let mut archive = ZipArchive::new(Cursor::new(bundle)).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.by_index(0).unwrap().name(), "Document_1.docx");
}

#[test]
fn test_all_empty_rows_are_skipped() {
    let merger = Merger::builder().build().unwrap();
    let spreadsheet = xlsx(
        &["Borrowers Name"],
        &[vec!["Alice"], vec![""], vec!["Bob"]],
    );

    let (_, report) = merger
        .merge_to_buffer(Cursor::new(option_template()), Cursor::new(spreadsheet))
        .unwrap();

    // 完全な空行は行数に含まれない
    assert_eq!(report.rows, 2);
}

#[test]
fn test_missing_borrower_columns_fall_back_to_anr() {
    // 債務者名列が1つも存在しない場合、決定表のフォールバックが適用される
    let merger = Merger::builder().build().unwrap();
    let spreadsheet = xlsx(&["Loan No"], &[vec!["1001"]]);

    let (bundle, _) = merger
        .merge_to_buffer(Cursor::new(option_template()), Cursor::new(spreadsheet))
        .unwrap();

    let mut archive = ZipArchive::new(Cursor::new(bundle)).unwrap();
    let mut entry = archive.by_name("Document_1.docx").unwrap();
    let mut document = Vec::new();
    entry.read_to_end(&mut document).unwrap();

    let inspected = InspectedDocument::parse(&document).unwrap();
    assert_eq!(inspected.text(), "Suffix: AND ANR");
}

#[test]
fn test_whitespace_only_borrower_is_missing() {
    let merger = Merger::builder().build().unwrap();
    let spreadsheet = xlsx(
        &["Borrowers Name", "Borrower 2 Name", "Borrower 3 Name"],
        &[vec!["Alice", "   ", ""]],
    );

    let (bundle, _) = merger
        .merge_to_buffer(Cursor::new(option_template()), Cursor::new(spreadsheet))
        .unwrap();

    let mut archive = ZipArchive::new(Cursor::new(bundle)).unwrap();
    let mut entry = archive.by_name("Document_1.docx").unwrap();
    let mut document = Vec::new();
    entry.read_to_end(&mut document).unwrap();

    // 空白のみの債務者2は欠損扱い → 単独債務者 → サフィックスなし
    let inspected = InspectedDocument::parse(&document).unwrap();
    assert_eq!(inspected.text(), "Suffix: ");
}

#[test]
fn test_invalid_template_is_rejected() {
    let merger = Merger::builder().build().unwrap();
    let spreadsheet = xlsx(&["Borrowers Name"], &[vec!["Alice"]]);

    let result = merger.merge_to_buffer(
        Cursor::new(b"not a docx file".to_vec()),
        Cursor::new(spreadsheet),
    );
    assert!(matches!(result, Err(DocxMergeError::Zip(_))));
}

#[test]
fn test_zip_without_document_xml_is_rejected() {
    let merger = Merger::builder().build().unwrap();
    let spreadsheet = xlsx(&["Borrowers Name"], &[vec!["Alice"]]);

    // 有効なZIPだがword/document.xmlを持たない
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("hello.txt", FileOptions::default())
        .unwrap();
    writer.write_all(b"hello").unwrap();
    let not_a_docx = writer.finish().unwrap().into_inner();

    let result = merger.merge_to_buffer(Cursor::new(not_a_docx), Cursor::new(spreadsheet));
    assert!(matches!(result, Err(DocxMergeError::Template(_))));
}

#[test]
fn test_invalid_spreadsheet_is_rejected() {
    let merger = Merger::builder().build().unwrap();

    let result = merger.merge_to_buffer(
        Cursor::new(option_template()),
        Cursor::new(b"not a spreadsheet".to_vec()),
    );
    assert!(result.is_err());
}

#[test]
fn test_template_with_path_traversal_entry_is_rejected() {
    // パストラバーサルを含むZIPエントリはセキュリティ違反として拒否される
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(b"<w:document/>").unwrap();
    writer.start_file("../evil.xml", options).unwrap();
    writer.write_all(b"evil").unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let result = DocxTemplate::from_bytes(bytes);
    assert!(matches!(
        result,
        Err(DocxMergeError::SecurityViolation(_))
    ));
}

#[test]
fn test_columns_without_header_are_ignored() {
    // ヘッダーが空の列は差し込み対象にならない
    let merger = Merger::builder().build().unwrap();
    let spreadsheet = xlsx(
        &["Borrowers Name", "", "Loan No"],
        &[vec!["Alice", "stray", "1001"]],
    );

    let (_, report) = merger
        .merge_to_buffer(Cursor::new(option_template()), Cursor::new(spreadsheet))
        .unwrap();
    assert_eq!(report.rows, 1);
}
