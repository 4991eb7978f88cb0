//! Dataset Module
//!
//! スプレッドシートの先頭シートを読み込み、前処理済みの`Dataset`を構築する。
//! ヘッダー行の正規化、列単位の型推論、セル値の整形をここで行います。

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};

use crate::api::CollisionPolicy;
use crate::builder::MergeConfig;
use crate::error::DocxMergeError;
use crate::normalize::normalize_header;
use crate::types::{CellValue, ColumnType, Dataset};

/// スプレッドシートのバイト列からデータセットを読み込む
///
/// 先頭シートの1行目をヘッダー、以降をデータ行として解釈します。
///
/// # 処理フロー
///
/// 1. calamineでワークブックを開く（XLSX形式のみサポート）
/// 2. ヘッダー行を正規化し、衝突ポリシーに従って列キーを確定
/// 3. セル値を抽出（完全な空行はスキップ）
/// 4. 列単位で型推論を行い、値を文字列に整形
///
/// # 戻り値
///
/// * `Ok(Dataset)` - 前処理済みのデータセット
/// * `Err(DocxMergeError)` - 解析エラー、または列キー衝突が発生した場合
pub(crate) fn load_dataset(bytes: &[u8], config: &MergeConfig) -> Result<Dataset, DocxMergeError> {
    // 1. calamineでワークブックを開く
    let sheets = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(DocxMergeError::Spreadsheet)?;
    let mut workbook = match sheets {
        Sheets::Xlsx(workbook) => workbook,
        _ => {
            return Err(DocxMergeError::Config(
                "Only XLSX format is supported".to_string(),
            ))
        }
    };

    let sheet_names = workbook.sheet_names().to_vec();
    let first_sheet = sheet_names
        .first()
        .ok_or_else(|| DocxMergeError::Spreadsheet(calamine::Error::Msg("workbook contains no sheets")))?;

    let range = workbook
        .worksheet_range(first_sheet)
        .map_err(|e| DocxMergeError::Spreadsheet(e.into()))?;

    let mut rows_iter = range.rows();

    // 2. ヘッダー行の正規化と衝突検出
    let header_row = match rows_iter.next() {
        Some(row) => row,
        None => {
            // ヘッダーすら存在しない場合は空のデータセット
            return Ok(Dataset {
                columns: Vec::new(),
                rows: Vec::new(),
            });
        }
    };

    // (元の列インデックス, 正規化済みキー)
    let mut columns: Vec<(usize, String)> = Vec::new();
    // 正規化済みキー -> 最初に出現した生ヘッダー（衝突検出用）
    let mut seen: HashMap<String, String> = HashMap::new();

    for (col_idx, cell) in header_row.iter().enumerate() {
        let raw = header_cell_to_string(cell);
        if raw.is_empty() {
            // ヘッダーのない列は無視する
            continue;
        }

        let key = normalize_header(&raw);
        if let Some(first_raw) = seen.get(&key) {
            match config.collision_policy {
                CollisionPolicy::Error => {
                    return Err(DocxMergeError::ColumnCollision {
                        key,
                        first: first_raw.clone(),
                        second: raw,
                    });
                }
                CollisionPolicy::Overwrite => {
                    // 重複キーを許可する。MergeFieldMap構築時に後の列が優先される
                }
            }
        } else {
            seen.insert(key.clone(), raw);
        }
        columns.push((col_idx, key));
    }

    // 3. セル値の抽出（完全な空行はスキップ）
    let mut raw_rows: Vec<Vec<CellValue>> = Vec::new();
    for row in rows_iter {
        let values: Vec<CellValue> = columns
            .iter()
            .map(|(col_idx, _)| row.get(*col_idx).map(cell_to_value).unwrap_or(CellValue::Empty))
            .collect();

        if values.iter().all(CellValue::is_empty) {
            continue;
        }
        raw_rows.push(values);
    }

    // 4. 列単位の型推論と値の整形
    let date_pattern = config.date_format.pattern();
    let column_types: Vec<ColumnType> = (0..columns.len())
        .map(|i| infer_column_type(raw_rows.iter().map(|row| &row[i])))
        .collect();

    let rows: Vec<Vec<String>> = raw_rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&column_types)
                .map(|(value, col_type)| render_value(value, *col_type, date_pattern))
                .collect()
        })
        .collect();

    Ok(Dataset {
        columns: columns.into_iter().map(|(_, key)| key).collect(),
        rows,
    })
}

/// ヘッダーセルを生文字列に変換
fn header_cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// calamineのセルデータを内部表現に変換
fn cell_to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Empty),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Empty,
    }
}

/// 列の型を推論
///
/// 空でないすべての値が日時であり、かつ少なくとも1つ存在する場合のみ
/// 日時列と判定します。推論は列ごとに1回だけ行われます。
fn infer_column_type<'a>(values: impl Iterator<Item = &'a CellValue>) -> ColumnType {
    let mut has_datetime = false;
    for value in values {
        match value {
            CellValue::DateTime(_) => has_datetime = true,
            CellValue::Empty => {}
            _ => return ColumnType::Text,
        }
    }
    if has_datetime {
        ColumnType::DateTime
    } else {
        ColumnType::Text
    }
}

/// セル値を差し込み用の文字列に整形
///
/// - 日時列: 設定された日付形式（デフォルト`DD-MM-YYYY`）で出力
/// - テキスト列: 前後の空白を除去し、連続する空白文字（改行を含む）を
///   単一のスペースに畳み込む
/// - 欠損値: 空文字列
fn render_value(value: &CellValue, col_type: ColumnType, date_pattern: &str) -> String {
    match (value, col_type) {
        (CellValue::Empty, _) => String::new(),
        (CellValue::DateTime(dt), _) => dt.format(date_pattern).to_string(),
        (CellValue::Number(n), _) => render_number(*n),
        (CellValue::Bool(b), _) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        (CellValue::Text(s), _) => collapse_whitespace(s),
    }
}

/// 数値を文字列に整形（整数値は小数点なしで出力）
fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// 前後の空白を除去し、連続する空白文字を単一スペースに畳み込む
///
/// 改行・復帰文字も空白として扱われます。
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}
