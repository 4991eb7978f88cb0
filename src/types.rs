//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::collections::HashMap;

use chrono::NaiveDateTime;

/// セルの値を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    Text(String),

    /// 論理値
    Bool(bool),

    /// 日時
    DateTime(NaiveDateTime),

    /// 空セル（欠損値を含む）
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// 列の推論型
///
/// 型推論は前処理の前に列単位で1回だけ行われ、
/// 反復処理の途中で再分類されることはありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnType {
    /// 日時列（空でないすべての値が日時）
    DateTime,

    /// テキスト列（日時列以外のすべて）
    Text,
}

/// 前処理済みのデータセット
///
/// 列キーは正規化済みで、行の値はすべて文字列化・整形済みです。
/// 構築後は読み取り専用です。
#[derive(Debug, Clone)]
pub(crate) struct Dataset {
    /// 正規化済みの列キー（出現順）
    pub columns: Vec<String>,

    /// 前処理済みの行データ（列キーと同じ順序）
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    /// 行数を取得
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 指定行の差し込みフィールドマップを構築
    ///
    /// 列キーの出現順に挿入します。`CollisionPolicy::Overwrite`で重複キーが
    /// 許可されている場合、後の列の値が先の列の値を上書きします。
    pub fn merge_fields_for_row(&self, index: usize) -> MergeFieldMap {
        let mut map = MergeFieldMap::new();
        for (key, value) in self.columns.iter().zip(&self.rows[index]) {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}

/// 差し込みフィールドのマッピング（プレースホルダキー → 置換値）
///
/// 1行ごとに構築され、その行の`DocxTemplate::fill`呼び出しで
/// 1回だけ消費されます。構築後に変更されることはありません。
#[derive(Debug, Clone, Default)]
pub struct MergeFieldMap {
    fields: HashMap<String, String>,
}

impl MergeFieldMap {
    /// 空のマップを生成
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// キーと値を挿入
    ///
    /// 既存のキーは上書きされます。
    pub fn insert(&mut self, key: String, value: String) {
        self.fields.insert(key, value);
    }

    /// キーに対応する値を取得
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    /// キーが存在するかを判定
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// フィールド数を取得
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// マップが空かどうかを判定
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for MergeFieldMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// 生成された1件の文書（ファイル名とバイト列のペア）
///
/// ファイル名は行の序数（1始まり）から導出されます。
/// 生成後は不変であり、所有権はバッチ処理の出力コレクションへ、
/// その後アーカイブ生成へと移動します。
#[derive(Debug, Clone)]
pub(crate) struct GeneratedDocument {
    /// アーカイブ内のエントリ名（例: `Document_1.docx`）
    pub filename: String,

    /// シリアライズ済みのDOCXバイト列
    pub bytes: Vec<u8>,
}
