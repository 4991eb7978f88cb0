//! Builder Module
//!
//! 差し込み処理のエントリポイント。`MergerBuilder`で設定を組み立て、
//! `Merger`がテンプレート解析 → データセット読み込み → 行ごとの
//! 文書生成 → ZIPバンドル出力までのパイプラインを実行します。
//! 行ごとの文書生成はrayonで並列化されますが、出力順序は
//! 常にデータ行順に維持されます。

use std::fmt::Write as _;
use std::io::{Cursor, Read, Seek, Write};

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::api::{CollisionPolicy, DateFormat};
use crate::docx::DocxTemplate;
use crate::error::DocxMergeError;
use crate::fields::compute_option;
use crate::package::write_bundle;
use crate::parser::load_dataset;
use crate::security::SecurityConfig;
use crate::types::{Dataset, GeneratedDocument};

/// デフォルトの出力ファイル名プレフィックス
const DEFAULT_FILENAME_PREFIX: &str = "Document";
/// デフォルトのリテラルマーカー（債務者サフィックスの差し込み先）
const DEFAULT_OPTION_MARKER: &str = "<<option>>";

/// 差し込み処理の設定
#[derive(Debug, Clone)]
pub(crate) struct MergeConfig {
    /// 日付列の出力形式
    pub date_format: DateFormat,
    /// 列キー衝突時の動作
    pub collision_policy: CollisionPolicy,
    /// 出力ファイル名のプレフィックス（`{prefix}_{N}.docx`）
    pub filename_prefix: String,
    /// 債務者サフィックスを差し込むリテラルマーカー
    pub option_marker: String,
    /// 追加のリテラルマーカー置換ペア
    pub literals: Vec<(String, String)>,
    /// セキュリティ制限
    pub security: SecurityConfig,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            date_format: DateFormat::DayMonthYear,
            collision_policy: CollisionPolicy::Error,
            filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
            option_marker: DEFAULT_OPTION_MARKER.to_string(),
            literals: Vec::new(),
            security: SecurityConfig::default(),
        }
    }
}

/// `Merger`のビルダー
///
/// # 使用例
///
/// ```
/// use docxmerge::{CollisionPolicy, DateFormat, MergerBuilder};
///
/// let merger = MergerBuilder::new()
///     .with_date_format(DateFormat::DayMonthYear)
///     .with_collision_policy(CollisionPolicy::Error)
///     .with_filename_prefix("Notice")
///     .build()?;
/// # Ok::<(), docxmerge::DocxMergeError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MergerBuilder {
    config: MergeConfig,
}

impl MergerBuilder {
    /// デフォルト設定でビルダーを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 日付列の出力形式を設定（デフォルト: `DD-MM-YYYY`）
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.config.date_format = format;
        self
    }

    /// 列キー衝突時の動作を設定（デフォルト: エラー）
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.config.collision_policy = policy;
        self
    }

    /// 出力ファイル名のプレフィックスを設定（デフォルト: `Document`）
    ///
    /// 生成される文書は`{prefix}_{N}.docx`（Nは1始まりの行番号）と
    /// 命名されます。
    pub fn with_filename_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.filename_prefix = prefix.into();
        self
    }

    /// 債務者サフィックスの差し込み先マーカーを設定
    /// （デフォルト: `<<option>>`）
    pub fn with_option_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.option_marker = marker.into();
        self
    }

    /// 追加のリテラルマーカー置換を登録
    ///
    /// ランテキスト内の`marker`の出現箇所すべてが`value`に置換されます。
    pub fn with_literal(mut self, marker: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.literals.push((marker.into(), value.into()));
        self
    }

    /// 設定を検証して`Merger`を構築
    ///
    /// # 戻り値
    ///
    /// * `Ok(Merger)` - 構築された差し込み処理
    /// * `Err(DocxMergeError::Config)` - 設定が不正な場合
    ///   （無効な日付形式、空のプレフィックス等）
    pub fn build(self) -> Result<Merger, DocxMergeError> {
        // 1. 日付形式の検証（不正な書式指定子は出力時エラーになる）
        if let DateFormat::Custom(pattern) = &self.config.date_format {
            let probe = NaiveDate::from_ymd_opt(2024, 1, 31)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| DocxMergeError::Config("invalid probe date".to_string()))?;
            let mut rendered = String::new();
            if write!(rendered, "{}", probe.format(pattern)).is_err() {
                return Err(DocxMergeError::Config(format!(
                    "Invalid date format pattern: '{}'",
                    pattern
                )));
            }
        }

        // 2. ファイル名プレフィックスの検証
        let prefix = &self.config.filename_prefix;
        if prefix.is_empty() {
            return Err(DocxMergeError::Config(
                "Filename prefix must not be empty".to_string(),
            ));
        }
        if prefix.contains('/') || prefix.contains('\\') {
            return Err(DocxMergeError::Config(format!(
                "Filename prefix must not contain path separators: '{}'",
                prefix
            )));
        }

        // 3. マーカーの検証
        if self.config.option_marker.is_empty() {
            return Err(DocxMergeError::Config(
                "Option marker must not be empty".to_string(),
            ));
        }
        if self.config.literals.iter().any(|(marker, _)| marker.is_empty()) {
            return Err(DocxMergeError::Config(
                "Literal marker must not be empty".to_string(),
            ));
        }

        Ok(Merger {
            config: self.config,
        })
    }
}

/// 差し込み処理の実行結果
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// 処理されたデータ行数（＝生成された文書数）
    pub rows: usize,
    /// 生成された文書のファイル名（行順）
    pub filenames: Vec<String>,
}

/// 差し込み処理の実行体
///
/// DOCXテンプレートとスプレッドシートから、データ行ごとの
/// 差し込み済み文書を生成し、ZIPアーカイブとして出力します。
///
/// # 使用例
///
/// ```no_run
/// use std::fs::File;
/// use docxmerge::Merger;
///
/// let merger = Merger::builder().build()?;
/// let report = merger.merge(
///     File::open("template.docx")?,
///     File::open("data.xlsx")?,
///     File::create("output.zip")?,
/// )?;
/// println!("generated {} documents", report.rows);
/// # Ok::<(), docxmerge::DocxMergeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Merger {
    config: MergeConfig,
}

impl Merger {
    /// デフォルト設定のビルダーを作成
    pub fn builder() -> MergerBuilder {
        MergerBuilder::new()
    }

    /// 差し込みを実行し、結果をZIPアーカイブとして書き出す
    ///
    /// # 引数
    ///
    /// * `template` - DOCXテンプレートのリーダー
    /// * `spreadsheet` - XLSXスプレッドシートのリーダー
    /// * `output` - 出力ZIPアーカイブの書き込み先
    ///
    /// # 戻り値
    ///
    /// * `Ok(MergeReport)` - 処理件数と生成ファイル名
    /// * `Err(DocxMergeError)` - 入力の解析エラー、列キー衝突、
    ///   または行単位の生成エラー（`Row`に行番号が含まれる）
    ///
    /// # エッジケース
    ///
    /// データ行が0件の場合、エントリを持たない有効なZIPを出力します。
    /// いずれかの行で生成に失敗した場合は処理全体を中断し、
    /// 最も小さい行番号のエラーを返します（部分的な出力は行いません）。
    pub fn merge<T, S, W>(
        &self,
        template: T,
        spreadsheet: S,
        output: W,
    ) -> Result<MergeReport, DocxMergeError>
    where
        T: Read,
        S: Read,
        W: Write + Seek,
    {
        // 1. 入力の読み込みとサイズ検証
        let template_bytes = self.read_input(template)?;
        let spreadsheet_bytes = self.read_input(spreadsheet)?;

        // 2. テンプレート解析とデータセット読み込み
        let template = DocxTemplate::from_bytes(template_bytes)?;
        let dataset = load_dataset(&spreadsheet_bytes, &self.config)?;

        // 3. 行ごとの文書生成（並列・行順維持）
        let documents = self.generate_documents(&template, &dataset)?;

        // 4. ZIPバンドルの書き出し
        write_bundle(&documents, output)?;

        Ok(MergeReport {
            rows: documents.len(),
            filenames: documents.into_iter().map(|d| d.filename).collect(),
        })
    }

    /// 差し込みを実行し、出力ZIPをメモリ上のバッファとして返す
    pub fn merge_to_buffer<T, S>(
        &self,
        template: T,
        spreadsheet: S,
    ) -> Result<(Vec<u8>, MergeReport), DocxMergeError>
    where
        T: Read,
        S: Read,
    {
        let mut buffer = Cursor::new(Vec::new());
        let report = self.merge(template, spreadsheet, &mut buffer)?;
        Ok((buffer.into_inner(), report))
    }

    /// リーダーを読み切り、入力サイズ制限を検証
    fn read_input<R: Read>(&self, mut reader: R) -> Result<Vec<u8>, DocxMergeError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.config.security.check_input_size(bytes.len())?;
        Ok(bytes)
    }

    /// 全データ行の文書を生成（行順を維持）
    ///
    /// rayonで並列生成した後、行インデックスでソートして順序を
    /// 復元します。エラーが複数発生した場合は最も小さい行番号の
    /// ものを返します。
    fn generate_documents(
        &self,
        template: &DocxTemplate,
        dataset: &Dataset,
    ) -> Result<Vec<GeneratedDocument>, DocxMergeError> {
        let mut results: Vec<(usize, Result<GeneratedDocument, DocxMergeError>)> = (0..dataset
            .row_count())
            .into_par_iter()
            .map(|index| (index, self.generate_row(template, dataset, index)))
            .collect();

        results.sort_by_key(|(index, _)| *index);

        let mut documents = Vec::with_capacity(results.len());
        for (index, result) in results {
            match result {
                Ok(document) => documents.push(document),
                Err(source) => {
                    return Err(DocxMergeError::Row {
                        row: index + 1,
                        source: Box::new(source),
                    })
                }
            }
        }
        Ok(documents)
    }

    /// 1データ行分の文書を生成
    fn generate_row(
        &self,
        template: &DocxTemplate,
        dataset: &Dataset,
        index: usize,
    ) -> Result<GeneratedDocument, DocxMergeError> {
        // 1. 行のフィールドマッピングを構築
        let fields = dataset.merge_fields_for_row(index);

        // 2. 債務者サフィックスを計算し、リテラル置換に登録
        let option_value = compute_option(&fields);
        let mut literals = self.config.literals.clone();
        literals.push((self.config.option_marker.clone(), option_value.to_string()));

        // 3. テンプレートへ差し込み
        let bytes = template.fill(&fields, &literals)?;

        Ok(GeneratedDocument {
            filename: format!("{}_{}.docx", self.config.filename_prefix, index + 1),
            bytes,
        })
    }
}
