//! # DocxMerge
//!
//! DOCXテンプレートとXLSXスプレッドシートから差し込み文書を
//! 一括生成するRustライブラリ。
//!
//! スプレッドシートの各データ行について、テンプレートの
//! `MERGEFIELD`プレースホルダを行の値で置換した文書を1件ずつ
//! 生成し、全件を単一のZIPアーカイブにまとめて出力します。
//!
//! ## 主な機能
//!
//! - **ヘッダー正規化**: スプレッドシートの列見出し（空白・改行・
//!   記号を含む）を、テンプレートのプレースホルダキーと一致する
//!   識別子形式に正規化
//! - **前処理**: 日付セルの書式化（デフォルト`DD-MM-YYYY`）、
//!   テキストの空白畳み込み、欠損値の空文字列化
//! - **派生フィールド**: 複数債務者の有無から文書サフィックス
//!   （`AND ORS`/`AND ANR`）を計算し、リテラルマーカー
//!   `<<option>>`に差し込み
//! - **書式保持**: 置換対象以外のXMLを無変更で透過するため、
//!   太字等のラン書式とレイアウトは完全に維持
//! - **並列生成**: 行ごとの文書生成をrayonで並列化
//!   （出力順序は常にデータ行順）
//! - **セキュリティ**: ZIP bomb・パストラバーサル対策を標準装備
//!
//! ## 使用例
//!
//! ```no_run
//! use std::fs::File;
//! use docxmerge::Merger;
//!
//! fn main() -> Result<(), docxmerge::DocxMergeError> {
//!     let merger = Merger::builder().build()?;
//!
//!     let report = merger.merge(
//!         File::open("notice_template.docx")?,
//!         File::open("borrowers.xlsx")?,
//!         File::create("notices.zip")?,
//!     )?;
//!
//!     println!("generated {} documents", report.rows);
//!     Ok(())
//! }
//! ```
//!
//! 設定をカスタマイズする場合は[`MergerBuilder`]を使用します。
//!
//! ```no_run
//! use docxmerge::{CollisionPolicy, DateFormat, MergerBuilder};
//!
//! # fn main() -> Result<(), docxmerge::DocxMergeError> {
//! let merger = MergerBuilder::new()
//!     .with_date_format(DateFormat::Custom("%d/%m/%Y".to_string()))
//!     .with_collision_policy(CollisionPolicy::Overwrite)
//!     .with_filename_prefix("Notice")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod api;
mod builder;
mod docx;
mod error;
mod fields;
mod normalize;
mod package;
mod parser;
mod security;
mod types;

pub use api::{CollisionPolicy, DateFormat};
pub use builder::{MergeReport, Merger, MergerBuilder};
pub use docx::inspect::{
    Block, InspectedDocument, Paragraph, Run, Table, TableCell, TableRow,
};
pub use docx::DocxTemplate;
pub use error::DocxMergeError;
pub use normalize::normalize_header;
pub use types::MergeFieldMap;
