//! Parser Module
//!
//! calamineを使用したスプレッドシート解析と、
//! データセットの前処理（列正規化・型推論・値整形）を提供するモジュール。

mod dataset;

pub(crate) use dataset::load_dataset;
