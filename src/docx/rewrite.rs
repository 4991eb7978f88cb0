//! XML Rewrite Module
//!
//! WordprocessingML（`word/document.xml`など）のイベントストリームを
//! 書き換えて差し込みを行うモジュール。置換対象以外のイベントは
//! そのまま透過するため、ランの書式（太字・フォント等）や
//! 段落・テーブル構造は無変更で保持されます。
//!
//! 2種類の置換戦略を1パスで適用します。
//!
//! - **バルクフィールド差し込み**: Wordネイティブの`MERGEFIELD`
//!   プレースホルダ（`w:fldSimple`要素と`w:fldChar`による複合フィールドの
//!   両形式）を、元のラン書式（`w:rPr`）を引き継いだ単一のランに置換する
//! - **リテラルマーカー置換**: ランテキスト（`w:t`）内に出現する
//!   マーカートークン（例: `<<option>>`）を部分文字列として置換する。
//!   テキストノードのみを書き換えるため、`w:rPr`は構造上そのまま残る

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::DocxMergeError;
use crate::types::MergeFieldMap;

/// 複合フィールドの`w:fldChar`種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FldCharType {
    Begin,
    Separate,
    End,
}

/// 1つの`<w:r>`要素を読み取った結果
struct RunScan {
    /// ラン全体のイベント列（開始・終了タグを含む、所有権付き）
    events: Vec<Event<'static>>,
    /// ラン内の`w:fldChar`種別（存在する場合）
    fld_char: Option<FldCharType>,
    /// ラン内の`w:instrText`の内容
    instr_text: String,
    /// ランがテキスト（`w:t`）を含むか
    has_text: bool,
}

/// 複合フィールドのバッファリング状態
///
/// `fldChar begin`を含むランから`end`を含むランまでのイベントを保持します。
struct PendingField {
    /// バッファ済みイベント（置換しない場合にそのまま書き出す）
    events: Vec<Event<'static>>,
    /// 累積されたフィールド命令文字列
    instr: String,
    /// `separate`を通過したか
    seen_separate: bool,
    /// 表示ラン（separate以降の最初のテキストラン）の`w:rPr`
    result_rpr: Option<Vec<Event<'static>>>,
    /// `begin`ランの`w:rPr`（表示ランがない場合のフォールバック）
    begin_rpr: Option<Vec<Event<'static>>>,
}

/// XMLパートに差し込みを適用し、書き換え後のバイト列を返す
///
/// # 引数
///
/// * `xml` - WordprocessingMLパートのバイト列
/// * `fields` - MERGEFIELDキー → 置換値のマッピング
/// * `literals` - リテラルマーカー → 置換値のペア
///
/// # 戻り値
///
/// * `Ok(Vec<u8>)` - 書き換え後のXMLバイト列
/// * `Err(DocxMergeError)` - XMLの解析に失敗した場合
///
/// # エッジケース
///
/// テンプレートに存在するがマッピングにないキーのフィールドは
/// そのまま残されます（エラーにも空白にもなりません）。
/// マッピングにあるがテンプレートにないキーは単に使用されません。
pub(crate) fn substitute(
    xml: &[u8],
    fields: &MergeFieldMap,
    literals: &[(String, String)],
) -> Result<Vec<u8>, DocxMergeError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    let mut pending: Option<PendingField> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,

            Event::Start(e) if e.name().as_ref() == b"w:fldSimple" => {
                let start = e.into_owned();
                if let Some(p) = pending.as_mut() {
                    // 複合フィールドの内側はバッファへ
                    p.events.push(Event::Start(start));
                } else {
                    handle_fld_simple(&mut reader, &mut writer, start, fields)?;
                }
            }

            Event::Empty(e) if e.name().as_ref() == b"w:fldSimple" => {
                let empty = e.into_owned();
                if let Some(p) = pending.as_mut() {
                    p.events.push(Event::Empty(empty));
                } else {
                    // キャッシュ済みランを持たない空要素フィールド
                    match known_field_value(&empty, fields)? {
                        Some(value) => write_replacement_run(&mut writer, None, &value)?,
                        None => writer.write_event(Event::Empty(empty))?,
                    }
                }
            }

            Event::Start(e) if e.name().as_ref() == b"w:r" => {
                let start = e.into_owned();
                let run = collect_run(&mut reader, start)?;
                pending = process_run(&mut writer, pending.take(), run, fields, literals)?;
            }

            other => {
                let owned = other.into_owned();
                if let Some(p) = pending.as_mut() {
                    p.events.push(owned);
                } else {
                    writer.write_event(owned)?;
                }
            }
        }
        buf.clear();
    }

    // 閉じられていない複合フィールドはそのまま書き出す（破損テンプレート対策）
    if let Some(p) = pending.take() {
        write_events_with_literals(&mut writer, &p.events, literals)?;
    }

    Ok(writer.into_inner())
}

/// XMLパートからMERGEFIELDキーを文書順に収集
///
/// `w:fldSimple`の`w:instr`属性と、複合フィールドの`w:instrText`の
/// 両形式を対象とします。重複は除去しません（呼び出し側で処理）。
pub(crate) fn scan_merge_fields(xml: &[u8]) -> Result<Vec<String>, DocxMergeError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut keys = Vec::new();
    let mut in_field = false;
    let mut in_instr_text = false;
    let mut instr = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,

            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"w:fldSimple" => {
                if let Some(raw) = instr_attribute(&e)? {
                    if let Some(key) = parse_instr(&raw) {
                        keys.push(key);
                    }
                }
            }

            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"w:fldChar" => {
                match fld_char_type(&e)? {
                    Some(FldCharType::Begin) => {
                        in_field = true;
                        instr.clear();
                    }
                    Some(FldCharType::End) => {
                        if in_field {
                            if let Some(key) = parse_instr(&instr) {
                                keys.push(key);
                            }
                        }
                        in_field = false;
                    }
                    _ => {}
                }
            }

            Event::Start(e) if e.name().as_ref() == b"w:instrText" => {
                in_instr_text = true;
            }
            Event::End(e) if e.name().as_ref() == b"w:instrText" => {
                in_instr_text = false;
            }
            Event::Text(t) if in_field && in_instr_text => {
                instr.push_str(&t.unescape()?);
            }

            _ => {}
        }
        buf.clear();
    }

    Ok(keys)
}

/// フィールド命令文字列からMERGEFIELDのキーを抽出
///
/// 例: `" MERGEFIELD Loan_No \* MERGEFORMAT "` → `Loan_No`。
/// 引用符付きのキー（`MERGEFIELD "My Field"`）にも対応します。
/// MERGEFIELD以外の命令（PAGE、DATEなど）は`None`を返します。
pub(crate) fn parse_instr(instr: &str) -> Option<String> {
    let rest = instr.trim_start();
    let keyword_end = rest.find(char::is_whitespace)?;
    let (keyword, after) = rest.split_at(keyword_end);
    if !keyword.eq_ignore_ascii_case("MERGEFIELD") {
        return None;
    }

    let after = after.trim_start();
    if let Some(inner) = after.strip_prefix('"') {
        let end = inner.find('"')?;
        Some(inner[..end].to_string())
    } else {
        let end = after.find(char::is_whitespace).unwrap_or(after.len());
        if end == 0 {
            None
        } else {
            Some(after[..end].to_string())
        }
    }
}

/// `w:fldSimple`開始タグの`w:instr`属性を取得
fn instr_attribute(e: &BytesStart<'_>) -> Result<Option<String>, DocxMergeError> {
    for attr in e.attributes() {
        let attr =
            attr.map_err(|e| DocxMergeError::Template(format!("bad attribute in w:fldSimple: {}", e)))?;
        if attr.key.as_ref() == b"w:instr" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// `w:fldChar`要素の`w:fldCharType`属性を取得
fn fld_char_type(e: &BytesStart<'_>) -> Result<Option<FldCharType>, DocxMergeError> {
    for attr in e.attributes() {
        let attr =
            attr.map_err(|e| DocxMergeError::Template(format!("bad attribute in w:fldChar: {}", e)))?;
        if attr.key.as_ref() == b"w:fldCharType" {
            return Ok(match attr.value.as_ref() {
                b"begin" => Some(FldCharType::Begin),
                b"separate" => Some(FldCharType::Separate),
                b"end" => Some(FldCharType::End),
                _ => None,
            });
        }
    }
    Ok(None)
}

/// `w:fldSimple`要素の命令を解析し、認識されたキーの置換値を返す
fn known_field_value(
    e: &BytesStart<'_>,
    fields: &MergeFieldMap,
) -> Result<Option<String>, DocxMergeError> {
    let Some(raw) = instr_attribute(e)? else {
        return Ok(None);
    };
    let Some(key) = parse_instr(&raw) else {
        return Ok(None);
    };
    Ok(fields.get(&key).map(|v| v.to_string()))
}

/// `w:fldSimple`要素を処理
///
/// 認識されたキーの場合、内側のイベントを消費して書式（`w:rPr`）だけを
/// 取り出し、置換値を持つ単一のランを書き出します。
/// 未知のキーの場合は開始タグをそのまま書き出し、内側は
/// メインループの透過処理に任せます。
fn handle_fld_simple<W: Write>(
    reader: &mut Reader<&[u8]>,
    writer: &mut Writer<W>,
    start: BytesStart<'static>,
    fields: &MergeFieldMap,
) -> Result<(), DocxMergeError> {
    let Some(value) = known_field_value(&start, fields)? else {
        // 未知のフィールドはそのまま通す
        writer.write_event(Event::Start(start))?;
        return Ok(());
    };

    // 認識されたフィールド: 終了タグまで消費し、最初のw:rPrを取り出す
    let mut depth = 1usize;
    let mut inner: Vec<Event<'static>> = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => {
                return Err(DocxMergeError::Template(
                    "unexpected end of XML inside w:fldSimple".to_string(),
                ))
            }
            Event::Start(e) => {
                if e.name().as_ref() == b"w:fldSimple" {
                    depth += 1;
                }
                inner.push(Event::Start(e.into_owned()));
            }
            Event::End(e) => {
                if e.name().as_ref() == b"w:fldSimple" {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                inner.push(Event::End(e.into_owned()));
            }
            other => inner.push(other.into_owned()),
        }
        buf.clear();
    }

    let rpr = extract_rpr(&inner);
    write_replacement_run(writer, rpr.as_deref(), &value)
}

/// 1つの`<w:r>`要素を終了タグまで読み取る
fn collect_run(
    reader: &mut Reader<&[u8]>,
    start: BytesStart<'static>,
) -> Result<RunScan, DocxMergeError> {
    let mut events: Vec<Event<'static>> = vec![Event::Start(start)];
    let mut fld_char = None;
    let mut instr_text = String::new();
    let mut has_text = false;

    let mut depth = 1usize;
    let mut in_instr = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => {
                return Err(DocxMergeError::Template(
                    "unexpected end of XML inside w:r".to_string(),
                ))
            }
            Event::Start(e) => {
                match e.name().as_ref() {
                    b"w:r" => depth += 1,
                    b"w:instrText" => in_instr = true,
                    b"w:t" => has_text = true,
                    b"w:fldChar" => fld_char = fld_char_type(&e)?.or(fld_char),
                    _ => {}
                }
                events.push(Event::Start(e.into_owned()));
            }
            Event::Empty(e) => {
                match e.name().as_ref() {
                    b"w:t" => has_text = true,
                    b"w:fldChar" => fld_char = fld_char_type(&e)?.or(fld_char),
                    _ => {}
                }
                events.push(Event::Empty(e.into_owned()));
            }
            Event::Text(t) => {
                if in_instr {
                    instr_text.push_str(&t.unescape()?);
                }
                events.push(Event::Text(t.into_owned()));
            }
            Event::End(e) => {
                let name = e.name().as_ref().to_vec();
                events.push(Event::End(e.into_owned()));
                match name.as_slice() {
                    b"w:r" => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    b"w:instrText" => in_instr = false,
                    _ => {}
                }
            }
            other => events.push(other.into_owned()),
        }
        buf.clear();
    }

    Ok(RunScan {
        events,
        fld_char,
        instr_text,
        has_text,
    })
}

/// イベント列から最初の`w:rPr`サブツリーを取り出す
fn extract_rpr(events: &[Event<'static>]) -> Option<Vec<Event<'static>>> {
    let mut depth = 0usize;
    let mut rpr: Vec<Event<'static>> = Vec::new();

    for event in events {
        match event {
            Event::Start(e) if depth == 0 && e.name().as_ref() == b"w:rPr" => {
                depth = 1;
                rpr.push(event.clone());
            }
            Event::Empty(e) if depth == 0 && e.name().as_ref() == b"w:rPr" => {
                return Some(vec![event.clone()]);
            }
            _ if depth > 0 => {
                match event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => {
                        rpr.push(event.clone());
                        depth -= 1;
                        if depth == 0 {
                            return Some(rpr);
                        }
                        continue;
                    }
                    _ => {}
                }
                rpr.push(event.clone());
            }
            _ => {}
        }
    }
    None
}

/// ランを複合フィールドの状態機械に通す
///
/// フィールド処理中であればランをバッファし、`fldChar end`で
/// フィールドを確定します。処理中でなければ`fldChar begin`で
/// バッファリングを開始し、それ以外のランは即座に書き出します。
/// 戻り値は次のランに引き継ぐフィールド状態です。
fn process_run<W: Write>(
    writer: &mut Writer<W>,
    pending: Option<PendingField>,
    run: RunScan,
    fields: &MergeFieldMap,
    literals: &[(String, String)],
) -> Result<Option<PendingField>, DocxMergeError> {
    match pending {
        Some(mut p) => {
            p.instr.push_str(&run.instr_text);
            match run.fld_char {
                Some(FldCharType::End) => {
                    finish_complex_field(writer, p, run, fields, literals)?;
                    Ok(None)
                }
                Some(FldCharType::Separate) => {
                    p.seen_separate = true;
                    p.events.extend(run.events);
                    Ok(Some(p))
                }
                _ => {
                    if p.seen_separate && p.result_rpr.is_none() && run.has_text {
                        p.result_rpr = extract_rpr(&run.events);
                    }
                    p.events.extend(run.events);
                    Ok(Some(p))
                }
            }
        }
        None if run.fld_char == Some(FldCharType::Begin) => Ok(Some(PendingField {
            begin_rpr: extract_rpr(&run.events),
            instr: run.instr_text,
            seen_separate: false,
            result_rpr: None,
            events: run.events,
        })),
        None => {
            write_events_with_literals(writer, &run.events, literals)?;
            Ok(None)
        }
    }
}

/// 複合フィールドの終端処理
///
/// 命令がマッピング内のMERGEFIELDであれば、バッファ済みのフィールド
/// イベント一式を破棄して置換ランを書き出します。そうでなければ
/// バッファをそのまま書き出します（リテラル置換は適用）。
fn finish_complex_field<W: Write>(
    writer: &mut Writer<W>,
    mut pending: PendingField,
    end_run: RunScan,
    fields: &MergeFieldMap,
    literals: &[(String, String)],
) -> Result<(), DocxMergeError> {
    let value = parse_instr(&pending.instr).and_then(|key| fields.get(&key).map(str::to_string));

    match value {
        Some(value) => {
            // 表示ランの書式を優先し、なければbeginランの書式を使う
            let rpr = pending.result_rpr.or(pending.begin_rpr);
            write_replacement_run(writer, rpr.as_deref(), &value)
        }
        None => {
            pending.events.extend(end_run.events);
            write_events_with_literals(writer, &pending.events, literals)
        }
    }
}

/// 置換値を持つ単一のランを書き出す
///
/// 元のフィールドから取り出した`w:rPr`をそのまま引き継ぐため、
/// 太字などの書式属性は置換後も維持されます。
fn write_replacement_run<W: Write>(
    writer: &mut Writer<W>,
    rpr: Option<&[Event<'static>]>,
    value: &str,
) -> Result<(), DocxMergeError> {
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    if let Some(events) = rpr {
        for event in events {
            writer.write_event(event.clone())?;
        }
    }
    let mut t = BytesStart::new("w:t");
    t.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(value).into_owned()))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    Ok(())
}

/// イベント列を書き出し、`w:t`内のテキストにリテラルマーカー置換を適用
///
/// マーカーを含まないテキストは元のイベントをそのまま書き出すため、
/// エスケープ表現も含めて入力と同一のバイト列が維持されます。
fn write_events_with_literals<W: Write>(
    writer: &mut Writer<W>,
    events: &[Event<'static>],
    literals: &[(String, String)],
) -> Result<(), DocxMergeError> {
    let mut in_t = false;

    for event in events {
        match event {
            Event::Start(e) if e.name().as_ref() == b"w:t" => {
                in_t = true;
                writer.write_event(event.clone())?;
            }
            Event::End(e) if e.name().as_ref() == b"w:t" => {
                in_t = false;
                writer.write_event(event.clone())?;
            }
            Event::Text(t) if in_t && !literals.is_empty() => {
                let text = t.unescape()?;
                if literals.iter().any(|(marker, _)| text.contains(marker.as_str())) {
                    let mut replaced = text.into_owned();
                    for (marker, value) in literals {
                        replaced = replaced.replace(marker.as_str(), value);
                    }
                    writer.write_event(Event::Text(BytesText::new(&replaced).into_owned()))?;
                } else {
                    writer.write_event(event.clone())?;
                }
            }
            _ => writer.write_event(event.clone())?,
        }
    }
    Ok(())
}
