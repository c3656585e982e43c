//! XML Metadata Parser Module
//!
//! XLSX内部のXMLファイルから、calamineで取得不可能な情報を抽出するモジュール。
//! 差分スタイル（dxf）、テーマXML、条件付き書式ブロックを提供します。

use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::color::ColorSpec;
use crate::error::XlsxToCssError;
use crate::security::{validate_zip_path, SecurityConfig};
use crate::theme::ThemeColors;
use crate::types::{
    BorderEdge, CellRange, CfRule, ConditionalFormatting, DifferentialStyle, DxfAlignment,
    DxfBorder, DxfFill, DxfFont,
};

/// XLSXメタデータパーサー
///
/// XLSXファイル（ZIPアーカイブ）からXMLを直接解析し、
/// calamineで取得できない情報を抽出します。
#[derive(Debug, Clone)]
pub(crate) struct XlsxMetadataParser {
    /// styles.xmlのdxfs要素（出現順 = dxfId順）
    dxfs: Vec<DifferentialStyle>,
    /// xl/theme/theme1.xmlの生バイト列（存在する場合）
    theme_xml: Option<Vec<u8>>,
    /// シート名 -> 条件付き書式ブロックのマッピング
    conditional_formats: HashMap<String, Vec<ConditionalFormatting>>,
}

impl XlsxMetadataParser {
    /// XLSXファイル（ZIPアーカイブ）からメタデータを解析
    ///
    /// # 引数
    ///
    /// * `xlsx_reader` - XLSXファイルを読み込むためのリーダー（Read + Seekトレイトを実装）
    ///
    /// # 戻り値
    ///
    /// * `Ok(XlsxMetadataParser)` - メタデータの解析に成功した場合
    /// * `Err(XlsxToCssError)` - 解析エラーまたはセキュリティ違反が発生した場合
    pub fn new<R: Read + Seek>(xlsx_reader: R) -> Result<Self, XlsxToCssError> {
        let security_config = SecurityConfig::default();

        let mut archive =
            ZipArchive::new(xlsx_reader).map_err(|e| XlsxToCssError::Zip(format!("{}", e)))?;

        // セキュリティチェック: ファイル数の上限
        if archive.len() > security_config.max_file_count {
            return Err(XlsxToCssError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                security_config.max_file_count
            )));
        }

        // セキュリティチェック: 各ファイルのパス検証とサイズチェック
        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| XlsxToCssError::Zip(format!("{}", e)))?;

            // パストラバーサル対策
            let file_name = file.name();
            validate_zip_path(file_name).map_err(|e| {
                XlsxToCssError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;

            // ファイルサイズチェック
            let file_size = file.size();
            if file_size > security_config.max_file_size {
                return Err(XlsxToCssError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    file_name, file_size, security_config.max_file_size
                )));
            }

            // 展開後のサイズ累計をチェック
            total_decompressed_size =
                total_decompressed_size
                    .checked_add(file_size)
                    .ok_or_else(|| {
                        XlsxToCssError::SecurityViolation(
                            "Total decompressed size calculation overflow".to_string(),
                        )
                    })?;

            if total_decompressed_size > security_config.max_decompressed_size {
                return Err(XlsxToCssError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, security_config.max_decompressed_size
                )));
            }
        }

        // 1. xl/workbook.xml を解析（シート名の順序）
        let sheet_names = Self::parse_workbook(&mut archive)?;

        // 2. xl/styles.xml を解析（dxfs）
        let dxfs = Self::parse_styles(&mut archive)?;

        // 3. xl/theme/theme1.xml を読み込む（解析はテーマ取得時）
        let theme_xml = Self::read_theme(&mut archive)?;

        // 4. xl/worksheets/*.xml を解析（条件付き書式ブロック）
        let conditional_formats = Self::parse_worksheets(&mut archive, &sheet_names)?;

        Ok(Self {
            dxfs,
            theme_xml,
            conditional_formats,
        })
    }

    /// dxfIdから差分スタイルを取得
    ///
    /// # 戻り値
    ///
    /// * `Some(&DifferentialStyle)` - dxfIdが有効な場合
    /// * `None` - dxfIdが範囲外の場合
    pub fn differential_style(&self, dxf_id: u32) -> Option<&DifferentialStyle> {
        self.dxfs.get(dxf_id as usize)
    }

    /// テーマカラーマップを解析
    ///
    /// テーマXMLが存在しない場合、strictモードではエラー、非strictモード
    /// ではフォールバック（lt1/dk1のみ）を返します。
    pub fn theme_colors(&self, strict: bool) -> Result<ThemeColors, XlsxToCssError> {
        match &self.theme_xml {
            Some(xml) => ThemeColors::from_theme_xml(xml, strict),
            None if strict => Err(XlsxToCssError::ThemeColors(
                "Missing workbook theme (xl/theme/theme1.xml).".to_string(),
            )),
            None => Ok(ThemeColors::fallback()),
        }
    }

    /// シートの条件付き書式ブロックを取得
    ///
    /// 条件付き書式を持たないシートは空のスライスです。
    pub fn conditional_formats(&self, sheet_name: &str) -> &[ConditionalFormatting] {
        self.conditional_formats
            .get(sheet_name)
            .map(|blocks| blocks.as_slice())
            .unwrap_or(&[])
    }

    /// xl/workbook.xml の解析（プライベート）
    ///
    /// `<sheets>` 要素からシート名を出現順に抽出します。
    fn parse_workbook<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<Vec<String>, XlsxToCssError> {
        let mut workbook_file = match archive.by_name("xl/workbook.xml") {
            Ok(file) => file,
            Err(_) => {
                // workbook.xmlが存在しない場合は空の結果を返す
                return Ok(Vec::new());
            }
        };

        let mut xml_content = Vec::new();
        workbook_file.read_to_end(&mut xml_content)?;

        parse_workbook_xml(&xml_content)
    }

    /// xl/styles.xml の解析（プライベート）
    fn parse_styles<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<Vec<DifferentialStyle>, XlsxToCssError> {
        let mut styles_file = match archive.by_name("xl/styles.xml") {
            Ok(file) => file,
            Err(_) => {
                // styles.xmlが存在しない場合は空の結果を返す
                return Ok(Vec::new());
            }
        };

        let mut xml_content = Vec::new();
        styles_file.read_to_end(&mut xml_content)?;

        parse_dxfs_xml(&xml_content)
    }

    /// xl/theme/theme1.xml の読み込み（プライベート）
    fn read_theme<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<Option<Vec<u8>>, XlsxToCssError> {
        let mut theme_file = match archive.by_name("xl/theme/theme1.xml") {
            Ok(file) => file,
            Err(_) => return Ok(None),
        };

        let mut xml_content = Vec::new();
        theme_file.read_to_end(&mut xml_content)?;
        Ok(Some(xml_content))
    }

    /// xl/worksheets/*.xml の解析（プライベート）
    ///
    /// ワークシートXMLのファイル番号（sheetN.xml）をworkbook.xmlの
    /// シート順に対応付けて、シートごとの条件付き書式ブロックを収集します。
    fn parse_worksheets<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        sheet_names: &[String],
    ) -> Result<HashMap<String, Vec<ConditionalFormatting>>, XlsxToCssError> {
        let mut conditional_formats: HashMap<String, Vec<ConditionalFormatting>> = HashMap::new();

        let mut worksheet_files: Vec<(usize, String)> = Vec::new();
        for i in 0..archive.len() {
            let file_name = archive
                .by_index(i)
                .map_err(|e| XlsxToCssError::Zip(format!("{}", e)))?
                .name()
                .to_string();

            if let Some(ordinal) = worksheet_ordinal(&file_name) {
                worksheet_files.push((ordinal, file_name));
            }
        }
        worksheet_files.sort();

        for (ordinal, file_name) in worksheet_files {
            let sheet_name = sheet_names
                .get(ordinal - 1)
                .cloned()
                .unwrap_or_else(|| format!("Sheet{}", ordinal));

            let mut file = archive
                .by_name(&file_name)
                .map_err(|e| XlsxToCssError::Zip(format!("{}", e)))?;
            let mut xml_content = Vec::new();
            file.read_to_end(&mut xml_content)?;

            let blocks = parse_conditional_formatting_xml(&xml_content)?;
            if !blocks.is_empty() {
                conditional_formats.insert(sheet_name, blocks);
            }
        }

        Ok(conditional_formats)
    }
}

/// ワークシートXMLのパスからファイル番号を抽出
///
/// 例: "xl/worksheets/sheet1.xml" -> 1
fn worksheet_ordinal(path: &str) -> Option<usize> {
    path.strip_prefix("xl/worksheets/sheet")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// workbook.xmlのバイト列からシート名を出現順に抽出
fn parse_workbook_xml(xml: &[u8]) -> Result<Vec<String>, XlsxToCssError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheet_names = Vec::new();
    let mut in_sheets = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                // <sheet>は自己終了タグの場合がある
                match e.name().as_ref() {
                    b"sheets" => {
                        in_sheets = true;
                    }
                    b"sheet" if in_sheets => {
                        if let Some(name) = attr_value(&e, b"name")? {
                            sheet_names.push(name);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"sheets" {
                    in_sheets = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxToCssError::Zip(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheet_names)
}

/// dxf解析中の現在位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DxfSection {
    None,
    Font,
    Fill,
    Border,
    BorderEdge(BorderSide),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BorderSide {
    Top,
    Right,
    Bottom,
    Left,
}

/// styles.xmlのバイト列からdxfs要素を出現順に抽出
///
/// 出現順のインデックスがそのままdxfIdです。
fn parse_dxfs_xml(xml: &[u8]) -> Result<Vec<DifferentialStyle>, XlsxToCssError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut dxfs = Vec::new();
    let mut in_dxfs = false;
    let mut current: Option<DifferentialStyle> = None;
    let mut section = DxfSection::None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| XlsxToCssError::Zip(format!("XML parse error: {}", e)))?;
        match event {
            // <b/>や<color .../>のような葉要素は自己終了タグで現れる
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"dxfs" => {
                    in_dxfs = true;
                }
                b"dxf" if in_dxfs => {
                    current = Some(DifferentialStyle::default());
                    section = DxfSection::None;
                }
                b"font" => {
                    if let Some(dxf) = current.as_mut() {
                        section = DxfSection::Font;
                        dxf.font.get_or_insert_with(DxfFont::default);
                    }
                }
                b"fill" => {
                    if let Some(dxf) = current.as_mut() {
                        section = DxfSection::Fill;
                        dxf.fill.get_or_insert_with(DxfFill::default);
                    }
                }
                b"border" => {
                    if let Some(dxf) = current.as_mut() {
                        section = DxfSection::Border;
                        dxf.border.get_or_insert_with(DxfBorder::default);
                    }
                }
                b"alignment" => {
                    if let Some(dxf) = current.as_mut() {
                        dxf.alignment = Some(DxfAlignment {
                            horizontal: attr_value(&e, b"horizontal")?,
                            vertical: attr_value(&e, b"vertical")?,
                        });
                    }
                }
                b"b" if section == DxfSection::Font => {
                    if let Some(font) = current.as_mut().and_then(|d| d.font.as_mut()) {
                        font.bold = flag_value(&e)?;
                    }
                }
                b"i" if section == DxfSection::Font => {
                    if let Some(font) = current.as_mut().and_then(|d| d.font.as_mut()) {
                        font.italic = flag_value(&e)?;
                    }
                }
                b"u" if section == DxfSection::Font => {
                    if let Some(font) = current.as_mut().and_then(|d| d.font.as_mut()) {
                        font.underline = flag_value(&e)?;
                    }
                }
                b"sz" if section == DxfSection::Font => {
                    if let Some(font) = current.as_mut().and_then(|d| d.font.as_mut()) {
                        font.size = attr_value(&e, b"val")?.and_then(|v| v.parse().ok());
                    }
                }
                b"color" => match section {
                    DxfSection::Font => {
                        if let Some(font) = current.as_mut().and_then(|d| d.font.as_mut()) {
                            font.color = color_spec(&e)?;
                        }
                    }
                    DxfSection::BorderEdge(side) => {
                        if let Some(border) = current.as_mut().and_then(|d| d.border.as_mut()) {
                            if let Some(edge) = border_edge_mut(border, side) {
                                edge.color = color_spec(&e)?;
                            }
                        }
                    }
                    _ => {}
                },
                b"patternFill" if section == DxfSection::Fill => {
                    if let Some(fill) = current.as_mut().and_then(|d| d.fill.as_mut()) {
                        fill.pattern_type = attr_value(&e, b"patternType")?;
                    }
                }
                b"fgColor" if section == DxfSection::Fill => {
                    if let Some(fill) = current.as_mut().and_then(|d| d.fill.as_mut()) {
                        fill.fg_color = color_spec(&e)?;
                    }
                }
                b"bgColor" if section == DxfSection::Fill => {
                    if let Some(fill) = current.as_mut().and_then(|d| d.fill.as_mut()) {
                        fill.bg_color = color_spec(&e)?;
                    }
                }
                side @ (b"top" | b"right" | b"bottom" | b"left")
                    if matches!(section, DxfSection::Border | DxfSection::BorderEdge(_)) =>
                {
                    let side = match side {
                        b"top" => BorderSide::Top,
                        b"right" => BorderSide::Right,
                        b"bottom" => BorderSide::Bottom,
                        _ => BorderSide::Left,
                    };
                    section = DxfSection::BorderEdge(side);
                    if let Some(border) = current.as_mut().and_then(|d| d.border.as_mut()) {
                        let edge = BorderEdge {
                            style: attr_value(&e, b"style")?,
                            color: None,
                        };
                        *border_edge_slot(border, side) = Some(edge);
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"dxfs" => {
                    in_dxfs = false;
                }
                b"dxf" => {
                    if let Some(dxf) = current.take() {
                        dxfs.push(dxf);
                    }
                    section = DxfSection::None;
                }
                b"font" | b"fill" | b"border" => {
                    section = DxfSection::None;
                }
                b"top" | b"right" | b"bottom" | b"left" => {
                    if matches!(section, DxfSection::BorderEdge(_)) {
                        section = DxfSection::Border;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(dxfs)
}

fn border_edge_mut(border: &mut DxfBorder, side: BorderSide) -> Option<&mut BorderEdge> {
    border_edge_slot(border, side).as_mut()
}

fn border_edge_slot(border: &mut DxfBorder, side: BorderSide) -> &mut Option<BorderEdge> {
    match side {
        BorderSide::Top => &mut border.top,
        BorderSide::Right => &mut border.right,
        BorderSide::Bottom => &mut border.bottom,
        BorderSide::Left => &mut border.left,
    }
}

/// ワークシートXMLのバイト列から条件付き書式ブロックを抽出
fn parse_conditional_formatting_xml(
    xml: &[u8],
) -> Result<Vec<ConditionalFormatting>, XlsxToCssError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut blocks = Vec::new();
    let mut current_block: Option<ConditionalFormatting> = None;
    let mut current_rule: Option<CfRule> = None;
    let mut in_formula = false;
    let mut formula_text = String::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| XlsxToCssError::Zip(format!("XML parse error: {}", e)))?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => {
                match e.name().as_ref() {
                    b"conditionalFormatting" => {
                        // sqref属性は空白区切りで複数の矩形を持ちうる
                        let ranges = attr_value(&e, b"sqref")?
                            .map(|sqref| {
                                sqref
                                    .split_whitespace()
                                    .filter_map(CellRange::parse)
                                    .collect()
                            })
                            .unwrap_or_default();
                        let block = ConditionalFormatting {
                            ranges,
                            rules: Vec::new(),
                        };
                        if is_empty {
                            blocks.push(block);
                        } else {
                            current_block = Some(block);
                        }
                    }
                    b"cfRule" if current_block.is_some() => {
                        let rule = CfRule {
                            priority: attr_value(&e, b"priority")?
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(0),
                            dxf_id: attr_value(&e, b"dxfId")?.and_then(|v| v.parse().ok()),
                            stop_if_true: attr_value(&e, b"stopIfTrue")?
                                .map(|v| v == "1" || v == "true")
                                .unwrap_or(false),
                            formulas: Vec::new(),
                        };
                        if is_empty {
                            if let Some(block) = current_block.as_mut() {
                                block.rules.push(rule);
                            }
                        } else {
                            current_rule = Some(rule);
                        }
                    }
                    b"formula" if current_rule.is_some() && !is_empty => {
                        in_formula = true;
                        formula_text.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if in_formula {
                    let text = e
                        .unescape()
                        .map_err(|e| XlsxToCssError::Zip(format!("XML text error: {}", e)))?;
                    formula_text.push_str(&text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"formula" if in_formula => {
                    if let Some(rule) = current_rule.as_mut() {
                        rule.formulas.push(formula_text.clone());
                    }
                    in_formula = false;
                }
                b"cfRule" => {
                    if let (Some(block), Some(rule)) = (current_block.as_mut(), current_rule.take())
                    {
                        block.rules.push(rule);
                    }
                }
                b"conditionalFormatting" => {
                    if let Some(block) = current_block.take() {
                        blocks.push(block);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(blocks)
}

/// 要素から属性値を取得
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, XlsxToCssError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XlsxToCssError::Zip(format!("XML attribute error: {}", e)))?;
        if attr.key.as_ref() == key {
            return Ok(Some(std::str::from_utf8(&attr.value)?.to_string()));
        }
    }
    Ok(None)
}

/// <b/>のようなフラグ要素の値を取得
///
/// `val`属性がない場合はtrue、`val="0"`/`val="false"`はfalseです。
fn flag_value(e: &BytesStart<'_>) -> Result<bool, XlsxToCssError> {
    Ok(match attr_value(e, b"val")? {
        Some(v) => v != "0" && v != "false",
        None => true,
    })
}

/// 色要素（<color/>、<fgColor/>、<bgColor/>）の属性から色参照を構築
///
/// `rgb` > `theme` > `indexed` > `auto` の優先順で解釈します。
fn color_spec(e: &BytesStart<'_>) -> Result<Option<ColorSpec>, XlsxToCssError> {
    if let Some(rgb) = attr_value(e, b"rgb")? {
        return Ok(Some(ColorSpec::Rgb(rgb)));
    }
    if let Some(theme) = attr_value(e, b"theme")? {
        let index = theme.parse()?;
        let tint = attr_value(e, b"tint")?.and_then(|v| v.parse().ok());
        return Ok(Some(ColorSpec::Theme { index, tint }));
    }
    if let Some(indexed) = attr_value(e, b"indexed")? {
        return Ok(Some(ColorSpec::Indexed(indexed.parse()?)));
    }
    if attr_value(e, b"auto")?.is_some() {
        return Ok(Some(ColorSpec::Auto));
    }
    Ok(None)
}
