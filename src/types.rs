//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。
//! セル座標・範囲、セル値、条件付き書式ルール、差分スタイル（dxf）を提供します。

use std::collections::HashMap;

use serde::Serialize;

use crate::color::ColorSpec;

/// セルの値を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    pub fn to_a1_notation(&self) -> String {
        let col_str = Self::col_index_to_letter(self.col);
        format!("{}{}", col_str, self.row + 1)
    }

    /// A1形式の文字列を解析（例: "B3" -> (2, 1)）
    ///
    /// `$`による絶対参照マーカーは受け付けません（数式参照の解析は
    /// `formula`モジュールが担当します）。
    ///
    /// # 戻り値
    ///
    /// * `Some(CellCoord)` - 解析に成功した場合
    /// * `None` - A1形式でない場合
    pub fn parse_a1(s: &str) -> Option<Self> {
        let s = s.trim();
        let letters_len = s.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let (letters, digits) = s.split_at(letters_len);
        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let col = Self::col_letter_to_index(letters)?;
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row - 1, col))
    }

    /// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
    pub(crate) fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }

    /// 列文字列をインデックスに変換（"A" -> 0, "Z" -> 25, "AA" -> 26）
    pub(crate) fn col_letter_to_index(letters: &str) -> Option<u32> {
        if letters.is_empty() {
            return None;
        }
        let mut col: u32 = 0;
        for ch in letters.chars() {
            if !ch.is_ascii_alphabetic() {
                return None;
            }
            let digit = ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
            col = col.checked_mul(26)?.checked_add(digit)?;
        }
        Some(col - 1)
    }
}

/// セル範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellCoord,
    pub end: CellCoord,
}

impl CellRange {
    /// 新しい範囲を生成
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        Self { start, end }
    }

    /// A1形式の範囲文字列を解析（例: "A1:C3"、単一セルの "B2" も可）
    ///
    /// sqref属性に現れる`$`マーカーは無視されます。
    pub fn parse(s: &str) -> Option<Self> {
        let cleaned: String = s.chars().filter(|c| *c != '$').collect();
        let mut parts = cleaned.trim().splitn(2, ':');
        let start = CellCoord::parse_a1(parts.next()?)?;
        let end = match parts.next() {
            Some(p) => CellCoord::parse_a1(p)?,
            None => start,
        };
        if end.row < start.row || end.col < start.col {
            return None;
        }
        Some(Self::new(start, end))
    }

    /// 指定された座標が範囲内にあるかを判定
    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.row >= self.start.row
            && coord.row <= self.end.row
            && coord.col >= self.start.col
            && coord.col <= self.end.col
    }

    /// 範囲のサイズ（行数 × 列数）を計算
    pub fn size(&self) -> (u32, u32) {
        let rows = self.end.row - self.start.row + 1;
        let cols = self.end.col - self.start.col + 1;
        (rows, cols)
    }

    /// 範囲内のすべてのセル座標を行優先で走査するイテレータを生成
    pub fn iter(&self) -> impl Iterator<Item = CellCoord> {
        let start = self.start;
        let end = self.end;
        (start.row..=end.row)
            .flat_map(move |row| (start.col..=end.col).map(move |col| CellCoord::new(row, col)))
    }
}

/// 条件付き書式ルール（cfRule要素）
///
/// ルールは所属する`ConditionalFormatting`ブロックの範囲をカバーします。
/// `dxf_id`を持たないルール、および数式数が1でないルールは処理対象外です。
#[derive(Debug, Clone, PartialEq)]
pub struct CfRule {
    /// 優先度（小さいほど優先）
    pub priority: i32,

    /// 差分スタイルインデックス（styles.xmlのdxfs参照）
    pub dxf_id: Option<u32>,

    /// マッチ時に後続ルールの適用を停止するか
    pub stop_if_true: bool,

    /// ルールの数式（0個以上）
    pub formulas: Vec<String>,
}

/// 条件付き書式ブロック（conditionalFormatting要素）
///
/// sqref属性の範囲（空白区切りで複数の矩形を持ちうる）と、
/// そのブロックに属するルール群を保持します。
/// 相対参照シフトのアンカーは最初の範囲の左上セルです。
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalFormatting {
    /// カバーするセル範囲（1つ以上の矩形）
    pub ranges: Vec<CellRange>,

    /// ブロックに属するルール
    pub rules: Vec<CfRule>,
}

impl ConditionalFormatting {
    /// 相対参照シフトのアンカーセル（最初の範囲の左上）を取得
    pub fn anchor(&self) -> Option<CellCoord> {
        self.ranges.first().map(|r| r.start)
    }
}

/// 数式がtrueと評価されたセルごとのマッチ情報
///
/// `"{sheet}!{cell}"`形式のキーに対応付けられます。同一セルに複数の
/// ルールがマッチした場合はすべて保持され、優先順位の解決は呼び出し側に
/// 委ねられます（`priority`フィールドでソート可能）。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedRule {
    /// シート名
    pub sheet: String,

    /// セル座標（A1形式）
    pub cell: String,

    /// ルールの優先度（小さいほど優先）
    pub priority: i32,

    /// 差分スタイルインデックス
    pub dxf_id: u32,

    /// マッチ時に後続ルールの適用を停止するか
    pub stop_if_true: bool,
}

/// 差分スタイルのフォント設定
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DxfFont {
    /// フォントサイズ（ポイント）
    pub size: Option<f64>,

    /// フォント色
    pub color: Option<ColorSpec>,

    /// 太字
    pub bold: bool,

    /// 斜体
    pub italic: bool,

    /// 下線
    pub underline: bool,
}

/// 差分スタイルの塗りつぶし設定
///
/// dxfのpatternFillでは、patternType省略時もソリッド塗りつぶしとして
/// 扱われる点に注意してください。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DxfFill {
    /// パターン種別（"solid"、"none"など。省略時はソリッド扱い）
    pub pattern_type: Option<String>,

    /// 前景色（fgColor）
    pub fg_color: Option<ColorSpec>,

    /// 背景色（bgColor）
    pub bg_color: Option<ColorSpec>,
}

/// 罫線の1辺
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderEdge {
    /// 罫線スタイル（"thin"、"medium"、"dashed"など）
    pub style: Option<String>,

    /// 罫線色
    pub color: Option<ColorSpec>,
}

/// 差分スタイルの罫線設定
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DxfBorder {
    pub top: Option<BorderEdge>,
    pub right: Option<BorderEdge>,
    pub bottom: Option<BorderEdge>,
    pub left: Option<BorderEdge>,
}

/// 差分スタイルの配置設定
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DxfAlignment {
    /// 水平配置（"left"、"center"、"right"など）
    pub horizontal: Option<String>,

    /// 垂直配置（"top"、"center"、"bottom"など）
    pub vertical: Option<String>,
}

/// 差分スタイル（dxf要素）
///
/// 条件付き書式ルールが変更する属性のみを保持するスタイルレコードです。
/// セルの完全なスタイルではありません。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DifferentialStyle {
    pub font: Option<DxfFont>,
    pub fill: Option<DxfFill>,
    pub border: Option<DxfBorder>,
    pub alignment: Option<DxfAlignment>,
}

impl DifferentialStyle {
    /// スタイルが何の属性も持たないかを判定
    pub fn is_empty(&self) -> bool {
        self.font.is_none()
            && self.fill.is_none()
            && self.border.is_none()
            && self.alignment.is_none()
    }
}

/// 条件付き書式処理の入力となるシートデータ
///
/// セル値のスパースマップと条件付き書式ブロックを保持します。
/// 処理中に変更されることはありません。
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    /// シート名
    pub name: String,

    /// セル値（値を持つセルのみ）
    values: HashMap<CellCoord, CellValue>,

    /// 条件付き書式ブロック
    pub conditional_formats: Vec<ConditionalFormatting>,
}

impl SheetData {
    /// 空のシートデータを生成
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: HashMap::new(),
            conditional_formats: Vec::new(),
        }
    }

    /// セル値を設定
    pub fn set_value(&mut self, coord: CellCoord, value: CellValue) {
        if value.is_empty() {
            return;
        }
        self.values.insert(coord, value);
    }

    /// セル値を取得（値を持たないセルは`Empty`）
    pub fn value(&self, coord: CellCoord) -> CellValue {
        self.values
            .get(&coord)
            .cloned()
            .unwrap_or(CellValue::Empty)
    }

    /// 値を持つセルの個数
    pub fn cell_count(&self) -> usize {
        self.values.len()
    }
}
