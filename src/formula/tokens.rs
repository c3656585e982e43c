//! 数式のトークン化
//!
//! 数式文字列を構文解析用のトークン列に変換します。先頭の`=`は
//! トークン化の前に取り除かれます。

use crate::formula::FormulaError;
use crate::types::CellCoord;

/// Excelシートの最大行インデックス（0始まり、1,048,576行）
pub(crate) const MAX_ROW: u32 = 1_048_575;

/// Excelシートの最大列インデックス（0始まり、16,384列 = XFD）
pub(crate) const MAX_COL: u32 = 16_383;

/// 単一セル参照
///
/// `$A$1`のような絶対指定マーカーと、`Sheet1!A1`のようなシート修飾を
/// 保持します。相対参照シフト（`shifted`）は絶対指定された軸を固定した
/// まま座標を移動します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CellRef {
    /// シート修飾（`Sheet1!A1`の`Sheet1`部分）
    pub sheet: Option<String>,

    /// セル座標（0始まり）
    pub coord: CellCoord,

    /// 列が絶対指定（`$A1`）か
    pub abs_col: bool,

    /// 行が絶対指定（`A$1`）か
    pub abs_row: bool,
}

impl CellRef {
    /// 参照を相対シフトした新しい参照を生成
    ///
    /// 絶対指定された軸はシフトされません。シフト結果がシートの限界
    /// （1,048,576行 × 16,384列）を超える場合は`OutOfBounds`エラーです。
    pub fn shifted(&self, row_delta: i64, col_delta: i64) -> Result<Self, FormulaError> {
        let row = if self.abs_row {
            self.coord.row
        } else {
            let shifted = self.coord.row as i64 + row_delta;
            if shifted < 0 || shifted > MAX_ROW as i64 {
                return Err(FormulaError::OutOfBounds(self.display()));
            }
            shifted as u32
        };

        let col = if self.abs_col {
            self.coord.col
        } else {
            let shifted = self.coord.col as i64 + col_delta;
            if shifted < 0 || shifted > MAX_COL as i64 {
                return Err(FormulaError::OutOfBounds(self.display()));
            }
            shifted as u32
        };

        Ok(Self {
            sheet: self.sheet.clone(),
            coord: CellCoord::new(row, col),
            abs_col: self.abs_col,
            abs_row: self.abs_row,
        })
    }

    /// 参照の表示用文字列（エラーメッセージ向け）
    pub fn display(&self) -> String {
        let mut s = String::new();
        if let Some(sheet) = &self.sheet {
            s.push_str(sheet);
            s.push('!');
        }
        if self.abs_col {
            s.push('$');
        }
        s.push_str(&CellCoord::col_index_to_letter(self.coord.col));
        if self.abs_row {
            s.push('$');
        }
        s.push_str(&(self.coord.row + 1).to_string());
        s
    }
}

/// 数式トークン
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FormulaToken {
    Number(f64),
    Text(String),
    Bool(bool),
    Ref(CellRef),
    /// 関数名などの識別子
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Ampersand,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    Comma,
    Colon,
}

/// 数式文字列をトークン列に変換
///
/// 先頭の`=`は存在すれば取り除かれます。
pub(crate) fn tokenize(formula: &str) -> Result<Vec<FormulaToken>, FormulaError> {
    let input = formula.strip_prefix('=').unwrap_or(formula);
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        match ch {
            ' ' | '\t' | '\r' | '\n' => {
                pos += 1;
            }
            '+' => {
                tokens.push(FormulaToken::Plus);
                pos += 1;
            }
            '-' => {
                tokens.push(FormulaToken::Minus);
                pos += 1;
            }
            '*' => {
                tokens.push(FormulaToken::Star);
                pos += 1;
            }
            '/' => {
                tokens.push(FormulaToken::Slash);
                pos += 1;
            }
            '^' => {
                tokens.push(FormulaToken::Caret);
                pos += 1;
            }
            '&' => {
                tokens.push(FormulaToken::Ampersand);
                pos += 1;
            }
            '(' => {
                tokens.push(FormulaToken::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(FormulaToken::RParen);
                pos += 1;
            }
            ',' => {
                tokens.push(FormulaToken::Comma);
                pos += 1;
            }
            ':' => {
                tokens.push(FormulaToken::Colon);
                pos += 1;
            }
            '=' => {
                tokens.push(FormulaToken::Eq);
                pos += 1;
            }
            '<' => {
                if chars.get(pos + 1) == Some(&'>') {
                    tokens.push(FormulaToken::Ne);
                    pos += 2;
                } else if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(FormulaToken::Le);
                    pos += 2;
                } else {
                    tokens.push(FormulaToken::Lt);
                    pos += 1;
                }
            }
            '>' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(FormulaToken::Ge);
                    pos += 2;
                } else {
                    tokens.push(FormulaToken::Gt);
                    pos += 1;
                }
            }
            '"' => {
                let (text, next) = read_string(&chars, pos)?;
                tokens.push(FormulaToken::Text(text));
                pos = next;
            }
            '\'' => {
                // 'Sheet Name'!A1 形式のシート修飾参照
                let (sheet, next) = read_quoted_sheet(&chars, pos)?;
                if chars.get(next) != Some(&'!') {
                    return Err(FormulaError::UnexpectedChar('\'', pos));
                }
                let (word, next) = read_word(&chars, next + 1);
                let cell = parse_cell_word(&word)
                    .ok_or_else(|| FormulaError::UnexpectedToken(word.clone()))?;
                tokens.push(FormulaToken::Ref(CellRef {
                    sheet: Some(sheet),
                    ..cell
                }));
                pos = next;
            }
            c if c.is_ascii_digit() || (c == '.' && is_digit_at(&chars, pos + 1)) => {
                let (number, next) = read_number(&chars, pos)?;
                tokens.push(FormulaToken::Number(number));
                pos = next;
            }
            c if c.is_ascii_alphabetic() || c == '$' || c == '_' => {
                let (word, next) = read_word(&chars, pos);
                if chars.get(next) == Some(&'!') {
                    // Sheet1!A1 形式のシート修飾参照
                    let (cell_word, after) = read_word(&chars, next + 1);
                    let cell = parse_cell_word(&cell_word)
                        .ok_or_else(|| FormulaError::UnexpectedToken(cell_word.clone()))?;
                    tokens.push(FormulaToken::Ref(CellRef {
                        sheet: Some(word),
                        ..cell
                    }));
                    pos = after;
                } else if word.eq_ignore_ascii_case("TRUE") {
                    tokens.push(FormulaToken::Bool(true));
                    pos = next;
                } else if word.eq_ignore_ascii_case("FALSE") {
                    tokens.push(FormulaToken::Bool(false));
                    pos = next;
                } else if let Some(cell) = parse_cell_word(&word) {
                    tokens.push(FormulaToken::Ref(cell));
                    pos = next;
                } else {
                    tokens.push(FormulaToken::Ident(word));
                    pos = next;
                }
            }
            c => {
                return Err(FormulaError::UnexpectedChar(c, pos));
            }
        }
    }

    Ok(tokens)
}

fn is_digit_at(chars: &[char], pos: usize) -> bool {
    chars.get(pos).is_some_and(|c| c.is_ascii_digit())
}

/// 数値リテラルを読み取る（小数点と指数表記に対応）
fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), FormulaError> {
    let mut pos = start;
    while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
        pos += 1;
    }
    // 指数部（1E5、2.5e-3など）
    if chars.get(pos).is_some_and(|c| *c == 'e' || *c == 'E') {
        let mut exp_end = pos + 1;
        if chars.get(exp_end).is_some_and(|c| *c == '+' || *c == '-') {
            exp_end += 1;
        }
        if is_digit_at(chars, exp_end) {
            while is_digit_at(chars, exp_end) {
                exp_end += 1;
            }
            pos = exp_end;
        }
    }

    let text: String = chars[start..pos].iter().collect();
    text.parse::<f64>()
        .map(|n| (n, pos))
        .map_err(|_| FormulaError::UnexpectedToken(text))
}

/// 文字列リテラルを読み取る（`""`は`"`のエスケープ）
fn read_string(chars: &[char], start: usize) -> Result<(String, usize), FormulaError> {
    let mut text = String::new();
    let mut pos = start + 1;

    while pos < chars.len() {
        if chars[pos] == '"' {
            if chars.get(pos + 1) == Some(&'"') {
                text.push('"');
                pos += 2;
            } else {
                return Ok((text, pos + 1));
            }
        } else {
            text.push(chars[pos]);
            pos += 1;
        }
    }

    Err(FormulaError::UnexpectedEnd)
}

/// シングルクォートで囲まれたシート名を読み取る（`''`は`'`のエスケープ）
fn read_quoted_sheet(chars: &[char], start: usize) -> Result<(String, usize), FormulaError> {
    let mut name = String::new();
    let mut pos = start + 1;

    while pos < chars.len() {
        if chars[pos] == '\'' {
            if chars.get(pos + 1) == Some(&'\'') {
                name.push('\'');
                pos += 2;
            } else {
                return Ok((name, pos + 1));
            }
        } else {
            name.push(chars[pos]);
            pos += 1;
        }
    }

    Err(FormulaError::UnexpectedEnd)
}

/// 識別子・セル参照候補の語を読み取る
fn read_word(chars: &[char], start: usize) -> (String, usize) {
    let mut pos = start;
    while pos < chars.len()
        && (chars[pos].is_ascii_alphanumeric()
            || chars[pos] == '$'
            || chars[pos] == '_'
            || chars[pos] == '.')
    {
        pos += 1;
    }
    (chars[start..pos].iter().collect(), pos)
}

/// 語をセル参照として解析（`$B$3`、`A1`など）
///
/// セル参照のパターンに一致しない語は`None`です（関数名など）。
fn parse_cell_word(word: &str) -> Option<CellRef> {
    let mut rest = word;

    let abs_col = rest.starts_with('$');
    if abs_col {
        rest = &rest[1..];
    }

    let letters_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if letters_len == 0 {
        return None;
    }
    let (letters, after_letters) = rest.split_at(letters_len);
    rest = after_letters;

    let abs_row = rest.starts_with('$');
    if abs_row {
        rest = &rest[1..];
    }

    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let col = CellCoord::col_letter_to_index(letters)?;
    let row: u32 = rest.parse().ok()?;
    if row == 0 || row - 1 > MAX_ROW || col > MAX_COL {
        return None;
    }

    Some(CellRef {
        sheet: None,
        coord: CellCoord::new(row - 1, col),
        abs_col,
        abs_row,
    })
}
