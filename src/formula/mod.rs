//! Formula Module
//!
//! 条件付き書式数式の評価エンジン。トークン化（`tokens`）、構文解析
//! （`parser`）、評価（`eval`）の3段階で構成されます。
//!
//! サポートする言語は条件付き書式で一般的なサブセットです:
//! リテラル（数値・文字列・論理値）、単一セル参照（`$`による絶対指定と
//! シート修飾を含む）、二項演算子（比較・文字列連結・算術）、単項の
//! `+`/`-`、括弧、および論理・型判定関数
//! （`AND`/`OR`/`NOT`/`ISBLANK`/`ISNUMBER`/`ISTEXT`）。
//!
//! 範囲参照（`A1:B5`）と上記以外の関数は非対応で、構造化エラーとして
//! 報告されます。

pub(crate) mod eval;
pub(crate) mod parser;
pub(crate) mod tokens;

pub(crate) use eval::evaluate;
pub(crate) use parser::parse;
pub(crate) use tokens::CellRef;

use thiserror::Error;

/// 数式のトークン化・解析・評価中に発生するエラー
///
/// 処理対象の数式が評価できない理由を構造的に表現します。
/// `fail_ok`モードでは呼び出し側がこれらのエラーを吸収し、該当セルを
/// 非マッチとして扱います。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    /// トークン化できない文字に遭遇した
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    /// 数式が途中で終わっている
    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    /// 構文解析中に予期しないトークンに遭遇した
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    /// サポートされていない関数が使用された
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),

    /// 範囲参照（複数セル参照）が使用された
    #[error("Multi-cell range reference is not supported: {0}")]
    MultiCellReference(String),

    /// 解決できないセル参照（別シートへの参照など）
    #[error("Unresolved cell reference: {0}")]
    UnresolvedReference(String),

    /// 相対参照のシフト結果がシートの限界を超えた
    #[error("Shifted reference is out of sheet bounds: {0}")]
    OutOfBounds(String),

    /// 関数の引数の個数が不正
    #[error("Function {function} expects {expected}, got {got} argument(s)")]
    ArgCount {
        function: String,
        expected: String,
        got: usize,
    },

    /// 値の型変換に失敗した（#VALUE!相当）
    #[error("Value error: {0}")]
    Value(String),

    /// ゼロ除算（#DIV/0!相当）
    #[error("Division by zero")]
    DivisionByZero,
}
