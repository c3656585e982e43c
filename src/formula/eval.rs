//! 数式の評価
//!
//! 式木をセル値に評価します。セル参照の解決は呼び出し側が提供する
//! クロージャに委ねられます（相対参照シフトもそこで行われます）。
//!
//! 型強制はExcelの挙動に合わせています: 空セルは文脈に応じて`0`、`""`、
//! `FALSE`として扱われ、数値らしき文字列は算術文脈で数値に変換され、
//! 文字列比較は大文字小文字を区別しません。異なる型同士の比較は
//! 数値 < 文字列 < 論理値の順序です。

use std::cmp::Ordering;

use crate::formula::parser::{BinaryOp, Expr, UnaryOp};
use crate::formula::tokens::CellRef;
use crate::formula::FormulaError;
use crate::types::CellValue;

/// 式木を評価
///
/// `resolve`はセル参照を値に解決するクロージャです。シート修飾の検証や
/// 相対参照シフトは`resolve`の実装側で行います。
pub(crate) fn evaluate<F>(expr: &Expr, resolve: &F) -> Result<CellValue, FormulaError>
where
    F: Fn(&CellRef) -> Result<CellValue, FormulaError>,
{
    match expr {
        Expr::Number(n) => Ok(CellValue::Number(*n)),
        Expr::Text(s) => Ok(CellValue::String(s.clone())),
        Expr::Bool(b) => Ok(CellValue::Bool(*b)),
        Expr::Ref(cell) => resolve(cell),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, resolve)?;
            let number = to_number(&value)?;
            match op {
                UnaryOp::Plus => Ok(CellValue::Number(number)),
                UnaryOp::Minus => Ok(CellValue::Number(-number)),
            }
        }
        Expr::Binary { op, left, right } => {
            let lhs = evaluate(left, resolve)?;
            let rhs = evaluate(right, resolve)?;
            eval_binary(*op, &lhs, &rhs)
        }
        Expr::Call { name, args } => eval_call(name, args, resolve),
    }
}

fn eval_binary(op: BinaryOp, lhs: &CellValue, rhs: &CellValue) -> Result<CellValue, FormulaError> {
    match op {
        BinaryOp::Add => Ok(CellValue::Number(to_number(lhs)? + to_number(rhs)?)),
        BinaryOp::Sub => Ok(CellValue::Number(to_number(lhs)? - to_number(rhs)?)),
        BinaryOp::Mul => Ok(CellValue::Number(to_number(lhs)? * to_number(rhs)?)),
        BinaryOp::Div => {
            let divisor = to_number(rhs)?;
            if divisor == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Ok(CellValue::Number(to_number(lhs)? / divisor))
        }
        BinaryOp::Pow => Ok(CellValue::Number(to_number(lhs)?.powf(to_number(rhs)?))),
        BinaryOp::Concat => {
            let mut text = to_text(lhs)?;
            text.push_str(&to_text(rhs)?);
            Ok(CellValue::String(text))
        }
        BinaryOp::Eq => Ok(CellValue::Bool(compare(lhs, rhs)? == Ordering::Equal)),
        BinaryOp::Ne => Ok(CellValue::Bool(compare(lhs, rhs)? != Ordering::Equal)),
        BinaryOp::Lt => Ok(CellValue::Bool(compare(lhs, rhs)? == Ordering::Less)),
        BinaryOp::Le => Ok(CellValue::Bool(compare(lhs, rhs)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(CellValue::Bool(compare(lhs, rhs)? == Ordering::Greater)),
        BinaryOp::Ge => Ok(CellValue::Bool(compare(lhs, rhs)? != Ordering::Less)),
    }
}

fn eval_call<F>(name: &str, args: &[Expr], resolve: &F) -> Result<CellValue, FormulaError>
where
    F: Fn(&CellRef) -> Result<CellValue, FormulaError>,
{
    match name {
        "AND" => {
            require_at_least(name, 1, args.len())?;
            let mut result = true;
            for arg in args {
                let value = evaluate(arg, resolve)?;
                result = result && to_bool(&value)?;
            }
            Ok(CellValue::Bool(result))
        }
        "OR" => {
            require_at_least(name, 1, args.len())?;
            let mut result = false;
            for arg in args {
                let value = evaluate(arg, resolve)?;
                result = result || to_bool(&value)?;
            }
            Ok(CellValue::Bool(result))
        }
        "NOT" => {
            require_exactly(name, 1, args.len())?;
            let value = evaluate(&args[0], resolve)?;
            Ok(CellValue::Bool(!to_bool(&value)?))
        }
        "ISBLANK" => {
            require_exactly(name, 1, args.len())?;
            let value = evaluate(&args[0], resolve)?;
            Ok(CellValue::Bool(value.is_empty()))
        }
        "ISNUMBER" => {
            require_exactly(name, 1, args.len())?;
            let value = evaluate(&args[0], resolve)?;
            Ok(CellValue::Bool(matches!(value, CellValue::Number(_))))
        }
        "ISTEXT" => {
            require_exactly(name, 1, args.len())?;
            let value = evaluate(&args[0], resolve)?;
            Ok(CellValue::Bool(matches!(value, CellValue::String(_))))
        }
        _ => Err(FormulaError::UnsupportedFunction(name.to_string())),
    }
}

fn require_exactly(name: &str, expected: usize, got: usize) -> Result<(), FormulaError> {
    if got != expected {
        return Err(FormulaError::ArgCount {
            function: name.to_string(),
            expected: expected.to_string(),
            got,
        });
    }
    Ok(())
}

fn require_at_least(name: &str, minimum: usize, got: usize) -> Result<(), FormulaError> {
    if got < minimum {
        return Err(FormulaError::ArgCount {
            function: name.to_string(),
            expected: format!("at least {}", minimum),
            got,
        });
    }
    Ok(())
}

/// 値を数値に強制変換
///
/// 空セルは`0`、論理値は`1`/`0`、数値らしき文字列は解析されます。
fn to_number(value: &CellValue) -> Result<f64, FormulaError> {
    match value {
        CellValue::Number(n) => Ok(*n),
        CellValue::Bool(true) => Ok(1.0),
        CellValue::Bool(false) => Ok(0.0),
        CellValue::Empty => Ok(0.0),
        CellValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FormulaError::Value(format!("Cannot convert \"{}\" to a number", s))),
        CellValue::Error(e) => Err(FormulaError::Value(format!("Cell contains error {}", e))),
    }
}

/// 値を論理値に強制変換
///
/// 空セルは`FALSE`、数値は非ゼロ判定、文字列は`"TRUE"`/`"FALSE"`
/// （大文字小文字を区別しない）のみ受け付けます。
fn to_bool(value: &CellValue) -> Result<bool, FormulaError> {
    match value {
        CellValue::Bool(b) => Ok(*b),
        CellValue::Number(n) => Ok(*n != 0.0),
        CellValue::Empty => Ok(false),
        CellValue::String(s) => {
            if s.eq_ignore_ascii_case("TRUE") {
                Ok(true)
            } else if s.eq_ignore_ascii_case("FALSE") {
                Ok(false)
            } else {
                Err(FormulaError::Value(format!(
                    "Cannot convert \"{}\" to a boolean",
                    s
                )))
            }
        }
        CellValue::Error(e) => Err(FormulaError::Value(format!("Cell contains error {}", e))),
    }
}

/// 値を文字列に強制変換
///
/// 整数値の数値は小数点なしで書式化されます。
fn to_text(value: &CellValue) -> Result<String, FormulaError> {
    match value {
        CellValue::String(s) => Ok(s.clone()),
        CellValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Ok(format!("{}", *n as i64))
            } else {
                Ok(format!("{}", n))
            }
        }
        CellValue::Bool(true) => Ok("TRUE".to_string()),
        CellValue::Bool(false) => Ok("FALSE".to_string()),
        CellValue::Empty => Ok(String::new()),
        CellValue::Error(e) => Err(FormulaError::Value(format!("Cell contains error {}", e))),
    }
}

/// 2値を比較
///
/// 同じ型同士は通常の順序（文字列は大文字小文字を区別しない）で、
/// 異なる型同士は数値 < 文字列 < 論理値の型順序で比較します。
/// 空セルは相手の型のゼロ値（`0`、`""`、`FALSE`）として扱われます。
fn compare(lhs: &CellValue, rhs: &CellValue) -> Result<Ordering, FormulaError> {
    match (lhs, rhs) {
        (CellValue::Error(e), _) | (_, CellValue::Error(e)) => {
            Err(FormulaError::Value(format!("Cell contains error {}", e)))
        }
        (CellValue::Empty, CellValue::Empty) => Ok(Ordering::Equal),
        (CellValue::Empty, CellValue::Number(_)) => compare(&CellValue::Number(0.0), rhs),
        (CellValue::Number(_), CellValue::Empty) => compare(lhs, &CellValue::Number(0.0)),
        (CellValue::Empty, CellValue::String(_)) => {
            compare(&CellValue::String(String::new()), rhs)
        }
        (CellValue::String(_), CellValue::Empty) => {
            compare(lhs, &CellValue::String(String::new()))
        }
        (CellValue::Empty, CellValue::Bool(_)) => compare(&CellValue::Bool(false), rhs),
        (CellValue::Bool(_), CellValue::Empty) => compare(lhs, &CellValue::Bool(false)),
        (CellValue::Number(a), CellValue::Number(b)) => {
            a.partial_cmp(b).ok_or_else(|| {
                FormulaError::Value("Cannot compare NaN".to_string())
            })
        }
        (CellValue::String(a), CellValue::String(b)) => {
            Ok(a.to_lowercase().cmp(&b.to_lowercase()))
        }
        (CellValue::Bool(a), CellValue::Bool(b)) => Ok(a.cmp(b)),
        // 異なる型: 数値 < 文字列 < 論理値
        (a, b) => Ok(type_rank(a).cmp(&type_rank(b))),
    }
}

fn type_rank(value: &CellValue) -> u8 {
    match value {
        CellValue::Number(_) => 0,
        CellValue::String(_) => 1,
        CellValue::Bool(_) => 2,
        // EmptyとErrorはここに到達しない
        _ => 3,
    }
}
