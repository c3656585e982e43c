//! 数式の構文解析
//!
//! トークン列を式木（`Expr`）に変換するPratt構文解析器。
//! 演算子の優先順位と結合規則はExcelに合わせています:
//! 比較 < 文字列連結 < 加減算 < 乗除算 < べき乗 < 単項演算子。

use crate::formula::tokens::{tokenize, CellRef, FormulaToken};
use crate::formula::FormulaError;

/// 単項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Plus,
    Minus,
}

/// 二項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// 数式の式木
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Ref(CellRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

/// 数式文字列を式木に解析
pub(crate) fn parse(formula: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(formula)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr(0)?;

    if let Some(token) = parser.peek() {
        return Err(FormulaError::UnexpectedToken(format!("{:?}", token)));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<FormulaToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&FormulaToken> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<FormulaToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: FormulaToken) -> Result<(), FormulaError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(FormulaError::UnexpectedToken(format!("{:?}", token))),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    /// 二項演算子の左結合力（大きいほど強く結合）
    fn binding_power(token: &FormulaToken) -> Option<(BinaryOp, u8)> {
        match token {
            FormulaToken::Eq => Some((BinaryOp::Eq, 1)),
            FormulaToken::Ne => Some((BinaryOp::Ne, 1)),
            FormulaToken::Lt => Some((BinaryOp::Lt, 1)),
            FormulaToken::Le => Some((BinaryOp::Le, 1)),
            FormulaToken::Gt => Some((BinaryOp::Gt, 1)),
            FormulaToken::Ge => Some((BinaryOp::Ge, 1)),
            FormulaToken::Ampersand => Some((BinaryOp::Concat, 2)),
            FormulaToken::Plus => Some((BinaryOp::Add, 3)),
            FormulaToken::Minus => Some((BinaryOp::Sub, 3)),
            FormulaToken::Star => Some((BinaryOp::Mul, 4)),
            FormulaToken::Slash => Some((BinaryOp::Div, 4)),
            FormulaToken::Caret => Some((BinaryOp::Pow, 5)),
            _ => None,
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, FormulaError> {
        let mut left = self.parse_prefix()?;

        while let Some(token) = self.peek() {
            let (op, bp) = match Self::binding_power(token) {
                Some(pair) => pair,
                None => break,
            };
            if bp < min_bp {
                break;
            }
            self.next();

            // べき乗は右結合、それ以外は左結合
            let right_bp = if op == BinaryOp::Pow { bp } else { bp + 1 };
            let right = self.parse_expr(right_bp)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, FormulaError> {
        match self.next() {
            Some(FormulaToken::Number(n)) => Ok(Expr::Number(n)),
            Some(FormulaToken::Text(s)) => Ok(Expr::Text(s)),
            Some(FormulaToken::Bool(b)) => Ok(Expr::Bool(b)),
            Some(FormulaToken::Ref(cell)) => {
                // A1:B5 のような範囲参照は非対応
                if self.peek() == Some(&FormulaToken::Colon) {
                    self.next();
                    let end = match self.next() {
                        Some(FormulaToken::Ref(end)) => end.display(),
                        _ => "?".to_string(),
                    };
                    return Err(FormulaError::MultiCellReference(format!(
                        "{}:{}",
                        cell.display(),
                        end
                    )));
                }
                Ok(Expr::Ref(cell))
            }
            Some(FormulaToken::Plus) => {
                let operand = self.parse_expr(6)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Plus,
                    operand: Box::new(operand),
                })
            }
            Some(FormulaToken::Minus) => {
                let operand = self.parse_expr(6)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Minus,
                    operand: Box::new(operand),
                })
            }
            Some(FormulaToken::LParen) => {
                let inner = self.parse_expr(0)?;
                self.expect(FormulaToken::RParen)?;
                Ok(inner)
            }
            Some(FormulaToken::Ident(name)) => {
                // 関数呼び出し以外の識別子（名前付き範囲など)は非対応
                if self.peek() != Some(&FormulaToken::LParen) {
                    return Err(FormulaError::UnexpectedToken(name));
                }
                self.next();
                let args = self.parse_args()?;
                Ok(Expr::Call {
                    name: name.to_ascii_uppercase(),
                    args,
                })
            }
            Some(token) => Err(FormulaError::UnexpectedToken(format!("{:?}", token))),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();

        if self.peek() == Some(&FormulaToken::RParen) {
            self.next();
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr(0)?);
            match self.next() {
                Some(FormulaToken::Comma) => continue,
                Some(FormulaToken::RParen) => return Ok(args),
                Some(token) => {
                    return Err(FormulaError::UnexpectedToken(format!("{:?}", token)));
                }
                None => return Err(FormulaError::UnexpectedEnd),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellCoord;

    #[test]
    fn test_parse_comparison() {
        let expr = parse("=A1>10").unwrap();
        match expr {
            Expr::Binary { op, left, right } => {
                assert_eq!(op, BinaryOp::Gt);
                assert!(matches!(*left, Expr::Ref(_)));
                assert_eq!(*right, Expr::Number(10.0));
            }
            e => panic!("Expected binary expression, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_precedence_arithmetic_over_comparison() {
        // A1+1>B1*2 は (A1+1) > (B1*2)
        let expr = parse("=A1+1>B1*2").unwrap();
        match expr {
            Expr::Binary { op, left, right } => {
                assert_eq!(op, BinaryOp::Gt);
                assert!(matches!(
                    *left,
                    Expr::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
                assert!(matches!(
                    *right,
                    Expr::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            e => panic!("Expected binary expression, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_mul_binds_tighter_than_add() {
        // 1+2*3 は 1+(2*3)
        let expr = parse("=1+2*3").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => {
                assert!(matches!(
                    *right,
                    Expr::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            e => panic!("Expected addition at the root, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_pow_right_associative() {
        // 2^3^2 は 2^(3^2)
        let expr = parse("=2^3^2").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Pow,
                left,
                right,
            } => {
                assert_eq!(*left, Expr::Number(2.0));
                assert!(matches!(
                    *right,
                    Expr::Binary {
                        op: BinaryOp::Pow,
                        ..
                    }
                ));
            }
            e => panic!("Expected power at the root, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_left_associative_subtraction() {
        // 10-3-2 は (10-3)-2
        let expr = parse("=10-3-2").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Sub,
                left,
                right,
            } => {
                assert!(matches!(
                    *left,
                    Expr::Binary {
                        op: BinaryOp::Sub,
                        ..
                    }
                ));
                assert_eq!(*right, Expr::Number(2.0));
            }
            e => panic!("Expected subtraction at the root, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_parentheses_override() {
        let expr = parse("=(1+2)*3").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Mul,
                left,
                ..
            } => {
                assert!(matches!(
                    *left,
                    Expr::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            e => panic!("Expected multiplication at the root, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_unary_minus() {
        let expr = parse("=-A1").unwrap();
        assert!(matches!(
            expr,
            Expr::Unary {
                op: UnaryOp::Minus,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_unary_binds_tighter_than_pow() {
        // Excelでは -2^2 = 4（単項マイナスがべき乗より強い）
        let expr = parse("=-2^2").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Pow,
                left,
                ..
            } => {
                assert!(matches!(
                    *left,
                    Expr::Unary {
                        op: UnaryOp::Minus,
                        ..
                    }
                ));
            }
            e => panic!("Expected power at the root, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_function_call() {
        let expr = parse("=AND(A1>0,A1<10)").unwrap();
        match expr {
            Expr::Call { name, args } => {
                assert_eq!(name, "AND");
                assert_eq!(args.len(), 2);
            }
            e => panic!("Expected call, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_function_name_case_insensitive() {
        let expr = parse("=isblank(B2)").unwrap();
        match expr {
            Expr::Call { name, .. } => assert_eq!(name, "ISBLANK"),
            e => panic!("Expected call, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_nested_calls() {
        let expr = parse("=NOT(OR(ISBLANK(A1),A1=0))").unwrap();
        match expr {
            Expr::Call { name, args } => {
                assert_eq!(name, "NOT");
                assert!(matches!(&args[0], Expr::Call { name, .. } if name == "OR"));
            }
            e => panic!("Expected call, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_range_reference_rejected() {
        match parse("=SUM(A1:B5)") {
            Err(FormulaError::MultiCellReference(range)) => {
                assert_eq!(range, "A1:B5");
            }
            other => panic!("Expected MultiCellReference, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_identifier_rejected() {
        // 名前付き範囲は非対応
        match parse("=MyRange>0") {
            Err(FormulaError::UnexpectedToken(name)) => {
                assert_eq!(name, "MyRange");
            }
            other => panic!("Expected UnexpectedToken, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_trailing_tokens_rejected() {
        assert!(matches!(
            parse("=A1>10 20"),
            Err(FormulaError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn test_parse_unbalanced_paren() {
        assert_eq!(parse("=(A1>10"), Err(FormulaError::UnexpectedEnd));
    }

    #[test]
    fn test_parse_empty_formula() {
        assert_eq!(parse("="), Err(FormulaError::UnexpectedEnd));
    }

    #[test]
    fn test_parse_sheet_qualified_reference() {
        let expr = parse("=Data!$A$1=5").unwrap();
        match expr {
            Expr::Binary { left, .. } => match *left {
                Expr::Ref(cell) => {
                    assert_eq!(cell.sheet.as_deref(), Some("Data"));
                    assert_eq!(cell.coord, CellCoord::new(0, 0));
                    assert!(cell.abs_col && cell.abs_row);
                }
                e => panic!("Expected ref, got {:?}", e),
            },
            e => panic!("Expected binary expression, got {:?}", e),
        }
    }

    #[test]
    fn test_parse_concat() {
        let expr = parse("=A1&\"!\"=\"done!\"").unwrap();
        // 連結は比較より強く結合する
        match expr {
            Expr::Binary {
                op: BinaryOp::Eq,
                left,
                ..
            } => {
                assert!(matches!(
                    *left,
                    Expr::Binary {
                        op: BinaryOp::Concat,
                        ..
                    }
                ));
            }
            e => panic!("Expected equality at the root, got {:?}", e),
        }
    }
}
