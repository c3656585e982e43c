//! Processor Module
//!
//! シートの条件付き書式ブロックをセルごとに評価し、数式がtrueと
//! 評価されたセルのマッチ一覧を構築するモジュール。
//!
//! 数式はブロックのアンカーセル（最初の範囲の左上）を基準に書かれて
//! おり、各対象セルへの適用時には相対参照がアンカーからのオフセット分
//! シフトされます（`$`による絶対指定は固定）。
//!
//! 同一セルに複数のルールがマッチした場合はすべて保持されます。
//! 優先順位と`stopIfTrue`の解決はクラス適用側の責務です。

use std::collections::HashMap;

use crate::error::XlsxToCssError;
use crate::formula::{evaluate, parse, CellRef};
use crate::types::{CellValue, MatchedRule, SheetData};

/// シートの条件付き書式を評価し、セルごとのマッチ一覧を返す
///
/// 戻り値のキーは`"{シート名}!{A1形式セル}"`です。マッチしたセルのみが
/// キーとして現れます。
///
/// `dxf_id`を持たないルールと、数式の個数が1でないルール
/// （`colorScale`や`top10`など数式ベースでないルール種別）は
/// 評価対象外として静かにスキップされます。
///
/// `fail_ok`がtrueの場合、数式の解析・評価エラーは該当ルール・セルの
/// 非マッチとして吸収されます。falseの場合は最初のエラーで処理を
/// 中断します。
pub fn process_conditional_formatting(
    sheet: &SheetData,
    fail_ok: bool,
) -> Result<HashMap<String, Vec<MatchedRule>>, XlsxToCssError> {
    let mut matches: HashMap<String, Vec<MatchedRule>> = HashMap::new();

    for formatting in &sheet.conditional_formats {
        let anchor = match formatting.anchor() {
            Some(anchor) => anchor,
            None => continue,
        };

        for rule in &formatting.rules {
            let dxf_id = match rule.dxf_id {
                Some(dxf_id) => dxf_id,
                None => continue,
            };
            if rule.formulas.len() != 1 {
                continue;
            }

            // 解析はルールごとに一度だけ行い、セルごとの適用は
            // 参照シフトと評価のみ
            let expr = match parse(&rule.formulas[0]) {
                Ok(expr) => expr,
                Err(e) => {
                    if fail_ok {
                        continue;
                    }
                    return Err(e.into());
                }
            };

            for range in &formatting.ranges {
                for coord in range.iter() {
                    let row_delta = coord.row as i64 - anchor.row as i64;
                    let col_delta = coord.col as i64 - anchor.col as i64;

                    let resolve = |cell: &CellRef| {
                        if let Some(name) = &cell.sheet {
                            if name != &sheet.name {
                                return Err(crate::formula::FormulaError::UnresolvedReference(
                                    cell.display(),
                                ));
                            }
                        }
                        let shifted = cell.shifted(row_delta, col_delta)?;
                        Ok(sheet.value(shifted.coord))
                    };

                    match evaluate(&expr, &resolve) {
                        Ok(CellValue::Bool(true)) => {
                            let key = format!("{}!{}", sheet.name, coord.to_a1_notation());
                            matches.entry(key).or_default().push(MatchedRule {
                                sheet: sheet.name.clone(),
                                cell: coord.to_a1_notation(),
                                priority: rule.priority,
                                dxf_id,
                                stop_if_true: rule.stop_if_true,
                            });
                        }
                        // trueでない評価結果（false、数値、文字列）は非マッチ
                        Ok(_) => {}
                        Err(e) => {
                            if !fail_ok {
                                return Err(e.into());
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellCoord, CellRange, CfRule, ConditionalFormatting};

    fn rule(priority: i32, dxf_id: u32, formula: &str) -> CfRule {
        CfRule {
            priority,
            dxf_id: Some(dxf_id),
            stop_if_true: false,
            formulas: vec![formula.to_string()],
        }
    }

    fn sheet_with_column(values: &[f64]) -> SheetData {
        let mut sheet = SheetData::new("Data");
        for (row, value) in values.iter().enumerate() {
            sheet.set_value(CellCoord::new(row as u32, 0), CellValue::Number(*value));
        }
        sheet
    }

    #[test]
    fn test_anchored_column_formula() {
        // A1:A4 に =$A1>10 を適用。行のみ相対なので各行が自分の値を見る
        let mut sheet = sheet_with_column(&[5.0, 20.0, 7.0, 42.0]);
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1:A4").unwrap()],
            rules: vec![rule(1, 0, "=$A1>10")],
        });

        let matches = process_conditional_formatting(&sheet, true).unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.contains_key("Data!A2"));
        assert!(matches.contains_key("Data!A4"));
        assert!(!matches.contains_key("Data!A1"));
    }

    #[test]
    fn test_relative_reference_shift() {
        // B2に対して書かれた =A1>0 をC3に適用すると、参照はB2を指す
        let mut sheet = SheetData::new("Data");
        sheet.set_value(CellCoord::parse_a1("B2").unwrap(), CellValue::Number(1.0));
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("B2:C3").unwrap()],
            rules: vec![rule(1, 0, "=A1>0")],
        });

        let matches = process_conditional_formatting(&sheet, true).unwrap();
        // C3のみマッチ: B2に適用された数式はA1（空=0）を見る
        assert_eq!(matches.len(), 1);
        assert!(matches.contains_key("Data!C3"));
    }

    #[test]
    fn test_absolute_reference_not_shifted() {
        // $A$1 は全セルで同じセルを参照する
        let mut sheet = SheetData::new("Data");
        sheet.set_value(CellCoord::new(0, 0), CellValue::Number(99.0));
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("B1:B3").unwrap()],
            rules: vec![rule(1, 0, "=$A$1>10")],
        });

        let matches = process_conditional_formatting(&sheet, true).unwrap();
        assert_eq!(matches.len(), 3);
    }

    #[test]
    fn test_multiple_rectangles_share_anchor() {
        // sqref="A1:A2 C1:C2" のアンカーは最初の矩形の左上（A1）
        let mut sheet = SheetData::new("Data");
        sheet.set_value(CellCoord::parse_a1("A1").unwrap(), CellValue::Number(1.0));
        sheet.set_value(CellCoord::parse_a1("C2").unwrap(), CellValue::Number(1.0));
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![
                CellRange::parse("A1:A2").unwrap(),
                CellRange::parse("C1:C2").unwrap(),
            ],
            rules: vec![rule(1, 0, "=A1=1")],
        });

        let matches = process_conditional_formatting(&sheet, true).unwrap();
        assert!(matches.contains_key("Data!A1"));
        assert!(matches.contains_key("Data!C2"));
        assert!(!matches.contains_key("Data!A2"));
        assert!(!matches.contains_key("Data!C1"));
    }

    #[test]
    fn test_all_matches_retained() {
        // 同一セルに複数ルールがマッチした場合はすべて保持される
        let mut sheet = sheet_with_column(&[42.0]);
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1").unwrap()],
            rules: vec![rule(2, 0, "=$A1>10"), rule(1, 1, "=$A1>40")],
        });

        let matches = process_conditional_formatting(&sheet, true).unwrap();
        let cell_matches = &matches["Data!A1"];
        assert_eq!(cell_matches.len(), 2);
        // 保持順はブロック内の出現順（優先度の解決は呼び出し側）
        assert_eq!(cell_matches[0].priority, 2);
        assert_eq!(cell_matches[1].priority, 1);
    }

    #[test]
    fn test_rule_without_dxf_skipped() {
        let mut sheet = sheet_with_column(&[42.0]);
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1").unwrap()],
            rules: vec![CfRule {
                priority: 1,
                dxf_id: None,
                stop_if_true: false,
                formulas: vec!["=$A1>10".to_string()],
            }],
        });

        // fail_ok=falseでもエラーにならずスキップされる
        let matches = process_conditional_formatting(&sheet, false).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_rule_with_two_formulas_skipped() {
        // cellIs between のような2数式ルールは数式ベース評価の対象外
        let mut sheet = sheet_with_column(&[42.0]);
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1").unwrap()],
            rules: vec![CfRule {
                priority: 1,
                dxf_id: Some(0),
                stop_if_true: false,
                formulas: vec!["10".to_string(), "50".to_string()],
            }],
        });

        let matches = process_conditional_formatting(&sheet, false).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_parse_error_fail_ok() {
        let mut sheet = sheet_with_column(&[42.0]);
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1").unwrap()],
            rules: vec![rule(1, 0, "=SUM(A1:B5)>10"), rule(2, 1, "=$A1>10")],
        });

        // fail_ok=true: 壊れたルールだけスキップされ、残りは評価される
        let matches = process_conditional_formatting(&sheet, true).unwrap();
        let cell_matches = &matches["Data!A1"];
        assert_eq!(cell_matches.len(), 1);
        assert_eq!(cell_matches[0].dxf_id, 1);
    }

    #[test]
    fn test_parse_error_strict() {
        let mut sheet = sheet_with_column(&[42.0]);
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1").unwrap()],
            rules: vec![rule(1, 0, "=SUM(A1:B5)>10")],
        });

        let result = process_conditional_formatting(&sheet, false);
        assert!(matches!(result, Err(XlsxToCssError::Formula(_))));
    }

    #[test]
    fn test_eval_error_fail_ok() {
        // ゼロ除算は該当セルの非マッチとして吸収される
        let mut sheet = SheetData::new("Data");
        sheet.set_value(CellCoord::parse_a1("B1").unwrap(), CellValue::Number(2.0));
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1:A2").unwrap()],
            rules: vec![rule(1, 0, "=1/B1>0")],
        });

        let matches = process_conditional_formatting(&sheet, true).unwrap();
        // A1はB1=2で評価可能、A2はB2=0でゼロ除算
        assert_eq!(matches.len(), 1);
        assert!(matches.contains_key("Data!A1"));
    }

    #[test]
    fn test_sheet_qualified_reference_same_sheet() {
        let mut sheet = sheet_with_column(&[42.0]);
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1").unwrap()],
            rules: vec![rule(1, 0, "=Data!$A$1>10")],
        });

        let matches = process_conditional_formatting(&sheet, false).unwrap();
        assert!(matches.contains_key("Data!A1"));
    }

    #[test]
    fn test_cross_sheet_reference_rejected() {
        let mut sheet = sheet_with_column(&[42.0]);
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1").unwrap()],
            rules: vec![rule(1, 0, "=Other!$A$1>10")],
        });

        let result = process_conditional_formatting(&sheet, false);
        assert!(matches!(
            result,
            Err(XlsxToCssError::Formula(
                crate::formula::FormulaError::UnresolvedReference(_)
            ))
        ));

        // fail_okでは非マッチ扱い
        let matches = process_conditional_formatting(&sheet, true).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_shift_out_of_bounds() {
        // sqref="B2 B1" のアンカーはB2。B1への適用では参照A1を
        // さらに上へシフトできず範囲外になる
        let mut sheet = SheetData::new("Data");
        sheet.set_value(CellCoord::parse_a1("A1").unwrap(), CellValue::Number(1.0));
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![
                CellRange::parse("B2").unwrap(),
                CellRange::parse("B1").unwrap(),
            ],
            rules: vec![rule(1, 0, "=A1=1")],
        });

        let matches = process_conditional_formatting(&sheet, true).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches.contains_key("Data!B2"));

        let result = process_conditional_formatting(&sheet, false);
        assert!(matches!(
            result,
            Err(XlsxToCssError::Formula(
                crate::formula::FormulaError::OutOfBounds(_)
            ))
        ));
    }

    #[test]
    fn test_non_boolean_formula_result_is_no_match() {
        let mut sheet = sheet_with_column(&[42.0]);
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1").unwrap()],
            rules: vec![rule(1, 0, "=$A1+1")],
        });

        let matches = process_conditional_formatting(&sheet, false).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_empty_sheet() {
        let sheet = SheetData::new("Empty");
        let matches = process_conditional_formatting(&sheet, false).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_text_rule() {
        let mut sheet = SheetData::new("Data");
        sheet.set_value(
            CellCoord::parse_a1("A1").unwrap(),
            CellValue::String("done".to_string()),
        );
        sheet.set_value(
            CellCoord::parse_a1("A2").unwrap(),
            CellValue::String("pending".to_string()),
        );
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1:A2").unwrap()],
            rules: vec![rule(1, 0, "=$A1=\"DONE\"")],
        });

        let matches = process_conditional_formatting(&sheet, true).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches.contains_key("Data!A1"));
    }

    #[test]
    fn test_isblank_rule() {
        let mut sheet = SheetData::new("Data");
        sheet.set_value(CellCoord::parse_a1("A1").unwrap(), CellValue::Number(1.0));
        sheet.conditional_formats.push(ConditionalFormatting {
            ranges: vec![CellRange::parse("A1:A3").unwrap()],
            rules: vec![rule(1, 0, "=ISBLANK($A1)")],
        });

        let matches = process_conditional_formatting(&sheet, true).unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.contains_key("Data!A2"));
        assert!(matches.contains_key("Data!A3"));
    }
}
