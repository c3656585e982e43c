//! Integration Tests for xlsx2css
//!
//! These tests generate real XLSX workbooks with rust_xlsxwriter, run the
//! full conversion pipeline on them, and assert on the resulting match
//! table, CSS classes and stylesheet.

use rust_xlsxwriter::*;
use std::io::Cursor;
use xlsx2css::{ConverterBuilder, SheetSelector, XlsxToCssError};

// Helper module for generating test fixtures
mod fixtures {
    use super::*;

    /// Generate a workbook with a single numeric-threshold rule
    ///
    /// A1:A4 hold 5, 20, 7, 42 and the rule `=$A1>10` highlights the
    /// cells above the threshold (A2 and A4).
    pub fn generate_threshold_rule() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        worksheet.write_number(0, 0, 5)?;
        worksheet.write_number(1, 0, 20)?;
        worksheet.write_number(2, 0, 7)?;
        worksheet.write_number(3, 0, 42)?;

        let format = Format::new()
            .set_background_color(Color::RGB(0xFFC7CE))
            .set_font_color(Color::RGB(0x9C0006))
            .set_bold();
        let rule = ConditionalFormatFormula::new()
            .set_rule("=$A1>10")
            .set_format(format);
        worksheet.add_conditional_format(0, 0, 3, 0, &rule)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a workbook with two rules using different formats
    ///
    /// B1:B3 hold 1, 50, 200. Rule 1 (`=$B1>100`) and rule 2 (`=$B1>10`)
    /// both apply to the column, so B3 matches both rules.
    pub fn generate_two_rules() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        worksheet.write_number(0, 1, 1)?;
        worksheet.write_number(1, 1, 50)?;
        worksheet.write_number(2, 1, 200)?;

        let red = Format::new().set_background_color(Color::RGB(0xFF0000));
        let yellow = Format::new().set_background_color(Color::RGB(0xFFFF00));

        let high = ConditionalFormatFormula::new()
            .set_rule("=$B1>100")
            .set_format(red);
        let medium = ConditionalFormatFormula::new()
            .set_rule("=$B1>10")
            .set_format(yellow);
        worksheet.add_conditional_format(0, 1, 2, 1, &high)?;
        worksheet.add_conditional_format(0, 1, 2, 1, &medium)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a workbook where the first rule stops evaluation on match
    pub fn generate_stop_if_true() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        worksheet.write_number(0, 0, 200)?;

        let red = Format::new().set_background_color(Color::RGB(0xFF0000));
        let yellow = Format::new().set_background_color(Color::RGB(0xFFFF00));

        let high = ConditionalFormatFormula::new()
            .set_rule("=$A1>100")
            .set_format(red)
            .set_stop_if_true(true);
        let medium = ConditionalFormatFormula::new()
            .set_rule("=$A1>10")
            .set_format(yellow);
        worksheet.add_conditional_format(0, 0, 0, 0, &high)?;
        worksheet.add_conditional_format(0, 0, 0, 0, &medium)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a workbook with a text-equality rule
    pub fn generate_text_rule() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        worksheet.write_string(0, 0, "urgent")?;
        worksheet.write_string(1, 0, "ok")?;
        worksheet.write_string(2, 0, "URGENT")?;

        let format = Format::new()
            .set_font_color(Color::RGB(0x9C0006))
            .set_italic();
        let rule = ConditionalFormatFormula::new()
            .set_rule("=$A1=\"urgent\"")
            .set_format(format);
        worksheet.add_conditional_format(0, 0, 2, 0, &rule)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a workbook with an ISBLANK rule over a sparse column
    pub fn generate_isblank_rule() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        // A2 is the only filled cell; A1 and A3 are blank
        worksheet.write_string(1, 0, "present")?;
        // Anchor the used range so the blank rows stay inside the sheet
        worksheet.write_string(2, 1, "marker")?;

        let format = Format::new().set_background_color(Color::RGB(0xDDDDDD));
        let rule = ConditionalFormatFormula::new()
            .set_rule("=ISBLANK(A1)")
            .set_format(format);
        worksheet.add_conditional_format(0, 0, 2, 0, &rule)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a workbook where the rule reads a neighbouring column
    ///
    /// The rule `=B1>10` is applied to A1:A3 so each cell in column A is
    /// highlighted based on the value beside it in column B.
    pub fn generate_relative_reference() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        worksheet.write_string(0, 0, "alpha")?;
        worksheet.write_string(1, 0, "beta")?;
        worksheet.write_string(2, 0, "gamma")?;
        worksheet.write_number(0, 1, 5)?;
        worksheet.write_number(1, 1, 15)?;
        worksheet.write_number(2, 1, 25)?;

        let format = Format::new().set_bold();
        let rule = ConditionalFormatFormula::new()
            .set_rule("=B1>10")
            .set_format(format);
        worksheet.add_conditional_format(0, 0, 2, 0, &rule)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a workbook with two sheets, each with its own rule
    pub fn generate_two_sheets() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();

        let sheet1 = workbook.add_worksheet();
        sheet1.set_name("Data")?;
        sheet1.write_number(0, 0, 99)?;
        let format = Format::new().set_background_color(Color::RGB(0xFF0000));
        let rule = ConditionalFormatFormula::new()
            .set_rule("=$A1>10")
            .set_format(format);
        sheet1.add_conditional_format(0, 0, 0, 0, &rule)?;

        let sheet2 = workbook.add_worksheet();
        sheet2.set_name("Summary")?;
        sheet2.write_number(0, 0, 99)?;
        let format = Format::new().set_background_color(Color::RGB(0x00FF00));
        let rule = ConditionalFormatFormula::new()
            .set_rule("=$A1>10")
            .set_format(format);
        sheet2.add_conditional_format(0, 0, 0, 0, &rule)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a workbook without any conditional formatting
    pub fn generate_plain_values() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "Header")?;
        worksheet.write_number(1, 0, 42)?;
        Ok(workbook.save_to_buffer()?)
    }
}

#[test]
fn test_threshold_rule_matches() {
    let data = fixtures::generate_threshold_rule().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    assert!(!result.matches.contains_key("Sheet1!A1"));
    assert!(result.matches.contains_key("Sheet1!A2"));
    assert!(!result.matches.contains_key("Sheet1!A3"));
    assert!(result.matches.contains_key("Sheet1!A4"));

    // Both matching cells share the same class
    let a2: Vec<_> = result.cell_classes["Sheet1!A2"].iter().collect();
    let a4: Vec<_> = result.cell_classes["Sheet1!A4"].iter().collect();
    assert_eq!(a2, vec!["cf-0"]);
    assert_eq!(a4, vec!["cf-0"]);

    // The stylesheet carries the dxf formatting
    assert!(result.stylesheet.contains(".cf-0 {"));
    assert!(result.stylesheet.contains("background-color: #FFC7CE;"));
    assert!(result.stylesheet.contains("color: #9C0006;"));
    assert!(result.stylesheet.contains("font-weight: bold;"));
}

#[test]
fn test_multiple_rules_same_cell() {
    let data = fixtures::generate_two_rules().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    // B1 = 1 matches nothing, B2 = 50 matches one rule, B3 = 200 both
    assert!(!result.matches.contains_key("Sheet1!B1"));
    assert_eq!(result.matches["Sheet1!B2"].len(), 1);
    assert_eq!(result.matches["Sheet1!B3"].len(), 2);

    // Neither rule stops, so B3 gets both classes
    assert_eq!(result.cell_classes["Sheet1!B3"].len(), 2);
    assert_eq!(result.cell_classes["Sheet1!B2"].len(), 1);

    // Matches are reported with their rule priorities
    let priorities: Vec<i32> = result.matches["Sheet1!B3"]
        .iter()
        .map(|m| m.priority)
        .collect();
    assert_eq!(priorities.len(), 2);
    assert!(priorities[0] != priorities[1]);
}

#[test]
fn test_stop_if_true_halts_class_application() {
    let data = fixtures::generate_stop_if_true().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    // Both rules matched and are reported
    assert_eq!(result.matches["Sheet1!A1"].len(), 2);

    // But only the stopping rule's class is applied
    assert_eq!(result.cell_classes["Sheet1!A1"].len(), 1);
}

#[test]
fn test_text_rule_is_case_insensitive() {
    let data = fixtures::generate_text_rule().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    assert!(result.matches.contains_key("Sheet1!A1"));
    assert!(!result.matches.contains_key("Sheet1!A2"));
    // Excel text comparison ignores case
    assert!(result.matches.contains_key("Sheet1!A3"));

    assert!(result.stylesheet.contains("font-style: italic;"));
    assert!(result.stylesheet.contains("color: #9C0006;"));
}

#[test]
fn test_isblank_rule_matches_empty_cells() {
    let data = fixtures::generate_isblank_rule().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    assert!(result.matches.contains_key("Sheet1!A1"));
    assert!(!result.matches.contains_key("Sheet1!A2"));
    assert!(result.matches.contains_key("Sheet1!A3"));
}

#[test]
fn test_relative_reference_shifts_with_cell() {
    let data = fixtures::generate_relative_reference().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    // A1 reads B1 (5), A2 reads B2 (15), A3 reads B3 (25)
    assert!(!result.matches.contains_key("Sheet1!A1"));
    assert!(result.matches.contains_key("Sheet1!A2"));
    assert!(result.matches.contains_key("Sheet1!A3"));
}

#[test]
fn test_sheet_selection_by_name() {
    let data = fixtures::generate_two_sheets().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new()
        .with_sheet_selector(SheetSelector::Name("Summary".to_string()))
        .build()
        .unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    assert!(result.matches.contains_key("Summary!A1"));
    assert!(!result.matches.contains_key("Data!A1"));
}

#[test]
fn test_sheet_selection_by_index() {
    let data = fixtures::generate_two_sheets().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new()
        .with_sheet_selector(SheetSelector::Index(0))
        .build()
        .unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    assert!(result.matches.contains_key("Data!A1"));
    assert!(!result.matches.contains_key("Summary!A1"));
}

#[test]
fn test_all_sheets_converted_by_default() {
    let data = fixtures::generate_two_sheets().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    assert!(result.matches.contains_key("Data!A1"));
    assert!(result.matches.contains_key("Summary!A1"));

    // Different formats on the two sheets produce distinct classes
    assert_ne!(
        result.cell_classes["Data!A1"],
        result.cell_classes["Summary!A1"]
    );
}

#[test]
fn test_nonexistent_sheet() {
    let data = fixtures::generate_two_sheets().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new()
        .with_sheet_selector(SheetSelector::Name("Missing".to_string()))
        .build()
        .unwrap();
    let result = converter.convert(Cursor::new(data));

    match result {
        Err(XlsxToCssError::Config(message)) => {
            assert!(message.contains("Missing"));
        }
        other => panic!("Expected Config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_sheet_index_out_of_range() {
    let data = fixtures::generate_two_sheets().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new()
        .with_sheet_selector(SheetSelector::Index(9))
        .build()
        .unwrap();
    let result = converter.convert(Cursor::new(data));

    assert!(matches!(result, Err(XlsxToCssError::Config(_))));
}

#[test]
fn test_custom_class_prefix() {
    let data = fixtures::generate_threshold_rule().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new()
        .with_class_prefix("hl")
        .build()
        .unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    let classes: Vec<_> = result.cell_classes["Sheet1!A2"].iter().collect();
    assert_eq!(classes, vec!["hl-0"]);
    assert!(result.stylesheet.contains(".hl-0 {"));
}

#[test]
fn test_important_flag() {
    let data = fixtures::generate_threshold_rule().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().with_important(true).build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    assert!(result
        .stylesheet
        .contains("background-color: #FFC7CE !important;"));
    assert!(result.stylesheet.contains("font-weight: bold !important;"));
}

#[test]
fn test_no_conditional_formats() {
    let data = fixtures::generate_plain_values().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    assert!(result.matches.is_empty());
    assert!(result.cell_classes.is_empty());
    assert!(result.stylesheet.is_empty());
}

#[test]
fn test_invalid_file_format() {
    let data = b"This is not an XLSX file".to_vec();
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data));

    assert!(result.is_err());
}

#[test]
fn test_json_output() {
    let data = fixtures::generate_threshold_rule().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    let json = serde_json::to_string(&result).expect("Failed to serialize result");
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert!(value["matches"]["Sheet1!A2"].is_array());
    assert_eq!(value["matches"]["Sheet1!A2"][0]["cell"], "A2");
    assert_eq!(value["cell_classes"]["Sheet1!A4"][0], "cf-0");
    assert!(value["stylesheet"].as_str().unwrap().contains("#FFC7CE"));
}

#[test]
fn test_strict_mode_accepts_well_formed_workbook() {
    // rust_xlsxwriter always writes a complete theme part, so strict
    // mode succeeds on its output
    let data = fixtures::generate_threshold_rule().expect("Failed to generate fixture");
    let converter = ConverterBuilder::new().with_strict(true).build().unwrap();
    let result = converter.convert(Cursor::new(data)).unwrap();

    assert!(result.matches.contains_key("Sheet1!A2"));
}
