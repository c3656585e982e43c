//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

use crate::formula::FormulaError;

/// xlsx2cssクレート全体で使用するエラー型
///
/// このエラー型は、Excelファイルの読み込み、条件付き書式の解析、
/// CSS変換処理中に発生するすべてのエラーを統一的に扱うために使用されます。
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー（ファイル読み込み失敗など）
/// - `Parse`: Excelファイルの解析中に発生したエラー（calamine由来）
/// - `Zip`: XLSXファイル（ZIPアーカイブ）の解析エラー
/// - `ThemeColors`: ワークブックテーマの構造エラー（strictモードのみ）
/// - `Formula`: 条件付き書式数式のトークン化・解析・評価エラー
/// - `Config`: 設定の検証に失敗したエラー（無効なクラスプレフィックスなど）
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsx2css::XlsxToCssError;
/// use std::fs::File;
///
/// fn read_excel_file(path: &str) -> Result<(), XlsxToCssError> {
///     let file = File::open(path)?;  // Ioエラーが自動的に変換される
///     // ... 処理 ...
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlsxToCssError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Excelファイルの解析中に発生したエラー
    ///
    /// calamineクレートがExcelファイルを解析する際に発生したエラーです。
    /// ファイル形式が不正、破損したファイル、サポートされていない形式などが
    /// 原因となります。
    #[error("Failed to parse Excel file: {0}")]
    Parse(#[from] calamine::Error),

    /// UTF-8文字列の変換エラー
    ///
    /// XML解析時にUTF-8文字列への変換に失敗した場合に発生します。
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// ZIPアーカイブの解析エラー
    ///
    /// XLSXファイル（ZIPアーカイブ）の解析中に発生したエラーです。
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// 数値の解析エラー
    ///
    /// XML属性の文字列から数値への変換に失敗した場合に発生します。
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// 設定の検証に失敗したエラー
    ///
    /// `ConverterBuilder::build()`時に設定を検証し、無効な設定が検出された
    /// 場合に発生します。例えば、CSSクラスプレフィックスが空の場合や、
    /// CSS識別子として使用できない文字を含む場合などです。
    #[error("Configuration error: {0}")]
    Config(String),

    /// ワークブックテーマの構造エラー
    ///
    /// テーマXMLが存在しない、または構造が不正な場合に発生します。
    /// strictモードでのみ返され、非strictモードではフォールバックの
    /// テーマカラーが使用されます。
    #[error("Workbook theme error: {0}")]
    ThemeColors(String),

    /// 条件付き書式数式のエラー
    ///
    /// 数式のトークン化・解析・評価中に発生したエラーです。
    /// `fail_ok=true`（デフォルト）の場合、このエラーは内部で吸収され、
    /// 該当セルは「非マッチ」として扱われます。
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限などの
    /// セキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}
