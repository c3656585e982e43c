//! Builder Module
//!
//! Fluent Builder APIを提供し、`Converter`インスタンスを段階的に構築する。

use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Seek};

use serde::Serialize;

use crate::api::SheetSelector;
use crate::color::ColorResolver;
use crate::css::{CssBuilder, CssClassGenerator};
use crate::error::XlsxToCssError;
use crate::parser::WorkbookParser;
use crate::processor::process_conditional_formatting;
use crate::types::MatchedRule;

/// 変換処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ConversionConfig {
    /// シート選択方式
    pub sheet_selector: SheetSelector,

    /// CSSクラス名のプレフィックス
    pub class_prefix: String,

    /// テーマ構造エラーを致命的として扱うか
    pub strict: bool,

    /// 数式エラーを非マッチとして吸収するか
    pub fail_ok: bool,

    /// すべての宣言に`!important`を付与するか
    pub important: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            sheet_selector: SheetSelector::All,
            class_prefix: "cf".to_string(),
            strict: false,
            fail_ok: true,
            important: false,
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Converter`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみを
/// オーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsx2css::{ConverterBuilder, SheetSelector};
///
/// # fn main() -> Result<(), xlsx2css::XlsxToCssError> {
/// let converter = ConverterBuilder::new()
///     .with_sheet_selector(SheetSelector::Name("Data".to_string()))
///     .with_class_prefix("hl")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConverterBuilder {
    /// 内部設定（構築中）
    config: ConversionConfig,
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - シート選択: すべてのシート
    /// - クラスプレフィックス: `"cf"`
    /// - strictモード: 無効（テーマ欠落時はフォールバック）
    /// - fail_okモード: 有効（数式エラーは非マッチとして吸収）
    /// - `!important`: 付与しない
    pub fn new() -> Self {
        Self {
            config: ConversionConfig::default(),
        }
    }

    /// 変換対象のシートを選択する
    ///
    /// # 引数
    ///
    /// * `selector: SheetSelector`: シート選択方式
    pub fn with_sheet_selector(mut self, selector: SheetSelector) -> Self {
        self.config.sheet_selector = selector;
        self
    }

    /// CSSクラス名のプレフィックスを指定する
    ///
    /// 生成されるクラス名は`{prefix}-0`、`{prefix}-1`、...です。
    /// プレフィックスはCSS識別子として有効でなければならず、
    /// `build()`時に検証されます。
    pub fn with_class_prefix(mut self, prefix: &str) -> Self {
        self.config.class_prefix = prefix.to_string();
        self
    }

    /// テーマ・色解決エラーを致命的として扱うかを指定する
    ///
    /// * `true`: テーマXMLの欠落・構造不正、および範囲外の色参照を
    ///   エラーとして返す
    /// * `false`（デフォルト）: フォールバックのテーマカラーで処理を
    ///   継続し、解決できない色は宣言から省略する
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    /// 数式エラーを非マッチとして吸収するかを指定する
    ///
    /// * `true`（デフォルト）: 解析・評価できない数式は該当セルの
    ///   非マッチとして扱う
    /// * `false`: 最初の数式エラーで変換を中断する
    pub fn with_fail_ok(mut self, fail_ok: bool) -> Self {
        self.config.fail_ok = fail_ok;
        self
    }

    /// すべてのCSS宣言に`!important`を付与するかを指定する
    ///
    /// 既存のスタイルシートと競合する環境への埋め込み用です。
    pub fn with_important(mut self, important: bool) -> Self {
        self.config.important = important;
        self
    }

    /// 設定を検証し、`Converter`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Converter)`: 設定が有効な場合、Converterインスタンス
    /// * `Err(XlsxToCssError::Config)`: 設定が無効な場合
    ///   （クラスプレフィックスがCSS識別子として不正など）
    pub fn build(self) -> Result<Converter, XlsxToCssError> {
        validate_class_prefix(&self.config.class_prefix)?;
        Ok(Converter::new(self.config))
    }
}

/// クラスプレフィックスがCSS識別子として有効かを検証
///
/// 先頭は英字または`_`、以降は英数字・`-`・`_`のみ許可します。
fn validate_class_prefix(prefix: &str) -> Result<(), XlsxToCssError> {
    let mut chars = prefix.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        }
        None => false,
    };

    if !valid {
        return Err(XlsxToCssError::Config(format!(
            "Invalid CSS class prefix: '{}'",
            prefix
        )));
    }
    Ok(())
}

/// 変換結果
///
/// セルごとのマッチ情報、セルに適用するCSSクラス、および生成された
/// スタイルシートを保持します。`serde::Serialize`を実装しているため、
/// そのままJSONとして出力できます。
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    /// `"{シート名}!{A1形式セル}"` -> マッチしたルールの一覧
    ///
    /// マッチしたセルのみがキーとして現れます。同一セルの複数マッチは
    /// すべて保持されます。
    pub matches: HashMap<String, Vec<MatchedRule>>,

    /// `"{シート名}!{A1形式セル}"` -> 適用するCSSクラス名のセット
    ///
    /// 優先度順にルールを適用し、`stopIfTrue`で打ち切った結果です。
    pub cell_classes: HashMap<String, BTreeSet<String>>,

    /// 生成されたスタイルシート（ルールを空行区切りで結合）
    pub stylesheet: String,
}

/// 変換処理のファサード
///
/// XLSXファイルの条件付き書式を評価し、CSSクラスとスタイルシートに
/// 変換するためのメインエントリーポイントです。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsx2css::ConverterBuilder;
/// use std::fs::File;
///
/// # fn main() -> Result<(), xlsx2css::XlsxToCssError> {
/// let converter = ConverterBuilder::new().build()?;
/// let input = File::open("example.xlsx")?;
/// let result = converter.convert(input)?;
/// println!("{}", result.stylesheet);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Converter {
    /// 変換設定
    config: ConversionConfig,
}

impl Converter {
    pub(crate) fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    /// XLSXファイルの条件付き書式をCSSに変換
    ///
    /// # 引数
    ///
    /// * `input` - XLSXファイルを読み込むためのリーダー（Read + Seekトレイトを実装）
    ///
    /// # 戻り値
    ///
    /// * `Ok(ConversionResult)` - 変換に成功した場合
    /// * `Err(XlsxToCssError)` - エラーが発生した場合
    ///
    /// # 処理フロー
    ///
    /// 1. WorkbookParserの初期化（セキュリティ検証を含む）
    /// 2. シート選択
    /// 3. テーマカラーの解決とCSSジェネレータの構築
    /// 4. 各シートの条件付き書式を評価
    /// 5. マッチしたセルへ優先度順にCSSクラスを適用
    pub fn convert<R: Read + Seek>(&self, input: R) -> Result<ConversionResult, XlsxToCssError> {
        // 1. ワークブックとメタデータを開く
        let mut parser = WorkbookParser::open(input)?;

        // 2. シート選択
        let sheet_names = select_sheets(&parser.sheet_names(), &self.config.sheet_selector)?;

        // 3. テーマカラーを解決し、CSSジェネレータを構築
        let theme = parser.metadata().theme_colors(self.config.strict)?;
        let css_builder = CssBuilder::new(
            ColorResolver::new(theme),
            self.config.important,
            self.config.strict,
        );
        let mut generator = CssClassGenerator::new(css_builder, &self.config.class_prefix);

        let mut matches: HashMap<String, Vec<MatchedRule>> = HashMap::new();
        let mut cell_classes: HashMap<String, BTreeSet<String>> = HashMap::new();

        // 4. 各シートの条件付き書式を評価
        for sheet_name in &sheet_names {
            let sheet = parser.sheet_data(sheet_name)?;
            let sheet_matches = process_conditional_formatting(&sheet, self.config.fail_ok)?;

            // 5. 優先度順にCSSクラスを適用
            for (cell_key, mut cell_matches) in sheet_matches {
                cell_matches.sort_by_key(|m| m.priority);

                let mut classes = BTreeSet::new();
                for matched in &cell_matches {
                    let style = parser.metadata().differential_style(matched.dxf_id);
                    if let Some(style) = style {
                        if let Some(class) = generator.class_for(matched.dxf_id, style)? {
                            classes.insert(class);
                        }
                    }
                    if matched.stop_if_true {
                        break;
                    }
                }

                if !classes.is_empty() {
                    cell_classes.insert(cell_key.clone(), classes);
                }
                matches.insert(cell_key, cell_matches);
            }
        }

        Ok(ConversionResult {
            matches,
            cell_classes,
            stylesheet: generator.registry().stylesheet(),
        })
    }
}

/// シート選択方式に基づいてシートを選択
///
/// # 戻り値
///
/// * `Ok(Vec<String>)` - 選択されたシート名のリスト
/// * `Err(XlsxToCssError::Config)` - シートが見つからない、または
///   インデックスが範囲外の場合
fn select_sheets(
    all_sheet_names: &[String],
    selector: &SheetSelector,
) -> Result<Vec<String>, XlsxToCssError> {
    match selector {
        SheetSelector::All => Ok(all_sheet_names.to_vec()),

        SheetSelector::Index(index) => {
            if *index >= all_sheet_names.len() {
                return Err(XlsxToCssError::Config(format!(
                    "Sheet index {} is out of range (total: {})",
                    index,
                    all_sheet_names.len()
                )));
            }
            Ok(vec![all_sheet_names[*index].clone()])
        }

        SheetSelector::Name(name) => {
            if !all_sheet_names.contains(name) {
                return Err(XlsxToCssError::Config(format!("Sheet '{}' not found", name)));
            }
            Ok(vec![name.clone()])
        }

        SheetSelector::Indices(indices) => {
            let mut result = Vec::new();
            for &index in indices {
                if index >= all_sheet_names.len() {
                    return Err(XlsxToCssError::Config(format!(
                        "Sheet index {} is out of range (total: {})",
                        index,
                        all_sheet_names.len()
                    )));
                }
                result.push(all_sheet_names[index].clone());
            }
            Ok(result)
        }

        SheetSelector::Names(names) => {
            for name in names {
                if !all_sheet_names.contains(name) {
                    return Err(XlsxToCssError::Config(format!("Sheet '{}' not found", name)));
                }
            }
            Ok(names.clone())
        }
    }
}
