//! CSS Module
//!
//! 差分スタイル（dxf）をCSS宣言に変換し、同一宣言セットを単一のCSS
//! クラスに重複排除するモジュール。
//!
//! 1つのdxfは1つのCSSクラスに変換されます（フォント・塗りつぶし・罫線・
//! 配置を属性グループごとに分割しません）。クラス名は登録順の連番
//! （`{prefix}-0`、`{prefix}-1`、...）で決定的に採番されます。

use std::collections::{BTreeSet, HashMap};

use crate::color::{argb_to_css, ColorResolver, ColorSpec};
use crate::error::XlsxToCssError;
use crate::types::{BorderEdge, DifferentialStyle, DxfAlignment, DxfFill, DxfFont};

/// 罫線スタイルをCSSの線幅・線種に対応付け
///
/// `none`はCSSに出力しないため`None`です。未知のスタイルは最も近い
/// `1px solid`で近似します。
fn border_width_and_style(style: &str) -> Option<(&'static str, &'static str)> {
    match style {
        "none" => None,
        "dashDot" | "dashDotDot" | "dashed" | "slantDashDot" => Some(("1px", "dashed")),
        "dotted" => Some(("1px", "dotted")),
        "double" => Some(("3px", "double")),
        "hair" | "thin" => Some(("1px", "solid")),
        "medium" | "mediumDashDot" | "mediumDashDotDot" => Some(("2px", "solid")),
        "mediumDashed" => Some(("2px", "dashed")),
        "thick" => Some(("3px", "solid")),
        _ => Some(("1px", "solid")),
    }
}

/// 水平配置をCSSのtext-align値に対応付け
fn horizontal_alignment(value: &str) -> Option<&'static str> {
    match value {
        "left" | "fill" => Some("left"),
        "center" | "centerContinuous" => Some("center"),
        "right" => Some("right"),
        "justify" | "distributed" => Some("justify"),
        _ => None,
    }
}

/// 垂直配置をCSSのvertical-align値に対応付け
fn vertical_alignment(value: &str) -> Option<&'static str> {
    match value {
        "top" => Some("top"),
        "center" => Some("middle"),
        "bottom" => Some("bottom"),
        "justify" | "distributed" => Some("middle"),
        _ => None,
    }
}

/// 差分スタイルからCSS宣言セットを構築するビルダ
///
/// 色参照の解決は保持する`ColorResolver`に委ねます。宣言は
/// `BTreeSet`に収集されるため、出力順序は常に決定的です。
#[derive(Debug, Clone)]
pub struct CssBuilder {
    resolver: ColorResolver,
    important: bool,
    strict: bool,
}

impl CssBuilder {
    /// 新しいビルダを生成
    ///
    /// `important`がtrueの場合、すべての宣言に` !important`を付与します。
    /// `strict`がtrueの場合、範囲外の色インデックスや未解決テーマスロット
    /// への参照をエラーとして返します（falseの場合は宣言を省略）。
    pub fn new(resolver: ColorResolver, important: bool, strict: bool) -> Self {
        Self {
            resolver,
            important,
            strict,
        }
    }

    /// 差分スタイルをCSS宣言セットに変換
    ///
    /// 変換できる属性を持たないスタイルは空のセットになります。
    /// 宣言は末尾のセミコロンを含みません。
    pub fn dxf_declarations(
        &self,
        style: &DifferentialStyle,
    ) -> Result<BTreeSet<String>, XlsxToCssError> {
        let mut declarations = BTreeSet::new();

        if let Some(font) = &style.font {
            self.font_declarations(font, &mut declarations)?;
        }
        if let Some(fill) = &style.fill {
            self.fill_declarations(fill, &mut declarations)?;
        }
        if let Some(border) = &style.border {
            self.edge_declaration("top", border.top.as_ref(), &mut declarations)?;
            self.edge_declaration("right", border.right.as_ref(), &mut declarations)?;
            self.edge_declaration("bottom", border.bottom.as_ref(), &mut declarations)?;
            self.edge_declaration("left", border.left.as_ref(), &mut declarations)?;
        }
        if let Some(alignment) = &style.alignment {
            self.alignment_declarations(alignment, &mut declarations);
        }

        Ok(declarations)
    }

    fn push(&self, declarations: &mut BTreeSet<String>, declaration: String) {
        if self.important {
            declarations.insert(format!("{} !important", declaration));
        } else {
            declarations.insert(declaration);
        }
    }

    /// 色参照をCSS色文字列に解決
    ///
    /// strictモードでは解決失敗（範囲外インデックスなど）をエラーとして
    /// 返し、非strictモードでは`None`（宣言省略）に落とします。
    fn css_color(&self, spec: &ColorSpec) -> Result<Option<String>, XlsxToCssError> {
        let argb = if self.strict {
            self.resolver.resolve_strict(spec)?
        } else {
            self.resolver.resolve(spec)
        };
        Ok(argb.and_then(|argb| argb_to_css(&argb)))
    }

    fn opt_css_color(&self, spec: Option<&ColorSpec>) -> Result<Option<String>, XlsxToCssError> {
        match spec {
            Some(spec) => self.css_color(spec),
            None => Ok(None),
        }
    }

    fn font_declarations(
        &self,
        font: &DxfFont,
        declarations: &mut BTreeSet<String>,
    ) -> Result<(), XlsxToCssError> {
        if let Some(size) = font.size {
            self.push(declarations, format!("font-size: {}pt", size));
        }
        if let Some(color) = self.opt_css_color(font.color.as_ref())? {
            self.push(declarations, format!("color: {}", color));
        }
        if font.bold {
            self.push(declarations, "font-weight: bold".to_string());
        }
        if font.italic {
            self.push(declarations, "font-style: italic".to_string());
        }
        if font.underline {
            self.push(declarations, "text-decoration: underline".to_string());
        }
        Ok(())
    }

    fn fill_declarations(
        &self,
        fill: &DxfFill,
        declarations: &mut BTreeSet<String>,
    ) -> Result<(), XlsxToCssError> {
        match fill.pattern_type.as_deref() {
            Some("none") => {
                self.push(declarations, "background-color: transparent".to_string());
            }
            // patternType省略時はソリッド扱い。その他のパターンは
            // セル背景を前景色で近似する
            _ => {
                let color = match self.opt_css_color(fill.fg_color.as_ref())? {
                    Some(color) => Some(color),
                    None => self.opt_css_color(fill.bg_color.as_ref())?,
                };
                if let Some(color) = color {
                    self.push(declarations, format!("background-color: {}", color));
                }
            }
        }
        Ok(())
    }

    fn edge_declaration(
        &self,
        side: &str,
        edge: Option<&BorderEdge>,
        declarations: &mut BTreeSet<String>,
    ) -> Result<(), XlsxToCssError> {
        let edge = match edge {
            Some(edge) => edge,
            None => return Ok(()),
        };
        let style = match edge.style.as_deref() {
            Some(style) => style,
            None => return Ok(()),
        };
        let (width, line) = match border_width_and_style(style) {
            Some(pair) => pair,
            None => return Ok(()),
        };

        let declaration = match self.opt_css_color(edge.color.as_ref())? {
            Some(color) => format!("border-{}: {} {} {}", side, width, line, color),
            None => format!("border-{}: {} {}", side, width, line),
        };
        self.push(declarations, declaration);
        Ok(())
    }

    fn alignment_declarations(
        &self,
        alignment: &DxfAlignment,
        declarations: &mut BTreeSet<String>,
    ) {
        if let Some(value) = alignment
            .horizontal
            .as_deref()
            .and_then(horizontal_alignment)
        {
            self.push(declarations, format!("text-align: {}", value));
        }
        if let Some(value) = alignment.vertical.as_deref().and_then(vertical_alignment) {
            self.push(declarations, format!("vertical-align: {}", value));
        }
    }
}

/// CSSルールのレジストリ
///
/// 同一の宣言セットを持つスタイルを単一のクラスに重複排除します。
/// フィンガープリントはソート済み宣言の結合文字列で、登録順に
/// `{prefix}-{n}`（nは0始まり）のクラス名が割り当てられます。
#[derive(Debug, Clone)]
pub struct CssRulesRegistry {
    prefix: String,
    class_by_fingerprint: HashMap<String, String>,
    rules: Vec<String>,
}

impl CssRulesRegistry {
    /// 指定されたクラスプレフィックスでレジストリを生成
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            class_by_fingerprint: HashMap::new(),
            rules: Vec::new(),
        }
    }

    /// 宣言セットを登録し、クラス名を返す
    ///
    /// 既に同一の宣言セットが登録されている場合は既存のクラス名を
    /// 返します。空の宣言セットは登録できません（`None`）。
    pub fn register(&mut self, declarations: &BTreeSet<String>) -> Option<String> {
        if declarations.is_empty() {
            return None;
        }

        let fingerprint = declarations
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        if let Some(class) = self.class_by_fingerprint.get(&fingerprint) {
            return Some(class.clone());
        }

        let class = format!("{}-{}", self.prefix, self.rules.len());
        let body: Vec<String> = declarations
            .iter()
            .map(|declaration| format!("\t{};", declaration))
            .collect();
        self.rules
            .push(format!(".{} {{\n{}\n}}", class, body.join("\n")));
        self.class_by_fingerprint.insert(fingerprint, class.clone());
        Some(class)
    }

    /// 登録済みのCSSルールを登録順に取得
    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// 登録済みのルール数
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// ルールが1つも登録されていないかを判定
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// すべてのルールを結合したスタイルシート文字列を生成
    pub fn stylesheet(&self) -> String {
        self.rules.join("\n\n")
    }
}

/// 差分スタイルをCSSクラスに変換するジェネレータ
///
/// `CssBuilder`と`CssRulesRegistry`を束ね、dxfインデックスごとの
/// クラス解決をキャッシュします。
#[derive(Debug)]
pub struct CssClassGenerator {
    builder: CssBuilder,
    registry: CssRulesRegistry,
    class_by_dxf: HashMap<u32, Option<String>>,
}

impl CssClassGenerator {
    /// 新しいジェネレータを生成
    pub fn new(builder: CssBuilder, prefix: &str) -> Self {
        Self {
            builder,
            registry: CssRulesRegistry::new(prefix),
            class_by_dxf: HashMap::new(),
        }
    }

    /// 差分スタイルのCSSクラス名を解決
    ///
    /// 同じ`dxf_id`に対する再解決はキャッシュから返されます。
    /// CSSに変換できる属性を持たないスタイルは`None`です。
    pub fn class_for(
        &mut self,
        dxf_id: u32,
        style: &DifferentialStyle,
    ) -> Result<Option<String>, XlsxToCssError> {
        if let Some(cached) = self.class_by_dxf.get(&dxf_id) {
            return Ok(cached.clone());
        }

        let declarations = self.builder.dxf_declarations(style)?;
        let class = self.registry.register(&declarations);
        self.class_by_dxf.insert(dxf_id, class.clone());
        Ok(class)
    }

    /// 内部レジストリへの参照を取得
    pub fn registry(&self) -> &CssRulesRegistry {
        &self.registry
    }
}
