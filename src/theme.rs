//! Theme Module
//!
//! ワークブックテーマ（drawingML）からテーマカラーマップを抽出するモジュール。
//! テーマXMLのスロット順（dk1, lt1, dk2, lt2, ...）と、色参照が使用する
//! インデックス順（lt1, dk1, lt2, dk2, ...）のスワップを吸収します。

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::XlsxToCssError;

/// テーマカラーマップのスロット名（インデックス順）
///
/// レガシーなExcelテーマスロットの順序です。スロット0/1と2/3は
/// テーマXML内の出現順（dk1, lt1, dk2, lt2）に対してスワップされています。
pub const THEME_SLOTS: [&str; 10] = [
    "lt1", "dk1", "lt2", "dk2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
];

/// テーマカラーマップ
///
/// 常に10スロットを保持します。strictモードで構築した場合はすべての
/// スロットが解決済みであることが保証されます。非strictモードでは
/// 未解決のスロットが存在しえますが、スロット数の不変条件（10）は
/// 維持されます。
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeColors {
    slots: Vec<Option<String>>,
}

impl ThemeColors {
    /// スロットのリストからテーマカラーマップを生成
    ///
    /// 10スロットに満たない入力は未解決スロットで埋められ、
    /// 超過分は無視されます。
    pub fn from_slots(slots: Vec<Option<String>>) -> Self {
        let mut slots = slots;
        slots.resize(THEME_SLOTS.len(), None);
        slots.truncate(THEME_SLOTS.len());
        Self { slots }
    }

    /// フォールバックのテーマカラーマップを生成
    ///
    /// テーマが取得できない場合に使用される最小限のマップです。
    /// lt1（ウィンドウ背景）とdk1（ウィンドウ前景）のみ解決されます。
    pub fn fallback() -> Self {
        let mut slots = vec![None; THEME_SLOTS.len()];
        slots[0] = Some("FFFFFF".to_string());
        slots[1] = Some("000000".to_string());
        Self { slots }
    }

    /// テーマXML（xl/theme/theme1.xml）からテーマカラーマップを解析
    ///
    /// 最初の`clrScheme`要素から各スロットの色を抽出します。`sysClr`
    /// ノードの`val`が`window`系の場合は`lastClr`属性を使用します。
    ///
    /// # 引数
    ///
    /// * `xml` - テーマXMLのバイト列
    /// * `strict` - trueの場合、構造エラーやスロット欠落を
    ///   `XlsxToCssError::ThemeColors`として返す。falseの場合、
    ///   解決できたスロットのみを持つベストエフォートのマップを返す。
    pub fn from_theme_xml(xml: &[u8], strict: bool) -> Result<Self, XlsxToCssError> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut seen_theme_elements = false;
        let mut seen_clr_scheme = false;
        let mut in_clr_scheme = false;
        let mut current_slot: Option<usize> = None;
        let mut found: Vec<Option<String>> = vec![None; THEME_SLOTS.len()];

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let local = e.local_name();
                    match local.as_ref() {
                        b"themeElements" => {
                            seen_theme_elements = true;
                        }
                        b"clrScheme" if !seen_clr_scheme => {
                            seen_clr_scheme = true;
                            in_clr_scheme = true;
                        }
                        name if in_clr_scheme && current_slot.is_none() => {
                            current_slot = THEME_SLOTS
                                .iter()
                                .position(|slot| slot.as_bytes() == name);
                        }
                        // 展開形の色ノード（<a:srgbClr val="...">...</a:srgbClr>）は
                        // Start+Endとして報告されるため、Emptyと同様に属性を読む
                        _ => {
                            if let Some(slot) = current_slot {
                                Self::capture_slot_color(&e, slot, &mut found, strict)?;
                            }
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    // <a:srgbClr val="4F81BD"/> や <a:sysClr val="window" lastClr="FFFFFF"/>
                    if let Some(slot) = current_slot {
                        Self::capture_slot_color(&e, slot, &mut found, strict)?;
                    }
                }
                Ok(Event::End(e)) => {
                    let local = e.local_name();
                    match local.as_ref() {
                        b"clrScheme" => {
                            in_clr_scheme = false;
                        }
                        name => {
                            if let Some(slot) = current_slot {
                                if THEME_SLOTS[slot].as_bytes() == name {
                                    if strict && found[slot].is_none() {
                                        return Err(XlsxToCssError::ThemeColors(format!(
                                            "Color node '{}' does not contain values.",
                                            THEME_SLOTS[slot]
                                        )));
                                    }
                                    current_slot = None;
                                }
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    if strict {
                        return Err(XlsxToCssError::ThemeColors(format!(
                            "Unable to parse workbook theme colors: {}",
                            e
                        )));
                    }
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        if strict {
            if !seen_theme_elements {
                return Err(XlsxToCssError::ThemeColors(
                    "Missing 'themeElements' node in workbook theme.".to_string(),
                ));
            }
            if !seen_clr_scheme {
                return Err(XlsxToCssError::ThemeColors(
                    "Missing 'clrScheme' node in workbook theme.".to_string(),
                ));
            }
            for (slot, value) in found.iter().enumerate() {
                if value.is_none() {
                    return Err(XlsxToCssError::ThemeColors(format!(
                        "Missing '{}' color node in workbook theme.",
                        THEME_SLOTS[slot]
                    )));
                }
            }
        }

        Ok(Self::from_slots(found))
    }

    /// スロット直下の色ノードから値を取り込む
    ///
    /// スロットごとに最初の値のみを採用します。値を持たないノードは
    /// strictモードではエラー、非strictモードでは無視されます。
    fn capture_slot_color(
        e: &quick_xml::events::BytesStart<'_>,
        slot: usize,
        found: &mut [Option<String>],
        strict: bool,
    ) -> Result<(), XlsxToCssError> {
        if found[slot].is_some() {
            return Ok(());
        }
        match Self::color_value_from_node(e, strict)? {
            Some(value) => found[slot] = Some(value),
            None => {
                if strict {
                    return Err(XlsxToCssError::ThemeColors(format!(
                        "Color node '{}' is missing 'val' attribute.",
                        THEME_SLOTS[slot]
                    )));
                }
            }
        }
        Ok(())
    }

    /// 色ノードの属性から色値を抽出
    ///
    /// `srgbClr`は`val`属性を、`sysClr`は`val`が`window`系のとき
    /// `lastClr`属性を使用します。
    fn color_value_from_node(
        e: &quick_xml::events::BytesStart<'_>,
        strict: bool,
    ) -> Result<Option<String>, XlsxToCssError> {
        let mut val: Option<String> = None;
        let mut last_clr: Option<String> = None;

        for attr in e.attributes() {
            let attr = match attr {
                Ok(attr) => attr,
                Err(err) => {
                    if strict {
                        return Err(XlsxToCssError::ThemeColors(format!(
                            "XML attribute error in workbook theme: {}",
                            err
                        )));
                    }
                    continue;
                }
            };
            match attr.key.as_ref() {
                b"val" => {
                    val = Some(String::from_utf8_lossy(&attr.value).into_owned());
                }
                b"lastClr" => {
                    last_clr = Some(String::from_utf8_lossy(&attr.value).into_owned());
                }
                _ => {}
            }
        }

        match val {
            Some(v) if v.contains("window") => {
                if last_clr.is_none() && strict {
                    return Err(XlsxToCssError::ThemeColors(
                        "System color node is missing 'lastClr' attribute.".to_string(),
                    ));
                }
                Ok(last_clr)
            }
            Some(v) => Ok(Some(v)),
            None => Ok(None),
        }
    }

    /// スロットの色値を取得
    ///
    /// # 戻り値
    ///
    /// * `Some(&str)` - スロットが解決済みの場合（6桁RGB文字列）
    /// * `None` - インデックスが範囲外、またはスロットが未解決の場合
    pub fn get(&self, index: u32) -> Option<&str> {
        self.slots
            .get(index as usize)
            .and_then(|slot| slot.as_deref())
    }

    /// スロット数（常に10）
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// すべてのスロットが解決済みかを判定
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_some())
    }
}
