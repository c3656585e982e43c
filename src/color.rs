//! Color Module
//!
//! インデックスカラー・テーマカラー・直接aRGB値の解決と、
//! CSSカラー表記への変換を提供するモジュール。
//! テーマカラーのtint適用はMS Excelと同じHLSMAX=240ベースの
//! 輝度変換で行います。

use crate::error::XlsxToCssError;
use crate::theme::ThemeColors;

/// RGB各チャンネルの最大値
const RGBMAX: f64 = 255.0;

/// MS ExcelのtintはHLSを240基数で扱う
const HLSMAX: f64 = 240.0;

/// レガシーインデックスパレット（64エントリ）
///
/// インデックス0〜63に対応する6桁RGB値です。インデックス64と65は
/// システムの前景色・背景色として予約されており、パレットには含まれません。
const INDEXED_COLORS: [&str; 64] = [
    "000000", "FFFFFF", "FF0000", "00FF00", "0000FF", "FFFF00", "FF00FF", "00FFFF", // 0-7
    "000000", "FFFFFF", "FF0000", "00FF00", "0000FF", "FFFF00", "FF00FF", "00FFFF", // 8-15
    "800000", "008000", "000080", "808000", "800080", "008080", "C0C0C0", "808080", // 16-23
    "9999FF", "993366", "FFFFCC", "CCFFFF", "660066", "FF8080", "0066CC", "CCCCFF", // 24-31
    "000080", "FF00FF", "FFFF00", "00FFFF", "800080", "800000", "008080", "0000FF", // 32-39
    "00CCFF", "CCFFFF", "CCFFCC", "FFFF99", "99CCFF", "FF99CC", "CC99FF", "FFCC99", // 40-47
    "3366FF", "33CCCC", "99CC00", "FFCC00", "FF9900", "FF6600", "666699", "969696", // 48-55
    "003366", "339966", "003300", "333300", "993300", "993366", "333399", "333333", // 56-63
];

/// システム前景色（"automatic"）のインデックス
const INDEX_SYSTEM_FOREGROUND: u32 = 64;

/// システム背景色のインデックス
const INDEX_SYSTEM_BACKGROUND: u32 = 65;

/// 色参照を表す列挙型
///
/// dxfやテーマに現れる3種類の色指定（インデックス・テーマ・直接RGB）と
/// 自動色を統一的に表現します。
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpec {
    /// レガシーパレットへのインデックス
    Indexed(u32),

    /// テーマスロットへの参照（tintは[-1, 1]）
    Theme { index: u32, tint: Option<f64> },

    /// 6桁または8桁の16進数aRGB文字列
    Rgb(String),

    /// 自動色（デフォルト色を使用する意味であり、エラーではない）
    Auto,
}

/// aRGB文字列を正規化
///
/// 6桁入力には不透明のアルファ（`FF`）を前置し、8桁入力はそのまま
/// 大文字化します。16進数として不正な入力は`None`を返します。
pub fn normalize_argb(value: &str) -> Option<String> {
    let v = value.trim();
    if !(v.len() == 6 || v.len() == 8) || !v.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let upper = v.to_ascii_uppercase();
    if upper.len() == 6 {
        Some(format!("FF{}", upper))
    } else {
        Some(upper)
    }
}

/// aRGB文字列をCSSカラー表記に変換
///
/// * 6桁入力 → `#RRGGBB`
/// * アルファが`00`または`FF`の8桁入力 → `#RRGGBB`
///   （Excelファイル中の`00`アルファは慣習的に不透明を意味します）
/// * それ以外の8桁入力 → `rgba(r, g, b, a)`（aはアルファ/255を
///   [0, 1]にクランプし、小数3桁の固定精度で出力）
///
/// # 戻り値
///
/// * `Some(String)` - 変換に成功した場合
/// * `None` - 16進数として不正な入力の場合
pub fn argb_to_css(argb: &str) -> Option<String> {
    let v = argb.trim();
    if !v.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match v.len() {
        6 => Some(format!("#{}", v.to_ascii_uppercase())),
        8 => {
            let upper = v.to_ascii_uppercase();
            let alpha = u32::from_str_radix(&upper[0..2], 16).ok()?;
            let rgb = &upper[2..];
            if alpha == 0x00 || alpha == 0xFF {
                return Some(format!("#{}", rgb));
            }
            let red = u32::from_str_radix(&rgb[0..2], 16).ok()?;
            let green = u32::from_str_radix(&rgb[2..4], 16).ok()?;
            let blue = u32::from_str_radix(&rgb[4..6], 16).ok()?;
            let a = (alpha as f64 / 255.0).clamp(0.0, 1.0);
            Some(format!("rgba({}, {}, {}, {:.3})", red, green, blue, a))
        }
        _ => None,
    }
}

/// aRGB文字列をHLSMAXベースのHLSに変換（アルファは無視）
fn argb_to_ms_hls(argb: &str) -> Option<(f64, f64, f64)> {
    let v = argb.trim();
    if !(v.len() == 6 || v.len() == 8) || !v.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let rgb = &v[v.len() - 6..];
    let red = u32::from_str_radix(&rgb[0..2], 16).ok()? as f64 / RGBMAX;
    let green = u32::from_str_radix(&rgb[2..4], 16).ok()? as f64 / RGBMAX;
    let blue = u32::from_str_radix(&rgb[4..6], 16).ok()? as f64 / RGBMAX;

    let (h, l, s) = rgb_to_hls(red, green, blue);
    Some(((h * HLSMAX).round(), (l * HLSMAX).round(), (s * HLSMAX).round()))
}

/// HLSMAXベースのHLSを(0, 1)範囲のRGBに変換
fn ms_hls_to_rgb(hue: f64, lightness: f64, saturation: f64) -> (f64, f64, f64) {
    hls_to_rgb(hue / HLSMAX, lightness / HLSMAX, saturation / HLSMAX)
}

/// (0, 1)範囲のRGBを6桁16進数文字列に変換
fn rgb_to_hex(red: f64, green: f64, blue: f64) -> String {
    format!(
        "{:02X}{:02X}{:02X}",
        (red * RGBMAX).round() as u32,
        (green * RGBMAX).round() as u32,
        (blue * RGBMAX).round() as u32,
    )
}

/// HLSMAXベースの輝度にtintを適用
///
/// tintが正の場合は白方向へ、負の場合は黒方向へ輝度を補間します。
fn tint_luminance(tint: f64, lum: f64) -> f64 {
    let tinted = if tint < 0.0 {
        lum * (1.0 + tint)
    } else {
        lum * (1.0 - tint) + (HLSMAX - HLSMAX * (1.0 - tint))
    };
    tinted.round()
}

/// ベースカラーにtintを適用し、8桁aRGB文字列を返す
///
/// 輝度のみを変換するHLSベースの変換であり、スプレッドシートビューアの
/// 描画と一致します（チャンネルごとの単純スケーリングではありません）。
pub(crate) fn apply_tint(base: &str, tint: f64) -> Option<String> {
    let (h, l, s) = argb_to_ms_hls(base)?;
    let (red, green, blue) = ms_hls_to_rgb(h, tint_luminance(tint, l), s);
    normalize_argb(&rgb_to_hex(red, green, blue))
}

/// (0, 1)範囲のRGBをHLSに変換
fn rgb_to_hls(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    let l = (minc + maxc) / 2.0;
    if (maxc - minc).abs() < f64::EPSILON {
        return (0.0, l, 0.0);
    }
    let delta = maxc - minc;
    let s = if l <= 0.5 {
        delta / (maxc + minc)
    } else {
        delta / (2.0 - maxc - minc)
    };
    let rc = (maxc - r) / delta;
    let gc = (maxc - g) / delta;
    let bc = (maxc - b) / delta;
    let h = if (r - maxc).abs() < f64::EPSILON {
        bc - gc
    } else if (g - maxc).abs() < f64::EPSILON {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), l, s)
}

/// HLSを(0, 1)範囲のRGBに変換
fn hls_to_rgb(h: f64, l: f64, s: f64) -> (f64, f64, f64) {
    if s.abs() < f64::EPSILON {
        return (l, l, l);
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    (
        hls_component(m1, m2, h + 1.0 / 3.0),
        hls_component(m1, m2, h),
        hls_component(m1, m2, h - 1.0 / 3.0),
    )
}

fn hls_component(m1: f64, m2: f64, hue: f64) -> f64 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

/// テーマカラーマップに基づく色リゾルバ
///
/// テーマカラーマップを一度だけ解決して保持し、`ColorSpec`を正規化された
/// 8桁aRGB文字列に解決します。グローバル状態は持ちません。
#[derive(Debug, Clone)]
pub struct ColorResolver {
    theme: ThemeColors,
}

impl ColorResolver {
    /// テーマカラーマップからリゾルバを生成
    pub fn new(theme: ThemeColors) -> Self {
        Self { theme }
    }

    /// 色参照を8桁aRGB文字列に解決
    ///
    /// 解決できない参照（自動色、範囲外のインデックスなど）は`None`を
    /// 返します。`None`は「デフォルト色を使用する」ことを意味し、
    /// エラーではありません。
    pub fn resolve(&self, spec: &ColorSpec) -> Option<String> {
        match spec {
            ColorSpec::Auto => None,
            ColorSpec::Rgb(value) => normalize_argb(value),
            ColorSpec::Indexed(index) => match *index {
                INDEX_SYSTEM_FOREGROUND => None,
                INDEX_SYSTEM_BACKGROUND => self.theme.get(0).and_then(normalize_argb),
                i if (i as usize) < INDEXED_COLORS.len() => {
                    normalize_argb(INDEXED_COLORS[i as usize])
                }
                _ => None,
            },
            ColorSpec::Theme { index, tint } => {
                let base = self.theme.get(*index)?;
                match tint {
                    Some(t) if *t != 0.0 => apply_tint(base, *t),
                    _ => normalize_argb(base),
                }
            }
        }
    }

    /// 色参照を解決（strictモード）
    ///
    /// `resolve`と同じ動作ですが、範囲外のテーマ・インデックス参照を
    /// エラーとして返します。インデックス64（自動色）は引き続き
    /// `Ok(None)`です。
    pub fn resolve_strict(&self, spec: &ColorSpec) -> Result<Option<String>, XlsxToCssError> {
        match spec {
            ColorSpec::Indexed(index)
                if *index != INDEX_SYSTEM_FOREGROUND
                    && *index != INDEX_SYSTEM_BACKGROUND
                    && (*index as usize) >= INDEXED_COLORS.len() =>
            {
                Err(XlsxToCssError::ThemeColors(format!(
                    "Indexed color out of range: {}",
                    index
                )))
            }
            ColorSpec::Theme { index, .. } if self.theme.get(*index).is_none() => {
                Err(XlsxToCssError::ThemeColors(format!(
                    "Theme color index out of range: {}",
                    index
                )))
            }
            _ => Ok(self.resolve(spec)),
        }
    }
}
