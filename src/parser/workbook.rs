//! Parser Module
//!
//! calamineを使用したExcelファイル解析の基礎実装。
//! セル値の抽出はcalamineに委ね、条件付き書式などのメタデータは
//! `XlsxMetadataParser`から統合します。

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets, Xlsx};
use std::io::{Cursor, Read, Seek};

use crate::error::XlsxToCssError;
use crate::parser::XlsxMetadataParser;
use crate::security::SecurityConfig;
use crate::types::{CellCoord, CellValue, SheetData};

/// ワークブックパーサー
///
/// calamineのラッパーとして、ワークブックレベルの操作を提供します。
/// 同じ入力バッファからXMLメタデータも解析します。
pub(crate) struct WorkbookParser {
    /// calamineのワークブック（XLSX形式のみサポート）
    workbook: Xlsx<Cursor<Vec<u8>>>,
    /// XMLメタデータパーサー
    metadata: XlsxMetadataParser,
}

impl WorkbookParser {
    /// ワークブックを開き、XMLメタデータも解析する
    ///
    /// # 引数
    ///
    /// * `reader` - Excelファイルを読み込むためのリーダー（Read + Seekトレイトを実装）
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookParser)` - ワークブックとメタデータの読み込みに成功した場合
    /// * `Err(XlsxToCssError)` - エラーが発生した場合
    pub fn open<R: Read + Seek>(mut reader: R) -> Result<Self, XlsxToCssError> {
        // セキュリティチェック: 入力ファイルサイズの上限
        let security_config = SecurityConfig::default();

        // ファイル全体をメモリに読み込む（calamineとメタデータ解析で共有）
        let mut buffer = Vec::new();
        let bytes_read = reader.read_to_end(&mut buffer)?;

        if bytes_read as u64 > security_config.max_input_file_size {
            return Err(XlsxToCssError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                bytes_read, security_config.max_input_file_size
            )));
        }

        // calamineでワークブックを開く
        let sheets = open_workbook_auto_from_rs(Cursor::new(buffer.clone()))
            .map_err(XlsxToCssError::Parse)?;
        let workbook = match sheets {
            Sheets::Xlsx(workbook) => workbook,
            _ => {
                return Err(XlsxToCssError::Config(
                    "Only XLSX format is supported".to_string(),
                ))
            }
        };

        // XMLメタデータを解析
        let metadata = XlsxMetadataParser::new(Cursor::new(buffer))?;

        Ok(WorkbookParser { workbook, metadata })
    }

    /// すべてのシート名を取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names().to_vec()
    }

    /// メタデータを取得
    pub fn metadata(&self) -> &XlsxMetadataParser {
        &self.metadata
    }

    /// シートのセル値と条件付き書式を抽出
    ///
    /// # 引数
    ///
    /// * `sheet_name` - 抽出するシート名
    ///
    /// # 戻り値
    ///
    /// * `Ok(SheetData)` - セル値のスパースマップと条件付き書式ブロック
    /// * `Err(XlsxToCssError)` - シートが存在しない、または解析エラーの場合
    pub fn sheet_data(&mut self, sheet_name: &str) -> Result<SheetData, XlsxToCssError> {
        let range = self
            .workbook
            .worksheet_range(sheet_name)
            .map_err(|e| XlsxToCssError::Parse(e.into()))?;

        let mut sheet = SheetData::new(sheet_name);

        // used_cells()の座標は範囲の左上からの相対位置
        if let Some((start_row, start_col)) = range.start() {
            for (row, col, cell) in range.used_cells() {
                let coord = CellCoord::new(start_row + row as u32, start_col + col as u32);
                sheet.set_value(coord, Self::convert_value(cell));
            }
        }

        sheet.conditional_formats = self.metadata.conditional_formats(sheet_name).to_vec();

        Ok(sheet)
    }

    /// calamineのセルデータを内部のセル値に変換
    fn convert_value(cell: &Data) -> CellValue {
        match cell {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::String(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            // シリアル値として比較できるよう数値に落とす
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
            Data::Error(e) => CellValue::Error(format!("{:?}", e)),
            Data::Empty => CellValue::Empty,
        }
    }
}

// テストは統合テスト（tests/）で実装します。
// 実際のXLSXファイルが必要なため、単体テストではなく統合テストとして実装します。
