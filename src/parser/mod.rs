//! Parser Module
//!
//! calamineとXML直接解析を組み合わせたExcelファイル解析の実装。
//! セル値はcalamine、条件付き書式・dxf・テーマはXMLから抽出します。

mod metadata;
mod workbook;

pub(crate) use metadata::XlsxMetadataParser;
pub(crate) use workbook::WorkbookParser;
