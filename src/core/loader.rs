use crate::core::{CapacityRecord, Result};
use crate::utils::error::KepcoError;
use calamine::{Data, Reader};
use serde_json::{Map, Value};
use std::path::Path;

/// 欄位別名：(API 原始鍵, 可接受的欄位名稱)
/// 韓電ON 下載的檔案欄位名稱不固定，API camelCase、韓文標題、snake_case 都要能對應
const COLUMN_ALIASES: &[(&str, &[&str])] = &[
    ("substCd", &["substCd", "변전소코드", "변전소 코드", "subst_cd"]),
    ("substNm", &["substNm", "변전소명", "변전소 명", "subst_nm"]),
    ("jsSubstPwr", &["jsSubstPwr", "변전소용량", "변전소 용량", "변전소용량(kW)", "js_subst_pwr"]),
    ("substPwr", &["substPwr", "변전소누적연계", "변전소 누적연계용량", "변전소누적연계(kW)", "subst_pwr"]),
    ("mtrNo", &["mtrNo", "변압기번호", "변압기 번호", "MTR번호", "mtr_no"]),
    ("jsMtrPwr", &["jsMtrPwr", "변압기용량", "변압기 용량", "변압기용량(kW)", "js_mtr_pwr"]),
    ("mtrPwr", &["mtrPwr", "변압기누적연계", "변압기 누적연계용량", "변압기누적연계(kW)", "mtr_pwr"]),
    ("dlCd", &["dlCd", "DL코드", "DL 코드", "dl_cd"]),
    ("dlNm", &["dlNm", "DL명", "DL 명", "dl_nm", "배전선로명"]),
    ("jsDlPwr", &["jsDlPwr", "DL용량", "DL 용량", "DL용량(kW)", "js_dl_pwr"]),
    ("dlPwr", &["dlPwr", "DL누적연계", "DL 누적연계용량", "DL누적연계(kW)", "dl_pwr"]),
    ("vol1", &["vol1", "변전소여유", "변전소 여유용량", "변전소여유(kW)", "변전소여유용량(kW)"]),
    ("vol2", &["vol2", "변압기여유", "변압기 여유용량", "변압기여유(kW)", "변압기여유용량(kW)"]),
    ("vol3", &["vol3", "DL여유", "DL 여유용량", "DL여유(kW)", "DL여유용량(kW)"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Csv,
    Json,
    Excel,
}

impl FileFormat {
    fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            Some("xlsx") | Some("xls") => Ok(Self::Excel),
            _ => Err(KepcoError::DataLoad {
                message: format!("지원하지 않는 파일 형식입니다: {}", filename),
            }),
        }
    }
}

fn canonical_key(column: &str) -> Option<&'static str> {
    let column = column.trim();
    COLUMN_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&column))
        .map(|(key, _)| *key)
}

fn parse_record(object: Map<String, Value>, row_label: &str) -> Option<CapacityRecord> {
    serde_json::from_value(Value::Object(object))
        .map_err(|e| tracing::warn!("⚠️ Skipping unparsable record ({}): {}", row_label, e))
        .ok()
}

pub fn load_records_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<CapacityRecord>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| KepcoError::DataLoad {
        message: format!("cannot read '{}': {}", path.display(), e),
    })?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    load_records_from_bytes(&bytes, filename)
}

pub fn load_records_from_bytes(bytes: &[u8], filename: &str) -> Result<Vec<CapacityRecord>> {
    let records = match FileFormat::from_filename(filename)? {
        FileFormat::Csv => load_csv(bytes)?,
        FileFormat::Json => load_json(bytes)?,
        FileFormat::Excel => load_excel(bytes)?,
    };
    tracing::info!("📂 Loaded {} records from {}", records.len(), filename);
    Ok(records)
}

fn load_csv(bytes: &[u8]) -> Result<Vec<CapacityRecord>> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let column_map: Vec<(usize, &'static str)> = headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| canonical_key(header).map(|key| (index, key)))
        .collect();

    if column_map.is_empty() {
        return Err(KepcoError::DataLoad {
            message: format!(
                "no recognizable capacity columns in header: {}",
                headers.iter().collect::<Vec<_>>().join(", ")
            ),
        });
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("⚠️ Skipping malformed CSV row {}: {}", line + 2, e);
                continue;
            }
        };

        let object: Map<String, Value> = column_map
            .iter()
            .filter_map(|(index, key)| {
                row.get(*index)
                    .map(|value| (key.to_string(), Value::String(value.to_string())))
            })
            .collect();

        if let Some(record) = parse_record(object, &format!("row {}", line + 2)) {
            records.push(record);
        }
    }

    Ok(records)
}

/// 只讀第一個工作表，第一列為標題
fn load_excel(bytes: &[u8]) -> Result<Vec<CapacityRecord>> {
    let mut workbook =
        calamine::open_workbook_auto_from_rs(std::io::Cursor::new(bytes)).map_err(|e| {
            KepcoError::DataLoad {
                message: format!("invalid Excel file: {}", e),
            }
        })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| KepcoError::DataLoad {
            message: "Excel file has no worksheets".to_string(),
        })?
        .map_err(|e| KepcoError::DataLoad {
            message: format!("cannot read first worksheet: {}", e),
        })?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(cell_text).collect())
        .unwrap_or_default();
    let column_map: Vec<(usize, &'static str)> = headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| canonical_key(header).map(|key| (index, key)))
        .collect();

    if column_map.is_empty() {
        return Err(KepcoError::DataLoad {
            message: format!("no recognizable capacity columns in header: {}", headers.join(", ")),
        });
    }

    Ok(rows
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .filter_map(|(line, row)| {
            let object: Map<String, Value> = column_map
                .iter()
                .filter_map(|(index, key)| {
                    row.get(*index)
                        .map(|cell| (key.to_string(), Value::String(cell_text(cell))))
                })
                .collect();
            parse_record(object, &format!("row {}", line + 2))
        })
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.trim().to_string(),
        // 數字儲存格常以浮點數存放整數
        Data::Float(value) if value.fract() == 0.0 => format!("{:.0}", value),
        Data::Int(value) => value.to_string(),
        other => other.to_string(),
    }
}

fn load_json(bytes: &[u8]) -> Result<Vec<CapacityRecord>> {
    let payload: Value = serde_json::from_slice(bytes).map_err(|e| KepcoError::DataLoad {
        message: format!("invalid JSON file: {}", e),
    })?;

    let items = match payload {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(KepcoError::DataLoad {
                message: format!("expected an array or object, got {}", other),
            })
        }
    };

    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Value::Object(object) => {
                let remapped: Map<String, Value> = object
                    .into_iter()
                    .map(|(key, value)| match canonical_key(&key) {
                        Some(canonical) => (canonical.to_string(), value),
                        None => (key, value),
                    })
                    .collect();
                parse_record(remapped, &format!("item {}", index))
            }
            _ => {
                tracing::warn!("⚠️ Skipping non-object JSON item {}", index);
                None
            }
        })
        .collect())
}
