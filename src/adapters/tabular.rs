use crate::domain::model::{Table, TableFormat};
use crate::utils::error::{BotError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Cursor;

/// 輸出用的儲存格，數字保持數字型別寫入 xlsx
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

pub fn read_table(bytes: &[u8], format: TableFormat) -> Result<Table> {
    match format {
        TableFormat::Xlsx | TableFormat::Xls => read_workbook(bytes),
        TableFormat::Csv => read_csv(bytes),
    }
}

pub fn write_sheet(sheet: &Sheet, format: TableFormat) -> Result<Vec<u8>> {
    match format.output_format() {
        TableFormat::Csv => write_csv(sheet),
        _ => write_xlsx(sheet),
    }
}

fn read_workbook(bytes: &[u8]) -> Result<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| BotError::validation("the workbook has no worksheets"))??;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(first) => first.iter().map(cell_to_string).collect(),
        None => return Ok(Table::default()),
    };
    let rows = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok(Table { headers, rows })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        // 整數值的浮點數（例如郵遞區號）不要帶 ".0"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn read_csv(bytes: &[u8]) -> Result<Table> {
    let data = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(sniff_delimiter(data))
        .from_reader(data);

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    Ok(Table { headers, rows })
}

/// Excel 在俄語環境匯出的 CSV 常用分號分隔
fn sniff_delimiter(data: &[u8]) -> u8 {
    let first_line = data.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn write_csv(sheet: &Sheet) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        writer.write_record(row.iter().map(Cell::as_text))?;
    }
    writer
        .into_inner()
        .map_err(|e| BotError::IoError(e.into_error()))
}

fn write_xlsx(sheet: &Sheet) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    if !sheet.name.is_empty() {
        worksheet.set_name(&sheet.name)?;
    }

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
    }

    for (index, row) in sheet.rows.iter().enumerate() {
        let row_number = (index + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(text) => {
                    worksheet.write_string(row_number, col as u16, text)?;
                }
                Cell::Number(value) => {
                    worksheet.write_number(row_number, col as u16, *value)?;
                }
                Cell::Empty => {}
            }
        }
    }

    worksheet.set_freeze_panes(1, 0)?;
    worksheet.autofit();

    Ok(workbook.save_to_buffer()?)
}
