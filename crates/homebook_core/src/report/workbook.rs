//! Minimal workbook model and its `.xlsx` encoding.
//!
//! # Invariants
//! - Sheets are written in order, starting at `A1`.
//! - Reading trims trailing empty cells, so a blank row reads back as `[]`.

use super::TransferError;
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, Workbook as XlsxBook, Worksheet, XlsxError,
};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const WORKBOOK_EXTENSION: &str = "xlsx";
const HEADER_FILL: u32 = 0x3F51B5;
const AMOUNT_FORMAT: &str = "#,##0.00";
const PERCENT_FORMAT: &str = "0.0%";
const MIN_COLUMN_WIDTH: usize = 12;

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    /// Money, written with a `#,##0.00` number format.
    Amount(f64),
    /// Fraction written with a `0.0%` format (0.25 -> `25.0%`), optionally
    /// filled with an RGB colour.
    Percent { value: f64, fill: Option<u32> },
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Display text, used for console output and column sizing.
    pub fn render(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(value) => value.clone(),
            Self::Number(value) => value.to_string(),
            Self::Amount(value) => format!("{value:.2}"),
            Self::Percent { value, .. } => format!("{:.1}%", value * 100.0),
        }
    }

    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => Self::Empty,
            Data::String(value) => Self::Text(value.clone()),
            Data::Float(value) => Self::Number(*value),
            Data::Int(value) => Self::Number(*value as f64),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Named grid of cells; rows may have different lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
    /// Row indexes styled as table headers.
    pub header_rows: Vec<usize>,
    /// Rows kept visible while scrolling.
    pub frozen_rows: u32,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            header_rows: Vec::new(),
            frozen_rows: 0,
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn push_blank(&mut self) {
        self.rows.push(Vec::new());
    }

    pub fn push_texts(&mut self, values: &[&str]) {
        self.rows
            .push(values.iter().map(|value| Cell::text(*value)).collect());
    }

    /// Pushes a styled header row.
    pub fn push_header(&mut self, values: &[&str]) {
        self.header_rows.push(self.rows.len());
        self.push_texts(values);
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = Vec::new();
        for row in &self.rows {
            for (col, cell) in row.iter().enumerate() {
                if widths.len() <= col {
                    widths.resize(col + 1, MIN_COLUMN_WIDTH);
                }
                widths[col] = widths[col].max(cell.render().chars().count());
            }
        }
        widths
    }

    fn write_to(&self, worksheet: &mut Worksheet) -> Result<(), XlsxError> {
        let header = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(HEADER_FILL))
            .set_align(FormatAlign::Center)
            .set_border(FormatBorder::Thin);
        let amount = Format::new().set_num_format(AMOUNT_FORMAT);
        let percent = Format::new().set_num_format(PERCENT_FORMAT);

        worksheet.set_name(&self.name)?;
        for (col, width) in self.column_widths().into_iter().enumerate() {
            worksheet.set_column_width(col as u16, (width + 2) as f64)?;
        }
        if self.frozen_rows > 0 {
            worksheet.set_freeze_panes(self.frozen_rows, 0)?;
        }

        for (index, cells) in self.rows.iter().enumerate() {
            let row = index as u32;
            let is_header = self.header_rows.contains(&index);
            for (col, cell) in cells.iter().enumerate() {
                let col = col as u16;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(value) if is_header => {
                        worksheet.write_string_with_format(row, col, value, &header)?;
                    }
                    Cell::Text(value) => {
                        worksheet.write_string(row, col, value)?;
                    }
                    Cell::Number(value) => {
                        worksheet.write_number(row, col, *value)?;
                    }
                    Cell::Amount(value) => {
                        worksheet.write_number_with_format(row, col, *value, &amount)?;
                    }
                    Cell::Percent { value, fill } => {
                        let format = match fill {
                            Some(rgb) => percent.clone().set_background_color(Color::RGB(*rgb)),
                            None => percent.clone(),
                        };
                        worksheet.write_number_with_format(row, col, *value, &format)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Ordered set of sheets sharing one file stem.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub stem: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn file_name(&self) -> String {
        format!("{}.{WORKBOOK_EXTENSION}", self.stem)
    }

    /// Writes `<parent>/<stem>.xlsx` and returns its path.
    pub fn save(&self, parent: &Path) -> Result<PathBuf, TransferError> {
        fs::create_dir_all(parent).map_err(|source| TransferError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
        let path = parent.join(self.file_name());
        let write_error = |source: XlsxError| TransferError::Write {
            path: path.clone(),
            source,
        };

        let mut book = XlsxBook::new();
        for sheet in &self.sheets {
            sheet.write_to(book.add_worksheet()).map_err(write_error)?;
        }
        book.save(&path).map_err(write_error)?;
        Ok(path)
    }

    /// Reads every sheet of an `.xlsx` file; styling is not kept, so
    /// amounts and percentages come back as [`Cell::Number`].
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let mut book = open_xlsx(path)?;
        let mut sheets = Vec::new();
        for name in book.sheet_names() {
            let range = book
                .worksheet_range(&name)
                .map_err(|source| read_error(path, source))?;
            let (first_row, first_col) = range.start().unwrap_or((0, 0));

            let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); first_row as usize];
            for data in range.rows() {
                let mut row = vec![Cell::Empty; first_col as usize];
                row.extend(data.iter().map(Cell::from_data));
                while row.last() == Some(&Cell::Empty) {
                    row.pop();
                }
                rows.push(row);
            }

            sheets.push(Sheet {
                name,
                rows,
                header_rows: Vec::new(),
                frozen_rows: 0,
            });
        }

        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { stem, sheets })
    }
}

/// Opens an existing `.xlsx` file; anything that is not a regular file is
/// reported as an i/o error.
pub(crate) fn open_xlsx(path: &Path) -> Result<Xlsx<BufReader<File>>, TransferError> {
    let metadata = fs::metadata(path).map_err(|source| TransferError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(TransferError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "expected an .xlsx file",
            ),
        });
    }
    open_workbook(path).map_err(|source| read_error(path, source))
}

pub(crate) fn read_error(path: &Path, source: calamine::XlsxError) -> TransferError {
    TransferError::Read {
        path: path.to_path_buf(),
        source,
    }
}
