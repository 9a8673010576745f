use super::{
    average_section, config_section, error_section, hardware_section, peak_section,
    results_section, test_info_section, throughput_section, time_series_row, timing_section,
    Cell, Section, REPORT_TITLE, TIME_SERIES_HEADERS,
};
use crate::error::ReportError;
use crate::summary::round_to;
use crate::types::TestResult;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};

const HEADER_BLUE: u32 = 0x366092;
const SECTION_BLUE: u32 = 0xD9E1F2;

pub const SUMMARY_SHEET: &str = "Summary";
pub const RESULTS_SHEET: &str = "Results";
pub const TIME_SERIES_SHEET: &str = "Time Series";

/// What goes into one worksheet cell, before styling.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Report title, merged over the label and value columns.
    Title(&'static str),
    Note(String),
    SectionTitle(&'static str),
    Header(&'static str),
    Label(String),
    Value(Cell),
}

/// Cell contents of one worksheet, in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub name: &'static str,
    pub cells: Vec<(u32, u16, Entry)>,
    pub freeze_header: bool,
}

impl SheetLayout {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            cells: Vec::new(),
            freeze_header: false,
        }
    }

    fn put(&mut self, row: u32, col: u16, entry: Entry) {
        self.cells.push((row, col, entry));
    }

    /// Places a section at `row`; returns the row after it plus one blank.
    fn section(&mut self, mut row: u32, section: Section) -> u32 {
        self.put(row, 0, Entry::SectionTitle(section.title));
        row += 1;
        for (label, value) in section.rows {
            self.put(row, 0, Entry::Label(label));
            self.put(row, 1, Entry::Value(value));
            row += 1;
        }
        row + 1
    }

    pub fn rows(&self) -> u32 {
        self.cells.iter().map(|(row, _, _)| row + 1).max().unwrap_or(0)
    }
}

fn summary_layout(result: &TestResult) -> SheetLayout {
    let mut sheet = SheetLayout::new(SUMMARY_SHEET);
    sheet.put(0, 0, Entry::Title(REPORT_TITLE));
    sheet.put(
        1,
        0,
        Entry::Note(format!(
            "Generated: {} UTC",
            result.completed_at.format("%Y-%m-%d %H:%M:%S")
        )),
    );

    let mut row = 3;
    for section in [
        test_info_section(result),
        config_section(result),
        hardware_section(result),
    ] {
        row = sheet.section(row, section);
    }
    sheet
}

fn results_layout(result: &TestResult) -> SheetLayout {
    let mut sheet = SheetLayout::new(RESULTS_SHEET);
    let mut sections = vec![
        results_section(result),
        timing_section(result),
        peak_section(result),
        average_section(result),
        throughput_section(result),
    ];
    let errors = error_section(result);
    if !errors.rows.is_empty() {
        sections.push(errors);
    }

    let mut row = 0;
    for section in sections {
        row = sheet.section(row, section);
    }
    sheet
}

fn time_series_layout(result: &TestResult) -> SheetLayout {
    let mut sheet = SheetLayout::new(TIME_SERIES_SHEET);
    sheet.freeze_header = true;
    for (col, header) in TIME_SERIES_HEADERS.iter().enumerate() {
        sheet.put(0, col as u16, Entry::Header(*header));
    }
    for (index, snapshot) in result.snapshots.iter().enumerate() {
        for (col, cell) in time_series_row(snapshot).into_iter().enumerate() {
            sheet.put(index as u32 + 1, col as u16, Entry::Value(cell));
        }
    }
    sheet
}

/// The three sheets of the workbook: run summary, results, snapshot series.
pub fn layout(result: &TestResult) -> [SheetLayout; 3] {
    [
        summary_layout(result),
        results_layout(result),
        time_series_layout(result),
    ]
}

struct Styles {
    title: Format,
    section: Format,
    header: Format,
    text: Format,
    decimal: Format,
    integer: Format,
}

impl Styles {
    fn new() -> Self {
        let number = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Right);
        Self {
            title: Format::new().set_bold().set_font_size(16),
            section: Format::new()
                .set_bold()
                .set_font_size(12)
                .set_background_color(Color::RGB(SECTION_BLUE)),
            header: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(HEADER_BLUE))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap()
                .set_border(FormatBorder::Thin),
            text: Format::new().set_border(FormatBorder::Thin),
            decimal: number.clone().set_num_format("0.00"),
            integer: number.set_num_format("0"),
        }
    }
}

fn write_entry(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    entry: &Entry,
    styles: &Styles,
) -> Result<(), ReportError> {
    match entry {
        Entry::Title(title) => {
            sheet.merge_range(row, col, row, col + 1, title, &styles.title)?;
        }
        Entry::Note(note) => {
            sheet.write_string(row, col, note.as_str())?;
        }
        Entry::SectionTitle(title) => {
            sheet.write_string_with_format(row, col, *title, &styles.section)?;
            sheet.write_blank(row, col + 1, &styles.section)?;
        }
        Entry::Header(header) => {
            sheet.write_string_with_format(row, col, *header, &styles.header)?;
        }
        Entry::Label(label) => {
            sheet.write_string_with_format(row, col, label.as_str(), &styles.text)?;
        }
        Entry::Value(Cell::Number(value)) if value.is_finite() => {
            sheet.write_number_with_format(row, col, round_to(*value, 2), &styles.decimal)?;
        }
        Entry::Value(Cell::Integer(value)) => {
            sheet.write_number_with_format(row, col, *value as f64, &styles.integer)?;
        }
        Entry::Value(other) => {
            sheet.write_string_with_format(row, col, other.display(), &styles.text)?;
        }
    }
    Ok(())
}

/// Three-sheet workbook built from [`layout`].
pub fn render(result: &TestResult) -> Result<Vec<u8>, ReportError> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();

    for planned in layout(result) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(planned.name)?;
        if planned.freeze_header {
            sheet.set_freeze_panes(1, 0)?;
        }
        for (row, col, entry) in &planned.cells {
            write_entry(sheet, *row, *col, entry, &styles)?;
        }
        sheet.autofit();
    }

    Ok(workbook.save_to_buffer()?)
}
