use super::{
    average_section, config_section, error_section, hardware_section, peak_section,
    results_section, test_info_section, throughput_section, time_series_row, timestamp,
    timing_section, Section, REPORT_TITLE, TIME_SERIES_HEADERS, TIME_SERIES_TITLE,
};
use crate::error::ReportError;
use crate::types::TestResult;
use csv::{Terminator, Writer, WriterBuilder};

fn writer() -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String, ReportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::CsvBuffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReportError::CsvBuffer(e.to_string()))
}

fn write_section(output: &mut String, section: &Section) -> Result<(), ReportError> {
    output.push_str("## ");
    output.push_str(section.title);
    output.push('\n');

    let mut writer = writer();
    writer.write_record(section.columns)?;
    for (label, value) in &section.rows {
        writer.write_record([label.clone(), value.display()])?;
    }
    output.push_str(&finish(writer)?);
    output.push('\n');
    Ok(())
}

/// Key/value CSV: `#` comment header, one `##` block per section, then the
/// snapshot time series.
pub fn render(result: &TestResult) -> Result<String, ReportError> {
    let mut output = String::new();
    output.push_str(&format!("# {}\n", REPORT_TITLE));
    output.push_str(&format!("# Generated: {}\n\n", timestamp(&result.completed_at)));

    let mut sections = vec![
        test_info_section(result),
        config_section(result),
        hardware_section(result),
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
    for section in &sections {
        write_section(&mut output, section)?;
    }

    if !result.snapshots.is_empty() {
        output.push_str(&format!("## {}\n", TIME_SERIES_TITLE));
        let mut writer = writer();
        writer.write_record(TIME_SERIES_HEADERS)?;
        for snapshot in &result.snapshots {
            writer.write_record(time_series_row(snapshot).iter().map(|cell| cell.display()))?;
        }
        output.push_str(&finish(writer)?);
    }

    Ok(output)
}
