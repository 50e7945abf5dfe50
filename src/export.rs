//! Archive export formatting: CSV and Excel-compatible spreadsheet XML.
//!
//! Pure string building — the HTTP layer turns the result into a download.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::db::models::SensorLogEntry;

const COLUMNS: [&str; 4] = ["Timestamp", "pH", "Temperature (°C)", "TDS (ppm)"];

/// Download filename for an export produced on `date`:
/// `aquarium-data-YYYY-MM-DD.{ext}`.
pub fn export_filename(extension: &str, date: DateTime<Utc>) -> String {
    format!("aquarium-data-{}.{extension}", date.format("%Y-%m-%d"))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Render the archive as CSV. Header row unquoted, every data cell quoted;
/// pH with two decimals, temperature with one, TDS as an integer.
///
/// Returns `None` for an empty archive — no file, the caller reports a
/// no-op.
pub fn to_csv(entries: &[SensorLogEntry]) -> Option<String> {
    if entries.is_empty() {
        warn!("No data to export");
        return None;
    }

    let mut lines = vec![COLUMNS.join(",")];
    for entry in entries {
        let cells = [
            format_timestamp(entry.recorded_at),
            format!("{:.2}", entry.ph),
            format!("{:.1}", entry.temperature),
            format!("{:.0}", entry.tds),
        ];
        let row: Vec<String> = cells.iter().map(|c| format!("\"{c}\"")).collect();
        lines.push(row.join(","));
    }

    Some(lines.join("\n"))
}

/// Render the archive as a minimal Excel SpreadsheetML workbook with a
/// single "Sensor Data" worksheet. Same precision rules as the CSV.
pub fn to_spreadsheet_xml(entries: &[SensorLogEntry]) -> Option<String> {
    if entries.is_empty() {
        warn!("No data to export");
        return None;
    }

    let mut xml = String::from(
        "<?xml version=\"1.0\"?>\n\
         <?mso-application progid=\"Excel.Sheet\"?>\n\
         <Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\"\n \
         xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n \
         <Worksheet ss:Name=\"Sensor Data\">\n  <Table>\n   <Row>\n",
    );
    for column in COLUMNS {
        xml.push_str(&format!(
            "    <Cell><Data ss:Type=\"String\">{column}</Data></Cell>\n"
        ));
    }
    xml.push_str("   </Row>\n");

    for entry in entries {
        xml.push_str(&format!(
            "   <Row>\n    \
             <Cell><Data ss:Type=\"String\">{}</Data></Cell>\n    \
             <Cell><Data ss:Type=\"Number\">{:.2}</Data></Cell>\n    \
             <Cell><Data ss:Type=\"Number\">{:.1}</Data></Cell>\n    \
             <Cell><Data ss:Type=\"Number\">{:.0}</Data></Cell>\n   \
             </Row>\n",
            format_timestamp(entry.recorded_at),
            entry.ph,
            entry.temperature,
            entry.tds,
        ));
    }

    xml.push_str("  </Table>\n </Worksheet>\n</Workbook>\n");
    Some(xml)
}
