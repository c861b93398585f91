use crate::core::Record;
use crate::core::model::RECORD_NAME_FORMAT;
use std::fmt::Write;

const HEADER: &str = "TIME                 SYS/DIA  PUL";
const RULE: &str = "-------------------  -------  ---";

/// Renders records as the plain-text history table.
pub fn render_history(records: &[Record]) -> String {
    let mut out = String::with_capacity((records.len() + 2) * (HEADER.len() + 1));
    out.push_str(HEADER);
    out.push('\n');
    out.push_str(RULE);
    out.push('\n');
    for record in records {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{}  {:>3}/{:<3}  {:>3}",
            record.recorded_at.format(RECORD_NAME_FORMAT),
            record.systolic,
            record.diastolic,
            record.pulse
        );
    }
    out
}
