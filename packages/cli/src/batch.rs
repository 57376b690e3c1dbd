//! Batch formatting of newline-delimited JSON.

use std::io::{BufRead, Write};

use address_formatter::AddressFormatter;

use crate::progress::ProgressCallback;

/// Counts from a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub formatted: u64,
    pub failed: u64,
}

/// Formats every non-blank line of `reader` as one address and writes the
/// results to `writer`, separated by blank lines.
///
/// Lines that fail to format are logged with their line number and
/// counted; they do not stop the run.
///
/// # Errors
///
/// Returns an I/O error if reading the input or writing the output fails.
pub fn run<R: BufRead, W: Write>(
    formatter: &AddressFormatter,
    reader: R,
    writer: &mut W,
    fallback_country_code: Option<&str>,
    progress: &dyn ProgressCallback,
) -> std::io::Result<BatchSummary> {
    let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
    let total = lines.iter().filter(|line| !line.trim().is_empty()).count();
    progress.set_total(total as u64);

    let mut summary = BatchSummary::default();
    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match formatter.format_str(line, fallback_country_code) {
            Ok(address) => {
                if summary.formatted > 0 {
                    writeln!(writer)?;
                }
                write!(writer, "{address}")?;
                summary.formatted += 1;
            }
            Err(e) => {
                log::error!("Line {}: {e}", index + 1);
                summary.failed += 1;
            }
        }
        progress.inc(1);
    }

    progress.finish(format!(
        "{} formatted, {} failed",
        summary.formatted, summary.failed
    ));
    Ok(summary)
}
