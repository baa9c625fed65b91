//! CSV export of daily intake history.

use crate::{Error, Result, WaterState};
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    amount: u32,
    target: u32,
    logs_count: usize,
    met_target: bool,
}

/// Write one row per archived day, plus today if `include_today`
///
/// The file is written to a temp file and renamed into place, so an
/// interrupted export never leaves a half-written CSV behind.
/// Returns the number of rows written.
pub fn export_history_csv(state: &WaterState, path: &Path, include_today: bool) -> Result<usize> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    let mut rows = 0;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(temp.as_file());

        for record in &state.history {
            writer.serialize(CsvRow {
                date: record.date.to_string(),
                amount: record.amount,
                target: record.target,
                logs_count: record.logs_count,
                met_target: record.met_target(),
            })?;
            rows += 1;
        }

        if include_today {
            writer.serialize(CsvRow {
                date: state.last_updated_date.to_string(),
                amount: state.today_amount,
                target: state.daily_target,
                logs_count: state.today_logs.len(),
                met_target: state.today_amount >= state.daily_target,
            })?;
            rows += 1;
        }

        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} days to {:?}", rows, path);
    Ok(rows)
}
