//! Table ingestion.
//!
//! CSV goes through the Polars lazy scanner with generous schema inference.
//! XLSX is read with calamine and lands as all-string columns; the
//! sanitiser and type inferencer take it from there, so both formats end up
//! in the same place.

use anyhow::{bail, Context as _, Result};
use calamine::{open_workbook_auto, Data, Reader as _};
use polars::prelude::*;
use std::path::Path;

/// Loads a data table, dispatching on extension (`.csv`, `.xlsx`).
pub fn load_table(path: &Path) -> Result<DataFrame> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "xlsx" => load_xlsx(path),
        other => bail!("Unsupported file extension: {other} (expected csv or xlsx)"),
    }
}

fn load_csv(path: &Path) -> Result<DataFrame> {
    LazyCsvReader::new(path)
        .with_infer_schema_length(Some(10000))
        .with_has_header(true)
        .finish()
        .context("Failed to scan CSV")?
        .collect()
        .context("Failed to read CSV")
}

/// Reads the first worksheet of an XLSX file.
///
/// Row 0 is the header row. All cells are stringified; numeric typing
/// happens later in the sanitiser so XLSX and CSV inputs behave
/// identically.
fn load_xlsx(path: &Path) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet_names = workbook.sheet_names();
    let Some(first) = sheet_names.first().cloned() else {
        bail!("Workbook has no sheets: {}", path.display());
    };

    let range = workbook
        .worksheet_range(&first)
        .with_context(|| format!("Failed to read sheet '{first}'"))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        bail!("Sheet '{first}' is empty");
    };

    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let text = cell_to_string(cell).unwrap_or_default();
            if text.is_empty() {
                format!("col_{i}")
            } else {
                text
            }
        })
        .collect();

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (i, slot) in columns.iter_mut().enumerate() {
            slot.push(row.get(i).and_then(cell_to_string));
        }
    }

    let series: Vec<Column> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Column::from(Series::new(name.as_str().into(), values)))
        .collect();

    DataFrame::new(series).context("Failed to assemble dataframe from workbook")
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_owned())
            }
        }
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Error(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "group,value").unwrap();
        writeln!(f, "control,1.5").unwrap();
        writeln!(f, "treated,2.5").unwrap();

        let df = load_table(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(load_table(Path::new("data.parquet")).is_err());
    }
}
