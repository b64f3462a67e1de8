//! Multi-sheet spreadsheet report.
//!
//! Three sheets: "Data Analysis" (the cleaned table, or the matrix for
//! heatmaps, 3-decimal), "Hypothesis Test" (4-decimal p-values) and
//! "Descriptive Stats". The whole data region gets thin borders so the
//! file opens looking like a report, not a dump.

use crate::figure::RenderedFigure;
use anyhow::{Context as _, Result};
use polars::prelude::*;
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet};
use std::path::Path;

/// Writes the full report. The file is created in one shot; on error
/// nothing half-written is left behind beyond the temp the library cleans
/// up itself.
pub fn write_report(path: &Path, df: &DataFrame, rendered: &RenderedFigure) -> Result<()> {
    let mut workbook = Workbook::new();

    let header_fmt = Format::new().set_bold().set_border(FormatBorder::Thin);
    let text_fmt = Format::new().set_border(FormatBorder::Thin);
    let num3_fmt = Format::new()
        .set_border(FormatBorder::Thin)
        .set_num_format("0.000");
    let num4_fmt = Format::new()
        .set_border(FormatBorder::Thin)
        .set_num_format("0.0000");

    // Sheet 1: the analysed data (matrix form for heatmaps).
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Data Analysis")?;
        match &rendered.matrix {
            Some(matrix) => {
                sheet.write_string_with_format(0, 0, "", &header_fmt)?;
                for (c, name) in matrix.columns.iter().enumerate() {
                    sheet.write_string_with_format(0, c as u16 + 1, name, &header_fmt)?;
                }
                for (r, label) in matrix.rows.iter().enumerate() {
                    let row = r as u32 + 1;
                    sheet.write_string_with_format(row, 0, label, &text_fmt)?;
                    for (c, value) in matrix.data[r].iter().enumerate() {
                        let col = c as u16 + 1;
                        if value.is_finite() {
                            sheet.write_number_with_format(row, col, *value, &num3_fmt)?;
                        } else {
                            sheet.write_string_with_format(row, col, "", &text_fmt)?;
                        }
                    }
                }
            }
            None => write_dataframe(sheet, df, &header_fmt, &text_fmt, &num3_fmt)?,
        }
    }

    // Sheet 2: hypothesis tests, when any ran.
    if !rendered.tests.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Hypothesis Test")?;
        let headers = ["Comparison", "Method", "Statistic", "P-Value", "N", "Note"];
        for (c, h) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, c as u16, *h, &header_fmt)?;
        }
        for (r, report) in rendered.tests.iter().enumerate() {
            let row = r as u32 + 1;
            sheet.write_string_with_format(row, 0, &report.comparison, &text_fmt)?;
            sheet.write_string_with_format(row, 1, &report.method, &text_fmt)?;
            match report.statistic {
                Some(stat) if stat.is_finite() => {
                    sheet.write_number_with_format(row, 2, stat, &num4_fmt)?;
                }
                Some(stat) => {
                    sheet.write_string_with_format(row, 2, &format!("{stat}"), &text_fmt)?;
                }
                None => {
                    sheet.write_string_with_format(row, 2, "-", &text_fmt)?;
                }
            }
            match report.p_value {
                Some(p) => {
                    sheet.write_number_with_format(row, 3, p, &num4_fmt)?;
                }
                None => {
                    sheet.write_string_with_format(row, 3, "-", &text_fmt)?;
                }
            }
            let sizes = report
                .sample_sizes
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" / ");
            sheet.write_string_with_format(row, 4, &sizes, &text_fmt)?;
            sheet.write_string_with_format(row, 5, report.note.as_deref().unwrap_or(""), &text_fmt)?;
        }
    }

    // Sheet 3: descriptive statistics.
    if !rendered.descriptive.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Descriptive Stats")?;
        let headers = ["Group", "count", "mean", "std", "min", "25%", "50%", "75%", "max"];
        for (c, h) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, c as u16, *h, &header_fmt)?;
        }
        for (r, row_data) in rendered.descriptive.iter().enumerate() {
            let row = r as u32 + 1;
            let d = &row_data.stats;
            sheet.write_string_with_format(row, 0, &row_data.label, &text_fmt)?;
            sheet.write_number_with_format(row, 1, d.count as f64, &text_fmt)?;
            for (c, value) in [d.mean, d.std, d.min, d.q1, d.median, d.q3, d.max]
                .into_iter()
                .enumerate()
            {
                let col = c as u16 + 2;
                if value.is_finite() {
                    sheet.write_number_with_format(row, col, value, &num3_fmt)?;
                } else {
                    sheet.write_string_with_format(row, col, "-", &text_fmt)?;
                }
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save workbook: {}", path.display()))?;
    Ok(())
}

/// Dumps a dataframe onto a sheet: numeric columns 3-decimal, everything
/// else stringified.
fn write_dataframe(
    sheet: &mut Worksheet,
    df: &DataFrame,
    header_fmt: &Format,
    text_fmt: &Format,
    num_fmt: &Format,
) -> Result<()> {
    for (c, col) in df.get_columns().iter().enumerate() {
        let col_idx = c as u16;
        sheet.write_string_with_format(0, col_idx, col.name().as_str(), header_fmt)?;

        let series = col.as_materialized_series();
        if series.dtype().is_primitive_numeric() {
            let casted = series
                .cast(&DataType::Float64)
                .context("Numeric column failed to cast for export")?;
            let ca = casted.f64().map_err(|e| anyhow::anyhow!(e))?;
            for (r, value) in ca.into_iter().enumerate() {
                let row = r as u32 + 1;
                match value {
                    Some(v) if v.is_finite() => {
                        sheet.write_number_with_format(row, col_idx, v, num_fmt)?;
                    }
                    _ => {
                        sheet.write_string_with_format(row, col_idx, "", text_fmt)?;
                    }
                }
            }
        } else {
            let casted = series
                .cast(&DataType::String)
                .context("Column failed to stringify for export")?;
            let ca = casted.str().map_err(|e| anyhow::anyhow!(e))?;
            for (r, value) in ca.into_iter().enumerate() {
                let row = r as u32 + 1;
                sheet.write_string_with_format(row, col_idx, value.unwrap_or(""), text_fmt)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Descriptive, GroupDescriptive, TestReport};

    fn sample_rendered() -> RenderedFigure {
        RenderedFigure {
            tests: vec![TestReport {
                comparison: "Treated vs Control".to_owned(),
                method: "T-test".to_owned(),
                statistic: Some(12.34),
                p_value: Some(0.0012),
                sample_sizes: vec![8, 8],
                note: None,
            }],
            descriptive: vec![GroupDescriptive {
                label: "Control".to_owned(),
                stats: Descriptive::compute(&[1.0, 2.0, 3.0]).unwrap(),
            }],
            matrix: None,
        }
    }

    #[test]
    fn test_write_report_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.xlsx");

        let g = Series::new("group".into(), vec!["a", "b"]);
        let v = Series::new("value".into(), vec![1.0, 2.0]);
        let df = DataFrame::new(vec![Column::from(g), Column::from(v)]).unwrap();

        write_report(&path, &df, &sample_rendered()).unwrap();
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_matrix_takes_over_data_sheet() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("matrix.xlsx");

        let df = DataFrame::empty();
        let rendered = RenderedFigure {
            tests: vec![],
            descriptive: vec![],
            matrix: Some(crate::figure::CorrelationMatrix {
                columns: vec!["a".to_owned(), "b".to_owned()],
                rows: vec!["a".to_owned(), "b".to_owned()],
                data: vec![vec![1.0, 0.5], vec![0.5, 1.0]],
            }),
        };
        write_report(&path, &df, &rendered).unwrap();
        assert!(path.exists());
    }
}
