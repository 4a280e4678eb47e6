use anyhow::{Context, Result};
use log::debug;
use ndarray::Array2;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

/// Traces read from disk, one row per channel.
#[derive(Debug, Clone)]
pub struct TraceTable {
    pub channel_names: Vec<String>,
    pub traces: Array2<f64>,
}

/// Reads a CSV with a header row and one numeric column per channel.
pub fn read_traces<R: Read>(reader: R) -> Result<TraceTable> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let channel_names: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    if channel_names.is_empty() {
        anyhow::bail!("CSV header has no channel columns");
    }

    let mut samples = Vec::new();
    let mut rows = 0;
    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read CSV row {}", line + 1))?;
        for (column, field) in record.iter().enumerate() {
            let value: f64 = field.parse().with_context(|| {
                format!(
                    "Invalid value '{}' in column '{}' at row {}",
                    field,
                    channel_names[column],
                    line + 1
                )
            })?;
            samples.push(value);
        }
        rows += 1;
    }

    // Rows are samples on disk; the library wants channels as rows.
    let traces = Array2::from_shape_vec((rows, channel_names.len()), samples)
        .context("CSV rows have inconsistent lengths")?
        .reversed_axes()
        .as_standard_layout()
        .into_owned();
    debug!(
        "Loaded {} channels x {} samples",
        traces.nrows(),
        traces.ncols()
    );

    Ok(TraceTable {
        channel_names,
        traces,
    })
}

pub fn read_csv_file(path: &PathBuf) -> Result<TraceTable> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    read_traces(file).with_context(|| format!("Failed to parse {}", path.display()))
}
