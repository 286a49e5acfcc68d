//! Feature matrix CSV export and training report loading.

use std::path::Path;

use anyhow::{bail, Context, Result};
use pricecast_core::features::FeatureMatrix;

use crate::report::{report_file_name, TrainingReport, REPORT_SCHEMA_VERSION};

/// Serialize a feature matrix as CSV: `bar_index,timestamp,close,<features...>`.
pub fn export_features_csv(matrix: &FeatureMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec![
        "bar_index".to_string(),
        "timestamp".to_string(),
        "close".to_string(),
    ];
    header.extend(matrix.schema().names().iter().cloned());
    wtr.write_record(&header)?;

    for row in matrix.rows() {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.bar_index.to_string());
        record.push(row.timestamp.to_string());
        record.push(row.close.to_string());
        record.extend(row.values.iter().map(f64::to_string));
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Read `report_<ticker>.json` from `dir`, rejecting unknown schema versions.
pub fn load_report(dir: &Path, ticker: &str) -> Result<TrainingReport> {
    let path = dir.join(report_file_name(ticker));
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let report: TrainingReport = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if report.schema_version > REPORT_SCHEMA_VERSION {
        bail!(
            "unsupported report schema version {} (max supported: {})",
            report.schema_version,
            REPORT_SCHEMA_VERSION
        );
    }
    Ok(report)
}
