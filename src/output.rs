use clap::ValueEnum;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::aggregator::RevenueSummary;
use crate::error::OutputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Parquet,
    Csv,
    Both,
}

impl OutputFormat {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            OutputFormat::Parquet => &["parquet"],
            OutputFormat::Csv => &["csv"],
            OutputFormat::Both => &["parquet", "csv"],
        }
    }
}

/// Builds the ledger frame with its stable column names.
pub fn summaries_to_frame(rows: &[RevenueSummary]) -> PolarsResult<DataFrame> {
    let column = |f: fn(&RevenueSummary) -> f64| rows.iter().map(f).collect::<Vec<f64>>();
    let counter = |f: fn(&RevenueSummary) -> u64| rows.iter().map(f).collect::<Vec<u64>>();

    df!(
        "BESS_Asset_Name" => rows.iter().map(|r| r.resource_id.clone()).collect::<Vec<String>>(),
        "Year" => rows.iter().map(|r| r.year).collect::<Vec<i32>>(),
        "DA_Revenue" => column(|r| r.ledger.dam_energy),
        "RT_Revenue" => column(|r| r.ledger.rt_energy_arbitrage),
        "RegUp_Revenue" => column(|r| r.ledger.reg_up),
        "RegDown_Revenue" => column(|r| r.ledger.reg_down),
        "Spin_Revenue" => column(|r| r.ledger.rrs),
        "ECRS_Revenue" => column(|r| r.ledger.ecrs),
        "NonSpin_Revenue" => column(|r| r.ledger.non_spin),
        "Total_AS_Revenue" => column(|r| r.total_as),
        "Total_Revenue" => column(|r| r.total),
        "Energy_Pct" => column(|r| r.energy_pct),
        "AS_Pct" => column(|r| r.as_pct),
        "Discharge_MWh" => column(|r| r.ledger.discharge_mwh),
        "Charge_MWh" => column(|r| r.ledger.charge_mwh),
        "DAM_Hours" => counter(|r| r.ledger.dam_hours),
        "RT_Intervals" => counter(|r| r.ledger.rt_intervals),
        "Fallback_Price_Intervals" => counter(|r| r.ledger.fallback_intervals),
        "Revenue_Per_MW" => rows.iter().map(|r| r.revenue_per_mw).collect::<Vec<Option<f64>>>()
    )
}

/// Writes `rows` next to `stem` (`<stem>.parquet` and/or `<stem>.csv`).
///
/// Each file is written to a temporary sibling and renamed into place, so a
/// reader never sees a partial ledger.
pub fn write_ledger(
    rows: &[RevenueSummary],
    stem: &Path,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, OutputError> {
    let mut df = summaries_to_frame(rows).map_err(|source| OutputError::Polars {
        path: stem.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for extension in format.extensions() {
        let path = stem.with_extension(extension);
        write_atomically(&path, |file| match *extension {
            "csv" => CsvWriter::new(file).include_header(true).finish(&mut df),
            _ => ParquetWriter::new(file).finish(&mut df).map(|_| ()),
        })?;
        written.push(path);
    }
    Ok(written)
}

fn write_atomically<F>(path: &Path, write: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut fs::File) -> PolarsResult<()>,
{
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    write(tmp.as_file_mut()).map_err(|source| OutputError::Polars {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.as_file_mut().flush().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RevenueLedgerEntry;
    use tempfile::TempDir;

    fn rows() -> Vec<RevenueSummary> {
        let ledger = RevenueLedgerEntry {
            dam_energy: 200.0,
            rt_energy_arbitrage: 30.0,
            reg_up: 40.0,
            dam_hours: 1,
            rt_intervals: 1,
            ..Default::default()
        };
        vec![RevenueSummary {
            resource_id: "BESS_A".to_string(),
            year: 2024,
            total_as: ledger.total_as(),
            energy_total: ledger.energy_total(),
            total: ledger.total(),
            energy_pct: ledger.energy_pct(),
            as_pct: ledger.as_pct(),
            revenue_per_mw: None,
            ledger,
        }]
    }

    #[test]
    fn test_frame_has_stable_columns() {
        let df = summaries_to_frame(&rows()).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 19);
        let total = df.column("Total_Revenue").unwrap().f64().unwrap().get(0);
        assert_eq!(total, Some(270.0));
        assert_eq!(df.column("Revenue_Per_MW").unwrap().null_count(), 1);
    }

    #[test]
    fn test_write_both_formats() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("out").join("bess_revenues");
        let written = write_ledger(&rows(), &stem, OutputFormat::Both).unwrap();

        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
        let csv = fs::read_to_string(stem.with_extension("csv")).unwrap();
        assert!(csv.starts_with("BESS_Asset_Name,Year,DA_Revenue,RT_Revenue"));
        assert!(csv.contains("BESS_A,2024"));

        let leftovers = fs::read_dir(dir.path().join("out")).unwrap().count();
        assert_eq!(leftovers, 2);
    }
}
