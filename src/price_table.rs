use chrono::{Duration, NaiveDateTime};
use polars::prelude::*;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use crate::error::SourceError;
use crate::models::EnergyPrice;
use crate::schema::{hour_ending_start, parse_delivery_date, parse_hour_ending, HeaderIndex};

/// Settlement point prices read from one table.
#[derive(Debug, Default)]
pub struct PriceTable {
    pub quotes: Vec<EnergyPrice>,
    /// Rows without a usable date, hour, interval or price.
    pub skipped_rows: u64,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(rename = "DeliveryDate")]
    delivery_date: String,
    #[serde(rename = "DeliveryHour")]
    delivery_hour: String,
    #[serde(rename = "DeliveryInterval", default)]
    delivery_interval: Option<String>,
    #[serde(rename = "SettlementPointName", alias = "SettlementPoint")]
    settlement_point: String,
    #[serde(rename = "SettlementPointPrice")]
    price: String,
}

/// Start of `interval` (1-based) inside hour ending `hour`.
fn interval_start(
    date: &str,
    hour: &str,
    interval: Option<&str>,
    interval_minutes: u32,
) -> Option<NaiveDateTime> {
    let start = hour_ending_start(parse_delivery_date(date)?, parse_hour_ending(hour)?)?;
    let interval = match interval.map(str::trim) {
        None | Some("") => 1,
        Some(raw) => raw.parse::<u32>().ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && *v >= 0.0)
                .map(|v| v as u32)
        })?,
    };
    let per_hour = 60 / interval_minutes.clamp(1, 60);
    if interval == 0 || interval > per_hour {
        return None;
    }
    Some(start + Duration::minutes(i64::from((interval - 1) * interval_minutes)))
}

/// Loads a settlement point price table from Parquet or CSV.
///
/// `interval_minutes` is the width of a `DeliveryInterval`; tables without
/// that column are hourly. When `settlement_points` is given, only those
/// points are kept.
pub fn load_settlement_prices(
    path: &Path,
    interval_minutes: u32,
    settlement_points: Option<&HashSet<String>>,
) -> Result<PriceTable, SourceError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("parquet") => load_parquet(path, interval_minutes, settlement_points),
        Some("csv") => load_csv(path, interval_minutes, settlement_points),
        _ => Err(SourceError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn keep(settlement_points: Option<&HashSet<String>>, point: &str) -> bool {
    settlement_points.map_or(true, |points| points.contains(point))
}

fn load_csv(
    path: &Path,
    interval_minutes: u32,
    settlement_points: Option<&HashSet<String>>,
) -> Result<PriceTable, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| SourceError::from_csv(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| SourceError::from_csv(path, e))?
        .clone();
    let index = HeaderIndex::new(&headers);
    let schema_err = |source| SourceError::Schema {
        path: path.to_path_buf(),
        source,
    };
    for column in ["DeliveryDate", "DeliveryHour", "SettlementPointPrice"] {
        index.require(column).map_err(schema_err)?;
    }
    if index.position("SettlementPointName").is_none() {
        index.require("SettlementPoint").map_err(schema_err)?;
    }

    let mut table = PriceTable::default();
    for result in reader.deserialize::<PriceRow>() {
        let row = match result {
            Ok(row) => row,
            Err(_) => {
                table.skipped_rows += 1;
                continue;
            }
        };
        if !keep(settlement_points, &row.settlement_point) {
            continue;
        }
        let start = interval_start(
            &row.delivery_date,
            &row.delivery_hour,
            row.delivery_interval.as_deref(),
            interval_minutes,
        );
        let price = row.price.trim().parse::<f64>().ok().filter(|p| p.is_finite());
        match (start, price) {
            (Some(interval_start), Some(price_per_mwh)) => table.quotes.push(EnergyPrice {
                settlement_point: row.settlement_point,
                interval_start,
                price_per_mwh,
            }),
            _ => table.skipped_rows += 1,
        }
    }

    Ok(table)
}

fn load_parquet(
    path: &Path,
    interval_minutes: u32,
    settlement_points: Option<&HashSet<String>>,
) -> Result<PriceTable, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let polars_err = |source| SourceError::Polars {
        path: path.to_path_buf(),
        source,
    };
    let df = ParquetReader::new(file).finish().map_err(polars_err)?;

    let dates = df
        .column("DeliveryDate")
        .map_err(polars_err)?
        .cast(&DataType::String)
        .map_err(polars_err)?;
    let hours = df
        .column("DeliveryHour")
        .map_err(polars_err)?
        .cast(&DataType::String)
        .map_err(polars_err)?;
    let points = df
        .column("SettlementPointName")
        .or_else(|_| df.column("SettlementPoint"))
        .map_err(polars_err)?
        .cast(&DataType::String)
        .map_err(polars_err)?;
    let prices = df
        .column("SettlementPointPrice")
        .map_err(polars_err)?
        .cast(&DataType::Float64)
        .map_err(polars_err)?;
    let intervals = match df.column("DeliveryInterval") {
        Ok(column) => Some(column.cast(&DataType::String).map_err(polars_err)?),
        Err(_) => None,
    };

    let dates = dates.str().map_err(polars_err)?;
    let hours = hours.str().map_err(polars_err)?;
    let points = points.str().map_err(polars_err)?;
    let prices = prices.f64().map_err(polars_err)?;
    let intervals = intervals.as_ref().map(|s| s.str()).transpose().map_err(polars_err)?;

    let mut table = PriceTable::default();
    for idx in 0..df.height() {
        let Some(point) = points.get(idx) else {
            table.skipped_rows += 1;
            continue;
        };
        if !keep(settlement_points, point) {
            continue;
        }
        let start = match (dates.get(idx), hours.get(idx)) {
            (Some(date), Some(hour)) => interval_start(
                date,
                hour,
                intervals.and_then(|column| column.get(idx)),
                interval_minutes,
            ),
            _ => None,
        };
        match (start, prices.get(idx).filter(|p| p.is_finite())) {
            (Some(interval_start), Some(price_per_mwh)) => table.quotes.push(EnergyPrice {
                settlement_point: point.to_string(),
                interval_start,
                price_per_mwh,
            }),
            _ => table.skipped_rows += 1,
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_interval_start_offsets() {
        let start = interval_start("03/01/2024", "11", Some("2"), 15).unwrap();
        assert_eq!(start.to_string(), "2024-03-01 10:15:00");
        assert_eq!(
            interval_start("2024-03-01", "01:00", None, 15).unwrap().to_string(),
            "2024-03-01 00:00:00"
        );
        assert!(interval_start("03/01/2024", "11", Some("5"), 15).is_none());
        assert!(interval_start("03/01/2024", "11", Some("0"), 15).is_none());
    }

    #[test]
    fn test_load_csv_prices() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "rt_prices_2024.csv",
            "DeliveryDate,DeliveryHour,DeliveryInterval,SettlementPoint,SettlementPointPrice\n\
             03/01/2024,11,1,SP1,30.0\n\
             03/01/2024,11,2,SP1,-4.5\n\
             03/01/2024,11,3,SP2,12.0\n\
             03/01/2024,11,4,SP1,\n",
        );

        let table = load_settlement_prices(&path, 15, None).unwrap();
        assert_eq!(table.quotes.len(), 3);
        assert_eq!(table.skipped_rows, 1);
        assert_eq!(table.quotes[1].price_per_mwh, -4.5);
        assert_eq!(table.quotes[1].interval_start.to_string(), "2024-03-01 10:15:00");

        let only_sp1: HashSet<String> = ["SP1".to_string()].into_iter().collect();
        let filtered = load_settlement_prices(&path, 15, Some(&only_sp1)).unwrap();
        assert!(filtered.quotes.iter().all(|q| q.settlement_point == "SP1"));
        assert_eq!(filtered.quotes.len(), 2);
    }

    #[test]
    fn test_csv_without_price_column_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "prices.csv",
            "DeliveryDate,DeliveryHour,SettlementPointName\n03/01/2024,1,SP1\n",
        );
        let err = load_settlement_prices(&path, 15, None).unwrap_err();
        assert!(matches!(err, SourceError::Schema { .. }));
    }

    #[test]
    fn test_load_parquet_prices() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("da_prices_2024.parquet");
        let mut df = df!(
            "DeliveryDate" => &["03/01/2024", "03/01/2024"],
            "DeliveryHour" => &[8i64, 9],
            "SettlementPointName" => &["SP1", "SP1"],
            "SettlementPointPrice" => &[20.0f64, 22.5]
        )
        .unwrap();
        let mut file = File::create(&path).unwrap();
        ParquetWriter::new(&mut file).finish(&mut df).unwrap();

        let table = load_settlement_prices(&path, 60, None).unwrap();
        assert_eq!(table.skipped_rows, 0);
        assert_eq!(table.quotes.len(), 2);
        assert_eq!(table.quotes[0].interval_start.to_string(), "2024-03-01 07:00:00");
        assert_eq!(table.quotes[1].price_per_mwh, 22.5);
    }

    #[test]
    fn test_unknown_extension() {
        let err = load_settlement_prices(Path::new("prices.xlsx"), 15, None).unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedFormat { .. }));
    }
}
