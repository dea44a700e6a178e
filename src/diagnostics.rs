use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;

use crate::error::SourceError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Run-level data-quality counters.
///
/// Every recoverable issue lands here instead of aborting: skipped files,
/// fields coerced to zero, fallback energy prices and missing AS prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunDiagnostics {
    pub files_processed: u64,
    pub skipped_files: Vec<SkippedFile>,
    pub records_read: u64,
    pub non_storage_records: u64,
    /// Records that cannot be attributed (no resource name, bad timestamp).
    pub malformed_records: u64,
    /// Numeric fields that were present but unusable and read as zero.
    pub coerced_fields: u64,
    pub unknown_resources: u64,
    pub out_of_period_records: u64,
    pub energy_price_fallbacks: u64,
    pub missing_as_prices: u64,
    /// Price keys whose value was replaced by a later, different quote.
    pub superseded_quotes: u64,
}

impl RunDiagnostics {
    pub fn record_skipped(&mut self, err: &SourceError) {
        warn!("Skipping {}", err);
        self.skipped_files.push(SkippedFile {
            path: err.path().clone(),
            reason: err.to_string(),
        });
    }

    /// Number of issues that lost or approximated data.
    pub fn warning_count(&self) -> u64 {
        self.skipped_files.len() as u64
            + self.malformed_records
            + self.coerced_fields
            + self.energy_price_fallbacks
            + self.missing_as_prices
    }

    pub fn merge(&mut self, other: RunDiagnostics) {
        self.files_processed += other.files_processed;
        self.skipped_files.extend(other.skipped_files);
        self.records_read += other.records_read;
        self.non_storage_records += other.non_storage_records;
        self.malformed_records += other.malformed_records;
        self.coerced_fields += other.coerced_fields;
        self.unknown_resources += other.unknown_resources;
        self.out_of_period_records += other.out_of_period_records;
        self.energy_price_fallbacks += other.energy_price_fallbacks;
        self.missing_as_prices += other.missing_as_prices;
        self.superseded_quotes += other.superseded_quotes;
    }

    pub fn log_summary(&self) {
        info!(
            "Processed {} files, {} records ({} non-storage, {} untracked resources)",
            self.files_processed,
            self.records_read,
            self.non_storage_records,
            self.unknown_resources
        );
        if !self.skipped_files.is_empty() {
            warn!("{} files skipped", self.skipped_files.len());
        }
        if self.malformed_records > 0 {
            warn!("{} records could not be attributed and were dropped", self.malformed_records);
        }
        if self.coerced_fields > 0 {
            warn!("{} numeric fields were unparseable and read as zero", self.coerced_fields);
        }
        if self.energy_price_fallbacks > 0 {
            warn!(
                "{} energy intervals priced with the fallback price",
                self.energy_price_fallbacks
            );
        }
        if self.missing_as_prices > 0 {
            warn!("{} AS awards had no clearing price and earned nothing", self.missing_as_prices);
        }
        if self.superseded_quotes > 0 {
            warn!("{} price quotes were superseded by later corrections", self.superseded_quotes);
        }
    }
}
