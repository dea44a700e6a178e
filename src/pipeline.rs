//! Per-period revenue computation.
//!
//! Each operating year is processed independently: its price indexes are
//! completed from every hourly file and price table first, then hourly
//! awards and streamed dispatch records are accumulated into a ledger store
//! owned by that year. Years run in parallel and their stores are merged
//! once all of them finish.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::accumulator::{LedgerStore, PriceBook, RevenueAccumulator};
use crate::aggregator::{finalize, RevenueSummary};
use crate::config::RevenueConfig;
use crate::diagnostics::RunDiagnostics;
use crate::error::{RevenueError, SourceError};
use crate::extractor::{AwardExtractor, Extraction};
use crate::models::{AsPrice, EnergyPrice, IntervalAward};
use crate::output::{write_ledger, OutputFormat};
use crate::price_table::load_settlement_prices;
use crate::registry::ResourceRegistry;
use crate::schema::SchemaVariant;
use crate::sources::SourceCatalog;

/// Outcome of a run: finalized rows, data-quality counters and the files
/// written.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub periods: BTreeSet<i32>,
    pub summaries: Vec<RevenueSummary>,
    pub diagnostics: RunDiagnostics,
    pub outputs: Vec<PathBuf>,
}

impl RunReport {
    /// 0 when at least one resource produced a ledger row, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.summaries.is_empty() {
            1
        } else {
            0
        }
    }

    pub fn warning_count(&self) -> u64 {
        self.diagnostics.warning_count()
    }
}

/// Computes ledgers for `periods` and writes them next to `output_stem`.
///
/// Only a registry or output failure is an error; anything wrong with an
/// individual input file is recorded in the report's diagnostics.
pub fn compute_revenues(
    periods: &BTreeSet<i32>,
    config: &RevenueConfig,
    output_stem: &Path,
    format: OutputFormat,
) -> Result<RunReport, RevenueError> {
    let registry = ResourceRegistry::load(
        &config.sources.registry,
        &config.filters.storage_resource_types,
    )?;
    info!(
        "Loaded {} storage resources from {}",
        registry.len(),
        config.sources.registry.display()
    );

    let catalog = SourceCatalog::discover(&config.sources);
    let progress = MultiProgress::new();
    if !config.processing.show_progress {
        progress.set_draw_target(ProgressDrawTarget::hidden());
    }

    let results: Vec<(LedgerStore, RunDiagnostics)> = periods
        .par_iter()
        .map(|&year| {
            PeriodRun {
                year,
                registry: &registry,
                catalog: &catalog,
                config,
                progress: &progress,
            }
            .run()
        })
        .collect();

    let mut store = LedgerStore::new();
    let mut diagnostics = RunDiagnostics::default();
    for (period_store, period_diag) in results {
        store.merge(period_store);
        diagnostics.merge(period_diag);
    }

    let summaries = finalize(&store, &registry);
    info!(
        "{} ledger rows across {} periods ({} accumulated entries)",
        summaries.len(),
        periods.len(),
        store.len()
    );

    let outputs = if summaries.is_empty() {
        warn!("No resource produced revenue; nothing written");
        Vec::new()
    } else {
        let written = write_ledger(&summaries, output_stem, format)?;
        for path in &written {
            info!("Saved {}", path.display());
        }
        written
    };

    diagnostics.log_summary();

    Ok(RunReport {
        periods: periods.clone(),
        summaries,
        diagnostics,
        outputs,
    })
}

/// Records of one hourly file, committed to the period only when the whole
/// file was read.
#[derive(Default)]
struct HourlyBatch {
    awards: Vec<IntervalAward>,
    clearing_prices: Vec<AsPrice>,
    energy_prices: Vec<EnergyPrice>,
}

struct PeriodRun<'a> {
    year: i32,
    registry: &'a ResourceRegistry,
    catalog: &'a SourceCatalog,
    config: &'a RevenueConfig,
    progress: &'a MultiProgress,
}

impl PeriodRun<'_> {
    fn run(&self) -> (LedgerStore, RunDiagnostics) {
        let mut diag = RunDiagnostics::default();
        let mut prices = PriceBook::new(&self.config.pricing);

        let price_files = self.catalog.settlement_price_files(self.year);
        let hourly_files: Vec<(SchemaVariant, PathBuf)> =
            [SchemaVariant::DayAhead, SchemaVariant::Supplemental]
                .into_iter()
                .flat_map(|variant| {
                    self.catalog
                        .files_for_period(variant, self.year)
                        .into_iter()
                        .map(move |path| (variant, path))
                })
                .collect();
        let dispatch_files = self
            .catalog
            .files_for_period(SchemaVariant::RealTime, self.year);

        let pb = self.progress.add(ProgressBar::new(
            (price_files.len() + hourly_files.len() + dispatch_files.len()) as u64,
        ));
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} {prefix} [{elapsed_precise}] \
                 [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_prefix(self.year.to_string());

        // Real-time prices
        let settlement_points = self.registry.settlement_points();
        for path in &price_files {
            pb.set_message(file_label(path));
            self.load_price_table(path, &settlement_points, &mut prices, &mut diag);
            pb.inc(1);
        }

        // Hourly awards and the clearing prices printed alongside them
        let mut awards = Vec::new();
        for (variant, path) in &hourly_files {
            pb.set_message(file_label(path));
            match self.read_hourly_file(path, *variant, &mut diag) {
                Ok(batch) => {
                    diag.files_processed += 1;
                    prices.for_variant_mut(*variant).index_as_prices(batch.clearing_prices);
                    prices.day_ahead.index_energy_prices(batch.energy_prices);
                    awards.extend(batch.awards);
                }
                Err(e) => diag.record_skipped(&e),
            }
            pb.inc(1);
        }
        diag.superseded_quotes += prices.superseded_total();
        debug!(
            "{}: {} real-time quotes, {} day-ahead MCPCs, {} supplemental MCPCs",
            self.year,
            prices.real_time.energy_len(),
            prices.day_ahead.as_len(),
            prices.supplemental.as_len()
        );

        let accumulator = RevenueAccumulator::new(self.registry, &prices, &self.config.pricing)
            .restricted_to(self.year);
        let mut store = accumulator.accumulate(LedgerStore::new(), &awards, &mut diag);
        debug!("{}: {} hourly awards accumulated", self.year, awards.len());
        drop(awards);

        for path in &dispatch_files {
            pb.set_message(file_label(path));
            match self.stream_dispatch_file(path, &accumulator) {
                Ok((file_store, file_diag)) => {
                    store.merge(file_store);
                    diag.merge(file_diag);
                    diag.files_processed += 1;
                }
                Err(e) => diag.record_skipped(&e),
            }
            pb.inc(1);
        }

        pb.finish_with_message(format!("{} resources", store.len()));
        info!(
            "{}: {} price tables, {} hourly files, {} dispatch files, {} ledger entries",
            self.year,
            price_files.len(),
            hourly_files.len(),
            dispatch_files.len(),
            store.len()
        );
        (store, diag)
    }

    fn load_price_table(
        &self,
        path: &Path,
        settlement_points: &HashSet<String>,
        prices: &mut PriceBook,
        diag: &mut RunDiagnostics,
    ) {
        let interval_minutes = self.config.pricing.rt_price_interval_minutes;
        match load_settlement_prices(path, interval_minutes, Some(settlement_points)) {
            Ok(table) => {
                if table.skipped_rows > 0 {
                    warn!("{}: {} unusable price rows", path.display(), table.skipped_rows);
                    diag.malformed_records += table.skipped_rows;
                }
                debug!("{}: {} price quotes", path.display(), table.quotes.len());
                prices.real_time.index_energy_prices(table.quotes);
                diag.files_processed += 1;
            }
            Err(e) => diag.record_skipped(&e),
        }
    }

    fn open(
        &self,
        path: &Path,
        variant: SchemaVariant,
    ) -> Result<(csv::Reader<File>, AwardExtractor), SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| SourceError::from_csv(path, e))?;
        let headers = reader.headers().map_err(|e| SourceError::from_csv(path, e))?;
        let storage_types = &self.config.filters.storage_resource_types;
        let extractor = AwardExtractor::new(variant, headers, storage_types).map_err(|source| {
            SourceError::Schema {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok((reader, extractor))
    }

    fn read_hourly_file(
        &self,
        path: &Path,
        variant: SchemaVariant,
        diag: &mut RunDiagnostics,
    ) -> Result<HourlyBatch, SourceError> {
        let (mut reader, extractor) = self.open(path, variant)?;
        let mut file_diag = RunDiagnostics::default();
        let mut batch = HourlyBatch::default();

        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(SourceError::from_csv(path, e)),
                Err(_) => {
                    file_diag.malformed_records += 1;
                    continue;
                }
            };
            file_diag.records_read += 1;

            batch
                .clearing_prices
                .extend(extractor.clearing_prices(&record, &mut file_diag));

            match extractor.extract(&record, &mut file_diag) {
                Extraction::Award(award) => {
                    if let (Some(price), Some(settlement_point)) = (
                        award.energy_price,
                        self.registry.settlement_point(&award.resource_id),
                    ) {
                        batch.energy_prices.push(EnergyPrice {
                            settlement_point: settlement_point.to_string(),
                            interval_start: award.interval_start,
                            price_per_mwh: price,
                        });
                    }
                    batch.awards.push(award);
                }
                Extraction::NotStorage => file_diag.non_storage_records += 1,
                Extraction::Malformed => file_diag.malformed_records += 1,
            }
        }

        debug!(
            "{}: {} records, {} storage awards",
            path.display(),
            file_diag.records_read,
            batch.awards.len()
        );
        diag.merge(file_diag);
        Ok(batch)
    }

    /// Streams one dispatch file in fixed-size batches into a store of its
    /// own, so a file that fails halfway contributes nothing.
    fn stream_dispatch_file(
        &self,
        path: &Path,
        accumulator: &RevenueAccumulator<'_>,
    ) -> Result<(LedgerStore, RunDiagnostics), SourceError> {
        let (mut reader, extractor) = self.open(path, SchemaVariant::RealTime)?;
        let batch_size = self.config.processing.batch_size.max(1);
        let mut store = LedgerStore::new();
        let mut diag = RunDiagnostics::default();
        let mut batch = Vec::with_capacity(batch_size);

        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(SourceError::from_csv(path, e)),
                Err(_) => {
                    diag.malformed_records += 1;
                    continue;
                }
            };
            diag.records_read += 1;

            match extractor.extract(&record, &mut diag) {
                Extraction::Award(award) => batch.push(award),
                Extraction::NotStorage => diag.non_storage_records += 1,
                Extraction::Malformed => diag.malformed_records += 1,
            }

            if batch.len() >= batch_size {
                accumulator.accumulate_into(&mut store, &batch, &mut diag);
                batch.clear();
            }
        }
        accumulator.accumulate_into(&mut store, &batch, &mut diag);

        Ok((store, diag))
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
