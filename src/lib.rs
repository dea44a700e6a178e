pub mod accumulator;
pub mod aggregator;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extractor;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod price_index;
pub mod price_table;
pub mod registry;
pub mod report;
pub mod schema;
pub mod sources;

pub use accumulator::{LedgerStore, PriceBook, RevenueAccumulator};
pub use aggregator::{
    aggregate_by_resource, finalize, top_resources, ResourceTotals, RevenueSummary,
};
pub use config::RevenueConfig;
pub use diagnostics::RunDiagnostics;
pub use error::{RegistryLoadError, RevenueError, SourceError};
pub use extractor::AwardExtractor;
pub use models::{AsProduct, IntervalAward, LedgerKey, ResourceRecord, RevenueLedgerEntry};
pub use output::{write_ledger, OutputFormat};
pub use pipeline::{compute_revenues, RunReport};
pub use price_index::PriceIndex;
pub use registry::ResourceRegistry;
pub use schema::SchemaVariant;
pub use sources::SourceCatalog;
