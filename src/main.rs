use anyhow::{Context, Result};
use bess_revenue::report::{format_diagnostics, format_top_resources, format_year_summary};
use bess_revenue::{compute_revenues, OutputFormat, RevenueConfig, SourceCatalog};
use clap::Parser;
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "bess_revenue")]
#[command(about = "Compute per-resource BESS revenue ledgers from ERCOT 60-day disclosure data")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resource registry CSV
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Directory of 60-day DAM Gen Resource Data CSVs
    #[arg(long)]
    dam_dir: Option<PathBuf>,

    /// Directory of 60-day SCED Gen Resource Data CSVs
    #[arg(long)]
    sced_dir: Option<PathBuf>,

    /// Directory of 60-day SASM AS Offer Awards CSVs
    #[arg(long)]
    sasm_dir: Option<PathBuf>,

    /// Directory of real-time settlement point price tables
    #[arg(long)]
    price_dir: Option<PathBuf>,

    /// Operating years, comma separated (default: every year found)
    #[arg(short, long, value_delimiter = ',')]
    years: Vec<i32>,

    /// Output path without extension
    #[arg(short, long, default_value = "bess_analysis/bess_annual_revenues")]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "both")]
    format: OutputFormat,

    /// $/MWh for dispatch intervals with no real-time price
    #[arg(long)]
    fallback_price: Option<f64>,

    /// Worker threads (default: all cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Number of resources in the top earners table (0 to disable)
    #[arg(long, default_value = "10")]
    top: usize,

    /// Write the full run report as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Hide progress bars and info logging
    #[arg(short, long)]
    quiet: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<RevenueConfig> {
    let mut config = match &args.config {
        Some(path) => RevenueConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RevenueConfig::default(),
    };

    let sources = &mut config.sources;
    if let Some(registry) = &args.registry {
        sources.registry = registry.clone();
    }
    for (dir, flag) in [
        (&mut sources.dam_dir, &args.dam_dir),
        (&mut sources.sced_dir, &args.sced_dir),
        (&mut sources.sasm_dir, &args.sasm_dir),
        (&mut sources.price_dir, &args.price_dir),
    ] {
        if flag.is_some() {
            *dir = flag.clone();
        }
    }
    if let Some(price) = args.fallback_price {
        config.pricing.fallback_energy_price = price;
    }
    if args.threads.is_some() {
        config.processing.threads = args.threads;
    }
    if args.quiet {
        config.processing.show_progress = false;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<u8> {
    let config = load_config(&args)?;

    let threads = config.processing.threads.unwrap_or_else(num_cpus::get);
    if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        warn!("Could not size the worker pool: {}", e);
    }

    let periods: BTreeSet<i32> = if args.years.is_empty() {
        SourceCatalog::discover(&config.sources).available_years()
    } else {
        args.years.iter().copied().collect()
    };
    if periods.is_empty() {
        warn!("No operating years given and none found in disclosure file names");
        return Ok(1);
    }
    info!("Processing years {:?} on {} threads", periods, threads);

    let report = compute_revenues(&periods, &config, &args.output, args.format)?;

    if !report.summaries.is_empty() {
        println!("\n{}", format_year_summary(&report.summaries));
        if args.top > 0 {
            println!("{}", format_top_resources(&report.summaries, args.top));
        }
    }
    let diagnostics = format_diagnostics(&report.diagnostics);
    if !diagnostics.is_empty() {
        println!("Run diagnostics ({} warnings):\n{}", report.warning_count(), diagnostics);
    }
    for path in &report.outputs {
        println!("Saved {}", path.display());
    }

    if let Some(path) = &args.report_json {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Run report written to {}", path.display());
    }

    Ok(report.exit_code())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
