#![allow(dead_code)]

use bess_revenue::{compute_revenues, OutputFormat, RevenueConfig, RevenueError, RunReport};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const DAM_HEADER: &str = "Delivery Date,Hour Ending,Resource Name,Resource Type,\
Awarded Quantity,Energy Settlement Point Price,RegUp Awarded,RegUp MCPC,RegDown Awarded,\
RegDown MCPC,RRSPFR Awarded,RRSFFR Awarded,RRSUFR Awarded,RRS MCPC,ECRSSD Awarded,ECRS MCPC,\
NonSpin Awarded,NonSpin MCPC";

pub const SASM_HEADER: &str = "Delivery Date,Hour Ending,Resource Name,Resource Type,\
REGUP Awarded,REGUP MCPC,REGDN Awarded,REGDN MCPC,RRSPFR Awarded,RRSFFR Awarded,RRSUFR Awarded,\
RRS MCPC,ECRSS Awarded,ECRS MCPC,NSPIN Awarded,NSPIN MCPC";

pub const SCED_HEADER: &str = "SCED Time Stamp,Resource Name,Resource Type,Base Point";

pub const PRICE_HEADER: &str =
    "DeliveryDate,DeliveryHour,DeliveryInterval,SettlementPointName,SettlementPointPrice";

/// A throwaway disclosure tree: registry plus dam/, sced/, sasm/ and prices/.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for sub in ["dam", "sced", "sasm", "prices", "out"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, header: &str, rows: &[&str]) -> PathBuf {
        let path = self.path(relative);
        let mut contents = String::from(header);
        contents.push('\n');
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn write_registry(&self, rows: &[&str]) -> PathBuf {
        self.write(
            "registry.csv",
            "Resource_Name,Settlement_Point,Max_Capacity_MW,Resource_Type",
            rows,
        )
    }

    pub fn config(&self) -> RevenueConfig {
        let mut config = RevenueConfig::default();
        config.sources.registry = self.path("registry.csv");
        config.sources.dam_dir = Some(self.path("dam"));
        config.sources.sced_dir = Some(self.path("sced"));
        config.sources.sasm_dir = Some(self.path("sasm"));
        config.sources.price_dir = Some(self.path("prices"));
        config.processing.show_progress = false;
        config
    }

    pub fn output_stem(&self) -> PathBuf {
        self.path("out/bess_annual_revenues")
    }

    pub fn run(&self, periods: &[i32], format: OutputFormat) -> Result<RunReport, RevenueError> {
        let periods: BTreeSet<i32> = periods.iter().copied().collect();
        compute_revenues(&periods, &self.config(), &self.output_stem(), format)
    }
}

/// One DAM row with only energy and RegUp populated.
#[allow(clippy::too_many_arguments)]
pub fn dam_row(
    date: &str,
    hour: u32,
    resource: &str,
    kind: &str,
    mw: f64,
    price: f64,
    regup: f64,
    regup_mcpc: f64,
) -> String {
    format!("{date},{hour},{resource},{kind},{mw},{price},{regup},{regup_mcpc},,,,,,,,,,")
}

/// One SASM row with RegUp and the three RRS tiers populated.
pub fn sasm_row(
    date: &str,
    hour: u32,
    resource: &str,
    regup: (f64, f64),
    rrs_tiers: [f64; 3],
    rrs_mcpc: f64,
) -> String {
    let [pfr, ffr, ufr] = rrs_tiers;
    format!(
        "{date},{hour},{resource},PWRSTR,{},{},,,{pfr},{ffr},{ufr},{rrs_mcpc},,,,",
        regup.0, regup.1
    )
}
