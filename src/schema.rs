//! Column layouts of the disclosure report families.
//!
//! Each [`SchemaVariant`] declares, as data, which columns identify the
//! resource and the granule, which column carries the energy quantity, and
//! which award columns feed each AS product. Several award columns listed for
//! one product are summed into a single award.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::collections::HashMap;

use crate::error::SchemaError;
use crate::models::AsProduct;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaVariant {
    /// Day-ahead market hourly awards (60-day DAM Gen Resource Data).
    DayAhead,
    /// SCED base points, one row per resource per dispatch run.
    RealTime,
    /// Supplemental AS market awards (60-day SASM AS Offer Awards).
    Supplemental,
}

#[derive(Debug)]
pub enum TimeColumns {
    HourEnding { date: &'static str, hour: &'static str },
    Timestamp { column: &'static str },
}

#[derive(Debug)]
pub struct ProductColumns {
    pub product: AsProduct,
    pub awards: &'static [&'static str],
    pub price: &'static str,
}

#[derive(Debug)]
pub struct SourceSchema {
    pub variant: SchemaVariant,
    pub file_pattern: &'static str,
    pub resource_name: &'static str,
    pub resource_type: &'static str,
    pub time: TimeColumns,
    pub energy: Option<&'static str>,
    pub energy_price: Option<&'static str>,
    pub products: &'static [ProductColumns],
}

const RRS_TIERS: &[&str] = &["RRSPFR Awarded", "RRSFFR Awarded", "RRSUFR Awarded"];

static DAY_AHEAD: SourceSchema = SourceSchema {
    variant: SchemaVariant::DayAhead,
    file_pattern: "*DAM_Gen_Resource_Data*.csv",
    resource_name: "Resource Name",
    resource_type: "Resource Type",
    time: TimeColumns::HourEnding {
        date: "Delivery Date",
        hour: "Hour Ending",
    },
    energy: Some("Awarded Quantity"),
    energy_price: Some("Energy Settlement Point Price"),
    products: &[
        ProductColumns {
            product: AsProduct::RegUp,
            awards: &["RegUp Awarded"],
            price: "RegUp MCPC",
        },
        ProductColumns {
            product: AsProduct::RegDown,
            awards: &["RegDown Awarded"],
            price: "RegDown MCPC",
        },
        ProductColumns {
            product: AsProduct::Rrs,
            awards: RRS_TIERS,
            price: "RRS MCPC",
        },
        ProductColumns {
            product: AsProduct::Ecrs,
            awards: &["ECRSSD Awarded"],
            price: "ECRS MCPC",
        },
        ProductColumns {
            product: AsProduct::NonSpin,
            awards: &["NonSpin Awarded"],
            price: "NonSpin MCPC",
        },
    ],
};

// AS capacity is settled in the day-ahead and supplemental markets only;
// SCED rows carry energy dispatch and nothing else is read from them.
static REAL_TIME: SourceSchema = SourceSchema {
    variant: SchemaVariant::RealTime,
    file_pattern: "*SCED_Gen_Resource_Data*.csv",
    resource_name: "Resource Name",
    resource_type: "Resource Type",
    time: TimeColumns::Timestamp {
        column: "SCED Time Stamp",
    },
    energy: Some("Base Point"),
    energy_price: None,
    products: &[],
};

static SUPPLEMENTAL: SourceSchema = SourceSchema {
    variant: SchemaVariant::Supplemental,
    file_pattern: "*Generation_Resource_AS_Offer_Awards*.csv",
    resource_name: "Resource Name",
    resource_type: "Resource Type",
    time: TimeColumns::HourEnding {
        date: "Delivery Date",
        hour: "Hour Ending",
    },
    energy: None,
    energy_price: None,
    products: &[
        ProductColumns {
            product: AsProduct::RegUp,
            awards: &["REGUP Awarded"],
            price: "REGUP MCPC",
        },
        ProductColumns {
            product: AsProduct::RegDown,
            awards: &["REGDN Awarded"],
            price: "REGDN MCPC",
        },
        ProductColumns {
            product: AsProduct::Rrs,
            awards: RRS_TIERS,
            price: "RRS MCPC",
        },
        ProductColumns {
            product: AsProduct::Ecrs,
            awards: &["ECRSS Awarded"],
            price: "ECRS MCPC",
        },
        ProductColumns {
            product: AsProduct::NonSpin,
            awards: &["NSPIN Awarded"],
            price: "NSPIN MCPC",
        },
    ],
};

impl SchemaVariant {
    pub fn schema(self) -> &'static SourceSchema {
        match self {
            SchemaVariant::DayAhead => &DAY_AHEAD,
            SchemaVariant::RealTime => &REAL_TIME,
            SchemaVariant::Supplemental => &SUPPLEMENTAL,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SchemaVariant::DayAhead => "DAM",
            SchemaVariant::RealTime => "SCED",
            SchemaVariant::Supplemental => "SASM",
        }
    }
}

/// Header name -> column position for one file.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim_start_matches('\u{feff}').trim().to_string(), idx))
            .collect();
        Self { positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<usize, SchemaError> {
        self.position(name).ok_or_else(|| SchemaError(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BoundTime {
    HourEnding { date: usize, hour: usize },
    Timestamp { column: usize },
}

#[derive(Debug, Clone)]
pub struct BoundProduct {
    pub product: AsProduct,
    pub awards: Vec<usize>,
    pub price: Option<usize>,
}

/// A schema resolved against one file's header row.
#[derive(Debug, Clone)]
pub struct BoundSchema {
    pub variant: SchemaVariant,
    pub resource_name: usize,
    pub resource_type: usize,
    pub time: BoundTime,
    pub energy: Option<usize>,
    pub energy_price: Option<usize>,
    pub products: Vec<BoundProduct>,
}

impl SourceSchema {
    /// Identity, time and energy columns are required; award and price
    /// columns are optional since older files predate some products.
    pub fn bind(&self, headers: &StringRecord) -> Result<BoundSchema, SchemaError> {
        let index = HeaderIndex::new(headers);

        let time = match self.time {
            TimeColumns::HourEnding { date, hour } => BoundTime::HourEnding {
                date: index.require(date)?,
                hour: index.require(hour)?,
            },
            TimeColumns::Timestamp { column } => BoundTime::Timestamp {
                column: index.require(column)?,
            },
        };

        let energy = self.energy.map(|name| index.require(name)).transpose()?;

        let products = self
            .products
            .iter()
            .filter_map(|columns| {
                let awards: Vec<usize> = columns
                    .awards
                    .iter()
                    .filter_map(|name| index.position(name))
                    .collect();
                let price = index.position(columns.price);
                if awards.is_empty() && price.is_none() {
                    None
                } else {
                    Some(BoundProduct {
                        product: columns.product,
                        awards,
                        price,
                    })
                }
            })
            .collect();

        Ok(BoundSchema {
            variant: self.variant,
            resource_name: index.require(self.resource_name)?,
            resource_type: index.require(self.resource_type)?,
            time,
            energy,
            energy_price: self.energy_price.and_then(|name| index.position(name)),
            products,
        })
    }
}

impl BoundSchema {
    pub fn interval_start(&self, record: &StringRecord) -> Option<NaiveDateTime> {
        match self.time {
            BoundTime::HourEnding { date, hour } => {
                let date = parse_delivery_date(record.get(date)?)?;
                let hour_ending = parse_hour_ending(record.get(hour)?)?;
                hour_ending_start(date, hour_ending)
            }
            BoundTime::Timestamp { column } => parse_sced_timestamp(record.get(column)?),
        }
    }
}

pub fn parse_delivery_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Accepts `7`, `07`, `07:00` and `7.0`; only 1..=24 is valid.
pub fn parse_hour_ending(raw: &str) -> Option<u32> {
    let hour = raw.trim().split(':').next()?.trim();
    let hour_ending = match hour.parse::<u32>() {
        Ok(h) => h,
        Err(_) => {
            let h = hour.parse::<f64>().ok()?;
            if h.fract() != 0.0 || h < 0.0 {
                return None;
            }
            h as u32
        }
    };
    (1..=24).contains(&hour_ending).then_some(hour_ending)
}

/// Hour ending `he` covers `[he - 1, he)`; HE24 starts at 23:00 the same day.
pub fn hour_ending_start(date: NaiveDate, hour_ending: u32) -> Option<NaiveDateTime> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(midnight + Duration::hours(i64::from(hour_ending) - 1))
}

pub fn parse_sced_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
