use chrono::{NaiveDateTime, Timelike};
use std::collections::HashMap;

use crate::models::{AsPrice, AsProduct, EnergyPrice};

/// Clearing-price lookup tables for one market over one processing period.
///
/// Quotes are keyed by the start of the index granule. Lookups floor the
/// requested time to that granule, so a 5-minute dispatch at 10:10 resolves
/// against the 10:00 quote of a 15-minute index.
///
/// When the same key is quoted more than once the latest quote wins:
/// disclosure corrections supersede earlier snapshots. Replacements that
/// change the value are counted in [`PriceIndex::superseded`].
#[derive(Debug, Clone)]
pub struct PriceIndex {
    granule_minutes: u32,
    energy: HashMap<String, HashMap<NaiveDateTime, f64>>,
    ancillary: HashMap<(AsProduct, NaiveDateTime), f64>,
    superseded: u64,
}

impl PriceIndex {
    /// `granule_minutes` must divide a day evenly.
    pub fn new(granule_minutes: u32) -> Self {
        Self {
            granule_minutes: granule_minutes.max(1),
            energy: HashMap::new(),
            ancillary: HashMap::new(),
            superseded: 0,
        }
    }

    pub fn hourly() -> Self {
        Self::new(60)
    }

    fn align(&self, at: NaiveDateTime) -> NaiveDateTime {
        let minute_of_day = at.hour() * 60 + at.minute();
        let floored = minute_of_day - minute_of_day % self.granule_minutes;
        at.date()
            .and_hms_opt(floored / 60, floored % 60, 0)
            .unwrap_or(at)
    }

    fn track(&mut self, previous: Option<f64>, price: f64) {
        if matches!(previous, Some(old) if old != price) {
            self.superseded += 1;
        }
    }

    pub fn index_energy_prices(&mut self, records: impl IntoIterator<Item = EnergyPrice>) {
        for record in records {
            let key = self.align(record.interval_start);
            let previous = self
                .energy
                .entry(record.settlement_point)
                .or_default()
                .insert(key, record.price_per_mwh);
            self.track(previous, record.price_per_mwh);
        }
    }

    pub fn index_as_prices(&mut self, records: impl IntoIterator<Item = AsPrice>) {
        for record in records {
            let key = (record.product, self.align(record.interval_start));
            let previous = self.ancillary.insert(key, record.price_per_mw);
            self.track(previous, record.price_per_mw);
        }
    }

    pub fn lookup_energy(&self, settlement_point: &str, at: NaiveDateTime) -> Option<f64> {
        self.energy
            .get(settlement_point)?
            .get(&self.align(at))
            .copied()
    }

    pub fn lookup_as(&self, product: AsProduct, at: NaiveDateTime) -> Option<f64> {
        self.ancillary.get(&(product, self.align(at))).copied()
    }

    pub fn energy_len(&self) -> usize {
        self.energy.values().map(HashMap::len).sum()
    }

    pub fn as_len(&self) -> usize {
        self.ancillary.len()
    }

    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}
