use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::SchemaVariant;

/// Ancillary-service products paid as capacity (awarded MW x MCPC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AsProduct {
    RegUp,
    RegDown,
    /// Responsive reserve, all response-speed tiers combined.
    Rrs,
    Ecrs,
    NonSpin,
}

impl AsProduct {
    pub const ALL: [AsProduct; 5] = [
        AsProduct::RegUp,
        AsProduct::RegDown,
        AsProduct::Rrs,
        AsProduct::Ecrs,
        AsProduct::NonSpin,
    ];

}

/// A storage resource known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub resource_id: String,
    pub settlement_point: String,
    pub resource_type: Option<String>,
    pub capacity_mw: Option<f64>,
    pub qse: Option<String>,
}

impl ResourceRecord {
    pub fn new(resource_id: impl Into<String>, settlement_point: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            settlement_point: settlement_point.into(),
            resource_type: None,
            capacity_mw: None,
            qse: None,
        }
    }

    pub fn with_capacity(mut self, capacity_mw: f64) -> Self {
        self.capacity_mw = Some(capacity_mw);
        self
    }
}

/// One resource's award or dispatch instruction for one granule.
///
/// `energy_mw` is signed: positive injects (discharge), negative withdraws
/// (charge). AS awards are capacity commitments and never negative.
/// `energy_price` is the settlement price printed on the award's own row,
/// when the report carries one.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalAward {
    pub resource_id: String,
    pub variant: SchemaVariant,
    pub interval_start: NaiveDateTime,
    pub energy_mw: f64,
    pub energy_price: Option<f64>,
    pub as_awards: BTreeMap<AsProduct, f64>,
}

impl IntervalAward {
    pub fn new(
        resource_id: impl Into<String>,
        variant: SchemaVariant,
        interval_start: NaiveDateTime,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            variant,
            interval_start,
            energy_mw: 0.0,
            energy_price: None,
            as_awards: BTreeMap::new(),
        }
    }

    pub fn with_energy(mut self, energy_mw: f64) -> Self {
        self.energy_mw = energy_mw;
        self
    }

    pub fn with_energy_price(mut self, price_per_mwh: f64) -> Self {
        self.energy_price = Some(price_per_mwh);
        self
    }

    pub fn with_as_award(mut self, product: AsProduct, mw: f64) -> Self {
        *self.as_awards.entry(product).or_insert(0.0) += mw;
        self
    }

    /// Operating year the granule belongs to.
    pub fn year(&self) -> i32 {
        self.interval_start.year()
    }

    pub fn as_award(&self, product: AsProduct) -> f64 {
        self.as_awards.get(&product).copied().unwrap_or(0.0)
    }
}

/// Clearing price of energy at a settlement point for one granule.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyPrice {
    pub settlement_point: String,
    pub interval_start: NaiveDateTime,
    pub price_per_mwh: f64,
}

/// Market-wide clearing price of an AS product for one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct AsPrice {
    pub product: AsProduct,
    pub interval_start: NaiveDateTime,
    pub price_per_mw: f64,
}

/// Ledger rows are keyed by operating year first so that iteration order is
/// `(period, resource_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub year: i32,
    pub resource_id: String,
}

impl LedgerKey {
    pub fn new(resource_id: impl Into<String>, year: i32) -> Self {
        Self {
            year,
            resource_id: resource_id.into(),
        }
    }
}

/// Accumulated revenue for one resource over one period.
///
/// Only additive updates are applied during accumulation; totals and shares
/// are derived on demand and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueLedgerEntry {
    pub dam_energy: f64,
    pub rt_energy_arbitrage: f64,
    pub reg_up: f64,
    pub reg_down: f64,
    pub rrs: f64,
    pub ecrs: f64,
    pub non_spin: f64,

    // Auxiliary tallies
    pub discharge_mwh: f64,
    pub charge_mwh: f64,
    pub dam_hours: u64,
    pub rt_intervals: u64,
    pub fallback_intervals: u64,
}

impl RevenueLedgerEntry {
    pub fn component_mut(&mut self, product: AsProduct) -> &mut f64 {
        match product {
            AsProduct::RegUp => &mut self.reg_up,
            AsProduct::RegDown => &mut self.reg_down,
            AsProduct::Rrs => &mut self.rrs,
            AsProduct::Ecrs => &mut self.ecrs,
            AsProduct::NonSpin => &mut self.non_spin,
        }
    }

    pub fn total_as(&self) -> f64 {
        self.reg_up + self.reg_down + self.rrs + self.ecrs + self.non_spin
    }

    pub fn energy_total(&self) -> f64 {
        self.dam_energy + self.rt_energy_arbitrage
    }

    pub fn total(&self) -> f64 {
        self.energy_total() + self.total_as()
    }

    /// Energy share of the total in percent; 0 when the total is not positive.
    pub fn energy_pct(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.energy_total() / total * 100.0
        } else {
            0.0
        }
    }

    /// AS share of the total in percent; 0 when the total is not positive.
    pub fn as_pct(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.total_as() / total * 100.0
        } else {
            0.0
        }
    }

    pub fn merge(&mut self, other: &RevenueLedgerEntry) {
        self.dam_energy += other.dam_energy;
        self.rt_energy_arbitrage += other.rt_energy_arbitrage;
        self.reg_up += other.reg_up;
        self.reg_down += other.reg_down;
        self.rrs += other.rrs;
        self.ecrs += other.ecrs;
        self.non_spin += other.non_spin;
        self.discharge_mwh += other.discharge_mwh;
        self.charge_mwh += other.charge_mwh;
        self.dam_hours += other.dam_hours;
        self.rt_intervals += other.rt_intervals;
        self.fallback_intervals += other.fallback_intervals;
    }
}
