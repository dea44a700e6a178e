use std::collections::BTreeMap;

use crate::config::PricingConfig;
use crate::diagnostics::RunDiagnostics;
use crate::models::{IntervalAward, LedgerKey, RevenueLedgerEntry};
use crate::price_index::PriceIndex;
use crate::registry::ResourceRegistry;
use crate::schema::SchemaVariant;

/// One price index per market. Day-ahead and supplemental MCPCs clear in
/// different auctions and are never mixed.
#[derive(Debug, Clone)]
pub struct PriceBook {
    pub day_ahead: PriceIndex,
    pub real_time: PriceIndex,
    pub supplemental: PriceIndex,
}

impl PriceBook {
    pub fn new(pricing: &PricingConfig) -> Self {
        Self {
            day_ahead: PriceIndex::hourly(),
            real_time: PriceIndex::new(pricing.rt_price_interval_minutes),
            supplemental: PriceIndex::hourly(),
        }
    }

    pub fn for_variant(&self, variant: SchemaVariant) -> &PriceIndex {
        match variant {
            SchemaVariant::DayAhead => &self.day_ahead,
            SchemaVariant::RealTime => &self.real_time,
            SchemaVariant::Supplemental => &self.supplemental,
        }
    }

    pub fn for_variant_mut(&mut self, variant: SchemaVariant) -> &mut PriceIndex {
        match variant {
            SchemaVariant::DayAhead => &mut self.day_ahead,
            SchemaVariant::RealTime => &mut self.real_time,
            SchemaVariant::Supplemental => &mut self.supplemental,
        }
    }

    pub fn superseded_total(&self) -> u64 {
        self.day_ahead.superseded() + self.real_time.superseded() + self.supplemental.superseded()
    }
}

/// Revenue entries keyed by `(year, resource_id)`.
///
/// A store belongs to exactly one worker while it is being filled; stores of
/// independent periods are combined with [`LedgerStore::merge`]. Entries are
/// created on a resource's first award rather than up front for every
/// registered resource; an entry that never earns is dropped at finalization
/// either way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerStore {
    entries: BTreeMap<LedgerKey, RevenueLedgerEntry>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_mut(&mut self, key: LedgerKey) -> &mut RevenueLedgerEntry {
        self.entries.entry(key).or_default()
    }

    pub fn get(&self, resource_id: &str, year: i32) -> Option<&RevenueLedgerEntry> {
        self.entries.get(&LedgerKey::new(resource_id, year))
    }

    pub fn merge(&mut self, other: LedgerStore) {
        for (key, entry) in other.entries {
            self.entry_mut(key).merge(&entry);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LedgerKey, &RevenueLedgerEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Prices awards against a [`PriceBook`] and adds the proceeds to a
/// [`LedgerStore`].
///
/// Every update is an addition, so awards may arrive in any order and in
/// any chunking. Awards of resources missing from the registry are counted
/// and skipped.
pub struct RevenueAccumulator<'a> {
    registry: &'a ResourceRegistry,
    prices: &'a PriceBook,
    dispatch_hours: f64,
    fallback_price: f64,
    period: Option<i32>,
}

impl<'a> RevenueAccumulator<'a> {
    pub fn new(
        registry: &'a ResourceRegistry,
        prices: &'a PriceBook,
        pricing: &PricingConfig,
    ) -> Self {
        Self {
            registry,
            prices,
            dispatch_hours: pricing.dispatch_interval_hours(),
            fallback_price: pricing.fallback_energy_price,
            period: None,
        }
    }

    /// Only awards whose granule falls in `year` are applied.
    pub fn restricted_to(mut self, year: i32) -> Self {
        self.period = Some(year);
        self
    }

    pub fn accumulate(
        &self,
        mut store: LedgerStore,
        awards: &[IntervalAward],
        diag: &mut RunDiagnostics,
    ) -> LedgerStore {
        self.accumulate_into(&mut store, awards, diag);
        store
    }

    pub fn accumulate_into(
        &self,
        store: &mut LedgerStore,
        awards: &[IntervalAward],
        diag: &mut RunDiagnostics,
    ) {
        for award in awards {
            let year = award.year();
            if self.period.is_some_and(|period| period != year) {
                diag.out_of_period_records += 1;
                continue;
            }
            let Some(resource) = self.registry.get(&award.resource_id) else {
                diag.unknown_resources += 1;
                continue;
            };

            let entry = store.entry_mut(LedgerKey::new(award.resource_id.as_str(), year));
            let settlement_point = resource.settlement_point.as_str();
            let index = self.prices.for_variant(award.variant);

            match award.variant {
                SchemaVariant::DayAhead => {
                    if award.energy_mw != 0.0 {
                        // The row's own price settles the award; the index only
                        // covers rows that left it blank.
                        let price = award
                            .energy_price
                            .or_else(|| index.lookup_energy(settlement_point, award.interval_start))
                            .unwrap_or_else(|| {
                                diag.energy_price_fallbacks += 1;
                                self.fallback_price
                            });
                        entry.dam_energy += award.energy_mw * price;
                    }
                    apply_capacity(entry, award, index, diag);
                    entry.dam_hours += 1;
                }
                SchemaVariant::Supplemental => apply_capacity(entry, award, index, diag),
                SchemaVariant::RealTime => {
                    let mwh = award.energy_mw * self.dispatch_hours;
                    if mwh != 0.0 {
                        let quoted = index.lookup_energy(settlement_point, award.interval_start);
                        let price = match quoted {
                            Some(price) => price,
                            None => {
                                entry.fallback_intervals += 1;
                                diag.energy_price_fallbacks += 1;
                                self.fallback_price
                            }
                        };
                        entry.rt_energy_arbitrage += mwh * price;
                    }
                    if mwh > 0.0 {
                        entry.discharge_mwh += mwh;
                    } else if mwh < 0.0 {
                        entry.charge_mwh -= mwh;
                    }
                    entry.rt_intervals += 1;
                }
            }
        }
    }
}

fn apply_capacity(
    entry: &mut RevenueLedgerEntry,
    award: &IntervalAward,
    index: &PriceIndex,
    diag: &mut RunDiagnostics,
) {
    for (&product, &mw) in &award.as_awards {
        if mw <= 0.0 {
            continue;
        }
        match index.lookup_as(product, award.interval_start) {
            Some(price) => *entry.component_mut(product) += mw * price,
            None => diag.missing_as_prices += 1,
        }
    }
}
