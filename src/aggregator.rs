use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::accumulator::LedgerStore;
use crate::models::RevenueLedgerEntry;
use crate::registry::ResourceRegistry;

/// A finalized ledger row: one resource over one operating year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub resource_id: String,
    pub year: i32,
    pub ledger: RevenueLedgerEntry,
    pub total_as: f64,
    pub energy_total: f64,
    pub total: f64,
    pub energy_pct: f64,
    pub as_pct: f64,
    /// Total revenue per MW of registered capacity, when capacity is known.
    pub revenue_per_mw: Option<f64>,
}

impl RevenueSummary {
    fn from_entry(
        resource_id: &str,
        year: i32,
        ledger: RevenueLedgerEntry,
        capacity_mw: Option<f64>,
    ) -> Self {
        let total = ledger.total();
        Self {
            resource_id: resource_id.to_string(),
            year,
            total_as: ledger.total_as(),
            energy_total: ledger.energy_total(),
            total,
            energy_pct: ledger.energy_pct(),
            as_pct: ledger.as_pct(),
            revenue_per_mw: capacity_mw.map(|mw| total / mw),
            ledger,
        }
    }
}

/// Drops all-zero entries and derives totals and shares.
///
/// Rows come out ordered by `(year, resource_id)`.
pub fn finalize(store: &LedgerStore, registry: &ResourceRegistry) -> Vec<RevenueSummary> {
    store
        .iter()
        .filter(|(_, entry)| entry.total() != 0.0)
        .map(|(key, entry)| {
            let capacity = registry.get(&key.resource_id).and_then(|r| r.capacity_mw);
            RevenueSummary::from_entry(&key.resource_id, key.year, entry.clone(), capacity)
        })
        .collect()
}

/// One resource summed across every period it appears in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceTotals {
    pub resource_id: String,
    pub periods: BTreeSet<i32>,
    pub ledger: RevenueLedgerEntry,
}

impl ResourceTotals {
    pub fn total(&self) -> f64 {
        self.ledger.total()
    }
}

pub fn aggregate_by_resource(rows: &[RevenueSummary]) -> BTreeMap<String, ResourceTotals> {
    let mut totals: BTreeMap<String, ResourceTotals> = BTreeMap::new();
    for row in rows {
        let entry = totals
            .entry(row.resource_id.clone())
            .or_insert_with(|| ResourceTotals {
                resource_id: row.resource_id.clone(),
                periods: BTreeSet::new(),
                ledger: RevenueLedgerEntry::default(),
            });
        entry.periods.insert(row.year);
        entry.ledger.merge(&row.ledger);
    }
    totals
}

/// Highest-earning resources across all periods, best first.
pub fn top_resources(rows: &[RevenueSummary], n: usize) -> Vec<ResourceTotals> {
    let mut ranked: Vec<ResourceTotals> = aggregate_by_resource(rows).into_values().collect();
    ranked.sort_by(|a, b| {
        b.total()
            .total_cmp(&a.total())
            .then_with(|| a.resource_id.cmp(&b.resource_id))
    });
    ranked.truncate(n);
    ranked
}

/// Market-wide totals for one year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YearTotals {
    pub year: i32,
    pub resources: usize,
    /// Resources with a positive total.
    pub active_resources: usize,
    pub dam_energy: f64,
    pub rt_energy_arbitrage: f64,
    pub total_as: f64,
    pub total: f64,
}

pub fn summarize_years(rows: &[RevenueSummary]) -> Vec<YearTotals> {
    let mut years: BTreeMap<i32, YearTotals> = BTreeMap::new();
    for row in rows {
        let totals = years.entry(row.year).or_insert_with(|| YearTotals {
            year: row.year,
            ..Default::default()
        });
        totals.resources += 1;
        if row.total > 0.0 {
            totals.active_resources += 1;
        }
        totals.dam_energy += row.ledger.dam_energy;
        totals.rt_energy_arbitrage += row.ledger.rt_energy_arbitrage;
        totals.total_as += row.total_as;
        totals.total += row.total;
    }
    years.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LedgerKey, ResourceRecord};
    use approx::assert_abs_diff_eq;

    fn store() -> LedgerStore {
        let mut store = LedgerStore::new();
        {
            let e = store.entry_mut(LedgerKey::new("B", 2024));
            e.dam_energy = 200.0;
            e.reg_up = 40.0;
            e.rt_energy_arbitrage = 30.0;
        }
        store.entry_mut(LedgerKey::new("A", 2024)).rt_energy_arbitrage = -20.0;
        store.entry_mut(LedgerKey::new("C", 2024)).rt_intervals = 12;
        store.entry_mut(LedgerKey::new("B", 2023)).non_spin = 100.0;
        store
    }

    fn registry() -> ResourceRegistry {
        vec![
            ResourceRecord::new("A", "SP1"),
            ResourceRecord::new("B", "SP2").with_capacity(10.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_finalize_drops_zero_totals_and_orders_rows() {
        let rows = finalize(&store(), &registry());
        let keys: Vec<(i32, &str)> = rows
            .iter()
            .map(|r| (r.year, r.resource_id.as_str()))
            .collect();
        assert_eq!(keys, vec![(2023, "B"), (2024, "A"), (2024, "B")]);
    }

    #[test]
    fn test_finalize_derives_shares() {
        let rows = finalize(&store(), &registry());
        let b = rows.iter().find(|r| r.year == 2024 && r.resource_id == "B").unwrap();
        assert_abs_diff_eq!(b.total, 270.0);
        assert_abs_diff_eq!(b.energy_pct + b.as_pct, 100.0, epsilon = 1e-9);
        assert_eq!(b.revenue_per_mw, Some(27.0));

        let a = rows.iter().find(|r| r.resource_id == "A").unwrap();
        assert!(a.total < 0.0);
        assert_eq!((a.energy_pct, a.as_pct), (0.0, 0.0));
        assert_eq!(a.revenue_per_mw, None);
    }

    #[test]
    fn test_aggregate_and_top_resources() {
        let rows = finalize(&store(), &registry());
        let by_resource = aggregate_by_resource(&rows);
        let b = &by_resource["B"];
        assert_eq!(b.periods.iter().copied().collect::<Vec<_>>(), vec![2023, 2024]);
        assert_abs_diff_eq!(b.total(), 370.0);

        let top = top_resources(&rows, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].resource_id, "B");
    }

    #[test]
    fn test_summarize_years() {
        let years = summarize_years(&finalize(&store(), &registry()));
        assert_eq!(years.len(), 2);
        assert_eq!(years[1].year, 2024);
        assert_eq!(years[1].resources, 2);
        assert_eq!(years[1].active_resources, 1);
        assert_abs_diff_eq!(years[1].total, 250.0);
        assert_abs_diff_eq!(years[0].total_as, 100.0);
    }
}
