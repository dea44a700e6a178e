use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use bess_revenue::config::PricingConfig;
use bess_revenue::models::{AsPrice, EnergyPrice};
use bess_revenue::{
    AsProduct, IntervalAward, LedgerStore, PriceBook, ResourceRecord, ResourceRegistry,
    RevenueAccumulator, RunDiagnostics, SchemaVariant,
};

const RESOURCES: usize = 50;

fn fixtures() -> (ResourceRegistry, PriceBook, Vec<IntervalAward>, Vec<IntervalAward>) {
    let pricing = PricingConfig::default();
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let registry: ResourceRegistry = (0..RESOURCES)
        .map(|i| ResourceRecord::new(format!("BESS_{i}"), format!("SP_{}", i % 10)))
        .collect();

    let mut prices = PriceBook::new(&pricing);
    for hour in 0..24 * 7 {
        let at = start + Duration::hours(hour);
        let shape = if (17..21).contains(&(hour % 24)) { 90.0 } else { 25.0 };
        prices.day_ahead.index_energy_prices(
            (0..10).map(|sp| EnergyPrice {
                settlement_point: format!("SP_{sp}"),
                interval_start: at,
                price_per_mwh: shape + sp as f64,
            }),
        );
        prices.day_ahead.index_as_prices(AsProduct::ALL.into_iter().map(|product| AsPrice {
            product,
            interval_start: at,
            price_per_mw: 6.0,
        }));
        for quarter in 0..4 {
            prices.real_time.index_energy_prices((0..10).map(|sp| EnergyPrice {
                settlement_point: format!("SP_{sp}"),
                interval_start: at + Duration::minutes(quarter * 15),
                price_per_mwh: shape * 1.1,
            }));
        }
    }

    let hourly: Vec<IntervalAward> = (0..24 * 7)
        .flat_map(|hour| {
            (0..RESOURCES).map(move |i| {
                let at = start + Duration::hours(hour);
                IntervalAward::new(format!("BESS_{i}"), SchemaVariant::DayAhead, at)
                    .with_energy(if hour % 24 < 6 { -10.0 } else { 10.0 })
                    .with_as_award(AsProduct::RegUp, 2.0)
                    .with_as_award(AsProduct::Rrs, 3.0)
            })
        })
        .collect();

    let dispatch: Vec<IntervalAward> = (0..12 * 24 * 7)
        .flat_map(|step| {
            (0..RESOURCES).map(move |i| {
                IntervalAward::new(
                    format!("BESS_{i}"),
                    SchemaVariant::RealTime,
                    start + Duration::minutes(step * 5),
                )
                .with_energy(if step % 3 == 0 { -8.0 } else { 12.0 })
            })
        })
        .collect();

    (registry, prices, hourly, dispatch)
}

fn benchmark_accumulation(c: &mut Criterion) {
    let pricing = PricingConfig::default();
    let (registry, prices, hourly, dispatch) = fixtures();
    let accumulator = RevenueAccumulator::new(&registry, &prices, &pricing);

    c.bench_function("accumulate_hourly_week", |b| {
        b.iter(|| {
            let mut diag = RunDiagnostics::default();
            black_box(accumulator.accumulate(LedgerStore::new(), &hourly, &mut diag))
        });
    });

    c.bench_function("accumulate_dispatch_week_batched", |b| {
        b.iter(|| {
            let mut diag = RunDiagnostics::default();
            let mut store = LedgerStore::new();
            for batch in dispatch.chunks(50_000) {
                accumulator.accumulate_into(&mut store, batch, &mut diag);
            }
            black_box(store)
        });
    });
}

criterion_group!(benches, benchmark_accumulation);
criterion_main!(benches);
