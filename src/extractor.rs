use csv::StringRecord;

use crate::diagnostics::RunDiagnostics;
use crate::error::SchemaError;
use crate::models::{AsPrice, IntervalAward};
use crate::schema::{BoundSchema, SchemaVariant};

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Award(IntervalAward),
    /// Not a storage resource; dropped here and never seen downstream.
    NotStorage,
    /// No resource name or no parseable granule.
    Malformed,
}

enum Field {
    Blank,
    Number(f64),
    Invalid,
}

fn read_field(raw: Option<&str>) -> Field {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Field::Blank,
    };
    if raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return Field::Blank;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Field::Number(value),
        _ => Field::Invalid,
    }
}

/// Signed quantity; blanks and garbage read as zero.
pub fn coerce_signed(raw: Option<&str>, diag: &mut RunDiagnostics) -> f64 {
    match read_field(raw) {
        Field::Number(value) => value,
        Field::Blank => 0.0,
        Field::Invalid => {
            diag.coerced_fields += 1;
            0.0
        }
    }
}

/// Capacity award; additionally a negative value is coerced to zero.
pub fn coerce_award(raw: Option<&str>, diag: &mut RunDiagnostics) -> f64 {
    match read_field(raw) {
        Field::Number(value) if value >= 0.0 => value,
        Field::Blank => 0.0,
        Field::Number(_) | Field::Invalid => {
            diag.coerced_fields += 1;
            0.0
        }
    }
}

/// Prices are never invented: a blank or unparseable price is no quote.
pub fn parse_price(raw: Option<&str>, diag: &mut RunDiagnostics) -> Option<f64> {
    match read_field(raw) {
        Field::Number(value) => Some(value),
        Field::Blank => None,
        Field::Invalid => {
            diag.coerced_fields += 1;
            None
        }
    }
}

/// Normalizes raw disclosure rows of one file into [`IntervalAward`]s.
pub struct AwardExtractor {
    schema: BoundSchema,
    storage_types: Vec<String>,
}

impl AwardExtractor {
    pub fn new(
        variant: SchemaVariant,
        headers: &StringRecord,
        storage_types: &[String],
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            schema: variant.schema().bind(headers)?,
            storage_types: storage_types.to_vec(),
        })
    }

    pub fn is_storage(&self, record: &StringRecord) -> bool {
        record
            .get(self.schema.resource_type)
            .map(str::trim)
            .map(|tag| self.storage_types.iter().any(|s| s.eq_ignore_ascii_case(tag)))
            .unwrap_or(false)
    }

    pub fn extract(&self, record: &StringRecord, diag: &mut RunDiagnostics) -> Extraction {
        if !self.is_storage(record) {
            return Extraction::NotStorage;
        }

        let resource_id = match record.get(self.schema.resource_name).map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return Extraction::Malformed,
        };
        let Some(interval_start) = self.schema.interval_start(record) else {
            return Extraction::Malformed;
        };

        let mut award = IntervalAward::new(resource_id, self.schema.variant, interval_start);

        if let Some(column) = self.schema.energy {
            award.energy_mw = coerce_signed(record.get(column), diag);
        }

        for product in &self.schema.products {
            let mw: f64 = product
                .awards
                .iter()
                .map(|&column| coerce_award(record.get(column), diag))
                .sum();
            if mw > 0.0 {
                award.as_awards.insert(product.product, mw);
            }
        }

        award.energy_price = self
            .schema
            .energy_price
            .and_then(|column| parse_price(record.get(column), diag));

        Extraction::Award(award)
    }

    /// Market clearing prices carried on a row. MCPCs are market-wide, so
    /// rows of every resource type are valid sources.
    pub fn clearing_prices(
        &self,
        record: &StringRecord,
        diag: &mut RunDiagnostics,
    ) -> Vec<AsPrice> {
        if self.schema.products.iter().all(|p| p.price.is_none()) {
            return Vec::new();
        }
        let Some(interval_start) = self.schema.interval_start(record) else {
            return Vec::new();
        };

        self.schema
            .products
            .iter()
            .filter_map(|product| {
                let column = product.price?;
                parse_price(record.get(column), diag).map(|price_per_mw| AsPrice {
                    product: product.product,
                    interval_start,
                    price_per_mw,
                })
            })
            .collect()
    }
}
