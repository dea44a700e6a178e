use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::RegistryLoadError;
use crate::models::ResourceRecord;
use crate::schema::HeaderIndex;

/// Storage resources tracked by the run, keyed by resource name.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, ResourceRecord>,
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ResourceRegistry {
    /// Load the master list CSV. Requires `Resource_Name` and
    /// `Settlement_Point`; `Max_Capacity_MW`, `QSE` and `Resource_Type` are
    /// read when present.
    pub fn load(path: &Path, storage_types: &[String]) -> Result<Self, RegistryLoadError> {
        let file = File::open(path).map_err(|source| RegistryLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, path, storage_types)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        origin: &Path,
        storage_types: &[String],
    ) -> Result<Self, RegistryLoadError> {
        let path = || origin.to_path_buf();
        let csv_err = |source| RegistryLoadError::Csv { path: path(), source };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let index = HeaderIndex::new(reader.headers().map_err(csv_err)?);

        let required = |column: &'static str| {
            index
                .position(column)
                .ok_or_else(|| RegistryLoadError::MissingColumn { path: path(), column })
        };
        let name_col = required("Resource_Name")?;
        let point_col = required("Settlement_Point")?;
        let capacity_col = index.position("Max_Capacity_MW");
        let qse_col = index.position("QSE");
        let type_col = index.position("Resource_Type");

        let mut registry = Self::default();
        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(csv_err)?;
            // header is line 1
            let line = row as u64 + 2;

            let resource_type = type_col.and_then(|col| optional_text(record.get(col)));
            if type_col.is_some() {
                let is_storage = resource_type
                    .as_deref()
                    .map(|tag| storage_types.iter().any(|s| s.eq_ignore_ascii_case(tag)))
                    .unwrap_or(false);
                if !is_storage {
                    continue;
                }
            }

            let resource_id = optional_text(record.get(name_col)).ok_or_else(|| {
                RegistryLoadError::EmptyField {
                    path: path(),
                    column: "Resource_Name",
                    line,
                }
            })?;
            let settlement_point = optional_text(record.get(point_col)).ok_or_else(|| {
                RegistryLoadError::EmptyField {
                    path: path(),
                    column: "Settlement_Point",
                    line,
                }
            })?;

            let resource = ResourceRecord {
                resource_id,
                settlement_point,
                resource_type,
                capacity_mw: capacity_col
                    .and_then(|col| record.get(col))
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|mw| mw.is_finite() && *mw > 0.0),
                qse: qse_col.and_then(|col| optional_text(record.get(col))),
            };

            if let Some(previous) = registry.add_resource(resource) {
                return Err(RegistryLoadError::DuplicateResource {
                    path: path(),
                    resource_id: previous.resource_id,
                });
            }
        }

        if registry.is_empty() {
            return Err(RegistryLoadError::Empty { path: path() });
        }
        Ok(registry)
    }

    /// Inserts a resource, returning the record it replaced.
    pub fn add_resource(&mut self, resource: ResourceRecord) -> Option<ResourceRecord> {
        self.resources.insert(resource.resource_id.clone(), resource)
    }

    pub fn get(&self, resource_id: &str) -> Option<&ResourceRecord> {
        self.resources.get(resource_id)
    }

    pub fn settlement_point(&self, resource_id: &str) -> Option<&str> {
        self.resources
            .get(resource_id)
            .map(|r| r.settlement_point.as_str())
    }

    pub fn settlement_points(&self) -> HashSet<String> {
        self.resources
            .values()
            .map(|r| r.settlement_point.clone())
            .collect()
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.resources.contains_key(resource_id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.resources.values()
    }
}

impl FromIterator<ResourceRecord> for ResourceRegistry {
    fn from_iter<I: IntoIterator<Item = ResourceRecord>>(iter: I) -> Self {
        let mut registry = Self::default();
        for resource in iter {
            registry.add_resource(resource);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> Vec<String> {
        vec!["PWRSTR".to_string()]
    }

    fn load(csv: &str) -> Result<ResourceRegistry, RegistryLoadError> {
        ResourceRegistry::from_reader(csv.as_bytes(), Path::new("registry.csv"), &storage())
    }

    #[test]
    fn test_load_minimal_registry() {
        let registry = load("Resource_Name,Settlement_Point\nBESS_A,SP1\nBESS_B,SP2\n").unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.settlement_point("BESS_A"), Some("SP1"));
        assert_eq!(registry.settlement_point("GAS_1"), None);
        assert!(registry.get("BESS_B").unwrap().capacity_mw.is_none());
    }

    #[test]
    fn test_optional_columns_and_type_filter() {
        let registry = load(
            "Resource_Name,Settlement_Point,Max_Capacity_MW,QSE,Resource_Type\n\
             BESS_A,SP1,100,QALPHA,PWRSTR\n\
             SOLAR_1,SP9,250,QALPHA,PVGR\n\
             BESS_B,SP2,,,pwrstr\n",
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(!registry.contains("SOLAR_1"));
        let a = registry.get("BESS_A").unwrap();
        assert_eq!(a.capacity_mw, Some(100.0));
        assert_eq!(a.qse.as_deref(), Some("QALPHA"));
        let b = registry.get("BESS_B").unwrap();
        assert_eq!(b.capacity_mw, None);
        assert_eq!(b.qse, None);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let err = load("Resource_Name,Node\nBESS_A,SP1\n").unwrap_err();
        assert!(matches!(
            err,
            RegistryLoadError::MissingColumn { column: "Settlement_Point", .. }
        ));
    }

    #[test]
    fn test_duplicates_and_blank_fields_are_fatal() {
        let err = load("Resource_Name,Settlement_Point\nBESS_A,SP1\nBESS_A,SP2\n").unwrap_err();
        assert!(matches!(
            err,
            RegistryLoadError::DuplicateResource { ref resource_id, .. } if resource_id == "BESS_A"
        ));

        let err = load("Resource_Name,Settlement_Point\nBESS_A,SP1\nBESS_B,\n").unwrap_err();
        assert!(matches!(err, RegistryLoadError::EmptyField { line: 3, .. }));
    }

    #[test]
    fn test_empty_registry_is_fatal() {
        assert!(matches!(
            load("Resource_Name,Settlement_Point\n").unwrap_err(),
            RegistryLoadError::Empty { .. }
        ));
    }

    #[test]
    fn test_from_iterator() {
        let registry: ResourceRegistry = vec![
            ResourceRecord::new("BESS_A", "SP1").with_capacity(50.0),
            ResourceRecord::new("BESS_B", "SP1"),
        ]
        .into_iter()
        .collect();
        assert_eq!(registry.settlement_points().len(), 1);
        assert_eq!(registry.iter().count(), 2);
    }
}
