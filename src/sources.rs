use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::SourcesConfig;
use crate::schema::SchemaVariant;

/// Operating year stamped in a disclosure or price file name.
///
/// ERCOT names disclosure extracts `..._Data-DD-MMM-YY.csv`; price tables end
/// in `_YYYY`. Two-digit years below 50 are 20xx.
pub fn extract_year_from_filename(path: &Path) -> Option<i32> {
    let stem = path.file_stem()?.to_str()?;

    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() >= 3 {
        if let Some(year) = parts.last().and_then(|p| p.trim().parse::<i32>().ok()) {
            return Some(match year {
                0..=49 => 2000 + year,
                50..=99 => 1900 + year,
                _ => year,
            });
        }
    }

    let tail = stem.rsplit(['_', '-', '.']).next()?;
    if tail.len() == 4 {
        return tail.parse().ok();
    }
    None
}

fn glob_files(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), pattern);
    match glob::glob(&full) {
        Ok(paths) => {
            let mut files: Vec<PathBuf> = paths
                .filter_map(Result::ok)
                .filter(|p| p.is_file())
                .collect();
            files.sort();
            files
        }
        Err(e) => {
            warn!("Invalid file pattern {}: {}", full, e);
            Vec::new()
        }
    }
}

/// Disclosure files found under the configured directories.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    files: BTreeMap<SchemaVariant, Vec<PathBuf>>,
    price_dir: Option<PathBuf>,
}

impl SourceCatalog {
    pub fn discover(sources: &SourcesConfig) -> Self {
        let mut files = BTreeMap::new();
        for (variant, dir) in [
            (SchemaVariant::DayAhead, &sources.dam_dir),
            (SchemaVariant::RealTime, &sources.sced_dir),
            (SchemaVariant::Supplemental, &sources.sasm_dir),
        ] {
            let Some(dir) = dir else { continue };
            if !dir.is_dir() {
                warn!("{} directory {} does not exist", variant.label(), dir.display());
                continue;
            }
            let found = glob_files(dir, variant.schema().file_pattern);
            debug!("Found {} {} files in {}", found.len(), variant.label(), dir.display());
            files.insert(variant, found);
        }

        Self {
            files,
            price_dir: sources.price_dir.clone(),
        }
    }

    pub fn files(&self, variant: SchemaVariant) -> &[PathBuf] {
        self.files.get(&variant).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Files that may hold records of operating year `year`.
    ///
    /// Disclosures are published 60 days after the operating day, so the
    /// last weeks of `year` arrive in files stamped `year + 1`. Files whose
    /// name carries no year are always included.
    pub fn files_for_period(&self, variant: SchemaVariant, year: i32) -> Vec<PathBuf> {
        self.files(variant)
            .iter()
            .filter(|path| match extract_year_from_filename(path) {
                Some(stamped) => stamped == year || stamped == year + 1,
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Years present in day-ahead file names, or in real-time names when no
    /// day-ahead files exist.
    pub fn available_years(&self) -> BTreeSet<i32> {
        let variant = if self.files(SchemaVariant::DayAhead).is_empty() {
            SchemaVariant::RealTime
        } else {
            SchemaVariant::DayAhead
        };
        self.files(variant)
            .iter()
            .filter_map(|path| extract_year_from_filename(path))
            .collect()
    }

    /// Real-time settlement point price tables for `year`.
    pub fn settlement_price_files(&self, year: i32) -> Vec<PathBuf> {
        let Some(dir) = &self.price_dir else {
            return Vec::new();
        };
        let mut files = glob_files(dir, &format!("**/*_{year}.parquet"));
        files.extend(glob_files(dir, &format!("**/*_{year}.csv")));
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_extract_year_from_filename() {
        let year = |name: &str| extract_year_from_filename(Path::new(name));
        assert_eq!(year("60d_DAM_Gen_Resource_Data-15-JAN-24.csv"), Some(2024));
        assert_eq!(year("60d_SCED_Gen_Resource_Data-01-DEC-98.csv"), Some(1998));
        assert_eq!(
            year("Settlement_Point_Prices_at_Resource_Nodes__Hubs_and_Load_Zones_2023.parquet"),
            Some(2023)
        );
        assert_eq!(year("resources.csv"), None);
    }

    #[test]
    fn test_discovery_and_period_window() {
        let dir = TempDir::new().unwrap();
        let dam = dir.path().join("dam");
        fs::create_dir_all(&dam).unwrap();
        for name in [
            "60d_DAM_Gen_Resource_Data-15-NOV-23.csv",
            "60d_DAM_Gen_Resource_Data-15-FEB-24.csv",
            "60d_DAM_Gen_Resource_Data-15-FEB-25.csv",
            "60d_DAM_Load_Resource_Data-15-FEB-24.csv",
        ] {
            fs::write(dam.join(name), "").unwrap();
        }

        let catalog = SourceCatalog::discover(&SourcesConfig {
            dam_dir: Some(dam),
            sced_dir: Some(dir.path().join("missing")),
            ..Default::default()
        });

        assert_eq!(catalog.files(SchemaVariant::DayAhead).len(), 3);
        assert!(catalog.files(SchemaVariant::RealTime).is_empty());
        assert_eq!(
            catalog.available_years().into_iter().collect::<Vec<_>>(),
            vec![2023, 2024, 2025]
        );

        let period: Vec<String> = catalog
            .files_for_period(SchemaVariant::DayAhead, 2023)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            period,
            vec![
                "60d_DAM_Gen_Resource_Data-15-FEB-24.csv",
                "60d_DAM_Gen_Resource_Data-15-NOV-23.csv"
            ]
        );
    }

    #[test]
    fn test_settlement_price_files() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("Settlement_Point_Prices");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Settlement_Point_Prices_2024.parquet"), "").unwrap();
        fs::write(dir.path().join("rt_prices_2024.csv"), "").unwrap();
        fs::write(dir.path().join("rt_prices_2023.csv"), "").unwrap();

        let catalog = SourceCatalog::discover(&SourcesConfig {
            price_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        });
        assert_eq!(catalog.settlement_price_files(2024).len(), 2);
        assert!(SourceCatalog::default().settlement_price_files(2024).is_empty());
    }
}
