//! In-memory dataset of one run
//!
//! Filled once by the loader, then only read by the metrics engine and the
//! presentation layer. An entity whose load failed is simply absent.

use std::collections::HashMap;

use serde::Serialize;

use crate::sources::{CaseSeries, DistrictSnapshot, Domain, VaccinationRecord};

/// A loaded record of any domain
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Vaccination(VaccinationRecord),
    District(DistrictSnapshot),
    Series(CaseSeries),
}

/// Records keyed by entity, one map per data domain
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dataset {
    vaccination: HashMap<String, VaccinationRecord>,
    districts: HashMap<String, DistrictSnapshot>,
    series: HashMap<Domain, HashMap<String, CaseSeries>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` for `key`; case series are filed under `domain`
    pub fn insert(&mut self, domain: Domain, key: impl Into<String>, record: Record) {
        let key = key.into();
        match record {
            Record::Vaccination(record) => {
                self.vaccination.insert(key, record);
            }
            Record::District(snapshot) => {
                self.districts.insert(key, snapshot);
            }
            Record::Series(series) => {
                self.series.entry(domain).or_default().insert(key, series);
            }
        }
    }

    pub fn vaccination(&self, key: &str) -> Option<&VaccinationRecord> {
        self.vaccination.get(key)
    }

    pub fn district(&self, key: &str) -> Option<&DistrictSnapshot> {
        self.districts.get(key)
    }

    pub fn series(&self, domain: Domain, key: &str) -> Option<&CaseSeries> {
        self.series.get(&domain)?.get(key)
    }

    /// Whether a record of `domain` is loaded for `key`
    pub fn contains(&self, domain: Domain, key: &str) -> bool {
        match domain {
            Domain::Vaccination => self.vaccination.contains_key(key),
            Domain::LocalSnapshot => self.districts.contains_key(key),
            Domain::GlobalCases | Domain::GlobalTimeline | Domain::LocalHistory => {
                self.series(domain, key).is_some()
            }
        }
    }

    /// Region key to official district id, for every loaded district snapshot
    pub fn district_ids(&self) -> HashMap<String, String> {
        self.districts
            .iter()
            .map(|(key, snapshot)| (key.clone(), snapshot.district_id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series() -> CaseSeries {
        CaseSeries {
            daily_new_cases: vec![1, 2, 3],
            last_updated_date: NaiveDate::from_ymd_opt(2021, 5, 20).unwrap(),
        }
    }

    #[test]
    fn test_series_are_separated_by_domain() {
        let mut dataset = Dataset::new();
        dataset.insert(Domain::GlobalCases, "DEU", Record::Series(series()));

        assert!(dataset.contains(Domain::GlobalCases, "DEU"));
        assert!(!dataset.contains(Domain::GlobalTimeline, "DEU"));
        assert!(dataset.series(Domain::GlobalTimeline, "DEU").is_none());
    }

    #[test]
    fn test_district_ids() {
        let mut dataset = Dataset::new();
        dataset.insert(
            Domain::LocalSnapshot,
            "A",
            Record::District(DistrictSnapshot {
                district_id: "09761".to_string(),
                name: "Augsburg".to_string(),
                cases7_per_100k: 80.0,
            }),
        );

        let ids = dataset.district_ids();
        assert_eq!(ids.get("A").map(String::as_str), Some("09761"));
        assert!(dataset.contains(Domain::LocalSnapshot, "A"));
        assert!(!dataset.contains(Domain::LocalHistory, "A"));
    }
}
