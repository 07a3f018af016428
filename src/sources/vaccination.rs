//! Our World in Data vaccination adapter
//!
//! The upstream publishes a single document with the latest figures for every
//! country keyed by ISO-3 code. The request is marked shared so the loader
//! downloads it once per run and slices it per country.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use super::{parse_shape, Domain, NormalizeError, SourceAdapter, SourceRequest, VaccinationRecord};
use crate::catalog;

/// Latest-figures document for all countries
const OWID_LATEST_URL: &str =
    "https://raw.githubusercontent.com/owid/covid-19-data/master/public/data/latest/owid-covid-latest.json";

/// Per-country entry of the OWID document
#[derive(Debug, Deserialize)]
struct OwidEntry {
    population: Option<f64>,
    total_vaccinations_per_hundred: Option<f64>,
    people_vaccinated_per_hundred: Option<f64>,
    people_fully_vaccinated_per_hundred: Option<f64>,
    new_vaccinations: Option<f64>,
    last_updated_date: Option<String>,
}

/// Adapter for the OWID latest vaccination figures
#[derive(Debug, Clone)]
pub struct OwidVaccination {
    /// URL of the latest-figures document (allows override for testing)
    url: String,
}

impl Default for OwidVaccination {
    fn default() -> Self {
        Self::new()
    }
}

impl OwidVaccination {
    pub fn new() -> Self {
        Self {
            url: OWID_LATEST_URL.to_string(),
        }
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The upstream document is keyed by ISO-3; ISO-2 keys are converted
    fn upstream_key(key: &str) -> &str {
        catalog::country(key).map_or(key, |country| country.iso3)
    }
}

impl SourceAdapter for OwidVaccination {
    type Record = VaccinationRecord;

    fn domain(&self) -> Domain {
        Domain::Vaccination
    }

    fn request(&self, _key: &str, _today: NaiveDate) -> Result<SourceRequest, NormalizeError> {
        Ok(SourceRequest {
            url: self.url.clone(),
            shared: true,
        })
    }

    fn normalize(&self, key: &str, raw: &Value) -> Result<VaccinationRecord, NormalizeError> {
        let upstream_key = Self::upstream_key(key);
        let entry = raw
            .get(upstream_key)
            .ok_or_else(|| NormalizeError::UnknownEntity(upstream_key.to_string()))?;
        let entry: OwidEntry = parse_shape(entry)?;

        let population = entry
            .population
            .filter(|population| *population > 0.0)
            .ok_or_else(|| NormalizeError::MissingField("population".to_string()))?;
        let total_vaccinations_per_hundred = entry
            .total_vaccinations_per_hundred
            .ok_or_else(|| NormalizeError::MissingField("total_vaccinations_per_hundred".to_string()))?;
        let date_str = entry
            .last_updated_date
            .ok_or_else(|| NormalizeError::MissingField("last_updated_date".to_string()))?;
        let last_updated_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|_| NormalizeError::InvalidDate(date_str.clone()))?;

        Ok(VaccinationRecord {
            population: population.round() as u64,
            total_vaccinations_per_hundred,
            people_vaccinated_per_hundred: entry.people_vaccinated_per_hundred,
            people_fully_vaccinated_per_hundred: entry.people_fully_vaccinated_per_hundred,
            new_vaccinations: entry.new_vaccinations.map(|count| count.max(0.0).round() as u64),
            last_updated_date,
        })
    }
}
