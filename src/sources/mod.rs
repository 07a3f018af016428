//! Source adapters for the upstream epidemiological APIs
//!
//! Each adapter knows how to build the request for one entity and how to turn
//! the raw JSON answer into a typed record. Anything missing or malformed in a
//! response is a [`NormalizeError`]; adapters never zero-fill.

pub mod jhu;
pub mod rki;
pub mod vaccination;

pub use jhu::{JhuHistory, JhuTimeline};
pub use rki::{RkiDistrictHistory, RkiDistrictSnapshot};
pub use vaccination::OwidVaccination;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Data domain a record belongs to
///
/// Used to namespace cache entries and the in-memory dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    /// Latest vaccination figures per country
    Vaccination,
    /// Daily new cases per country derived from a cumulative history
    GlobalCases,
    /// Daily new cases per country derived from a cumulative timeline
    GlobalTimeline,
    /// Current district snapshot (district id and official incidence)
    LocalSnapshot,
    /// Daily new cases per district
    LocalHistory,
}

impl Domain {
    /// Name used inside cache keys
    pub fn cache_name(self) -> &'static str {
        match self {
            Domain::Vaccination => "ourworldindata-latest",
            Domain::GlobalCases => "global-cases",
            Domain::GlobalTimeline => "global-timeline",
            Domain::LocalSnapshot => "local-cases",
            Domain::LocalHistory => "local-history",
        }
    }

    /// Short label of the upstream publisher, shown in update summaries
    pub fn source_label(self) -> &'static str {
        match self {
            Domain::Vaccination => "OWID",
            Domain::GlobalCases | Domain::GlobalTimeline => "JHU",
            Domain::LocalSnapshot | Domain::LocalHistory => "RKI",
        }
    }

    /// Whether records of this domain are daily case series
    pub fn is_case_series(self) -> bool {
        matches!(
            self,
            Domain::GlobalCases | Domain::GlobalTimeline | Domain::LocalHistory
        )
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_name())
    }
}

/// Errors raised while building a request or normalizing a response
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A required field is absent or null
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A date could not be parsed
    #[error("invalid date `{0}`")]
    InvalidDate(String),

    /// The entity is unknown to this source
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),

    /// The response holds too few data points to derive a series
    #[error("not enough data points for `{0}`")]
    EmptySeries(String),

    /// The response does not have the expected structure
    #[error("unexpected response shape: {0}")]
    Shape(String),

    /// The request URL could not be built
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

/// Outbound request for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub url: String,
    /// The response carries every entity and may be fetched once per run
    pub shared: bool,
}

/// Uniform time series of daily new cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSeries {
    /// One value per calendar day, newest first
    pub daily_new_cases: Vec<i64>,
    /// Calendar day of the newest value, as reported upstream
    pub last_updated_date: NaiveDate,
}

/// Latest vaccination figures for a country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationRecord {
    pub population: u64,
    pub total_vaccinations_per_hundred: f64,
    pub people_vaccinated_per_hundred: Option<f64>,
    pub people_fully_vaccinated_per_hundred: Option<f64>,
    pub new_vaccinations: Option<u64>,
    /// Day the figures describe
    pub last_updated_date: NaiveDate,
}

/// Current figures for a German district
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictSnapshot {
    /// Official district id ("RS"), needed to query the district history
    pub district_id: String,
    pub name: String,
    pub cases7_per_100k: f64,
}

/// One upstream data source
pub trait SourceAdapter: Send + Sync {
    type Record: Serialize + DeserializeOwned + Send;

    fn domain(&self) -> Domain;

    /// Builds the request for `key`; `today` is the run's reference day
    fn request(&self, key: &str, today: NaiveDate) -> Result<SourceRequest, NormalizeError>;

    /// Converts the raw response into this source's record for `key`
    fn normalize(&self, key: &str, raw: &Value) -> Result<Self::Record, NormalizeError>;
}

/// Derives daily new cases from running totals
///
/// `points` must be newest first with one entry per consecutive calendar day.
/// The oldest day has no baseline and is dropped, so the result is one entry
/// shorter than the input.
pub fn daily_from_cumulative(points: &[(NaiveDate, i64)]) -> Result<Vec<i64>, NormalizeError> {
    if points.len() < 2 {
        return Err(NormalizeError::EmptySeries(format!(
            "{} cumulative values",
            points.len()
        )));
    }

    points
        .windows(2)
        .map(|pair| {
            let (day, total) = pair[0];
            let (previous_day, previous_total) = pair[1];
            if day - previous_day != Duration::days(1) {
                return Err(NormalizeError::Shape(format!(
                    "cumulative series is not contiguous between {} and {}",
                    previous_day, day
                )));
            }
            Ok(total - previous_total)
        })
        .collect()
}

/// Sums raw per-record counts by calendar day
///
/// Returns one `(day, total)` per distinct day, newest first.
pub fn sum_by_day<I>(entries: I) -> Vec<(NaiveDate, i64)>
where
    I: IntoIterator<Item = (NaiveDate, i64)>,
{
    let mut totals: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for (day, count) in entries {
        *totals.entry(day).or_insert(0) += count;
    }
    totals.into_iter().rev().collect()
}

/// Deserializes a typed view of part of a response
pub(crate) fn parse_shape<T: DeserializeOwned>(raw: &Value) -> Result<T, NormalizeError> {
    T::deserialize(raw).map_err(|e| NormalizeError::Shape(e.to_string()))
}
