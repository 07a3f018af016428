//! Metrics engine
//!
//! Derives rolling 7-day incidence, tendency, severity and "last updated"
//! summaries from a fully loaded [`Dataset`]. Every calculation is anchored
//! on the run's reference day; an entity without data is an error, never a
//! zero.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Settings, TendencySettings};
use crate::dataset::Dataset;
use crate::sources::{CaseSeries, Domain};

/// Days summed by the rolling incidence
const WINDOW_DAYS: usize = 7;

/// Errors that can occur when computing a metric
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("{domain} {key}: need {needed} days of history, have {available}")]
    InsufficientHistory {
        domain: Domain,
        key: String,
        needed: usize,
        available: usize,
    },

    #[error("no {domain} data for {key}")]
    MissingEntity { domain: Domain, key: String },

    #[error("reference date {requested} is after today ({today})")]
    FutureDate {
        requested: NaiveDate,
        today: NaiveDate,
    },

    #[error("population of {key} must be positive")]
    InvalidPopulation { key: String },
}

/// Direction of the incidence trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tendency {
    Falling,
    Steady,
    Rising,
}

impl Tendency {
    pub fn symbol(self) -> &'static str {
        match self {
            Tendency::Falling => "↘",
            Tendency::Steady => "→",
            Tendency::Rising => "↗",
        }
    }
}

/// Incidence tier used for color coding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// Below 35
    Low,
    /// 35 up to 50
    Moderate,
    /// 50 up to 100
    High,
    /// 100 and above
    Critical,
}

/// Maps an incidence value to its tier
pub fn severity(incidence: f64) -> Severity {
    if incidence < 35.0 {
        Severity::Low
    } else if incidence < 50.0 {
        Severity::Moderate
    } else if incidence < 100.0 {
        Severity::High
    } else {
        Severity::Critical
    }
}

/// Classifies a trend from the day-over-day and week-over-week changes
///
/// A small daily change still counts as a trend when the weekly change is
/// large and points the same way. `diff == 0` checks falling first.
pub fn classify_tendency(diff: f64, long_diff: f64, thresholds: &TendencySettings) -> Tendency {
    let steady = thresholds.steady_range;
    let long_steady = thresholds.long_term_steady_range;

    if diff < -steady {
        Tendency::Falling
    } else if diff > steady {
        Tendency::Rising
    } else if diff <= 0.0 && long_diff < -long_steady {
        Tendency::Falling
    } else if diff >= 0.0 && long_diff > long_steady {
        Tendency::Rising
    } else {
        Tendency::Steady
    }
}

/// Reported day shifted by the source's reporting lag, never after `today`
pub fn effective_last_updated(reported: NaiveDate, lag_days: i64, today: NaiveDate) -> NaiveDate {
    (reported + Duration::days(lag_days)).min(today)
}

/// "Today", "Yesterday" or a short month-day date
pub fn relative_day(date: NaiveDate, today: NaiveDate) -> String {
    match (today - date).num_days() {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        _ => date.format("%b %-d").to_string(),
    }
}

/// Sources sharing one last-updated day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateGroup {
    pub date: NaiveDate,
    /// Source labels, sorted
    pub sources: Vec<&'static str>,
}

impl UpdateGroup {
    pub fn render(&self, today: NaiveDate) -> String {
        format!("{} ({})", relative_day(self.date, today), self.sources.join(", "))
    }
}

/// Last-updated days of all sources of a view, grouped by day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    /// Newest day first
    groups: Vec<UpdateGroup>,
}

impl UpdateSummary {
    /// Builds the summary from `(source label, day)` pairs
    ///
    /// A source contributing several days is represented by its oldest one.
    pub fn from_dates<I>(dates: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, NaiveDate)>,
    {
        let mut oldest_per_source: HashMap<&'static str, NaiveDate> = HashMap::new();
        for (label, date) in dates {
            oldest_per_source
                .entry(label)
                .and_modify(|oldest| *oldest = (*oldest).min(date))
                .or_insert(date);
        }

        let mut by_day: BTreeMap<NaiveDate, BTreeSet<&'static str>> = BTreeMap::new();
        for (label, date) in oldest_per_source {
            by_day.entry(date).or_default().insert(label);
        }

        Self {
            groups: by_day
                .into_iter()
                .rev()
                .map(|(date, sources)| UpdateGroup {
                    date,
                    sources: sources.into_iter().collect(),
                })
                .collect(),
        }
    }

    pub fn groups(&self) -> &[UpdateGroup] {
        &self.groups
    }

    pub fn oldest(&self) -> Option<&UpdateGroup> {
        self.groups.last()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every group, newest first
    pub fn render_all(&self, today: NaiveDate) -> String {
        self.groups
            .iter()
            .map(|group| group.render(today))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Only the oldest group
    pub fn render_oldest(&self, today: NaiveDate) -> String {
        self.oldest()
            .map(|group| group.render(today))
            .unwrap_or_default()
    }
}

/// Read-only calculations over one run's dataset
#[derive(Debug, Clone, Copy)]
pub struct Metrics<'a> {
    dataset: &'a Dataset,
    settings: &'a Settings,
    today: NaiveDate,
}

impl<'a> Metrics<'a> {
    pub fn new(dataset: &'a Dataset, settings: &'a Settings, today: NaiveDate) -> Self {
        Self {
            dataset,
            settings,
            today,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Population of a country: the static figure if given, otherwise the one
    /// from its vaccination record
    pub fn population(&self, key: &str, static_population: Option<u64>) -> Result<u64, MetricsError> {
        if let Some(population) = static_population {
            return Ok(population);
        }
        self.dataset
            .vaccination(key)
            .map(|record| record.population)
            .ok_or_else(|| MetricsError::MissingEntity {
                domain: Domain::Vaccination,
                key: key.to_string(),
            })
    }

    /// 7-day incidence per 100,000 inhabitants at `date`
    pub fn incidence(
        &self,
        domain: Domain,
        key: &str,
        population: u64,
        date: NaiveDate,
    ) -> Result<f64, MetricsError> {
        let series = self.series(domain, key)?;
        if date > self.today {
            return Err(MetricsError::FutureDate {
                requested: date,
                today: self.today,
            });
        }
        if population == 0 {
            return Err(MetricsError::InvalidPopulation {
                key: key.to_string(),
            });
        }

        let offset = (self.today - date).num_days() as usize + self.settings.partial_day_offset(domain);
        let needed = offset + WINDOW_DAYS;
        let window = series
            .daily_new_cases
            .get(offset..needed)
            .ok_or_else(|| MetricsError::InsufficientHistory {
                domain,
                key: key.to_string(),
                needed,
                available: series.daily_new_cases.len(),
            })?;

        let sum: i64 = window.iter().sum();
        Ok(100_000.0 * sum as f64 / population as f64)
    }

    /// Trend from the incidence of today, yesterday and a week ago
    pub fn tendency(&self, domain: Domain, key: &str, population: u64) -> Result<Tendency, MetricsError> {
        let current = self.incidence(domain, key, population, self.today)?;
        let yesterday = self.incidence(domain, key, population, self.today - Duration::days(1))?;
        let week_ago = self.incidence(domain, key, population, self.today - Duration::days(7))?;

        Ok(classify_tendency(
            current - yesterday,
            current - week_ago,
            &self.settings.tendency,
        ))
    }

    /// Day the data of `key` in `domain` is current as of
    ///
    /// District snapshots carry no date; they share the day of the district's
    /// case history.
    pub fn last_updated(&self, domain: Domain, key: &str) -> Result<NaiveDate, MetricsError> {
        let reported = match domain {
            Domain::Vaccination => self
                .dataset
                .vaccination(key)
                .map(|record| record.last_updated_date)
                .ok_or_else(|| MetricsError::MissingEntity {
                    domain,
                    key: key.to_string(),
                })?,
            Domain::LocalSnapshot => {
                return self.last_updated(Domain::LocalHistory, key);
            }
            Domain::GlobalCases | Domain::GlobalTimeline | Domain::LocalHistory => {
                self.series(domain, key)?.last_updated_date
            }
        };

        Ok(effective_last_updated(
            reported,
            self.settings.lag_days(domain),
            self.today,
        ))
    }

    /// Update summary over the given entities; entities without data are skipped
    pub fn update_summary<'k, I>(&self, entities: I) -> UpdateSummary
    where
        I: IntoIterator<Item = (Domain, &'k str)>,
    {
        UpdateSummary::from_dates(entities.into_iter().filter_map(|(domain, key)| {
            self.last_updated(domain, key)
                .ok()
                .map(|date| (domain.source_label(), date))
        }))
    }

    fn series(&self, domain: Domain, key: &str) -> Result<&'a CaseSeries, MetricsError> {
        self.dataset
            .series(domain, key)
            .ok_or_else(|| MetricsError::MissingEntity {
                domain,
                key: key.to_string(),
            })
    }
}
