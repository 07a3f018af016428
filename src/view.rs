//! View model handed to the renderers
//!
//! Turns metrics into display-ready values: incidence rounded to one
//! decimal with its severity, tendency symbols, vaccination progress and the
//! footer text. A failed metric stays an error here so the renderers can
//! show the entity as unavailable.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::catalog::Region;
use crate::dataset::Dataset;
use crate::metrics::{severity, Metrics, MetricsError, Severity, Tendency};
use crate::sources::Domain;
use crate::variant::{CountryEntry, FooterStyle, Variant};

/// Color band of the vaccination progress bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressTone {
    /// Below 60 %
    Red,
    /// 60 up to 70 %
    Orange,
    /// 70 % and above
    Green,
}

impl ProgressTone {
    pub fn for_percent(percent: f64) -> Self {
        if percent < 60.0 {
            ProgressTone::Red
        } else if percent < 70.0 {
            ProgressTone::Orange
        } else {
            ProgressTone::Green
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidenceView {
    /// Rounded to one decimal
    pub value: f64,
    /// Tier of the rounded value
    pub severity: Severity,
    /// Absent when the history is too short or missing
    pub tendency: Option<Tendency>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaccinationView {
    pub total_per_hundred: f64,
    pub fully_vaccinated_per_hundred: Option<f64>,
    pub new_vaccinations: Option<u64>,
    /// Share of the bar to fill, 0.0 to 1.0
    pub progress: f64,
    pub tone: ProgressTone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub label: String,
    pub incidence: Option<Result<IncidenceView, MetricsError>>,
    pub vaccination: Option<Result<VaccinationView, MetricsError>>,
}

impl EntityView {
    /// Whether every value the row should show failed
    pub fn is_unavailable(&self) -> bool {
        let incidence_ok = matches!(self.incidence, Some(Ok(_)));
        let vaccination_ok = matches!(self.vaccination, Some(Ok(_)));
        (self.incidence.is_some() || self.vaccination.is_some()) && !incidence_ok && !vaccination_ok
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub title: String,
    pub today: NaiveDate,
    pub regions: Vec<EntityView>,
    pub countries: Vec<EntityView>,
    /// "Last Update: ..." line, empty when nothing loaded
    pub footer: String,
}

/// Rounds to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl IncidenceView {
    fn new(value: f64, tendency: Option<Tendency>) -> Self {
        let value = round1(value);
        Self {
            value,
            severity: severity(value),
            tendency,
        }
    }
}

impl VaccinationView {
    fn new(total_per_hundred: f64, fully: Option<f64>, new_vaccinations: Option<u64>) -> Self {
        Self {
            total_per_hundred,
            fully_vaccinated_per_hundred: fully,
            new_vaccinations,
            progress: (total_per_hundred / 100.0).clamp(0.0, 1.0),
            tone: ProgressTone::for_percent(total_per_hundred),
        }
    }
}

/// Computes everything `variant` displays
pub fn build(variant: &Variant, metrics: &Metrics<'_>, dataset: &Dataset) -> DashboardView {
    let regions = variant
        .regions
        .iter()
        .map(|region| region_view(region, metrics, dataset))
        .collect();
    let countries = variant
        .countries
        .iter()
        .map(|entry| country_view(entry, metrics, dataset))
        .collect();

    let summary = metrics.update_summary(variant.update_entities());
    let footer = if summary.is_empty() {
        String::new()
    } else {
        let text = match variant.footer {
            FooterStyle::AllGroups => summary.render_all(metrics.today()),
            FooterStyle::OldestOnly => summary.render_oldest(metrics.today()),
        };
        format!("Last Update: {}", text)
    };

    DashboardView {
        title: variant.title.to_string(),
        today: metrics.today(),
        regions,
        countries,
        footer,
    }
}

/// District incidence comes from the official snapshot, the tendency from
/// the district's case history
fn region_view(region: &Region, metrics: &Metrics<'_>, dataset: &Dataset) -> EntityView {
    let incidence = dataset
        .district(region.key)
        .ok_or_else(|| MetricsError::MissingEntity {
            domain: Domain::LocalSnapshot,
            key: region.key.to_string(),
        })
        .map(|snapshot| {
            let tendency = metrics
                .tendency(Domain::LocalHistory, region.key, region.population)
                .map_err(|e| debug!(region = region.key, error = %e, "no tendency"))
                .ok();
            IncidenceView::new(snapshot.cases7_per_100k, tendency)
        });

    EntityView {
        label: region.name.to_string(),
        incidence: Some(incidence),
        vaccination: None,
    }
}

fn country_view(entry: &CountryEntry, metrics: &Metrics<'_>, dataset: &Dataset) -> EntityView {
    let key = entry.country.iso3;
    let static_population = entry.static_population.then_some(entry.country.population);

    let incidence = entry.cases.map(|domain| -> Result<IncidenceView, MetricsError> {
        let population = metrics.population(key, static_population)?;
        let value = metrics.incidence(domain, key, population, metrics.today())?;
        let tendency = metrics
            .tendency(domain, key, population)
            .map_err(|e| debug!(country = key, error = %e, "no tendency"))
            .ok();
        Ok(IncidenceView::new(value, tendency))
    });

    let vaccination = entry.vaccination.then(|| {
        dataset
            .vaccination(key)
            .map(|record| {
                VaccinationView::new(
                    record.total_vaccinations_per_hundred,
                    record.people_fully_vaccinated_per_hundred,
                    record.new_vaccinations,
                )
            })
            .ok_or_else(|| MetricsError::MissingEntity {
                domain: Domain::Vaccination,
                key: key.to_string(),
            })
    });

    EntityView {
        label: format!("{} {}", entry.country.flag, entry.country.name),
        incidence,
        vaccination,
    }
}
