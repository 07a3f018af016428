//! Declarative dashboard variants
//!
//! A variant names the entities it shows and which source feeds each of
//! them. Everything else (loading, metrics, rendering) is shared.

use clap::ValueEnum;

use crate::catalog::{self, Country, Region};
use crate::loader::Job;
use crate::sources::Domain;

/// Selectable dashboard layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum VariantKind {
    /// Local districts plus country incidence and vaccination progress
    #[default]
    Dashboard,
    /// Country incidence from the JHU history
    GlobalIncidence,
    /// Country vaccination progress
    GlobalVaccination,
    /// Country incidence from the JHU timeline plus vaccination progress
    GlobalIncidenceVaccination,
    /// Local district incidence
    LocalIncidence,
}

/// How much of the update summary a variant shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterStyle {
    /// Every update group, newest first
    AllGroups,
    /// Only the oldest update group
    OldestOnly,
}

/// One country row of a variant
#[derive(Debug, Clone, Copy)]
pub struct CountryEntry {
    pub country: &'static Country,
    /// Case series domain, if the row shows incidence
    pub cases: Option<Domain>,
    pub vaccination: bool,
    /// Use the catalog population instead of the vaccination record's
    pub static_population: bool,
}

/// A fully resolved variant
#[derive(Debug, Clone)]
pub struct Variant {
    pub title: &'static str,
    /// First region is the primary one
    pub regions: Vec<&'static Region>,
    /// First country is the primary one
    pub countries: Vec<CountryEntry>,
    pub footer: FooterStyle,
}

impl Variant {
    pub fn new(kind: VariantKind) -> Self {
        match kind {
            VariantKind::Dashboard => Self {
                title: "COVID-19 Dashboard",
                regions: regions(&["FDB", "A", "M", "BGL"]),
                countries: countries(&["DEU", "CAN", "USA"], Some(Domain::GlobalCases), true, false),
                footer: FooterStyle::AllGroups,
            },
            VariantKind::GlobalIncidence => Self {
                title: "7-day incidence",
                regions: Vec::new(),
                countries: countries(&["DEU", "CAN", "USA"], Some(Domain::GlobalCases), false, true),
                footer: FooterStyle::AllGroups,
            },
            VariantKind::GlobalVaccination => Self {
                title: "Vaccinations",
                regions: Vec::new(),
                countries: countries(&["DEU", "CAN", "USA"], None, true, false),
                footer: FooterStyle::AllGroups,
            },
            VariantKind::GlobalIncidenceVaccination => Self {
                title: "Incidence & vaccinations",
                regions: Vec::new(),
                countries: countries(&["DEU", "CAN", "USA"], Some(Domain::GlobalTimeline), true, true),
                footer: FooterStyle::OldestOnly,
            },
            VariantKind::LocalIncidence => Self {
                title: "7-day incidence",
                regions: regions(&["FDB", "A", "M"]),
                countries: Vec::new(),
                footer: FooterStyle::AllGroups,
            },
        }
    }

    /// Every load the variant needs
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs = Vec::new();
        for region in &self.regions {
            jobs.push(Job::new(Domain::LocalSnapshot, region.key));
            jobs.push(Job::new(Domain::LocalHistory, region.key));
        }
        for entry in &self.countries {
            if let Some(domain) = entry.cases {
                jobs.push(Job::new(domain, entry.country.iso3));
            }
            if entry.vaccination || (entry.cases.is_some() && !entry.static_population) {
                jobs.push(Job::new(Domain::Vaccination, entry.country.iso3));
            }
        }
        jobs
    }

    /// Entities whose last-updated days feed the footer
    pub fn update_entities(&self) -> Vec<(Domain, &'static str)> {
        let mut entities = Vec::new();
        for region in &self.regions {
            entities.push((Domain::LocalHistory, region.key));
        }
        for entry in &self.countries {
            if let Some(domain) = entry.cases {
                entities.push((domain, entry.country.iso3));
            }
            if entry.vaccination {
                entities.push((Domain::Vaccination, entry.country.iso3));
            }
        }
        entities
    }
}

fn regions(keys: &[&str]) -> Vec<&'static Region> {
    keys.iter().filter_map(|key| catalog::region(key)).collect()
}

fn countries(
    keys: &[&str],
    cases: Option<Domain>,
    vaccination: bool,
    static_population: bool,
) -> Vec<CountryEntry> {
    keys.iter()
        .filter_map(|key| catalog::country(key))
        .map(|country| CountryEntry {
            country,
            cases,
            vaccination,
            static_population,
        })
        .collect()
}
