//! Static entity catalog
//!
//! Countries are addressed by ISO codes, German districts by the short codes
//! of their licence plates. Regions carry the coordinate used for the spatial
//! district lookup and the population used for local incidence.

use serde::Serialize;

/// A country known to the dashboard
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Country {
    /// ISO 3166-1 alpha-3 code, the canonical entity key
    pub iso3: &'static str,
    /// ISO 3166-1 alpha-2 code
    pub iso2: &'static str,
    pub name: &'static str,
    pub flag: &'static str,
    /// Population used when a view does not take it from vaccination data
    pub population: u64,
}

/// A sub-national region (German district)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Region {
    /// Unique identifier for the region
    pub key: &'static str,
    /// Human-readable name of the region
    pub name: &'static str,
    /// Latitude coordinate
    pub latitude: f64,
    /// Longitude coordinate
    pub longitude: f64,
    pub population: u64,
}

pub static COUNTRIES: [Country; 3] = [
    Country {
        iso3: "DEU",
        iso2: "DE",
        name: "Germany",
        flag: "🇩🇪",
        population: 83_190_556,
    },
    Country {
        iso3: "CAN",
        iso2: "CA",
        name: "Canada",
        flag: "🇨🇦",
        population: 38_310_118,
    },
    Country {
        iso3: "USA",
        iso2: "US",
        name: "USA",
        flag: "🇺🇸",
        population: 330_967_801,
    },
];

pub static REGIONS: [Region; 4] = [
    Region {
        key: "FDB",
        name: "Kissing",
        latitude: 48.294,
        longitude: 10.969,
        population: 134_655,
    },
    Region {
        key: "A",
        name: "Augsburg",
        latitude: 48.366,
        longitude: 10.898,
        population: 296_582,
    },
    Region {
        key: "M",
        name: "München",
        latitude: 48.135,
        longitude: 11.613,
        population: 1_484_226,
    },
    Region {
        key: "BGL",
        name: "Freilassing",
        latitude: 47.835,
        longitude: 12.970,
        population: 105_929,
    },
];

/// Looks up a country by its ISO-3 or ISO-2 code
pub fn country(key: &str) -> Option<&'static Country> {
    COUNTRIES
        .iter()
        .find(|country| country.iso3 == key || country.iso2 == key)
}

/// Looks up a region by its key
pub fn region(key: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|region| region.key == key)
}
