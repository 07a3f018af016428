//! covidash library
//!
//! Loads COVID-19 case and vaccination data through a file cache, derives
//! 7-day incidence and tendency and renders dashboard views. The binary and
//! the integration tests both drive the pipeline through this crate.

pub mod app;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod fetch;
pub mod loader;
pub mod metrics;
pub mod sources;
pub mod ui;
pub mod variant;
pub mod view;
