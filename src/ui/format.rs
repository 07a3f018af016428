//! Text formatting shared by the terminal and plain renderers

use crate::metrics::MetricsError;
use crate::view::{IncidenceView, VaccinationView};

/// Shown in place of values that could not be computed
pub const UNAVAILABLE: &str = "unavailable";

/// Cells of the vaccination progress bar
pub const BAR_WIDTH: usize = 20;

/// Incidence with one decimal and the tendency arrow, e.g. `48.3 ↘`
pub fn incidence_text(incidence: &IncidenceView) -> String {
    match incidence.tendency {
        Some(tendency) => format!("{:.1} {}", incidence.value, tendency.symbol()),
        None => format!("{:.1}", incidence.value),
    }
}

/// Vaccination percentage, optionally with the daily doses
pub fn vaccination_text(vaccination: &VaccinationView) -> String {
    let mut text = format!("{:.1}%", vaccination.total_per_hundred);
    if let Some(fully) = vaccination.fully_vaccinated_per_hundred {
        text.push_str(&format!(" ({:.1}% full)", fully));
    }
    if let Some(doses) = vaccination.new_vaccinations {
        text.push_str(&format!(" +{}", group_thousands(doses)));
    }
    text
}

/// Filled and empty block cells for `progress` (0.0 to 1.0)
pub fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Text of a metric that may have failed
pub fn or_unavailable<T>(value: &Result<T, MetricsError>, format: impl Fn(&T) -> String) -> String {
    match value {
        Ok(value) => format(value),
        Err(_) => UNAVAILABLE.to_string(),
    }
}
