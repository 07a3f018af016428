//! Plain text rendition for hosts that only capture stdout

use super::format::{incidence_text, or_unavailable, progress_bar, vaccination_text, BAR_WIDTH};
use crate::view::{DashboardView, EntityView};

/// One line per entity, then the footer
pub fn render(view: &DashboardView) -> Vec<String> {
    let mut lines = vec![view.title.clone()];

    for entity in view.regions.iter().chain(&view.countries) {
        lines.push(entity_line(entity));
    }

    if !view.footer.is_empty() {
        lines.push(view.footer.clone());
    }
    lines
}

fn entity_line(entity: &EntityView) -> String {
    let mut parts = vec![entity.label.clone()];

    if let Some(incidence) = &entity.incidence {
        parts.push(or_unavailable(incidence, incidence_text));
    }
    if let Some(vaccination) = &entity.vaccination {
        parts.push(or_unavailable(vaccination, |v| {
            format!("{} {}", vaccination_text(v), progress_bar(v.progress, BAR_WIDTH))
        }));
    }
    parts.join("  ")
}
