use serde::{Deserialize, Serialize};

use crate::domain::{Section, SectionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDelta {
    pub section_id: SectionId,
    pub title: String,
    pub planned: i64,
    pub actual: i64,
    pub is_unplanned: bool,
}

impl SectionDelta {
    /// Positive when the section ran long.
    pub fn delta(&self) -> i64 {
        self.actual - self.planned
    }
}

/// Planned versus actual timing of a finished event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub total_planned: i64,
    pub total_actual: i64,
    pub unplanned_count: usize,
    pub on_time: bool,
    pub sections: Vec<SectionDelta>,
}

impl EventSummary {
    pub fn from_sections(sections: &[Section]) -> Self {
        let rows: Vec<SectionDelta> = sections
            .iter()
            .map(|section| SectionDelta {
                section_id: section.id,
                title: section.title.clone(),
                planned: section.duration,
                actual: section.actual_duration.unwrap_or(0),
                is_unplanned: section.is_unplanned,
            })
            .collect();
        let total_planned = rows.iter().map(|row| row.planned).sum();
        let total_actual = rows.iter().map(|row| row.actual).sum();

        Self {
            total_planned,
            total_actual,
            unplanned_count: sections.iter().filter(|s| s.is_unplanned).count(),
            on_time: total_actual <= total_planned,
            sections: rows,
        }
    }

    /// Seconds over the planned total; negative when the event ran short.
    pub fn overrun(&self) -> i64 {
        self.total_actual - self.total_planned
    }

    pub fn headline(&self) -> String {
        if self.on_time {
            "Excellent timing!".to_string()
        } else {
            format!("Overran by {} min", self.overrun() / 60)
        }
    }
}

/// `2h 55m`.
pub fn format_hours_minutes(seconds: i64) -> String {
    let abs = seconds.unsigned_abs();
    format!("{}h {}m", abs / 3600, (abs % 3600) / 60)
}

/// `+5m`, `-3m` or `0m`.
pub fn format_delta_minutes(delta: i64) -> String {
    let minutes = delta.unsigned_abs() / 60;
    let sign = match delta.signum() {
        1 => "+",
        -1 => "-",
        _ => "",
    };
    format!("{sign}{minutes}m")
}
