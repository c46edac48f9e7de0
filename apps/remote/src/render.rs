//! Plain-text rendering of display frames.

use client_core::{LiveFrame, StageFrame};
use shared::summary::{format_delta_minutes, format_hours_minutes, EventSummary};

/// Clears the terminal and homes the cursor.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub fn stage(frame: &StageFrame) -> String {
    match frame {
        StageFrame::Offline => "No live event\n".to_string(),
        StageFrame::Live(live) => {
            let mut out = String::new();
            out.push_str(&format!("{}\n\n", live.event_title));
            out.push_str(&format!("    {}\n", live.timer.formatted_time));
            if live.timer.is_overtime {
                out.push_str("    OVERTIME\n");
            }
            out.push('\n');
            out.push_str(&section_line(live));
            if let Some(message) = &live.stage_message {
                out.push_str(&format!("\n>>> {message} <<<\n"));
            }
            out
        }
        StageFrame::Finished {
            event_title,
            summary,
        } => finished(event_title, summary),
    }
}

/// Controller view: the stage content plus the state and next section.
pub fn status(frame: &StageFrame) -> String {
    let StageFrame::Live(live) = frame else {
        return stage(frame);
    };
    let mut out = format!(
        "{} [{}] {}\n",
        live.event_title,
        live.timer.status,
        live.timer.formatted_time
    );
    if live.timer.is_overtime {
        out.push_str("OVERTIME\n");
    }
    out.push_str(&section_line(live));
    match &live.next_section_title {
        Some(next) => out.push_str(&format!("next: {next}\n")),
        None if live.section_count > 0 => out.push_str("last section\n"),
        None => {}
    }
    if let Some(message) = &live.stage_message {
        out.push_str(&format!("message: {message}\n"));
    }
    out
}

fn section_line(live: &LiveFrame) -> String {
    let title = live.section_title.as_deref().unwrap_or("-");
    let badge = if live.is_unplanned { " [UNPLANNED]" } else { "" };
    if live.section_count == 0 {
        return format!("{title}{badge}\n");
    }
    format!(
        "{}/{} {title}{badge}\n",
        live.position, live.section_count
    )
}

fn finished(event_title: &str, summary: &EventSummary) -> String {
    let mut out = format!("{event_title} - finished\n{}\n\n", summary.headline());
    out.push_str(&format!(
        "planned {}  actual {}  unplanned {}\n\n",
        format_hours_minutes(summary.total_planned),
        format_hours_minutes(summary.total_actual),
        summary.unplanned_count
    ));
    for row in &summary.sections {
        out.push_str(&format!(
            "{:>5}  {}{}\n",
            format_delta_minutes(row.delta()),
            row.title,
            if row.is_unplanned { " *" } else { "" }
        ));
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
