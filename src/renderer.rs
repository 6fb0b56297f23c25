//! # Plan Rendering
//!
//! Renders dive plans, table listings and transition assessments as plain
//! text for the terminal. Each `render_*` function returns the text so it
//! can be tested; `draw_ascii` prints a plan directly.
//!
//! Plans are drawn as a numbered step list followed by a depth profile: one
//! row per segment with a bar proportional to the depth at the end of it.

use crate::{
    error::PlanError,
    plan::DivePlan,
    tables::Tables,
    timeline::{surdo2::TransitionStatus, Position, SegmentKind, TimelineSegment, TimerRequirement},
    BreathingGas, Modality,
};

/// Width of the depth profile bars at the deepest point
const PROFILE_WIDTH: usize = 40;

/// Format seconds as `mm:ss`, rounding to the nearest second.
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Format a depth with one decimal unless it is whole.
fn format_depth(depth: f64) -> String {
    if depth.fract() == 0.0 {
        format!("{depth:.0} m")
    } else {
        format!("{depth:.1} m")
    }
}

fn format_position(position: &Position) -> String {
    match *position {
        Position::Travel {
            from_depth,
            to_depth,
        } => format!("{} → {}", format_depth(from_depth), format_depth(to_depth)),
        Position::Level { depth } => format_depth(depth),
    }
}

fn format_timer(segment: &TimelineSegment) -> String {
    match segment.timer {
        TimerRequirement::None => format_duration(segment.duration_secs),
        TimerRequirement::Countdown { duration_secs } => {
            format!("{} ⏱", format_duration(duration_secs))
        }
        TimerRequirement::CountUp {
            warning_secs,
            error_secs: Some(error_secs),
        } => format!(
            "count-up, warn {} / limit {}",
            format_duration(f64::from(warning_secs)),
            format_duration(f64::from(error_secs))
        ),
        TimerRequirement::CountUp {
            warning_secs,
            error_secs: None,
        } => format!(
            "count-up, warn {}",
            format_duration(f64::from(warning_secs))
        ),
    }
}

fn kind_label(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Ascent => "Ascent",
        SegmentKind::Stop => "Stop",
        SegmentKind::O2Period => "O₂ period",
        SegmentKind::AirBreak => "Air break",
        SegmentKind::Compression => "Compression",
        SegmentKind::TravelShiftVent => "Travel/shift/vent",
        SegmentKind::SurfaceInterval => "Surface interval",
        SegmentKind::SurDo2Transition => "Transition",
    }
}

/// Join rendered lines, each terminated by a newline.
fn join_lines(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

/// Full text rendering of a plan.
pub fn render_plan(plan: &DivePlan) -> String {
    let mut lines = vec![
        plan.modality.label().to_string(),
        format!(
            "Depth {} (equivalent {}), table {} / {} min",
            format_depth(plan.real_depth),
            format_depth(plan.equivalent_depth),
            format_depth(plan.rounded_values.depth),
            plan.rounded_values.time
        ),
    ];
    if let Some(adjustment) = &plan.repetitive {
        lines.push(format!(
            "Repetitive: group {} after {} min, effective bottom time {} min",
            adjustment.previous_group, adjustment.surface_interval, adjustment.effective_bottom_time
        ));
    }
    if let Some(group) = &plan.altitude_group {
        lines.push(format!(
            "Altitude group {} ({} m row)",
            group.group, group.table_altitude
        ));
    }
    lines.extend(plan.warnings.iter().map(|warning| format!("⚠ {warning}")));
    lines.push(String::new());

    if plan.no_decompression {
        lines.push("No decompression required.".to_string());
    }

    for (index, segment) in plan.timeline.iter().enumerate() {
        lines.push(format!(
            "{:>2}. {:<18} {:<16} {:<4} {}",
            index + 1,
            kind_label(segment.kind),
            format_position(&segment.position),
            segment.gas.to_string(),
            format_timer(segment)
        ));
        lines.push(format!("    {}", segment.description));
    }
    lines.push(String::new());

    let mut out = join_lines(&lines);
    out.push_str(&render_profile(&plan.timeline));
    out.push_str(&join_lines(&[
        String::new(),
        format!(
            "Total decompression time: {}",
            format_duration(plan.total_time_secs)
        ),
        format!("Repetitive group: {}", plan.repetitive_group),
        plan.group_guidance.clone(),
    ]));
    out
}

/// Depth profile: one bar per segment, scaled to the deepest point.
pub fn render_profile(segments: &[TimelineSegment]) -> String {
    let deepest = segments
        .iter()
        .map(|s| match s.position {
            Position::Travel {
                from_depth,
                to_depth,
            } => from_depth.max(to_depth),
            Position::Level { depth } => depth,
        })
        .fold(0.0_f64, f64::max);
    if deepest <= 0.0 {
        return String::new();
    }

    let rows: Vec<String> = segments
        .iter()
        .map(|segment| {
            let depth = segment.position.end_depth();
            let width = ((depth / deepest) * PROFILE_WIDTH as f64).round() as usize;
            let fill = if segment.gas == BreathingGas::O2 {
                '▓'
            } else {
                '█'
            };
            format!(
                "{:>7} │{}",
                format_depth(depth),
                fill.to_string().repeat(width)
            )
        })
        .collect();
    join_lines(&rows)
}

/// Print a plan to stdout.
pub fn draw_ascii(plan: &DivePlan) {
    print!("{}", render_plan(plan));
}

/// Text for a failed calculation, naming alternative modalities if any.
pub fn render_failure(error: &PlanError) -> String {
    let mut lines = vec![format!("✗ {error}")];
    if let Some(alternatives) = error.alternatives() {
        let names: Vec<&str> = alternatives.iter().map(Modality::as_str).collect();
        lines.push(format!("  Available instead: {}", names.join(", ")));
    }
    join_lines(&lines)
}

/// Tabulated depths and bottom times for a modality (or all rows).
pub fn render_table_info(tables: &Tables, modality: Option<Modality>) -> String {
    let mut lines = vec![modality.map_or("All programs", |m| m.label()).to_string()];
    for depth in tables.available_depths(modality) {
        let times: Vec<String> = tables
            .available_times(depth, modality)
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        lines.push(format!("{:>7}: {}", format_depth(depth), times.join(" ")));
    }
    join_lines(&lines)
}

/// Text for an observed SurDO₂ transition.
pub fn render_transition(elapsed_secs: u32, status: TransitionStatus) -> String {
    let elapsed = format_duration(f64::from(elapsed_secs));
    match status {
        TransitionStatus::WithinLimit => format!("Transition {elapsed}: within limits"),
        TransitionStatus::ExtendFirstPeriod => format!(
            "Transition {elapsed}: over 5 minutes, extend the first O₂ period by a half period"
        ),
        TransitionStatus::Exceeded => format!(
            "Transition {elapsed}: over 7 minutes, treat per Treatment Table 5 or 6"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{calculate_dive_plan, config::PlanSettings, embedded, DivePlanParams};

    fn plan(mode: &str, depth: f64, bottom_time: u32) -> DivePlan {
        let tables = embedded::builtin().unwrap();
        let params = DivePlanParams {
            mode: mode.to_string(),
            depth,
            bottom_time,
            ..DivePlanParams::default()
        };
        calculate_dive_plan(&tables, &PlanSettings::default(), &params).unwrap()
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(60.0), "01:00");
        assert_eq!(format_duration(61.333), "01:01");
        assert_eq!(format_duration(1262.0), "21:02");
        assert_eq!(format_duration(3600.0), "60:00");
        assert_eq!(format_duration(-5.0), "00:00");
    }

    #[test]
    fn test_format_depth() {
        assert_eq!(format_depth(15.0), "15 m");
        assert_eq!(format_depth(12.2), "12.2 m");
    }

    #[test]
    fn test_render_air_plan() {
        let text = render_plan(&plan("air", 18.3, 80));
        assert!(text.contains("1st stop"));
        assert!(text.contains("2nd stop"));
        assert!(text.contains("Total decompression time: 21:02"));
        assert!(text.contains("Repetitive group: N"));
    }

    #[test]
    fn test_render_no_decompression() {
        let text = render_plan(&plan("air", 9.0, 20));
        assert!(text.contains("No decompression required."));
        assert!(text.contains("01:00"));
    }

    #[test]
    fn test_render_surface_decompression_shows_count_up() {
        let text = render_plan(&plan("surface_o2", 30.5, 60));
        assert!(text.contains("Transition"));
        assert!(text.contains("count-up, warn 05:00 / limit 07:00"));
        assert!(text.contains('▓'));
    }

    #[test]
    fn test_profile_scales_to_deepest_point() {
        let profile = render_profile(&plan("air", 18.3, 80).timeline);
        let first = profile.lines().next().unwrap();
        assert!(first.contains("9.1 m"));
        assert_eq!(profile.lines().count(), 5);
        assert!(profile.lines().last().unwrap().ends_with('│'));
    }

    #[test]
    fn test_render_failure_lists_alternatives() {
        let err = PlanError::NoProgram {
            modality: Modality::Air,
            depth: 9.1,
            bottom_time: 600,
            alternatives: vec![Modality::WaterO2, Modality::SurfaceO2],
        };
        let text = render_failure(&err);
        assert!(text.contains("Available instead: water_o2, surface_o2"));
    }

    #[test]
    fn test_render_table_info() {
        let tables = embedded::builtin().unwrap();
        let text = render_table_info(&tables, Some(Modality::Air));
        assert!(text.starts_with("Air decompression"));
        assert!(text.contains("18.3 m:"));
    }

    #[test]
    fn test_render_failure_without_alternatives_is_one_line() {
        let text = render_failure(&PlanError::UnknownGroup('P'));
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_render_plan_layout() {
        let text = render_plan(&plan("air", 18.3, 80));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Air decompression");
        assert_eq!(lines[1], "Depth 18.3 m (equivalent 18.3 m), table 18.3 m / 80 min");
        assert_eq!(lines[2], "");
        assert!(lines[3].starts_with(" 1. Ascent"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_render_transition() {
        assert!(render_transition(310, TransitionStatus::ExtendFirstPeriod).contains("05:10"));
        assert!(render_transition(420, TransitionStatus::Exceeded).contains("Treatment Table"));
    }
}
