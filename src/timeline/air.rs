//! In-water decompression on air.
//!
//! Ascend to each stop in turn, hold it for the tabulated time, then ascend
//! to the surface. Every segment has a fixed duration.

use super::{extract_stops, SegmentKind, Timeline, TimelineSegment};
use crate::{config::PlanSettings, tables::DiveTableEntry, BreathingGas};

pub fn synthesize(entry: &DiveTableEntry, real_depth: f64, settings: &PlanSettings) -> Timeline {
    let mut timeline = Timeline::default();
    let mut depth = real_depth;

    for (index, stop) in extract_stops(entry).into_iter().enumerate() {
        timeline.ascend(depth, stop.depth, settings.ascent_rate, BreathingGas::Air);
        timeline.push(TimelineSegment::timed(
            SegmentKind::Stop,
            stop.depth,
            f64::from(stop.minutes),
            BreathingGas::Air,
            format!(
                "{} stop: {} min at {} m on air",
                ordinal(index + 1),
                stop.minutes,
                stop.depth
            ),
        ));
        depth = stop.depth;
    }

    timeline.ascend(depth, 0.0, settings.ascent_rate, BreathingGas::Air);
    timeline
}

/// "1st", "2nd", "3rd", "4th"... as used to number stops.
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
