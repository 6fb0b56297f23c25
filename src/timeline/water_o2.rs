//! In-water decompression with oxygen.
//!
//! Deep stops are breathed on air as in the air procedure. Stops no deeper
//! than the O₂ ceiling (9 m) are breathed on oxygen: each is preceded by a
//! travel/shift/vent count-up for the gas switch, and its time is split into
//! O₂ periods and air breaks.
//!
//! Only O₂ period time counts toward the total; air breaks and the count-up
//! segments do not.

use super::{
    air::ordinal,
    extract_stops,
    oxygen::{self, OxygenBlock},
    Position, SegmentKind, Timeline, TimelineSegment, TimerRequirement,
};
use crate::{config::PlanSettings, tables::DiveTableEntry, BreathingGas};

pub fn synthesize(entry: &DiveTableEntry, real_depth: f64, settings: &PlanSettings) -> Timeline {
    let mut timeline = Timeline::default();
    let mut depth = real_depth;
    let mut gas = BreathingGas::Air;

    for (index, stop) in extract_stops(entry).into_iter().enumerate() {
        timeline.ascend(depth, stop.depth, settings.ascent_rate, gas);
        depth = stop.depth;

        if stop.depth > settings.o2_stop_max_depth {
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
            continue;
        }

        timeline.push_untimed(travel_shift_vent(stop.depth, settings));
        gas = BreathingGas::O2;
        push_oxygen_stop(&mut timeline, stop.depth, stop.minutes, index + 1, settings);
    }

    timeline.ascend(depth, 0.0, settings.ascent_rate, gas);
    timeline
}

/// Gas switch at an O₂ stop, timed as a count-up.
fn travel_shift_vent(depth: f64, settings: &PlanSettings) -> TimelineSegment {
    TimelineSegment {
        kind: SegmentKind::TravelShiftVent,
        position: Position::Level { depth },
        duration_secs: 0.0,
        gas: BreathingGas::Air,
        description: format!(
            "Travel, shift to O₂ and ventilate at {depth} m (warning after {} s)",
            settings.travel_shift_vent_warning_secs
        ),
        rate_m_per_min: None,
        timer: TimerRequirement::CountUp {
            warning_secs: settings.travel_shift_vent_warning_secs,
            error_secs: None,
        },
        adjustable: false,
    }
}

fn push_oxygen_stop(
    timeline: &mut Timeline,
    depth: f64,
    minutes: u32,
    number: usize,
    settings: &PlanSettings,
) {
    let blocks = oxygen::segment(minutes, settings);
    let periods = blocks
        .iter()
        .filter(|b| matches!(b, OxygenBlock::Period(_)))
        .count();
    let mut period = 0;

    for block in blocks {
        match block {
            OxygenBlock::Period(length) => {
                period += 1;
                timeline.push(TimelineSegment::timed(
                    SegmentKind::O2Period,
                    depth,
                    f64::from(length),
                    BreathingGas::O2,
                    format!(
                        "{} stop: O₂ period {period}/{periods}, {length} min at {depth} m",
                        ordinal(number)
                    ),
                ));
            }
            OxygenBlock::AirBreak(length) => {
                timeline.push_untimed(TimelineSegment::timed(
                    SegmentKind::AirBreak,
                    depth,
                    f64::from(length),
                    BreathingGas::Air,
                    format!("Air break: {length} min at {depth} m"),
                ));
            }
        }
    }
}
