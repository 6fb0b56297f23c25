//! # Surface Decompression on Oxygen (SurDO₂)
//!
//! ## Phases
//! 1. **In-water**: the stops at 12.2 m and deeper, on air. Shallower
//!    stops are replaced by the chamber phase.
//! 2. **Transition**: ascent to the surface (12 m/min from 12.2 m), undress,
//!    and compression in the chamber to 15 m (30 m/min). The whole interval
//!    is a count-up: past 5 minutes the first O₂ period may be extended by a
//!    half period, past 7 minutes the diver must be treated instead.
//! 3. **Chamber**: the tabulated number of 30-minute O₂ periods with 5-minute
//!    air breaks between them. Period 1 starts at 15 m and finishes at
//!    12.2 m, periods 2 to 4 are at 12.2 m, later periods at 9 m.
//! 4. **Surface**: ascent from the chamber on air at 30 m/min.
//!
//! The transition count-up never counts toward the total; chamber air
//! breaks do.

use super::{
    extract_stops, travel_secs, Position, SegmentKind, Timeline, TimelineSegment,
    TimerRequirement,
};
use crate::{config::PlanSettings, error::PlanError, tables::DiveTableEntry, BreathingGas};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shallowest in-water stop kept before surfacing (m)
pub const LAST_WATER_STOP: f64 = 12.2;
/// Chamber depth at the start of period 1 (m)
pub const CHAMBER_START_DEPTH: f64 = 15.0;
/// Chamber depth for the rest of period 1 through period 4 (m)
pub const CHAMBER_MID_DEPTH: f64 = 12.2;
/// Chamber depth from period 5 on (m)
pub const CHAMBER_FINAL_DEPTH: f64 = 9.0;
/// Last period breathed at the mid depth
const LAST_MID_DEPTH_PERIOD: usize = 4;

pub fn synthesize(
    entry: &DiveTableEntry,
    real_depth: f64,
    settings: &PlanSettings,
) -> Result<Timeline, PlanError> {
    let periods = entry.chamber_periods.ok_or_else(|| {
        PlanError::InvalidInput(format!(
            "table row {} m / {} min has no chamber periods",
            entry.depth, entry.bottom_time
        ))
    })?;

    let mut timeline = Timeline::default();
    let depth = in_water_phase(&mut timeline, entry, real_depth, settings);
    transition_phase(&mut timeline, depth, settings);
    let depth = chamber_phase(&mut timeline, periods, settings);
    timeline.push(TimelineSegment::travel(
        SegmentKind::Ascent,
        depth,
        0.0,
        settings.chamber_rate,
        BreathingGas::Air,
    ));

    debug!(periods, total = timeline.total_time_secs, "surface decompression timeline");
    Ok(timeline)
}

/// Deep stops on air. Returns the depth the diver leaves for the surface.
fn in_water_phase(
    timeline: &mut Timeline,
    entry: &DiveTableEntry,
    real_depth: f64,
    settings: &PlanSettings,
) -> f64 {
    let mut depth = real_depth;
    for stop in extract_stops(entry)
        .into_iter()
        .filter(|s| s.depth >= LAST_WATER_STOP)
    {
        timeline.ascend(depth, stop.depth, settings.ascent_rate, BreathingGas::Air);
        timeline.push(TimelineSegment::timed(
            SegmentKind::Stop,
            stop.depth,
            f64::from(stop.minutes),
            BreathingGas::Air,
            format!("In-water stop: {} min at {} m on air", stop.minutes, stop.depth),
        ));
        depth = stop.depth;
    }

    // Without a 12.2 m stop the normal rate applies down to 12.2 m
    if depth > LAST_WATER_STOP {
        timeline.ascend(depth, LAST_WATER_STOP, settings.ascent_rate, BreathingGas::Air);
        depth = LAST_WATER_STOP;
    }
    depth
}

fn transition_phase(timeline: &mut Timeline, depth: f64, settings: &PlanSettings) {
    let count_up = TimerRequirement::CountUp {
        warning_secs: settings.transition_warning_secs,
        error_secs: Some(settings.transition_error_secs),
    };
    let ascent_secs = travel_secs(depth, 0.0, settings.surface_ascent_rate);
    let compression_secs = travel_secs(0.0, CHAMBER_START_DEPTH, settings.chamber_rate);

    if settings.unified_transition {
        timeline.push_untimed(TimelineSegment {
            kind: SegmentKind::SurDo2Transition,
            position: Position::Travel {
                from_depth: depth,
                to_depth: CHAMBER_START_DEPTH,
            },
            duration_secs: 0.0,
            gas: BreathingGas::Air,
            description: format!(
                "Ascend from {depth} m at {} m/min ({ascent_secs:.0} s), undress and compress \
                 to {CHAMBER_START_DEPTH} m at {} m/min ({compression_secs:.0} s) within {} s",
                settings.surface_ascent_rate, settings.chamber_rate, settings.transition_warning_secs
            ),
            rate_m_per_min: None,
            timer: count_up,
            adjustable: false,
        });
        return;
    }

    timeline.push_untimed(TimelineSegment {
        kind: SegmentKind::SurfaceInterval,
        position: Position::Travel {
            from_depth: depth,
            to_depth: 0.0,
        },
        duration_secs: 0.0,
        gas: BreathingGas::Air,
        description: format!(
            "Ascend from {depth} m at {} m/min ({ascent_secs:.0} s) and undress; \
             surface interval runs until the chamber reaches {CHAMBER_START_DEPTH} m",
            settings.surface_ascent_rate
        ),
        rate_m_per_min: Some(settings.surface_ascent_rate),
        timer: count_up,
        adjustable: false,
    });
    timeline.push(TimelineSegment::travel(
        SegmentKind::Compression,
        0.0,
        CHAMBER_START_DEPTH,
        settings.chamber_rate,
        BreathingGas::Air,
    ));
}

/// Chamber O₂ periods. Returns the chamber depth after the last period.
fn chamber_phase(timeline: &mut Timeline, periods: f64, settings: &PlanSettings) -> f64 {
    let period_minutes = f64::from(settings.o2_period_minutes);
    let mut lengths = vec![period_minutes; periods.trunc() as usize];
    if periods.fract() > 0.0 {
        lengths.push(periods.fract() * period_minutes);
    }
    let count = lengths.len();
    let mut depth = CHAMBER_START_DEPTH;

    for (index, length) in lengths.into_iter().enumerate() {
        let number = index + 1;
        let target = period_depth(number);

        if index > 0 {
            timeline.push(air_break(depth, target, settings));
            depth = target;
        }

        if number == 1 {
            depth = first_period(timeline, length, count, settings);
            continue;
        }

        timeline.push(TimelineSegment::timed(
            SegmentKind::O2Period,
            depth,
            length,
            BreathingGas::O2,
            format!("Chamber O₂ period {number}/{count}: {length} min at {depth} m"),
        ));
    }
    depth
}

fn period_depth(number: usize) -> f64 {
    match number {
        1 => CHAMBER_START_DEPTH,
        n if n <= LAST_MID_DEPTH_PERIOD => CHAMBER_MID_DEPTH,
        _ => CHAMBER_FINAL_DEPTH,
    }
}

/// Period 1: an adjustable head at 15 m, then the rest of the period at
/// 12.2 m. The ascent between them is part of the period.
fn first_period(timeline: &mut Timeline, length: f64, count: usize, settings: &PlanSettings) -> f64 {
    let head = length.min(f64::from(settings.first_period_head_minutes));
    let mut segment = TimelineSegment::timed(
        SegmentKind::O2Period,
        CHAMBER_START_DEPTH,
        head,
        BreathingGas::O2,
        format!("Chamber O₂ period 1/{count}: {head} min at {CHAMBER_START_DEPTH} m"),
    );
    segment.adjustable = true;
    timeline.push(segment);

    if length <= head {
        return CHAMBER_START_DEPTH;
    }

    let ascent = TimelineSegment::travel(
        SegmentKind::Ascent,
        CHAMBER_START_DEPTH,
        CHAMBER_MID_DEPTH,
        settings.chamber_rate,
        BreathingGas::O2,
    );
    let remainder_secs = (length - head) * 60.0 - ascent.duration_secs;
    timeline.push(ascent);
    timeline.push(TimelineSegment::timed(
        SegmentKind::O2Period,
        CHAMBER_MID_DEPTH,
        remainder_secs / 60.0,
        BreathingGas::O2,
        format!(
            "Chamber O₂ period 1/{count}: remainder ({remainder_secs:.0} s) at {CHAMBER_MID_DEPTH} m"
        ),
    ));
    CHAMBER_MID_DEPTH
}

fn air_break(from: f64, to: f64, settings: &PlanSettings) -> TimelineSegment {
    let minutes = f64::from(settings.air_break_minutes);
    if from == to {
        return TimelineSegment::timed(
            SegmentKind::AirBreak,
            from,
            minutes,
            BreathingGas::Air,
            format!("Air break: {minutes} min at {from} m"),
        );
    }
    let duration_secs = minutes * 60.0;
    TimelineSegment {
        kind: SegmentKind::AirBreak,
        position: Position::Travel {
            from_depth: from,
            to_depth: to,
        },
        duration_secs,
        gas: BreathingGas::Air,
        description: format!("Air break: {minutes} min, ascending from {from} m to {to} m"),
        rate_m_per_min: Some(settings.chamber_rate),
        timer: TimerRequirement::Countdown { duration_secs },
        adjustable: false,
    }
}

/// Observed SurDO₂ surface interval, classified against the thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    /// Under the warning threshold: proceed as planned
    WithinLimit,
    /// Past the warning threshold: the first O₂ period may be extended
    ExtendFirstPeriod,
    /// Past the hard limit: treatment table required
    Exceeded,
}

impl TransitionStatus {
    pub fn from_elapsed(elapsed_secs: u32, settings: &PlanSettings) -> Self {
        if elapsed_secs >= settings.transition_error_secs {
            TransitionStatus::Exceeded
        } else if elapsed_secs >= settings.transition_warning_secs {
            TransitionStatus::ExtendFirstPeriod
        } else {
            TransitionStatus::WithinLimit
        }
    }
}

/// Surface an observed transition as an error when it needs action.
///
/// Past the warning threshold this returns the warning-only
/// [`PlanError::TransitionWarning`]; past the hard limit it returns
/// [`PlanError::TransitionExceeded`]. Nothing is corrected here.
pub fn check_transition(elapsed_secs: u32, settings: &PlanSettings) -> Result<(), PlanError> {
    match TransitionStatus::from_elapsed(elapsed_secs, settings) {
        TransitionStatus::WithinLimit => Ok(()),
        TransitionStatus::ExtendFirstPeriod => Err(PlanError::TransitionWarning { elapsed_secs }),
        TransitionStatus::Exceeded => Err(PlanError::TransitionExceeded { elapsed_secs }),
    }
}

/// Lengthen the adjustable head of period 1 by a half period.
/// Returns false when the timeline has no adjustable segment.
pub fn extend_first_period(timeline: &mut Timeline, settings: &PlanSettings) -> bool {
    let extra_secs = f64::from(settings.o2_period_minutes) * 60.0 / 2.0;
    let Some(segment) = timeline.segments.iter_mut().find(|s| s.adjustable) else {
        return false;
    };
    segment.extend_by(extra_secs);
    segment.description.push_str(&format!(
        " (extended by {} min after a long surface interval)",
        extra_secs / 60.0
    ));
    segment.adjustable = false;
    timeline.total_time_secs += extra_secs;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedded;

    fn row(depth: f64, bottom_time: u32) -> DiveTableEntry {
        embedded::builtin()
            .unwrap()
            .dive_table
            .into_iter()
            .find(|e| e.depth == depth && e.bottom_time == bottom_time)
            .unwrap()
    }

    fn o2_secs(segments: &[TimelineSegment]) -> f64 {
        segments
            .iter()
            .filter(|s| s.gas == BreathingGas::O2)
            .map(|s| s.duration_secs)
            .sum()
    }

    #[test]
    fn test_first_period_totals_thirty_minutes() {
        // 1 chamber period
        let timeline = synthesize(&row(18.3, 80), 18.3, &PlanSettings::default()).unwrap();
        let chamber: Vec<_> = timeline
            .segments
            .iter()
            .skip_while(|s| s.kind != SegmentKind::SurDo2Transition)
            .skip(1)
            .collect();

        assert_eq!(chamber[0].kind, SegmentKind::O2Period);
        assert_eq!(chamber[0].position, Position::Level { depth: 15.0 });
        assert_eq!(chamber[0].duration_secs, 900.0);
        assert!(chamber[0].adjustable);
        assert_eq!(chamber[1].kind, SegmentKind::Ascent);
        assert_eq!(chamber[2].position, Position::Level { depth: 12.2 });

        let period_one: f64 = chamber[..3].iter().map(|s| s.duration_secs).sum();
        assert!((period_one - 1800.0).abs() < 1e-9, "period 1 lasted {period_one} s");
    }

    #[test]
    fn test_shallow_stops_are_skipped_in_water() {
        let timeline = synthesize(&row(30.5, 60), 30.5, &PlanSettings::default()).unwrap();
        let stops: Vec<_> = timeline
            .segments
            .iter()
            .filter(|s| s.kind == SegmentKind::Stop)
            .collect();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].position, Position::Level { depth: 12.2 });
    }

    #[test]
    fn test_without_deep_stop_diver_ascends_to_12_2_first() {
        let timeline = synthesize(&row(18.3, 80), 18.3, &PlanSettings::default()).unwrap();
        assert_eq!(
            timeline.segments[0].position,
            Position::Travel {
                from_depth: 18.3,
                to_depth: 12.2
            }
        );
        assert_eq!(timeline.segments[0].rate_m_per_min, Some(9.0));
        assert_eq!(timeline.segments[1].kind, SegmentKind::SurDo2Transition);
    }

    #[test]
    fn test_transition_is_count_up_outside_total() {
        let timeline = synthesize(&row(30.5, 60), 30.5, &PlanSettings::default()).unwrap();
        let transition = timeline
            .segments
            .iter()
            .find(|s| s.kind == SegmentKind::SurDo2Transition)
            .unwrap();
        assert_eq!(
            transition.timer,
            TimerRequirement::CountUp {
                warning_secs: 300,
                error_secs: Some(420)
            }
        );
        let fixed: f64 = timeline
            .segments
            .iter()
            .filter(|s| !s.is_count_up())
            .map(|s| s.duration_secs)
            .sum();
        assert!((timeline.total_time_secs - fixed).abs() < 1e-9);
    }

    #[test]
    fn test_fractional_periods_and_air_breaks() {
        // 2.5 periods: 30 + 30 + 15 min of O₂, two air breaks
        let timeline = synthesize(&row(30.5, 60), 30.5, &PlanSettings::default()).unwrap();
        let chamber_o2 = o2_secs(&timeline.segments);
        assert!((chamber_o2 - 75.0 * 60.0).abs() < 1e-9, "O₂ {chamber_o2} s");

        let breaks = timeline
            .segments
            .iter()
            .filter(|s| s.kind == SegmentKind::AirBreak)
            .count();
        assert_eq!(breaks, 2);

        let last = timeline.segments.last().unwrap();
        assert_eq!(last.kind, SegmentKind::Ascent);
        assert_eq!(last.gas, BreathingGas::Air);
        assert_eq!(last.rate_m_per_min, Some(30.0));
        assert_eq!(
            last.position,
            Position::Travel {
                from_depth: 12.2,
                to_depth: 0.0
            }
        );
    }

    #[test]
    fn test_fifth_period_moves_to_nine_metres_during_break() {
        let timeline = synthesize(&row(48.8, 55), 48.8, &PlanSettings::default()).unwrap();
        let moving_break = timeline
            .segments
            .iter()
            .find(|s| {
                s.kind == SegmentKind::AirBreak && matches!(s.position, Position::Travel { .. })
            })
            .unwrap();
        assert_eq!(
            moving_break.position,
            Position::Travel {
                from_depth: 12.2,
                to_depth: 9.0
            }
        );
        assert_eq!(moving_break.duration_secs, 300.0);
        assert_eq!(timeline.segments.last().unwrap().position.end_depth(), 0.0);
    }

    #[test]
    fn test_half_period_only_stays_at_fifteen_metres() {
        let tables = embedded::builtin().unwrap();
        let entry = tables
            .dive_table
            .iter()
            .find(|e| e.surface_o2 && e.chamber_periods == Some(0.5))
            .unwrap();
        let timeline = synthesize(entry, entry.depth, &PlanSettings::default()).unwrap();
        let periods: Vec<_> = timeline
            .segments
            .iter()
            .filter(|s| s.kind == SegmentKind::O2Period)
            .collect();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].duration_secs, 900.0);
        assert_eq!(periods[0].position, Position::Level { depth: 15.0 });
    }

    #[test]
    fn test_split_transition_mode() {
        let settings = PlanSettings {
            unified_transition: false,
            ..PlanSettings::default()
        };
        let timeline = synthesize(&row(30.5, 60), 30.5, &settings).unwrap();
        let kinds: Vec<_> = timeline.segments.iter().map(|s| s.kind).collect();
        assert!(!kinds.contains(&SegmentKind::SurDo2Transition));
        let interval = kinds
            .iter()
            .position(|k| *k == SegmentKind::SurfaceInterval)
            .unwrap();
        assert_eq!(kinds[interval + 1], SegmentKind::Compression);
        assert_eq!(timeline.segments[interval + 1].duration_secs, 30.0);
    }

    #[test]
    fn test_transition_thresholds() {
        let settings = PlanSettings::default();
        assert_eq!(
            TransitionStatus::from_elapsed(299, &settings),
            TransitionStatus::WithinLimit
        );
        assert_eq!(
            TransitionStatus::from_elapsed(300, &settings),
            TransitionStatus::ExtendFirstPeriod
        );
        assert_eq!(
            TransitionStatus::from_elapsed(419, &settings),
            TransitionStatus::ExtendFirstPeriod
        );
        assert_eq!(
            TransitionStatus::from_elapsed(420, &settings),
            TransitionStatus::Exceeded
        );

        assert_eq!(check_transition(120, &settings), Ok(()));
        assert!(check_transition(300, &settings).unwrap_err().is_warning_only());
        assert_eq!(
            check_transition(420, &settings),
            Err(PlanError::TransitionExceeded { elapsed_secs: 420 })
        );
    }

    #[test]
    fn test_extension_adds_half_period_once() {
        let settings = PlanSettings::default();
        let mut timeline = synthesize(&row(18.3, 80), 18.3, &settings).unwrap();
        let before = timeline.total_time_secs;

        assert!(extend_first_period(&mut timeline, &settings));
        assert!((timeline.total_time_secs - before - 900.0).abs() < 1e-9);
        let head = timeline
            .segments
            .iter()
            .find(|s| s.kind == SegmentKind::O2Period)
            .unwrap();
        assert_eq!(head.duration_secs, 1800.0);
        assert_eq!(
            head.timer,
            TimerRequirement::Countdown {
                duration_secs: 1800.0
            }
        );

        assert!(!extend_first_period(&mut timeline, &settings));
    }

    #[test]
    fn test_row_without_periods_is_rejected() {
        let mut entry = row(18.3, 80);
        entry.chamber_periods = None;
        assert!(matches!(
            synthesize(&entry, 18.3, &PlanSettings::default()),
            Err(PlanError::InvalidInput(_))
        ));
    }
}
