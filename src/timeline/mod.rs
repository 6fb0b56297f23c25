//! # Timeline Synthesizer
//!
//! Turns a resolved table row into the ordered list of segments the diver
//! follows to the surface. One synthesizer per modality:
//!
//! - [`air`]: in-water stops on air
//! - [`water_o2`]: in-water stops, switching to O₂ at the shallow stops
//! - [`surdo2`]: abbreviated in-water phase, surface transition and chamber
//!   O₂ periods
//!
//! The [`oxygen`] segmenter breaks long O₂ exposures into periods separated
//! by air breaks and is shared by the two oxygen modalities.
//!
//! ## Timers
//! Segments never run a clock. Each one declares a [`TimerRequirement`]:
//! a countdown for fixed-duration stops and periods, or a count-up with
//! warning/error thresholds for procedures whose length depends on the crew
//! (gas switch, surface transition). Count-up segments carry no fixed
//! duration and never contribute to the plan's total time.

use crate::{config::PlanSettings, tables::DiveTableEntry, BreathingGas};
use serde::{Deserialize, Serialize};

pub mod air;
pub mod oxygen;
pub mod surdo2;
pub mod water_o2;

/// Kind of step in a decompression timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Ascent,
    Stop,
    O2Period,
    AirBreak,
    Compression,
    TravelShiftVent,
    SurfaceInterval,
    #[serde(rename = "surdo2_transition")]
    SurDo2Transition,
}

/// Where a segment takes place: a fixed depth, or travel between two.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    Travel { from_depth: f64, to_depth: f64 },
    Level { depth: f64 },
}

impl Position {
    /// Depth at the end of the segment.
    pub fn end_depth(&self) -> f64 {
        match *self {
            Position::Travel { to_depth, .. } => to_depth,
            Position::Level { depth } => depth,
        }
    }
}

/// Timer the host must run for a segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerRequirement {
    /// Travel at a fixed rate; no timer
    None,
    /// Count down from a fixed duration
    Countdown { duration_secs: f64 },
    /// Count up from zero, alerting at the thresholds
    CountUp {
        warning_secs: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_secs: Option<u32>,
    },
}

/// One step of a decompression timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    #[serde(flatten)]
    pub position: Position,
    /// Fixed duration (s); zero for count-up segments
    pub duration_secs: f64,
    pub gas: BreathingGas,
    pub description: String,
    /// Travel rate (m/min) for ascents and compression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_m_per_min: Option<f64>,
    pub timer: TimerRequirement,
    /// Duration may be extended on the caller's confirmation
    #[serde(default)]
    pub adjustable: bool,
}

impl TimelineSegment {
    /// Travel between two depths at `rate` m/min.
    pub fn travel(
        kind: SegmentKind,
        from_depth: f64,
        to_depth: f64,
        rate: f64,
        gas: BreathingGas,
    ) -> Self {
        let description = match kind {
            SegmentKind::Compression => format!(
                "Compress from {from_depth} m to {to_depth} m at {rate} m/min"
            ),
            _ => format!("Ascend from {from_depth} m to {to_depth} m at {rate} m/min"),
        };
        TimelineSegment {
            kind,
            position: Position::Travel {
                from_depth,
                to_depth,
            },
            duration_secs: travel_secs(from_depth, to_depth, rate),
            gas,
            description,
            rate_m_per_min: Some(rate),
            timer: TimerRequirement::None,
            adjustable: false,
        }
    }

    /// Fixed-duration segment at one depth, timed with a countdown.
    pub fn timed(
        kind: SegmentKind,
        depth: f64,
        minutes: f64,
        gas: BreathingGas,
        description: String,
    ) -> Self {
        let duration_secs = minutes * 60.0;
        TimelineSegment {
            kind,
            position: Position::Level { depth },
            duration_secs,
            gas,
            description,
            rate_m_per_min: None,
            timer: TimerRequirement::Countdown { duration_secs },
            adjustable: false,
        }
    }

    pub fn is_count_up(&self) -> bool {
        matches!(self.timer, TimerRequirement::CountUp { .. })
    }

    /// Add `secs` to a countdown segment, keeping its timer in step.
    pub(crate) fn extend_by(&mut self, secs: f64) {
        self.duration_secs += secs;
        if let TimerRequirement::Countdown { duration_secs } = &mut self.timer {
            *duration_secs = self.duration_secs;
        }
    }
}

/// Seconds to travel between two depths at `rate` m/min.
pub fn travel_secs(from_depth: f64, to_depth: f64, rate: f64) -> f64 {
    (from_depth - to_depth).abs() / rate * 60.0
}

/// A tabulated in-water stop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stop {
    pub depth: f64,
    pub minutes: u32,
}

/// Non-zero stops of a table row, deepest first.
pub fn extract_stops(entry: &DiveTableEntry) -> Vec<Stop> {
    entry
        .stops
        .entries()
        .into_iter()
        .filter_map(|(depth, minutes)| match minutes {
            Some(minutes) if minutes > 0 => Some(Stop { depth, minutes }),
            _ => None,
        })
        .collect()
}

/// Synthesized segments plus the plan's fixed-duration total.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    pub segments: Vec<TimelineSegment>,
    /// Sum of the durations that count toward decompression time (s)
    pub total_time_secs: f64,
}

impl Timeline {
    /// Append a segment whose duration counts toward the total.
    pub(crate) fn push(&mut self, segment: TimelineSegment) {
        self.total_time_secs += segment.duration_secs;
        self.segments.push(segment);
    }

    /// Append a segment kept out of the total (air breaks, count-ups).
    pub(crate) fn push_untimed(&mut self, segment: TimelineSegment) {
        self.segments.push(segment);
    }

    /// Append an in-water ascent when there is anywhere to ascend to.
    pub(crate) fn ascend(&mut self, from: f64, to: f64, rate: f64, gas: BreathingGas) {
        if from > to {
            self.push(TimelineSegment::travel(
                SegmentKind::Ascent,
                from,
                to,
                rate,
                gas,
            ));
        }
    }
}

/// Direct ascent from the bottom: the whole procedure for a dive inside the
/// no-decompression limit.
pub fn no_decompression(real_depth: f64, settings: &PlanSettings) -> Timeline {
    let mut timeline = Timeline::default();
    timeline.ascend(real_depth, 0.0, settings.ascent_rate, BreathingGas::Air);
    timeline
}
