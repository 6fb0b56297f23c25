//! # Decompression Planner Core Library
//!
//! This library computes staged decompression plans from the US Navy Rev.7
//! Chapter 9 tables. Given a depth, a bottom time, the dive altitude and a
//! decompression modality it produces the ordered list of ascents, stops,
//! oxygen periods, air breaks and chamber phases a diver follows to the
//! surface, together with the repetitive group letter used to plan the next
//! dive.
//!
//! ## Design Philosophy
//!
//! ### Table-driven, not model-driven
//! Nothing here simulates tissue gas loading. Every obligation comes from a
//! fixed regulatory table, and every lookup rounds *up* to the next tabulated
//! depth and bottom time. Anything the tables do not cover is a hard failure.
//!
//! ### Pure functions over immutable data
//! The [`tables::Tables`] repository is loaded once and never mutated.
//! [`plan::calculate_dive_plan`] is a pure function of its inputs and the
//! tables, so it can be called from any number of threads without
//! coordination.
//!
//! ### Declarative timers
//! The engine never runs a clock. Each [`timeline::TimelineSegment`] declares
//! the timer it needs (countdown with a fixed duration, or count-up with
//! warning/error thresholds) and the host UI schedules it.
//!
//! ## Data Flow
//! 1. **Altitude**: real depth → equivalent sea-level depth ([`altitude`])
//! 2. **Repetitive**: residual nitrogen adjusts the effective bottom time ([`repetitive`])
//! 3. **Resolve**: pick the governing table row ([`resolver`])
//! 4. **Synthesize**: build the modality-specific timeline ([`timeline`])
//! 5. **Envelope**: wrap the outcome as a `{success, ...}` result ([`plan`])

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Module declarations
pub mod altitude;
pub mod config;
pub mod embedded;
pub mod error;
pub mod plan;
pub mod renderer;
pub mod repetitive;
pub mod resolver;
pub mod tables;
pub mod timeline;

#[cfg(test)]
mod tests;

pub use error::PlanError;
pub use plan::{calculate_dive_plan, DivePlan, DivePlanParams, DivePlanResult};
pub use tables::Tables;

/// Decompression procedure selected by the diver.
///
/// Parsed from the wire strings `air`, `water_o2` and `surface_o2`
/// (`surdo2` is accepted as an alias for the latter).
///
/// # Example
/// ```
/// use deco_plan_lib::Modality;
///
/// let mode: Modality = "surdo2".parse().unwrap();
/// assert_eq!(mode, Modality::SurfaceO2);
/// assert_eq!(mode.to_string(), "surface_o2");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// In-water decompression breathing air
    Air,
    /// In-water decompression with oxygen at the shallow stops
    WaterO2,
    /// Surface decompression on oxygen in a recompression chamber
    #[serde(alias = "surdo2")]
    SurfaceO2,
}

impl Modality {
    /// All modalities, in the order alternatives are reported.
    pub const ALL: [Modality; 3] = [Modality::Air, Modality::WaterO2, Modality::SurfaceO2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Air => "air",
            Modality::WaterO2 => "water_o2",
            Modality::SurfaceO2 => "surface_o2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Modality::Air => "Air decompression",
            Modality::WaterO2 => "In-water O₂ decompression",
            Modality::SurfaceO2 => "Surface decompression on O₂ (SurDO₂)",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "air" => Ok(Modality::Air),
            "water_o2" => Ok(Modality::WaterO2),
            "surface_o2" | "surdo2" => Ok(Modality::SurfaceO2),
            other => Err(PlanError::InvalidMode(other.to_string())),
        }
    }
}

/// Gas breathed during a timeline segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreathingGas {
    Air,
    O2,
}

impl fmt::Display for BreathingGas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreathingGas::Air => f.write_str("Air"),
            BreathingGas::O2 => f.write_str("O₂"),
        }
    }
}

/// Repetitive group letter (A–Z) summarising residual nitrogen after a dive.
///
/// Serialized as a one-letter string. Lower-case input is normalised.
///
/// # Example
/// ```
/// use deco_plan_lib::RepetitiveGroup;
///
/// let group: RepetitiveGroup = "k".parse().unwrap();
/// assert_eq!(group.letter(), 'K');
/// assert!("7".parse::<RepetitiveGroup>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepetitiveGroup(char);

impl RepetitiveGroup {
    pub fn letter(&self) -> char {
        self.0
    }

    /// Short advisory for the surface interval that follows the dive.
    pub fn guidance(&self) -> &'static str {
        match self.0 {
            'A'..='I' => "Low nitrogen load: take it easy, hydrate and carry on with your day.",
            'J'..='R' => {
                "Some nitrogen remains in your tissues: avoid strenuous effort, rest and hydrate."
            }
            _ => "High residual nitrogen: stay at rest and hydrate well before any activity.",
        }
    }
}

impl TryFrom<char> for RepetitiveGroup {
    type Error = PlanError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        let upper = value.to_ascii_uppercase();
        if upper.is_ascii_uppercase() {
            Ok(RepetitiveGroup(upper))
        } else {
            Err(PlanError::UnknownGroup(value))
        }
    }
}

impl FromStr for RepetitiveGroup {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => RepetitiveGroup::try_from(c),
            _ => Err(PlanError::InvalidInput(format!(
                "repetitive group must be a single letter, got {s:?}"
            ))),
        }
    }
}

impl TryFrom<String> for RepetitiveGroup {
    type Error = PlanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepetitiveGroup> for String {
    fn from(group: RepetitiveGroup) -> Self {
        group.0.to_string()
    }
}

impl fmt::Display for RepetitiveGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Round a depth or altitude to one decimal place, the resolution of every
/// table in the repository.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
