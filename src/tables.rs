//! # Table Repository
//!
//! This module holds the four static reference tables the planner reads:
//!
//! | File                          | Contents                                         |
//! |-------------------------------|--------------------------------------------------|
//! | `dive_table.json`             | Air decompression table (stops, groups, periods) |
//! | `repetitive_transitions.json` | Surface interval credit (group → new group)      |
//! | `residual_nitrogen.json`      | Residual nitrogen time per group and depth       |
//! | `altitude_groups.json`        | Group on arrival at altitude                     |
//!
//! ## Loading Strategy
//! 1. **Directory**: if a table directory is configured, all four files are
//!    read from it
//! 2. **Embedded**: on any failure, fall back to the copies compiled into the
//!    binary (see [`crate::embedded`])
//!
//! Tables are validated once at load and never mutated afterwards, so a
//! `&Tables` can be shared freely across threads.

use crate::{Modality, RepetitiveGroup};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fs, io, path::Path};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DIVE_TABLE_FILE: &str = "dive_table.json";
pub const TRANSITIONS_FILE: &str = "repetitive_transitions.json";
pub const RESIDUAL_NITROGEN_FILE: &str = "residual_nitrogen.json";
pub const ALTITUDE_GROUPS_FILE: &str = "altitude_groups.json";

/// Errors that can occur while loading or validating table files.
#[derive(Error, Debug)]
pub enum TableError {
    /// Table file could not be read
    #[error("table IO: {0}")]
    Io(#[from] io::Error),

    /// Table file is not valid JSON for its schema
    #[error("{table}: malformed table: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Table parsed but violates a structural invariant
    #[error("{table}: {reason}")]
    Invalid { table: &'static str, reason: String },
}

/// Stop durations (minutes) at the twelve standard stop depths.
///
/// Serialized with the depth as key, e.g. `{"9.1": 6, "6.1": 13}`; absent
/// depths have no stop.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StopSchedule {
    #[serde(rename = "39.6", default, skip_serializing_if = "Option::is_none")]
    pub at_39_6: Option<u32>,
    #[serde(rename = "36.6", default, skip_serializing_if = "Option::is_none")]
    pub at_36_6: Option<u32>,
    #[serde(rename = "33.5", default, skip_serializing_if = "Option::is_none")]
    pub at_33_5: Option<u32>,
    #[serde(rename = "30.5", default, skip_serializing_if = "Option::is_none")]
    pub at_30_5: Option<u32>,
    #[serde(rename = "27.4", default, skip_serializing_if = "Option::is_none")]
    pub at_27_4: Option<u32>,
    #[serde(rename = "24.4", default, skip_serializing_if = "Option::is_none")]
    pub at_24_4: Option<u32>,
    #[serde(rename = "21.3", default, skip_serializing_if = "Option::is_none")]
    pub at_21_3: Option<u32>,
    #[serde(rename = "18.3", default, skip_serializing_if = "Option::is_none")]
    pub at_18_3: Option<u32>,
    #[serde(rename = "15.2", default, skip_serializing_if = "Option::is_none")]
    pub at_15_2: Option<u32>,
    #[serde(rename = "12.2", default, skip_serializing_if = "Option::is_none")]
    pub at_12_2: Option<u32>,
    #[serde(rename = "9.1", default, skip_serializing_if = "Option::is_none")]
    pub at_9_1: Option<u32>,
    #[serde(rename = "6.1", default, skip_serializing_if = "Option::is_none")]
    pub at_6_1: Option<u32>,
}

impl StopSchedule {
    /// `(depth, minutes)` for every tabulated stop, deepest first.
    pub fn entries(&self) -> [(f64, Option<u32>); 12] {
        [
            (39.6, self.at_39_6),
            (36.6, self.at_36_6),
            (33.5, self.at_33_5),
            (30.5, self.at_30_5),
            (27.4, self.at_27_4),
            (24.4, self.at_24_4),
            (21.3, self.at_21_3),
            (18.3, self.at_18_3),
            (15.2, self.at_15_2),
            (12.2, self.at_12_2),
            (9.1, self.at_9_1),
            (6.1, self.at_6_1),
        ]
    }

    pub fn total_minutes(&self) -> u32 {
        self.entries().iter().filter_map(|(_, m)| *m).sum()
    }
}

/// One row of the air decompression table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiveTableEntry {
    /// Tabulated depth (m)
    pub depth: f64,
    /// Tabulated bottom time (min)
    pub bottom_time: u32,
    /// Eligible for in-water air decompression
    pub air: bool,
    /// Eligible for in-water oxygen decompression
    pub water_o2: bool,
    /// Eligible for surface decompression on oxygen
    pub surface_o2: bool,
    #[serde(default)]
    pub stops: StopSchedule,
    pub repetitive_group: RepetitiveGroup,
    /// Chamber O₂ periods for SurDO2; tables may write these as `2.5` or `"2.5"`
    #[serde(
        default,
        deserialize_with = "deserialize_periods",
        skip_serializing_if = "Option::is_none"
    )]
    pub chamber_periods: Option<f64>,
}

impl DiveTableEntry {
    /// Whether this row carries a program for `modality`.
    pub fn allows(&self, modality: Modality) -> bool {
        match modality {
            Modality::Air => self.air,
            Modality::WaterO2 => self.water_o2,
            Modality::SurfaceO2 => self.surface_o2,
        }
    }

    /// A row with no eligible modality marks the no-decompression limit.
    pub fn is_no_decompression(&self) -> bool {
        !self.air && !self.water_o2 && !self.surface_o2
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PeriodsRepr {
    Number(f64),
    Text(String),
}

fn deserialize_periods<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let periods = match Option::<PeriodsRepr>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(PeriodsRepr::Number(n)) => n,
        Some(PeriodsRepr::Text(s)) => s.trim().parse::<f64>().map_err(|_| {
            serde::de::Error::custom(format!("chamber periods {s:?} is not a number"))
        })?,
    };
    if periods.is_nan() || periods <= 0.0 {
        return Err(serde::de::Error::custom(format!(
            "chamber periods must be positive, got {periods}"
        )));
    }
    Ok(Some(periods))
}

/// Surface interval credit: how a group decays over a surface interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepetitiveTransitionEntry {
    pub previous_group: RepetitiveGroup,
    /// Inclusive lower bound (min)
    pub min_interval: u32,
    /// Inclusive upper bound (min)
    pub max_interval: u32,
    pub new_group: RepetitiveGroup,
}

/// Residual nitrogen time, or the marker forbidding the repetitive dive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RntCell", into = "RntCell")]
pub enum ResidualNitrogen {
    Minutes(u32),
    NotPermitted,
}

const NOT_PERMITTED: &str = "not_permitted";

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RntCell {
    Minutes(u32),
    Marker(String),
}

impl TryFrom<RntCell> for ResidualNitrogen {
    type Error = String;

    fn try_from(cell: RntCell) -> Result<Self, Self::Error> {
        match cell {
            RntCell::Minutes(m) => Ok(ResidualNitrogen::Minutes(m)),
            RntCell::Marker(s) if s == NOT_PERMITTED => Ok(ResidualNitrogen::NotPermitted),
            RntCell::Marker(s) => Err(format!("unknown residual nitrogen marker {s:?}")),
        }
    }
}

impl From<ResidualNitrogen> for RntCell {
    fn from(value: ResidualNitrogen) -> Self {
        match value {
            ResidualNitrogen::Minutes(m) => RntCell::Minutes(m),
            ResidualNitrogen::NotPermitted => RntCell::Marker(NOT_PERMITTED.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RntEntry {
    pub group: RepetitiveGroup,
    /// Next dive's tabulated depth (m)
    pub depth: f64,
    pub rnt: ResidualNitrogen,
}

/// Group assigned to a diver who arrived at `altitude` less than 12 h ago.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AltitudeGroupEntry {
    /// Altitude (m), ascending through the table
    pub altitude: f64,
    pub group: RepetitiveGroup,
}

/// The complete, validated table set.
#[derive(Clone, Debug)]
pub struct Tables {
    pub dive_table: Vec<DiveTableEntry>,
    pub transitions: Vec<RepetitiveTransitionEntry>,
    pub residual_nitrogen: Vec<RntEntry>,
    pub altitude_groups: Vec<AltitudeGroupEntry>,
}

impl Tables {
    /// Load tables from `dir` when given, falling back to the embedded set.
    ///
    /// Only a failure of the embedded tables themselves is returned as an
    /// error; a bad table directory is logged and skipped.
    pub fn load(dir: Option<&Path>) -> Result<Self, TableError> {
        if let Some(dir) = dir {
            match Self::load_dir(dir) {
                Ok(tables) => {
                    info!(
                        dir = %dir.display(),
                        rows = tables.dive_table.len(),
                        "loaded decompression tables"
                    );
                    return Ok(tables);
                }
                Err(error) => {
                    warn!(dir = %dir.display(), %error, "table directory unusable, using embedded tables");
                }
            }
        }
        crate::embedded::builtin()
    }

    /// Read all four table files from a directory.
    pub fn load_dir(dir: &Path) -> Result<Self, TableError> {
        let read = |name: &str| fs::read_to_string(dir.join(name));
        Self::from_json(
            &read(DIVE_TABLE_FILE)?,
            &read(TRANSITIONS_FILE)?,
            &read(RESIDUAL_NITROGEN_FILE)?,
            &read(ALTITUDE_GROUPS_FILE)?,
        )
    }

    /// Parse and validate the four tables from JSON text.
    pub fn from_json(
        dive_table: &str,
        transitions: &str,
        residual_nitrogen: &str,
        altitude_groups: &str,
    ) -> Result<Self, TableError> {
        let tables = Tables {
            dive_table: parse(DIVE_TABLE_FILE, dive_table)?,
            transitions: parse(TRANSITIONS_FILE, transitions)?,
            residual_nitrogen: parse(RESIDUAL_NITROGEN_FILE, residual_nitrogen)?,
            altitude_groups: parse(ALTITUDE_GROUPS_FILE, altitude_groups)?,
        };
        tables.validate()?;
        debug!(
            dive_rows = tables.dive_table.len(),
            transitions = tables.transitions.len(),
            rnt_cells = tables.residual_nitrogen.len(),
            altitudes = tables.altitude_groups.len(),
            "tables parsed"
        );
        Ok(tables)
    }

    fn validate(&self) -> Result<(), TableError> {
        let invalid = |table, reason: String| Err(TableError::Invalid { table, reason });

        if self.dive_table.is_empty() {
            return invalid(DIVE_TABLE_FILE, "table is empty".into());
        }
        for entry in &self.dive_table {
            if entry.surface_o2 && entry.chamber_periods.is_none() {
                return invalid(
                    DIVE_TABLE_FILE,
                    format!(
                        "{} m / {} min allows SurDO2 but has no chamber periods",
                        entry.depth, entry.bottom_time
                    ),
                );
            }
        }
        // Longer bottom times at the same depth never shorten the obligation.
        for depth in self.available_depths(None) {
            let mut rows: Vec<&DiveTableEntry> = self
                .dive_table
                .iter()
                .filter(|e| e.depth == depth)
                .collect();
            rows.sort_by_key(|e| e.bottom_time);
            for pair in rows.windows(2) {
                if pair[1].stops.total_minutes() < pair[0].stops.total_minutes() {
                    return invalid(
                        DIVE_TABLE_FILE,
                        format!(
                            "{} m: stop total drops between {} and {} min",
                            depth, pair[0].bottom_time, pair[1].bottom_time
                        ),
                    );
                }
            }
        }

        for t in &self.transitions {
            if t.min_interval > t.max_interval {
                return invalid(
                    TRANSITIONS_FILE,
                    format!(
                        "group {}: range {}..{} is inverted",
                        t.previous_group, t.min_interval, t.max_interval
                    ),
                );
            }
        }
        let mut groups: Vec<RepetitiveGroup> =
            self.transitions.iter().map(|t| t.previous_group).collect();
        groups.sort();
        groups.dedup();
        for group in groups {
            let mut ranges: Vec<&RepetitiveTransitionEntry> = self
                .transitions
                .iter()
                .filter(|t| t.previous_group == group)
                .collect();
            ranges.sort_by_key(|t| t.min_interval);
            for pair in ranges.windows(2) {
                if pair[1].min_interval != pair[0].max_interval + 1 {
                    return invalid(
                        TRANSITIONS_FILE,
                        format!("group {group}: ranges are not contiguous"),
                    );
                }
            }
        }

        if self
            .altitude_groups
            .windows(2)
            .any(|w| w[1].altitude <= w[0].altitude)
        {
            return invalid(
                ALTITUDE_GROUPS_FILE,
                "altitudes must be strictly ascending".into(),
            );
        }
        Ok(())
    }

    /// Distinct tabulated depths, ascending. With a modality, only depths
    /// that carry a program (or a no-decompression limit) for it.
    pub fn available_depths(&self, modality: Option<Modality>) -> Vec<f64> {
        let mut depths: Vec<f64> = self
            .dive_table
            .iter()
            .filter(|e| modality.map_or(true, |m| e.allows(m) || e.is_no_decompression()))
            .map(|e| e.depth)
            .collect();
        depths.sort_by(f64::total_cmp);
        depths.dedup();
        depths
    }

    /// Tabulated bottom times at exactly `depth`, ascending.
    pub fn available_times(&self, depth: f64, modality: Option<Modality>) -> Vec<u32> {
        let mut times: Vec<u32> = self
            .dive_table
            .iter()
            .filter(|e| e.depth == depth)
            .filter(|e| modality.map_or(true, |m| e.allows(m) || e.is_no_decompression()))
            .map(|e| e.bottom_time)
            .collect();
        times.sort_unstable();
        times.dedup();
        times
    }

    /// New group after a surface interval, if the table defines one for
    /// `previous` at `interval` minutes.
    pub fn transition(&self, previous: RepetitiveGroup, interval: u32) -> Option<RepetitiveGroup> {
        self.transitions
            .iter()
            .find(|t| {
                t.previous_group == previous
                    && t.min_interval <= interval
                    && interval <= t.max_interval
            })
            .map(|t| t.new_group)
    }

    pub fn has_transitions_for(&self, group: RepetitiveGroup) -> bool {
        self.transitions.iter().any(|t| t.previous_group == group)
    }

    /// Residual nitrogen for `group` at the shallowest tabulated depth
    /// `>= depth`, together with that depth.
    pub fn residual_nitrogen(
        &self,
        group: RepetitiveGroup,
        depth: f64,
    ) -> Option<(f64, ResidualNitrogen)> {
        self.residual_nitrogen
            .iter()
            .filter(|e| e.group == group && e.depth >= depth)
            .min_by(|a, b| a.depth.total_cmp(&b.depth))
            .map(|e| (e.depth, e.rnt))
    }
}

fn parse<T: serde::de::DeserializeOwned>(table: &'static str, json: &str) -> Result<T, TableError> {
    serde_json::from_str(json).map_err(|source| TableError::Parse { table, source })
}
