//! # Altitude Converter
//!
//! Diving at altitude is planned with the sea-level tables by converting the
//! real depth into the *equivalent* sea-level depth that produces the same
//! decompression obligation.
//!
//! ## Conversion
//! 1. Barometric pressure at altitude from the standard atmosphere:
//!    `P = P0 · (1 − L·h / T0)^E`
//! 2. A gauge that was not recalibrated at altitude under-reads; add 0.3 m per
//!    304.32 m of altitude before scaling
//! 3. `equivalent = adjusted · P0 / P`, rounded to 0.1 m
//!
//! The equivalent depth drives table lookup; the real depth still drives
//! ascent timing.
//!
//! This module also resolves the repetitive group assigned to divers who
//! arrived at altitude less than 12 hours before diving.

use crate::{round_tenth, tables::Tables, RepetitiveGroup};
use serde::{Deserialize, Serialize};

/// Standard sea-level pressure (hPa)
pub const SEA_LEVEL_PRESSURE: f64 = 1013.25;
/// Standard sea-level temperature (K)
const SEA_LEVEL_TEMPERATURE: f64 = 288.15;
/// Temperature lapse rate (K/m)
const LAPSE_RATE: f64 = 0.0065;
/// Barometric exponent g·M / (R·L)
const EXPONENT: f64 = 5.255;

/// Gauge correction for a depth gauge zeroed at sea level: 0.3 m per 304.32 m
const GAUGE_CORRECTION_PER_METRE: f64 = 0.3 / 304.32;

/// Barometric pressure (hPa) at `altitude` metres.
pub fn barometric_pressure(altitude: f64) -> f64 {
    SEA_LEVEL_PRESSURE * (1.0 - LAPSE_RATE * altitude / SEA_LEVEL_TEMPERATURE).powf(EXPONENT)
}

/// Equivalent sea-level depth for a dive at `altitude`.
///
/// Identity at sea level. Altitude must be non-negative; the caller
/// validates it.
///
/// # Example
/// ```
/// use deco_plan_lib::altitude::equivalent_depth;
///
/// assert_eq!(equivalent_depth(18.3, 0.0, false), 18.3);
/// assert_eq!(equivalent_depth(20.0, 1000.0, true), 22.5);
/// ```
pub fn equivalent_depth(real_depth: f64, altitude: f64, recalibrated: bool) -> f64 {
    if altitude == 0.0 {
        return real_depth;
    }

    let adjusted = if recalibrated {
        real_depth
    } else {
        real_depth + altitude * GAUGE_CORRECTION_PER_METRE
    };

    round_tenth(adjusted * (SEA_LEVEL_PRESSURE / barometric_pressure(altitude)))
}

/// Group assigned from the altitude table, with the row actually used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AltitudeGroup {
    pub group: RepetitiveGroup,
    /// Tabulated altitude the lookup rounded to (m)
    pub table_altitude: f64,
    /// Set when the altitude was not tabulated exactly or lies above the table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Repetitive group for a diver who arrived at `altitude` less than 12 h ago.
///
/// Rounds up to the next tabulated altitude. Above the table the highest
/// row is used and a warning attached. `None` at sea level.
pub fn altitude_group(tables: &Tables, altitude: f64) -> Option<AltitudeGroup> {
    if altitude <= 0.0 {
        return None;
    }

    if let Some(row) = tables
        .altitude_groups
        .iter()
        .find(|row| row.altitude >= altitude)
    {
        let warning = (row.altitude != altitude).then(|| {
            format!(
                "altitude {altitude} m is not tabulated; using the {} m row",
                row.altitude
            )
        });
        return Some(AltitudeGroup {
            group: row.group,
            table_altitude: row.altitude,
            warning,
        });
    }

    tables.altitude_groups.last().map(|row| AltitudeGroup {
        group: row.group,
        table_altitude: row.altitude,
        warning: Some(format!(
            "altitude {altitude} m exceeds the table ({} m); using its highest group",
            row.altitude
        )),
    })
}
