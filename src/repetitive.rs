//! # Repetitive Dive Processor
//!
//! Accounts for nitrogen left over from a previous dive (or from the ascent
//! to altitude) by adjusting the depth and bottom time fed to the resolver.
//!
//! ## Two Paths
//! - **Surface interval under 10 minutes after a dive**: the dives are one
//!   dive. Bottom times add up and the deeper of the two depths governs.
//! - **Otherwise**: the previous group decays through the surface interval
//!   credit table, then the residual nitrogen time (RNT) for the new group
//!   at the next dive's depth is added to the bottom time.
//!
//! An altitude exposure has no dive to merge with, so it always takes the
//! second path. Less than 10 minutes after arrival the credit table's first
//! interval applies.
//!
//! An interval longer than the credit table covers holds the group
//! unchanged. A "not permitted" RNT cell always fails the plan.

use crate::{error::PlanError, tables::ResidualNitrogen, tables::Tables, RepetitiveGroup};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Surface intervals shorter than this merge the two dives (min).
pub const COMBINED_DIVE_INTERVAL: u32 = 10;

/// Where the residual nitrogen comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorSource {
    /// An earlier dive, described by its group and surface interval
    PreviousDive,
    /// Arrival at altitude less than 12 hours before the dive
    Altitude,
}

/// Residual nitrogen state carried into the current dive.
#[derive(Clone, Debug, PartialEq)]
pub struct PriorExposure {
    pub source: PriorSource,
    pub group: RepetitiveGroup,
    /// Minutes since surfacing (or since arriving at altitude)
    pub surface_interval: u32,
    /// Previous dive's bottom time (min); zero for altitude exposure
    pub previous_bottom_time: u32,
    /// Previous dive's depth (m); zero for altitude exposure
    pub previous_depth: f64,
}

/// How the adjustment was computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum AdjustmentPath {
    /// Interval under 10 minutes: dives merged
    CombinedDive,
    /// Interval of 10 minutes or more: residual nitrogen time added
    ResidualNitrogen {
        new_group: RepetitiveGroup,
        /// True when the interval lay beyond the credit table
        group_held: bool,
        rnt_minutes: u32,
        /// RNT table depth the lookup rounded to (m)
        rnt_table_depth: f64,
    },
}

/// Effective dive parameters after accounting for residual nitrogen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepetitiveAdjustment {
    pub source: PriorSource,
    pub previous_group: RepetitiveGroup,
    pub surface_interval: u32,
    #[serde(flatten)]
    pub path: AdjustmentPath,
    pub effective_depth: f64,
    pub effective_bottom_time: u32,
}

/// Adjust the current dive (equivalent depth, bottom time) for `prior`.
pub fn adjust(
    tables: &Tables,
    prior: &PriorExposure,
    depth: f64,
    bottom_time: u32,
) -> Result<RepetitiveAdjustment, PlanError> {
    if prior.source == PriorSource::PreviousDive && prior.surface_interval < COMBINED_DIVE_INTERVAL
    {
        let effective_bottom_time = add_minutes(prior.previous_bottom_time, bottom_time)?;
        let effective_depth = prior.previous_depth.max(depth);
        info!(
            interval = prior.surface_interval,
            effective_depth, effective_bottom_time, "surface interval under 10 min, dives combined"
        );
        return Ok(RepetitiveAdjustment {
            source: prior.source,
            previous_group: prior.group,
            surface_interval: prior.surface_interval,
            path: AdjustmentPath::CombinedDive,
            effective_depth,
            effective_bottom_time,
        });
    }

    if !tables.has_transitions_for(prior.group) {
        return Err(PlanError::UnknownGroup(prior.group.letter()));
    }

    let credit_interval = prior.surface_interval.max(COMBINED_DIVE_INTERVAL);
    let (new_group, group_held) = match tables.transition(prior.group, credit_interval) {
        Some(group) => (group, false),
        None => {
            debug!(
                group = %prior.group,
                interval = prior.surface_interval,
                "interval beyond credit table, group held"
            );
            (prior.group, true)
        }
    };

    let not_permitted = || PlanError::RepetitiveNotPermitted {
        group: new_group,
        depth,
    };
    let (rnt_table_depth, rnt_minutes) = match tables.residual_nitrogen(new_group, depth) {
        Some((table_depth, ResidualNitrogen::Minutes(minutes))) => (table_depth, minutes),
        Some((table_depth, ResidualNitrogen::NotPermitted)) => {
            warn!(group = %new_group, table_depth, "repetitive dive not permitted");
            return Err(not_permitted());
        }
        None => {
            warn!(group = %new_group, depth, "next dive deeper than the residual nitrogen table");
            return Err(not_permitted());
        }
    };

    let effective_bottom_time = add_minutes(bottom_time, rnt_minutes)?;
    info!(
        previous = %prior.group,
        new = %new_group,
        rnt_minutes,
        effective_bottom_time,
        "residual nitrogen applied"
    );

    Ok(RepetitiveAdjustment {
        source: prior.source,
        previous_group: prior.group,
        surface_interval: prior.surface_interval,
        path: AdjustmentPath::ResidualNitrogen {
            new_group,
            group_held,
            rnt_minutes,
            rnt_table_depth,
        },
        effective_depth: depth,
        effective_bottom_time,
    })
}

fn add_minutes(a: u32, b: u32) -> Result<u32, PlanError> {
    a.checked_add(b).ok_or_else(|| {
        PlanError::InvalidInput(format!("effective bottom time {a} + {b} min is out of range"))
    })
}
