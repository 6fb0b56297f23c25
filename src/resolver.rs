//! # Table Entry Resolver
//!
//! Picks the governing row of the dive table for a modality, depth and bottom
//! time. Lookup never rounds down: it takes the shallowest tabulated depth
//! that is at least the requested one, then the shortest tabulated bottom
//! time at or above the requested one at that depth.
//!
//! No-decompression rows (all modality flags off) are eligible for every
//! modality: a dive inside the no-decompression limit needs no procedure.

use crate::{error::PlanError, tables::DiveTableEntry, tables::Tables, Modality};
use tracing::debug;

fn eligible(entry: &DiveTableEntry, modality: Modality) -> bool {
    entry.allows(modality) || entry.is_no_decompression()
}

/// Minimal-conservative row for `modality`, if the table covers the dive.
pub fn find_entry(
    tables: &Tables,
    modality: Modality,
    depth: f64,
    bottom_time: u32,
) -> Option<&DiveTableEntry> {
    let table_depth = tables
        .dive_table
        .iter()
        .filter(|e| eligible(e, modality) && e.depth >= depth)
        .map(|e| e.depth)
        .min_by(f64::total_cmp)?;

    tables
        .dive_table
        .iter()
        .filter(|e| eligible(e, modality) && e.depth == table_depth)
        .filter(|e| e.bottom_time >= bottom_time)
        .min_by_key(|e| e.bottom_time)
}

/// Resolve the governing row, or fail with the modalities that would cover
/// the dive instead.
pub fn resolve(
    tables: &Tables,
    modality: Modality,
    depth: f64,
    bottom_time: u32,
) -> Result<&DiveTableEntry, PlanError> {
    if let Some(entry) = find_entry(tables, modality, depth, bottom_time) {
        debug!(
            %modality,
            depth,
            bottom_time,
            table_depth = entry.depth,
            table_time = entry.bottom_time,
            "resolved table entry"
        );
        return Ok(entry);
    }

    let alternatives: Vec<Modality> = Modality::ALL
        .into_iter()
        .filter(|m| *m != modality)
        .filter(|m| find_entry(tables, *m, depth, bottom_time).is_some())
        .collect();
    debug!(%modality, depth, bottom_time, ?alternatives, "no program");

    Err(PlanError::NoProgram {
        modality,
        depth,
        bottom_time,
        alternatives,
    })
}
