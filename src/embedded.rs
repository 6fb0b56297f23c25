//! # Embedded Tables
//!
//! Copies of the four reference tables compiled into the binary, so the
//! planner works with no table directory configured.
//!
//! ## Provenance
//! - **Depths**: the Rev.7 metric stop and table depths (3.0 m … 57.9 m)
//! - **No-decompression limits**: one row per depth, all modality flags off
//! - **Chamber periods**: written as text (`"2.5"`) exactly as the printed
//!   table gives them
//!
//! Deployments that must track a specific printing of the tables should set
//! `[tables] dir` in the configuration; those files take precedence.

use crate::tables::{TableError, Tables};
use tracing::debug;

const DIVE_TABLE: &str = include_str!("../tables/dive_table.json");
const TRANSITIONS: &str = include_str!("../tables/repetitive_transitions.json");
const RESIDUAL_NITROGEN: &str = include_str!("../tables/residual_nitrogen.json");
const ALTITUDE_GROUPS: &str = include_str!("../tables/altitude_groups.json");

/// Parse the embedded table set.
///
/// The JSON is validated exactly like files loaded from disk; an error here
/// means the build shipped a broken table.
pub fn builtin() -> Result<Tables, TableError> {
    debug!("parsing embedded tables");
    Tables::from_json(DIVE_TABLE, TRANSITIONS, RESIDUAL_NITROGEN, ALTITUDE_GROUPS)
}
