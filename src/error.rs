use crate::{Modality, RepetitiveGroup};
use thiserror::Error;

/// Errors produced while computing or assessing a dive plan.
///
/// None of these is ever silently corrected. [`PlanError::NoProgram`] carries
/// the modalities that *would* cover the dive so the caller can offer them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("no {modality} program covers {depth} m for {bottom_time} min")]
    NoProgram {
        modality: Modality,
        depth: f64,
        bottom_time: u32,
        alternatives: Vec<Modality>,
    },

    #[error("repetitive dive not permitted: group {group} at {depth} m")]
    RepetitiveNotPermitted { group: RepetitiveGroup, depth: f64 },

    #[error(
        "surface interval of {elapsed_secs} s exceeds 7 minutes: treat per Treatment Table 5 or 6"
    )]
    TransitionExceeded { elapsed_secs: u32 },

    #[error(
        "surface interval of {elapsed_secs} s exceeds 5 minutes: extend the first O₂ period by one half-period"
    )]
    TransitionWarning { elapsed_secs: u32 },

    #[error("invalid decompression mode: {0}")]
    InvalidMode(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown repetitive group: {0}")]
    UnknownGroup(char),
}

impl PlanError {
    /// Modalities that cover the requested dive, when the chosen one does not.
    pub fn alternatives(&self) -> Option<&[Modality]> {
        match self {
            PlanError::NoProgram { alternatives, .. } if !alternatives.is_empty() => {
                Some(alternatives)
            }
            _ => None,
        }
    }

    /// True when the failure is an advisory the caller may resolve by
    /// confirming an adjustment, rather than a hard stop.
    pub fn is_warning_only(&self) -> bool {
        matches!(self, PlanError::TransitionWarning { .. })
    }
}
