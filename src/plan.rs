//! # Plan Orchestrator
//!
//! [`calculate_dive_plan`] runs the whole pipeline for one dive:
//!
//! 1. Validate the parameters and parse the modality
//! 2. Convert the real depth to the equivalent sea-level depth
//! 3. Apply residual nitrogen from a previous dive and/or a recent arrival at
//!    altitude
//! 4. Resolve the governing table row
//! 5. Synthesize the modality's timeline
//!
//! [`DivePlanResult`] wraps the outcome in the `{success, ...}` envelope the
//! JSON boundary exposes.

use crate::{
    altitude::{self, AltitudeGroup},
    config::PlanSettings,
    error::PlanError,
    repetitive::{self, PriorExposure, PriorSource, RepetitiveAdjustment},
    resolver,
    tables::{DiveTableEntry, Tables},
    timeline::{self, air, surdo2, water_o2, Timeline, TimelineSegment},
    Modality, RepetitiveGroup,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Longest stay at altitude that still counts as recent arrival (min).
pub const ALTITUDE_RESIDENCE_WINDOW: i64 = 12 * 60;

/// Inputs to one plan calculation.
///
/// Deserializes from JSON with every optional field defaulted; camelCase
/// keys are accepted alongside snake_case.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivePlanParams {
    /// `air`, `water_o2` or `surface_o2`
    pub mode: String,
    /// Real depth (m)
    pub depth: f64,
    /// Bottom time (min)
    #[serde(alias = "bottomTime")]
    pub bottom_time: u32,
    /// Dive site altitude (m)
    pub altitude: f64,
    /// Depth gauge zeroed at altitude
    pub recalibrated: bool,
    #[serde(alias = "isRepetitive")]
    pub is_repetitive: bool,
    #[serde(alias = "repetitiveGroup", skip_serializing_if = "Option::is_none")]
    pub repetitive_group: Option<String>,
    /// Minutes since the previous dive surfaced
    #[serde(alias = "surfaceInterval", skip_serializing_if = "Option::is_none")]
    pub surface_interval: Option<u32>,
    #[serde(alias = "isAltitudeLessThan12h")]
    pub is_altitude_less_than_12h: bool,
    #[serde(alias = "altitudeArrivalTime", skip_serializing_if = "Option::is_none")]
    pub altitude_arrival_time: Option<DateTime<Utc>>,
    /// Time the dive starts; defaults to now
    #[serde(alias = "referenceTime", skip_serializing_if = "Option::is_none")]
    pub reference_time: Option<DateTime<Utc>>,
    #[serde(alias = "previousBottomTime")]
    pub previous_bottom_time: u32,
    #[serde(alias = "previousDepth")]
    pub previous_depth: f64,
}

/// Table depth and bottom time actually used.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundedValues {
    pub depth: f64,
    pub time: u32,
}

/// A computed decompression plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DivePlan {
    pub modality: Modality,
    pub real_depth: f64,
    pub equivalent_depth: f64,
    pub entry: DiveTableEntry,
    pub timeline: Vec<TimelineSegment>,
    /// Fixed-duration time to the surface (s); count-up segments excluded
    pub total_time_secs: f64,
    pub repetitive_group: RepetitiveGroup,
    pub group_guidance: String,
    pub rounded_values: RoundedValues,
    /// Depth fed to the resolver after repetitive adjustment (m)
    pub effective_depth: f64,
    /// Bottom time fed to the resolver after repetitive adjustment (min)
    pub effective_bottom_time: u32,
    pub no_decompression: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_group: Option<AltitudeGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetitive: Option<RepetitiveAdjustment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub first_period_extended: bool,
}

impl DivePlan {
    /// Apply the caller-confirmed half-period extension to SurDO₂ period 1.
    pub fn extend_first_period(&mut self, settings: &PlanSettings) -> Result<(), PlanError> {
        if self.first_period_extended {
            return Err(PlanError::InvalidInput(
                "first O₂ period already extended".to_string(),
            ));
        }
        let mut timeline = Timeline {
            segments: std::mem::take(&mut self.timeline),
            total_time_secs: self.total_time_secs,
        };
        let extended = surdo2::extend_first_period(&mut timeline, settings);
        self.timeline = timeline.segments;
        self.total_time_secs = timeline.total_time_secs;

        if !extended {
            return Err(PlanError::InvalidInput(format!(
                "{} plan has no adjustable O₂ period",
                self.modality
            )));
        }
        info!(total = self.total_time_secs, "first O₂ period extended");
        self.first_period_extended = true;
        Ok(())
    }
}

/// Compute the decompression plan for one dive.
pub fn calculate_dive_plan(
    tables: &Tables,
    settings: &PlanSettings,
    params: &DivePlanParams,
) -> Result<DivePlan, PlanError> {
    let modality: Modality = params.mode.parse()?;
    validate(params)?;

    let equivalent_depth =
        altitude::equivalent_depth(params.depth, params.altitude, params.recalibrated);
    let mut warnings = Vec::new();

    let mut altitude_group = None;
    let mut exposures = Vec::new();
    if params.is_altitude_less_than_12h {
        altitude_group = altitude_exposure(tables, params, &mut exposures, &mut warnings)?;
    }
    if params.is_repetitive {
        exposures.push(previous_dive(params)?);
    }

    // Every exposure must be permitted and resolvable; the most
    // conservative row governs
    let mut governing: Option<(RepetitiveAdjustment, &DiveTableEntry)> = None;
    for exposure in &exposures {
        let candidate = repetitive::adjust(tables, exposure, equivalent_depth, params.bottom_time)?;
        let row = resolver::resolve(
            tables,
            modality,
            candidate.effective_depth,
            candidate.effective_bottom_time,
        )?;
        if governing
            .as_ref()
            .map_or(true, |(_, current)| more_conservative(row, current))
        {
            governing = Some((candidate, row));
        }
    }
    let (adjustment, entry) = match governing {
        Some((adjustment, row)) => (Some(adjustment), row),
        None => (
            None,
            resolver::resolve(tables, modality, equivalent_depth, params.bottom_time)?,
        ),
    };
    let (effective_depth, effective_bottom_time) = adjustment
        .as_ref()
        .map_or((equivalent_depth, params.bottom_time), |a| {
            (a.effective_depth, a.effective_bottom_time)
        });

    let no_decompression = entry.is_no_decompression();

    let timeline = if no_decompression {
        timeline::no_decompression(params.depth, settings)
    } else {
        match modality {
            Modality::Air => air::synthesize(entry, params.depth, settings),
            Modality::WaterO2 => water_o2::synthesize(entry, params.depth, settings),
            Modality::SurfaceO2 => surdo2::synthesize(entry, params.depth, settings)?,
        }
    };

    info!(
        %modality,
        depth = params.depth,
        equivalent_depth,
        table_depth = entry.depth,
        table_time = entry.bottom_time,
        group = %entry.repetitive_group,
        no_decompression,
        "dive plan computed"
    );

    Ok(DivePlan {
        modality,
        real_depth: params.depth,
        equivalent_depth,
        entry: entry.clone(),
        timeline: timeline.segments,
        total_time_secs: timeline.total_time_secs,
        repetitive_group: entry.repetitive_group,
        group_guidance: entry.repetitive_group.guidance().to_string(),
        rounded_values: RoundedValues {
            depth: entry.depth,
            time: entry.bottom_time,
        },
        effective_depth,
        effective_bottom_time,
        no_decompression,
        altitude_group,
        repetitive: adjustment,
        warnings,
        first_period_extended: false,
    })
}

/// Deeper row first, then longer bottom time, then more stop time.
fn more_conservative(row: &DiveTableEntry, current: &DiveTableEntry) -> bool {
    (row.depth, row.bottom_time, row.stops.total_minutes())
        > (current.depth, current.bottom_time, current.stops.total_minutes())
}

fn validate(params: &DivePlanParams) -> Result<(), PlanError> {
    if !params.depth.is_finite() || params.depth <= 0.0 {
        return Err(PlanError::InvalidInput(format!(
            "depth must be positive, got {}",
            params.depth
        )));
    }
    if params.bottom_time == 0 {
        return Err(PlanError::InvalidInput(
            "bottom time must be at least 1 minute".to_string(),
        ));
    }
    if !params.altitude.is_finite() || params.altitude < 0.0 {
        return Err(PlanError::InvalidInput(format!(
            "altitude must be zero or positive, got {}",
            params.altitude
        )));
    }
    if !params.previous_depth.is_finite() || params.previous_depth < 0.0 {
        return Err(PlanError::InvalidInput(format!(
            "previous depth must be zero or positive, got {}",
            params.previous_depth
        )));
    }
    Ok(())
}

fn previous_dive(params: &DivePlanParams) -> Result<PriorExposure, PlanError> {
    let group: RepetitiveGroup = params
        .repetitive_group
        .as_deref()
        .ok_or_else(|| {
            PlanError::InvalidInput("repetitive dive requires a repetitive group".to_string())
        })?
        .parse()?;
    let surface_interval = params.surface_interval.ok_or_else(|| {
        PlanError::InvalidInput("repetitive dive requires a surface interval".to_string())
    })?;

    Ok(PriorExposure {
        source: PriorSource::PreviousDive,
        group,
        surface_interval,
        previous_bottom_time: params.previous_bottom_time,
        previous_depth: params.previous_depth,
    })
}

/// Group and exposure for a diver who arrived at altitude recently.
fn altitude_exposure(
    tables: &Tables,
    params: &DivePlanParams,
    exposures: &mut Vec<PriorExposure>,
    warnings: &mut Vec<String>,
) -> Result<Option<AltitudeGroup>, PlanError> {
    let arrival = params.altitude_arrival_time.ok_or_else(|| {
        PlanError::InvalidInput("arrival at altitude requires an arrival time".to_string())
    })?;
    let reference = params.reference_time.unwrap_or_else(Utc::now);
    let elapsed = (reference - arrival).num_minutes();

    if elapsed < 0 {
        return Err(PlanError::InvalidInput(format!(
            "altitude arrival {arrival} is after the dive"
        )));
    }
    if elapsed >= ALTITUDE_RESIDENCE_WINDOW {
        let message = format!(
            "arrived at altitude {} h ago; no altitude group applies",
            elapsed / 60
        );
        warn!("{message}");
        warnings.push(message);
        return Ok(None);
    }

    let Some(group) = altitude::altitude_group(tables, params.altitude) else {
        let message = "dive is at sea level; no altitude group applies".to_string();
        warn!("{message}");
        warnings.push(message);
        return Ok(None);
    };
    if let Some(message) = &group.warning {
        warnings.push(message.clone());
    }

    exposures.push(PriorExposure {
        source: PriorSource::Altitude,
        group: group.group,
        surface_interval: u32::try_from(elapsed).unwrap_or(u32::MAX),
        previous_bottom_time: 0,
        previous_depth: 0.0,
    });
    Ok(Some(group))
}

/// Success/failure envelope returned across the JSON boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DivePlanResult {
    pub success: bool,
    #[serde(flatten)]
    pub plan: Option<DivePlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<Modality>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_only: Option<bool>,
}

impl DivePlanResult {
    pub fn calculate(tables: &Tables, settings: &PlanSettings, params: &DivePlanParams) -> Self {
        calculate_dive_plan(tables, settings, params).into()
    }
}

impl From<Result<DivePlan, PlanError>> for DivePlanResult {
    fn from(result: Result<DivePlan, PlanError>) -> Self {
        match result {
            Ok(plan) => DivePlanResult {
                success: true,
                plan: Some(plan),
                error: None,
                alternatives: None,
                warning_only: None,
            },
            Err(error) => DivePlanResult {
                success: false,
                plan: None,
                alternatives: error.alternatives().map(<[Modality]>::to_vec),
                warning_only: error.is_warning_only().then_some(true),
                error: Some(error.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{embedded, repetitive::AdjustmentPath, timeline::Position};
    use chrono::Duration;

    fn params(mode: &str, depth: f64, bottom_time: u32) -> DivePlanParams {
        DivePlanParams {
            mode: mode.to_string(),
            depth,
            bottom_time,
            ..DivePlanParams::default()
        }
    }

    fn plan(params: &DivePlanParams) -> Result<DivePlan, PlanError> {
        let tables = embedded::builtin().unwrap();
        calculate_dive_plan(&tables, &PlanSettings::default(), params)
    }

    #[test]
    fn test_unknown_mode_fails_fast() {
        assert_eq!(
            plan(&params("heliox", 18.3, 80)),
            Err(PlanError::InvalidMode("heliox".to_string()))
        );
    }

    #[test]
    fn test_invalid_depth_and_time_rejected() {
        assert!(matches!(
            plan(&params("air", 0.0, 80)),
            Err(PlanError::InvalidInput(_))
        ));
        assert!(matches!(
            plan(&params("air", 18.3, 0)),
            Err(PlanError::InvalidInput(_))
        ));
        let mut negative_altitude = params("air", 18.3, 80);
        negative_altitude.altitude = -10.0;
        assert!(matches!(
            plan(&negative_altitude),
            Err(PlanError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_repetitive_dive_requires_group_and_interval() {
        let mut p = params("air", 18.3, 20);
        p.is_repetitive = true;
        p.surface_interval = Some(60);
        assert!(matches!(plan(&p), Err(PlanError::InvalidInput(_))));

        p.repetitive_group = Some("%".to_string());
        assert_eq!(plan(&p), Err(PlanError::UnknownGroup('%')));
    }

    #[test]
    fn test_altitude_drives_lookup_depth_not_ascent() {
        let mut p = params("air", 15.0, 40);
        p.altitude = 1000.0;
        p.recalibrated = true;
        let plan = plan(&p).unwrap();
        assert!(plan.equivalent_depth > 15.0);
        assert!(plan.rounded_values.depth >= plan.equivalent_depth);
        assert_eq!(plan.real_depth, 15.0);
        assert!(plan.no_decompression);
        assert_eq!(
            plan.timeline[0].position,
            Position::Travel {
                from_depth: 15.0,
                to_depth: 0.0
            }
        );
    }

    #[test]
    fn test_recent_arrival_at_altitude_adds_residual_nitrogen() {
        let reference = Utc::now();
        let mut p = params("air", 12.0, 30);
        p.altitude = 1000.0;
        p.recalibrated = true;
        p.is_altitude_less_than_12h = true;
        p.altitude_arrival_time = Some(reference - Duration::hours(2));
        p.reference_time = Some(reference);

        let plan = plan(&p).unwrap();
        let group = plan.altitude_group.as_ref().unwrap();
        assert_eq!(group.group.letter(), 'C');
        let adjustment = plan.repetitive.as_ref().unwrap();
        assert_eq!(adjustment.source, PriorSource::Altitude);
        assert!(plan.effective_bottom_time > 30);
        assert!(!plan.warnings.is_empty(), "1000 m is not tabulated");
    }

    #[test]
    fn test_arrival_long_ago_only_warns() {
        let reference = Utc::now();
        let mut p = params("air", 12.0, 30);
        p.altitude = 914.4;
        p.is_altitude_less_than_12h = true;
        p.altitude_arrival_time = Some(reference - Duration::hours(13));
        p.reference_time = Some(reference);

        let plan = plan(&p).unwrap();
        assert!(plan.repetitive.is_none());
        assert_eq!(plan.effective_bottom_time, 30);
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn test_missing_arrival_time_rejected() {
        let mut p = params("air", 12.0, 30);
        p.altitude = 914.4;
        p.is_altitude_less_than_12h = true;
        assert!(matches!(plan(&p), Err(PlanError::InvalidInput(_))));
    }

    #[test]
    fn test_heavier_of_two_exposures_governs() {
        let reference = Utc::now();
        let mut p = params("air", 12.0, 20);
        p.altitude = 914.4;
        p.recalibrated = true;
        p.is_altitude_less_than_12h = true;
        p.altitude_arrival_time = Some(reference - Duration::hours(3));
        p.reference_time = Some(reference);
        p.is_repetitive = true;
        p.repetitive_group = Some("Z".to_string());
        p.surface_interval = Some(30);

        let plan = plan(&p).unwrap();
        let adjustment = plan.repetitive.unwrap();
        assert_eq!(adjustment.source, PriorSource::PreviousDive);
    }

    #[test]
    fn test_deeper_combined_dive_outranks_longer_altitude_time() {
        let reference = Utc::now();
        let mut p = params("air", 12.0, 20);
        p.altitude = 1000.0;
        p.recalibrated = true;
        p.is_altitude_less_than_12h = true;
        p.altitude_arrival_time = Some(reference - Duration::hours(2));
        p.reference_time = Some(reference);
        p.is_repetitive = true;
        p.repetitive_group = Some("C".to_string());
        p.surface_interval = Some(5);
        p.previous_bottom_time = 10;
        p.previous_depth = 30.5;

        // Altitude alone gives 13.5 m for 34 min; the merged dive is 30.5 m for 30 min
        let plan = plan(&p).unwrap();
        assert_eq!(plan.repetitive.unwrap().source, PriorSource::PreviousDive);
        assert_eq!(plan.effective_depth, 30.5);
        assert_eq!(plan.effective_bottom_time, 30);
        assert_eq!(plan.rounded_values.depth, 30.5);
        assert_eq!(plan.rounded_values.time, 30);
        assert!(!plan.no_decompression);
        assert_eq!(plan.entry.stops.total_minutes(), 8);
    }

    #[test]
    fn test_fresh_arrival_at_altitude_is_penalised() {
        let reference = Utc::now();
        let arrival = |minutes_ago: i64| {
            let mut p = params("air", 12.0, 30);
            p.altitude = 1000.0;
            p.recalibrated = true;
            p.is_altitude_less_than_12h = true;
            p.altitude_arrival_time = Some(reference - Duration::minutes(minutes_ago));
            p.reference_time = Some(reference);
            p
        };

        let fresh = plan(&arrival(5)).unwrap();
        let later = plan(&arrival(120)).unwrap();
        assert!(matches!(
            fresh.repetitive.as_ref().unwrap().path,
            AdjustmentPath::ResidualNitrogen { .. }
        ));
        assert!(fresh.effective_bottom_time >= later.effective_bottom_time);
        assert_eq!(fresh.effective_bottom_time, 51);
    }

    #[test]
    fn test_params_accept_camel_case_json() {
        let p: DivePlanParams = serde_json::from_str(
            r#"{"mode": "surdo2", "depth": 30, "bottomTime": 60, "isRepetitive": false}"#,
        )
        .unwrap();
        assert_eq!(p.bottom_time, 60);
        assert_eq!(p.altitude, 0.0);
        assert!(!p.recalibrated);
        assert_eq!(p.mode.parse::<Modality>().unwrap(), Modality::SurfaceO2);
    }

    #[test]
    fn test_failure_envelope_carries_alternatives() {
        let tables = embedded::builtin().unwrap();
        let result =
            DivePlanResult::calculate(&tables, &PlanSettings::default(), &params("air", 9.1, 600));
        assert!(!result.success);
        assert!(result.plan.is_none());
        assert_eq!(
            result.alternatives,
            Some(vec![Modality::WaterO2, Modality::SurfaceO2])
        );
        assert_eq!(result.warning_only, None);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["alternatives"][0], "water_o2");
    }

    #[test]
    fn test_success_envelope_flattens_plan() {
        let tables = embedded::builtin().unwrap();
        let result =
            DivePlanResult::calculate(&tables, &PlanSettings::default(), &params("air", 18.3, 80));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["repetitive_group"], "N");
        assert_eq!(json["rounded_values"]["time"], 80);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_extension_rejected_outside_surface_decompression() {
        let mut air = plan(&params("air", 18.3, 80)).unwrap();
        assert!(air
            .extend_first_period(&PlanSettings::default())
            .is_err());

        let mut sur = plan(&params("surface_o2", 18.3, 80)).unwrap();
        let before = sur.total_time_secs;
        sur.extend_first_period(&PlanSettings::default()).unwrap();
        assert!(sur.first_period_extended);
        assert!((sur.total_time_secs - before - 900.0).abs() < 1e-9);
        assert!(sur.extend_first_period(&PlanSettings::default()).is_err());
    }
}
