//! O₂ segmenter: splits an oxygen obligation into periods and air breaks.
//!
//! While more than the final-period ceiling (35 min) remains, a full period
//! (30 min) is breathed followed by an air break (5 min). The remainder is
//! one last period with no trailing break. Continuous O₂ never exceeds the
//! final-period ceiling.

use crate::config::PlanSettings;

/// One block of an oxygen schedule, in minutes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OxygenBlock {
    Period(u32),
    AirBreak(u32),
}

/// Break `total_minutes` of O₂ into periods and air breaks.
pub fn segment(total_minutes: u32, settings: &PlanSettings) -> Vec<OxygenBlock> {
    let mut blocks = Vec::new();
    let mut remaining = total_minutes;

    // A zero-length period would stall the loop
    let period = settings.o2_period_minutes.max(1);
    let ceiling = settings.final_period_max_minutes.max(period);

    while remaining > ceiling {
        blocks.push(OxygenBlock::Period(period));
        blocks.push(OxygenBlock::AirBreak(settings.air_break_minutes));
        remaining -= period;
    }
    if remaining > 0 {
        blocks.push(OxygenBlock::Period(remaining));
    }
    blocks
}

/// Minutes breathed on O₂ in `blocks`.
pub fn oxygen_minutes(blocks: &[OxygenBlock]) -> u32 {
    blocks
        .iter()
        .map(|block| match block {
            OxygenBlock::Period(minutes) => *minutes,
            OxygenBlock::AirBreak(_) => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use OxygenBlock::*;

    #[test]
    fn test_period_time_equals_input() {
        let settings = PlanSettings::default();
        for total in [10, 30, 35, 36, 65, 90] {
            let blocks = segment(total, &settings);
            assert_eq!(oxygen_minutes(&blocks), total, "total {}", total);
        }
    }

    #[test]
    fn test_short_obligation_needs_no_break() {
        let settings = PlanSettings::default();
        assert_eq!(segment(10, &settings), vec![Period(10)]);
        assert_eq!(segment(35, &settings), vec![Period(35)]);
    }

    #[test]
    fn test_long_obligation_alternates_periods_and_breaks() {
        let settings = PlanSettings::default();
        assert_eq!(segment(36, &settings), vec![Period(30), AirBreak(5), Period(6)]);
        assert_eq!(segment(65, &settings), vec![Period(30), AirBreak(5), Period(35)]);
        assert_eq!(
            segment(90, &settings),
            vec![Period(30), AirBreak(5), Period(30), AirBreak(5), Period(30)]
        );
    }

    #[test]
    fn test_no_period_exceeds_ceiling_and_no_trailing_break() {
        let settings = PlanSettings::default();
        for total in 1..=240 {
            let blocks = segment(total, &settings);
            assert!(matches!(blocks.last(), Some(Period(_))));
            assert!(blocks.iter().all(|b| match b {
                Period(m) => *m <= settings.final_period_max_minutes,
                AirBreak(_) => true,
            }));
        }
    }

    #[test]
    fn test_zero_obligation_is_empty() {
        assert!(segment(0, &PlanSettings::default()).is_empty());
    }
}
