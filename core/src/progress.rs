//! Display-progress estimation.
//!
//! Upstream generation services report coarse phases, not percentages. The
//! estimator turns (current progress, status) into a monotonic value for a
//! progress bar. It is a display heuristic, never a correctness signal: the
//! bar only reaches 100 on the terminal completion status.

use serde::{Deserialize, Serialize};

use crate::task::TaskStatus;

/// Tuning for [`estimate`]. The defaults keep a pending task under 40% and a
/// processing task inside the 50..=90 band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProgressCurve {
    #[serde(default = "default_pending_step")]
    pub pending_step: u8,

    #[serde(default = "default_pending_ceiling")]
    pub pending_ceiling: u8,

    #[serde(default = "default_processing_step")]
    pub processing_step: u8,

    #[serde(default = "default_processing_floor")]
    pub processing_floor: u8,

    #[serde(default = "default_processing_ceiling")]
    pub processing_ceiling: u8,
}

fn default_pending_step() -> u8 {
    5
}

fn default_pending_ceiling() -> u8 {
    40
}

fn default_processing_step() -> u8 {
    10
}

fn default_processing_floor() -> u8 {
    50
}

fn default_processing_ceiling() -> u8 {
    90
}

impl Default for ProgressCurve {
    fn default() -> Self {
        Self {
            pending_step: default_pending_step(),
            pending_ceiling: default_pending_ceiling(),
            processing_step: default_processing_step(),
            processing_floor: default_processing_floor(),
            processing_ceiling: default_processing_ceiling(),
        }
    }
}

impl ProgressCurve {
    /// Map the current displayed progress and task status to the next value.
    ///
    /// Guarantees: never decreases for Pending/Processing, returns exactly
    /// 100 for Completed, and returns the input unchanged for Failed and
    /// Canceled.
    pub fn estimate(&self, current: u8, status: TaskStatus) -> u8 {
        match status {
            TaskStatus::Completed => 100,
            TaskStatus::Failed | TaskStatus::Canceled => current,
            TaskStatus::Pending => {
                let next = current.saturating_add(self.pending_step);
                next.min(self.pending_ceiling).max(current)
            }
            TaskStatus::Processing => {
                let base = current.max(self.processing_floor);
                let next = base.saturating_add(self.processing_step);
                next.min(self.processing_ceiling).max(current)
            }
        }
    }
}

/// [`ProgressCurve::estimate`] with the default curve.
pub fn estimate(current: u8, status: TaskStatus) -> u8 {
    ProgressCurve::default().estimate(current, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_is_always_100() {
        for p in [0u8, 1, 40, 90, 99, 100] {
            assert_eq!(estimate(p, TaskStatus::Completed), 100);
        }
    }

    #[test]
    fn failed_and_canceled_never_move() {
        for p in 0..=100u8 {
            assert_eq!(estimate(p, TaskStatus::Failed), p);
            assert_eq!(estimate(p, TaskStatus::Canceled), p);
        }
    }

    #[test]
    fn pending_and_processing_are_monotonic() {
        for p in 0..=100u8 {
            assert!(estimate(p, TaskStatus::Pending) >= p);
            assert!(estimate(p, TaskStatus::Processing) >= p);
        }
    }

    #[test]
    fn pending_caps_at_ceiling() {
        let curve = ProgressCurve::default();
        let mut p = 0u8;
        for _ in 0..50 {
            p = curve.estimate(p, TaskStatus::Pending);
        }
        assert_eq!(p, curve.pending_ceiling);
    }

    #[test]
    fn processing_stays_inside_band_and_below_100() {
        let curve = ProgressCurve::default();

        // From a cold start processing jumps to the floor plus one step.
        let first = curve.estimate(0, TaskStatus::Processing);
        assert!(first >= curve.processing_floor);

        let mut p = first;
        for _ in 0..50 {
            p = curve.estimate(p, TaskStatus::Processing);
            assert!(p < 100);
        }
        assert_eq!(p, curve.processing_ceiling);
    }

    #[test]
    fn processing_never_regresses_from_above_band() {
        // A task already past the ceiling (e.g. restored state) must not
        // be pulled back into the band.
        let curve = ProgressCurve::default();
        assert_eq!(curve.estimate(95, TaskStatus::Processing), 95);
    }
}
