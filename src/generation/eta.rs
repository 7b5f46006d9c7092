//! Remaining-time estimation for a job.
//!
//! Linear extrapolation from completed videos: with `k` of `n` videos done
//! after `elapsed`, the job is expected to take `elapsed / k * n` in total.

use std::time::Duration;

/// A remaining-time estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaEstimate {
    pub elapsed: Duration,
    pub estimated_total: Duration,
    pub remaining: Duration,
}

impl EtaEstimate {
    /// Human-readable form, seconds with two decimals.
    pub fn text(&self) -> String {
        format!(
            "Estimated time remaining: {:.2} seconds",
            self.remaining.as_secs_f64()
        )
    }
}

/// Estimates the remaining time of a job.
///
/// Returns `None` until at least one video has completed.
pub fn estimate(elapsed: Duration, completed: u32, total: u32) -> Option<EtaEstimate> {
    if completed == 0 {
        return None;
    }

    let per_video = elapsed.as_secs_f64() / f64::from(completed);
    let estimated_total = Duration::from_secs_f64(per_video * f64::from(total));

    Some(EtaEstimate {
        elapsed,
        estimated_total,
        remaining: estimated_total.saturating_sub(elapsed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_estimate_before_first_video() {
        assert!(estimate(Duration::from_secs(30), 0, 4).is_none());
    }

    #[test]
    fn linear_extrapolation() {
        let eta = estimate(Duration::from_secs(10), 1, 4).unwrap();
        assert!((eta.estimated_total.as_secs_f64() - 40.0).abs() < 1e-6);
        assert!((eta.remaining.as_secs_f64() - 30.0).abs() < 1e-6);
        assert_eq!(eta.text(), "Estimated time remaining: 30.00 seconds");
    }

    #[test]
    fn nothing_remaining_when_done() {
        let eta = estimate(Duration::from_millis(7500), 3, 3).unwrap();
        assert!(eta.remaining.as_secs_f64() < 1e-6);
        assert_eq!(eta.text(), "Estimated time remaining: 0.00 seconds");
    }

    #[test]
    fn more_completed_than_total_saturates() {
        let eta = estimate(Duration::from_secs(9), 3, 2).unwrap();
        assert_eq!(eta.remaining, Duration::ZERO);
    }
}
