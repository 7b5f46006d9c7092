//! Step progress throttling.

/// Reporting granularity in percent.
pub const PROGRESS_INCREMENT: u8 = 5;

/// Turns raw `(step, total)` callbacks into percentages, reporting only when
/// a new 5% threshold is crossed or the final step arrives.
#[derive(Debug, Default)]
pub struct StepThrottle {
    last_percent: u8,
}

impl StepThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the percentage to report, or `None` to stay quiet.
    pub fn observe(&mut self, step: u32, total: u32) -> Option<u8> {
        if total == 0 {
            return None;
        }

        let step = step.min(total);
        let percent = std::cmp::min((u64::from(step) * 100 / u64::from(total)) as u8, 99);

        let next_threshold = (self.last_percent / PROGRESS_INCREMENT + 1) * PROGRESS_INCREMENT;
        if percent >= next_threshold || step == total {
            self.last_percent = (percent / PROGRESS_INCREMENT) * PROGRESS_INCREMENT;
            Some(if step == total { 100 } else { percent })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_every_five_percent() {
        let mut throttle = StepThrottle::new();
        let reported: Vec<u8> = (1..=100).filter_map(|s| throttle.observe(s, 100)).collect();
        assert_eq!(reported.len(), 20);
        assert_eq!(reported[0], 5);
        assert_eq!(*reported.last().unwrap(), 100);
    }

    #[test]
    fn coarse_steps_report_each_time() {
        let mut throttle = StepThrottle::new();
        assert_eq!(throttle.observe(1, 4), Some(25));
        assert_eq!(throttle.observe(2, 4), Some(50));
        assert_eq!(throttle.observe(3, 4), Some(75));
        assert_eq!(throttle.observe(4, 4), Some(100));
    }

    #[test]
    fn zero_total_is_ignored() {
        let mut throttle = StepThrottle::new();
        assert_eq!(throttle.observe(0, 0), None);
    }

    #[test]
    fn small_moves_are_suppressed() {
        let mut throttle = StepThrottle::new();
        assert_eq!(throttle.observe(1, 50), None);
        assert_eq!(throttle.observe(3, 50), Some(6));
        assert_eq!(throttle.observe(4, 50), None);
    }
}
