//! Adaptive concurrency window: +1 per success, -1 per failure, bounded.

use crate::config::SchedulerConfig;
use crate::tier::DeviceTier;

/// Target number of simultaneous transfers.
///
/// Always within `[min, max]`; `max` is fixed at construction from the device
/// tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyWindow {
    current: usize,
    min: usize,
    max: usize,
}

impl ConcurrencyWindow {
    /// Create a window with the given bounds and starting value. Bounds are
    /// normalised so that `1 <= min <= max`, and the start is clamped into them.
    pub fn new(min: usize, max: usize, initial: usize) -> Self {
        let min = min.max(1);
        let max = max.max(min);
        Self {
            current: initial.clamp(min, max),
            min,
            max,
        }
    }

    /// Window for a batch on the given tier.
    pub fn for_tier(cfg: &SchedulerConfig, tier: DeviceTier) -> Self {
        Self::new(cfg.min_window, cfg.max_window(tier), cfg.initial_window)
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Additive increase after a success, capped at the tier ceiling.
    pub fn grow(&mut self) {
        if self.current < self.max {
            self.current += 1;
        }
    }

    /// Additive decrease after a failure, floored at the minimum.
    pub fn shrink(&mut self) {
        if self.current > self.min {
            self.current -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial_value_regardless_of_tier() {
        let cfg = SchedulerConfig::default();
        for tier in [DeviceTier::Low, DeviceTier::Mid, DeviceTier::High] {
            assert_eq!(ConcurrencyWindow::for_tier(&cfg, tier).current(), 3);
        }
        assert_eq!(ConcurrencyWindow::for_tier(&cfg, DeviceTier::High).max(), 7);
    }

    #[test]
    fn initial_clamped_into_bounds() {
        assert_eq!(ConcurrencyWindow::new(1, 2, 3).current(), 2);
        assert_eq!(ConcurrencyWindow::new(4, 8, 3).current(), 4);
        let w = ConcurrencyWindow::new(0, 0, 0);
        assert_eq!((w.min(), w.max(), w.current()), (1, 1, 1));
    }

    #[test]
    fn grow_caps_and_shrink_floors() {
        let mut w = ConcurrencyWindow::new(1, 5, 3);
        for _ in 0..10 {
            w.grow();
        }
        assert_eq!(w.current(), 5);
        for _ in 0..10 {
            w.shrink();
        }
        assert_eq!(w.current(), 1);
        w.grow();
        assert_eq!(w.current(), 2);
    }
}
