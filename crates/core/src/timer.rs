//! Frame timing for the main loop.

use std::time::{Duration, Instant};

/// Wall-clock timer for periodic statistics.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since creation or the last [`reset`](Self::reset).
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed timestep.
///
/// Input is sampled once per loop iteration and integrated with a constant step,
/// independent of how long the frame actually took.
#[derive(Debug, Clone, Copy)]
pub struct FixedStep {
    step: f32,
    steps_taken: u64,
}

impl FixedStep {
    /// `step` must be positive; [`ViewerConfig::validate`](crate::ViewerConfig::validate)
    /// enforces this for configured values.
    pub fn new(step: f32) -> Self {
        Self {
            step: step.max(f32::EPSILON),
            steps_taken: 0,
        }
    }

    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Total number of steps handed out so far.
    #[inline]
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    /// Advances by exactly one nominal step and returns it.
    pub fn next(&mut self) -> f32 {
        self.steps_taken += 1;
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_restarts_interval() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.elapsed() >= Duration::from_millis(5));

        timer.reset();
        assert!(timer.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn test_fixed_step_next_is_constant() {
        let mut step = FixedStep::new(0.16);
        assert_eq!(step.next(), 0.16);
        assert_eq!(step.next(), 0.16);
        assert_eq!(step.steps_taken(), 2);
    }

    #[test]
    fn test_fixed_step_rejects_zero() {
        let step = FixedStep::new(0.0);
        assert!(step.step() > 0.0);
    }
}
