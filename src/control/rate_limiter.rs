/// Moves a value towards a target by bounded steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    current: i64,
    step: u32,
}

impl RateLimiter {
    /// A `step` of 0 disables rate limiting
    pub fn new(initial: i64, step: u32) -> Self {
        Self {
            current: initial,
            step,
        }
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn set_step(&mut self, step: u32) {
        self.step = step;
    }

    pub fn step_towards(&mut self, target: i64) -> i64 {
        let delta = target - self.current;

        self.current += if self.step == 0 {
            delta
        } else {
            let step = self.step as i64;
            delta.clamp(-step, step)
        };

        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_steps() {
        let mut limiter = RateLimiter::new(255, 10);

        assert_eq!(limiter.step_towards(200), 245);
        assert_eq!(limiter.step_towards(200), 235);
        assert_eq!(limiter.step_towards(238), 238);
        assert_eq!(limiter.step_towards(300), 248);
        assert_eq!(limiter.current(), 248);
    }

    #[test]
    fn zero_step_jumps() {
        let mut limiter = RateLimiter::new(0, 0);
        assert_eq!(limiter.step_towards(-500), -500);

        limiter.set_step(100);
        assert_eq!(limiter.step_towards(0), -400);
    }
}
