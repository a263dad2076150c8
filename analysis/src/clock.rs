/// Converts decoder ticks into elapsed match time and detects when a new
/// second starts.
#[derive(Debug, Clone)]
pub struct Clock {
    tick_rate: f64,
    round_duration: f64,
    last_processed_second: Option<u32>,
}

impl Clock {
    /// `tick_rate` has to be positive, both decoders reject any other rate
    /// before a clock is created.
    pub fn new(tick_rate: f64, round_duration: f64) -> Self {
        Self {
            tick_rate,
            round_duration,
            last_processed_second: None,
        }
    }

    pub fn elapsed(&self, tick: u32) -> f64 {
        tick as f64 / self.tick_rate
    }

    /// Returns the second that `tick` falls into, but only the first time a
    /// tick of a later second than all previous ones is seen.
    pub fn advance(&mut self, tick: u32) -> Option<u32> {
        let second = self.elapsed(tick).floor() as u32;

        if self.last_processed_second.is_some_and(|last| second <= last) {
            return None;
        }

        self.last_processed_second = Some(second);
        Some(second)
    }

    pub fn last_processed_second(&self) -> Option<u32> {
        self.last_processed_second
    }

    /// Remaining round time, clamped at zero and rounded to 2 decimals.
    pub fn countdown(&self, elapsed: f64, round_start: f64) -> f64 {
        let remaining = (self.round_duration - (elapsed - round_start)).max(0.0);
        (remaining * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_once_per_second() {
        let mut clock = Clock::new(64.0, 115.0);

        assert_eq!(Some(0), clock.advance(0));
        assert_eq!(None, clock.advance(1));
        assert_eq!(None, clock.advance(63));
        assert_eq!(Some(1), clock.advance(64));
        assert_eq!(None, clock.advance(64));
        assert_eq!(None, clock.advance(127));
        assert_eq!(Some(3), clock.advance(200));
        assert_eq!(Some(3), clock.last_processed_second());
    }

    #[test]
    fn first_tick_late_in_the_match() {
        let mut clock = Clock::new(64.0, 115.0);

        assert_eq!(None, clock.last_processed_second());
        assert_eq!(Some(40), clock.advance(64 * 40 + 10));
    }

    #[test]
    fn ticks_going_backwards_never_flush() {
        let mut clock = Clock::new(128.0, 115.0);

        assert_eq!(Some(2), clock.advance(300));
        assert_eq!(None, clock.advance(10));
        assert_eq!(None, clock.advance(256));
        assert_eq!(Some(3), clock.advance(384));
    }

    #[test]
    fn elapsed_uses_tick_rate() {
        let clock = Clock::new(64.0, 115.0);
        assert_eq!(1.5, clock.elapsed(96));

        let clock = Clock::new(128.0, 115.0);
        assert_eq!(0.75, clock.elapsed(96));
    }

    #[test]
    fn countdown() {
        let clock = Clock::new(64.0, 115.0);

        assert_eq!(0.0, clock.countdown(125.0, 10.0));
        assert_eq!(0.0, clock.countdown(300.0, 10.0));
        assert_eq!(75.0, clock.countdown(50.0, 10.0));
        assert_eq!(115.0, clock.countdown(10.0, 10.0));
        assert_eq!(114.67, clock.countdown(10.333, 10.0));
    }

    #[test]
    fn countdown_configurable_duration() {
        let clock = Clock::new(64.0, 40.0);

        assert_eq!(30.0, clock.countdown(20.0, 10.0));
        assert_eq!(0.0, clock.countdown(60.0, 10.0));
    }
}
