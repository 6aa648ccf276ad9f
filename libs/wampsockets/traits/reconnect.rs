use rand::Rng;
use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// A strategy is stateful: every call to [`next_delay`](Self::next_delay)
/// accounts for one failed attempt.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&mut self) -> Option<Duration>;

    /// Reset the strategy state (called after a successful session)
    fn reset(&mut self);

    /// Number of retries scheduled since the last reset
    fn attempts(&self) -> u32;
}

/// Exponential backoff reconnection strategy
///
/// The first retry waits `initial_delay`; every further retry multiplies the
/// delay by `factor`, capped at `max_delay`. A non-zero `jitter` spreads each
/// delay uniformly over `delay * (1 ± jitter)`, still capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: f64,
    max_retries: Option<u32>,
    delay: Duration,
    retries: u32,
}

impl ExponentialBackoff {
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(3600);
    pub const DEFAULT_FACTOR: f64 = std::f64::consts::E;
    pub const DEFAULT_JITTER: f64 = 0.119_626_564_72;

    /// Create a new exponential backoff strategy doubling on every attempt
    ///
    /// # Arguments
    /// * `initial_delay` - The delay before the first retry
    /// * `max_delay` - The maximum delay between retries
    /// * `max_retries` - Maximum number of retries (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_retries: Option<u32>) -> Self {
        Self {
            initial_delay,
            max_delay,
            factor: 2.0,
            jitter: 0.0,
            max_retries,
            delay: initial_delay,
            retries: 0,
        }
    }

    /// Set the growth factor; values below 1 are clamped to 1
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    /// Set the jitter fraction, clamped to `0..=1`
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// Delay the next retry would use before jitter
    pub fn current_delay(&self) -> Duration {
        self.delay.min(self.max_delay)
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    fn grow(&self, base: Duration) -> Duration {
        let grown = (base.as_secs_f64() * self.factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(grown.max(0.0))
    }

    fn spread(&self, base: Duration) -> Duration {
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let secs = base.as_secs_f64();
        let low = secs * (1.0 - self.jitter);
        let high = secs * (1.0 + self.jitter);
        let jittered = rand::thread_rng().gen_range(low..=high);
        Duration::from_secs_f64(jittered.min(self.max_delay.as_secs_f64()).max(0.0))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INITIAL_DELAY, Self::DEFAULT_MAX_DELAY, None)
            .with_factor(Self::DEFAULT_FACTOR)
            .with_jitter(Self::DEFAULT_JITTER)
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self) -> Option<Duration> {
        if self.max_retries.is_some_and(|max| self.retries >= max) {
            return None;
        }
        self.retries += 1;

        let base = self.current_delay();
        self.delay = self.grow(base);
        Some(self.spread(base))
    }

    fn reset(&mut self) {
        self.delay = self.initial_delay;
        self.retries = 0;
    }

    fn attempts(&self) -> u32 {
        self.retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_twisted_style_parameters() {
        let strategy = ExponentialBackoff::default();
        assert_eq!(strategy.initial_delay(), Duration::from_secs(1));
        assert_eq!(strategy.max_delay(), Duration::from_secs(3600));
        assert!((strategy.factor() - std::f64::consts::E).abs() < f64::EPSILON);
        assert!(strategy.jitter() > 0.0);
        assert_eq!(strategy.max_retries(), None);
    }

    #[test]
    fn test_factor_and_jitter_are_clamped() {
        let strategy =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10), None)
                .with_factor(0.5)
                .with_jitter(3.0);
        assert_eq!(strategy.factor(), 1.0);
        assert_eq!(strategy.jitter(), 1.0);
    }

    #[test]
    fn test_reset_restores_initial_delay_and_attempts() {
        let mut strategy =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), None);
        for _ in 0..4 {
            strategy.next_delay();
        }
        assert_eq!(strategy.attempts(), 4);
        assert_eq!(strategy.current_delay(), Duration::from_secs(16));

        strategy.reset();

        assert_eq!(strategy.attempts(), 0);
        assert_eq!(strategy.next_delay(), Some(Duration::from_secs(1)));
    }
}
