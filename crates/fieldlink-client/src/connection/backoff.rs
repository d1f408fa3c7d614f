use std::time::Duration;

use crate::config::ReconnectSection;

/// Reconnect delay policy.
///
/// `delay(n) = min(base * multiplier^n, max)`; a multiplier of 1.0 is a
/// fixed delay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub max: Duration,
    /// Consecutive scheduled reconnects allowed before giving up.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    pub fn from_config(cfg: &ReconnectSection) -> Self {
        Self {
            base: Duration::from_millis(cfg.base_delay_ms),
            multiplier: cfg.multiplier,
            max: Duration::from_millis(cfg.max_delay_ms),
            max_attempts: cfg.max_attempts,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let ms = self.base.as_millis() as f64 * self.multiplier.powi(exp);
        let cap = self.max.as_millis() as f64;
        if !ms.is_finite() || ms >= cap {
            return self.max;
        }
        Duration::from_millis(ms as u64)
    }

    /// Whether another automatic attempt is allowed after `attempts` tries.
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(multiplier: f64, max_attempts: Option<u32>) -> ReconnectPolicy {
        ReconnectPolicy {
            base: Duration::from_millis(1000),
            multiplier,
            max: Duration::from_millis(8000),
            max_attempts,
        }
    }

    #[test]
    fn fixed_delay() {
        let p = policy(1.0, None);
        assert_eq!(p.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(p.delay_for_attempt(25), Duration::from_millis(1000));
    }

    #[test]
    fn exponential_is_capped() {
        let p = policy(2.0, None);
        assert_eq!(p.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(p.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(p.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(p.delay_for_attempt(u32::MAX), Duration::from_millis(8000));
    }

    #[test]
    fn ceiling() {
        let p = policy(1.5, Some(3));
        assert!(p.allows(0));
        assert!(p.allows(2));
        assert!(!p.allows(3));
        assert!(policy(1.5, None).allows(u32::MAX));
    }
}
