//! Randomized pacing policy
//!
//! Batch sizes and inter-batch delays are re-rolled after every cycle so the
//! traffic seen by the remote server does not follow a fixed rhythm.

use crate::config::PacingConfig;
use crate::{ConfigError, ConfigResult};
use rand::Rng;
use std::time::Duration;

/// Bounds the scheduler draws its batch sizes and delays from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// Smallest batch (inclusive)
    pub batch_min: usize,

    /// Largest batch (inclusive)
    pub batch_max: usize,

    /// Shortest pause after a batch (inclusive)
    pub delay_min: Duration,

    /// Longest pause after a batch (inclusive)
    pub delay_max: Duration,

    /// Wait for each individual queue pull
    pub pull_timeout: Duration,

    /// Pause after a pull times out, before the next cycle
    pub idle_pause: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from(&PacingConfig::default())
    }
}

impl From<&PacingConfig> for Pacing {
    fn from(config: &PacingConfig) -> Self {
        Self {
            batch_min: config.batch_size_min,
            batch_max: config.batch_size_max,
            delay_min: Duration::from_secs(config.delay_min_secs),
            delay_max: Duration::from_secs(config.delay_max_secs),
            pull_timeout: Duration::from_millis(config.pull_timeout_ms),
            idle_pause: Duration::from_millis(config.idle_pause_ms),
        }
    }
}

impl Pacing {
    /// Checks that the bounds describe a schedule that can make progress
    ///
    /// # Errors
    ///
    /// * `ConfigError::Validation` - a batch of zero jobs is allowed, a
    ///   range is inverted, or the pull timeout is zero
    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_min < 1 {
            return Err(ConfigError::Validation(format!(
                "batch_min must be >= 1, got {}",
                self.batch_min
            )));
        }

        if self.batch_min > self.batch_max {
            return Err(ConfigError::Validation(format!(
                "batch_min ({}) must not exceed batch_max ({})",
                self.batch_min, self.batch_max
            )));
        }

        if self.delay_min > self.delay_max {
            return Err(ConfigError::Validation(format!(
                "delay_min ({:?}) must not exceed delay_max ({:?})",
                self.delay_min, self.delay_max
            )));
        }

        if self.pull_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "pull_timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Draws the next batch size uniformly from `[batch_min, batch_max]`
    ///
    /// # Panics
    ///
    /// Panics when `batch_min > batch_max`; see [`Pacing::validate`].
    pub fn roll_batch_size<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(self.batch_min..=self.batch_max)
    }

    /// Draws the next inter-batch delay uniformly from `[delay_min, delay_max]`
    ///
    /// The draw has millisecond resolution. Panics on an inverted range.
    pub fn roll_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let low = self.delay_min.as_millis() as u64;
        let high = self.delay_max.as_millis() as u64;
        Duration::from_millis(rng.random_range(low..=high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_matches_documented_ranges() {
        let pacing = Pacing::default();
        assert_eq!(pacing.batch_min, 3);
        assert_eq!(pacing.batch_max, 5);
        assert_eq!(pacing.delay_min, Duration::from_secs(5));
        assert_eq!(pacing.delay_max, Duration::from_secs(10));
        assert_eq!(pacing.pull_timeout, Duration::from_secs(1));
        assert_eq!(pacing.idle_pause, Duration::from_millis(100));
    }

    #[test]
    fn test_batch_size_stays_in_bounds() {
        let pacing = Pacing::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 6];

        for _ in 0..1000 {
            let size = pacing.roll_batch_size(&mut rng);
            assert!((3..=5).contains(&size), "batch size {} out of bounds", size);
            seen[size] = true;
        }

        // Every admissible size shows up over enough draws
        assert!(seen[3] && seen[4] && seen[5]);
    }

    #[test]
    fn test_delay_stays_in_bounds() {
        let pacing = Pacing::default();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..1000 {
            let delay = pacing.roll_delay(&mut rng);
            assert!(delay >= Duration::from_secs(5));
            assert!(delay <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_degenerate_ranges() {
        let pacing = Pacing {
            batch_min: 1,
            batch_max: 1,
            delay_min: Duration::ZERO,
            delay_max: Duration::ZERO,
            ..Pacing::default()
        };
        let mut rng = StdRng::seed_from_u64(3);

        assert!(pacing.validate().is_ok());
        assert_eq!(pacing.roll_batch_size(&mut rng), 1);
        assert_eq!(pacing.roll_delay(&mut rng), Duration::ZERO);
    }

    #[test]
    fn test_validate_rejects_unusable_bounds() {
        let zero_batch = Pacing {
            batch_min: 0,
            batch_max: 0,
            ..Pacing::default()
        };
        let inverted_batch = Pacing {
            batch_min: 5,
            batch_max: 3,
            ..Pacing::default()
        };
        let inverted_delay = Pacing {
            delay_min: Duration::from_secs(10),
            delay_max: Duration::from_secs(5),
            ..Pacing::default()
        };
        let no_pull_wait = Pacing {
            pull_timeout: Duration::ZERO,
            ..Pacing::default()
        };

        for pacing in [zero_batch, inverted_batch, inverted_delay, no_pull_wait] {
            assert!(
                matches!(pacing.validate(), Err(ConfigError::Validation(_))),
                "{:?} should be rejected",
                pacing
            );
        }
        assert!(Pacing::default().validate().is_ok());
    }
}
