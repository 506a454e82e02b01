use crate::config::{CrawlerConfig, ThrottleConfig};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Adaptive pacing and concurrency governor shared by every fetch
///
/// Additive-increase/multiplicative-decrease over two values: the delay waited before each
/// request and the number of workers allowed to run. Healthy 2xx streaks slowly speed the
/// crawl up, while a 429 or 5xx immediately doubles the delay and halves the worker target.
/// Lives only for the duration of one process run.
#[derive(Debug)]
pub struct ThrottleController {
    config: ThrottleConfig,
    max_workers: usize,
    state: Mutex<ThrottleState>,
}

#[derive(Debug, Clone, Copy)]
struct ThrottleState {
    delay: f64,
    worker_target: usize,
    consecutive_successes: u32,
}

impl ThrottleController {
    /// Creates a controller starting at the base delay and the full worker count
    ///
    /// # Arguments
    ///
    /// * `throttle` - Delay bounds and success window
    /// * `crawler` - Supplies the worker ceiling
    pub fn new(throttle: &ThrottleConfig, crawler: &CrawlerConfig) -> Self {
        let max_workers = crawler.workers.max(1);
        Self {
            config: throttle.clone(),
            max_workers,
            state: Mutex::new(ThrottleState {
                delay: throttle.base_delay.clamp(0.0, throttle.max_delay.max(0.0)),
                worker_target: max_workers,
                consecutive_successes: 0,
            }),
        }
    }

    /// Waits the current delay; called before every outbound request
    pub async fn before_request(&self) {
        let delay = self.delay();
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
    }

    /// Adjusts pacing from the status of a finished request
    ///
    /// Transport failures are reported as 500 by the fetcher so they back off the same way.
    pub fn after_response(&self, status: u16) {
        let mut state = self.lock();

        if (200..300).contains(&status) {
            state.consecutive_successes += 1;
            if state.consecutive_successes >= self.config.success_window {
                state.delay = (state.delay - self.config.delay_step).max(self.config.min_delay);
                state.worker_target = (state.worker_target + 1).min(self.max_workers);
                state.consecutive_successes = 0;
                tracing::debug!(
                    "Throttle relaxed: delay {:.2}s, {} workers",
                    state.delay,
                    state.worker_target
                );
            }
        } else if status == 429 || status >= 500 {
            state.delay = (state.delay * 2.0).min(self.config.max_delay);
            state.worker_target = (state.worker_target / 2).max(1);
            state.consecutive_successes = 0;
            tracing::info!(
                "Throttle backing off after HTTP {}: delay {:.2}s, {} workers",
                status,
                state.delay,
                state.worker_target
            );
        }
    }

    /// Current inter-request delay
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.lock().delay)
    }

    /// Number of workers currently allowed to issue requests
    pub fn worker_target(&self) -> usize {
        self.lock().worker_target
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_throttle(workers: usize) -> ThrottleController {
        let crawler = CrawlerConfig {
            workers,
            ..CrawlerConfig::default()
        };
        ThrottleController::new(&ThrottleConfig::default(), &crawler)
    }

    fn delay_secs(throttle: &ThrottleController) -> f64 {
        throttle.delay().as_secs_f64()
    }

    #[test]
    fn test_starts_at_base_delay_and_full_workers() {
        let throttle = create_test_throttle(4);
        assert!((delay_secs(&throttle) - 0.5).abs() < 1e-6);
        assert_eq!(throttle.worker_target(), 4);
    }

    #[test]
    fn test_success_window_speeds_up() {
        let throttle = create_test_throttle(4);
        throttle.after_response(503);
        assert_eq!(throttle.worker_target(), 2);

        for _ in 0..29 {
            throttle.after_response(200);
        }
        assert!((delay_secs(&throttle) - 1.0).abs() < 1e-6);
        assert_eq!(throttle.worker_target(), 2);

        throttle.after_response(204);
        assert!((delay_secs(&throttle) - 0.9).abs() < 1e-6);
        assert_eq!(throttle.worker_target(), 3);
    }

    #[test]
    fn test_speed_up_respects_floor_and_ceiling() {
        let throttle = create_test_throttle(4);
        for _ in 0..30 * 20 {
            throttle.after_response(200);
        }
        assert!((delay_secs(&throttle) - 0.1).abs() < 1e-6);
        assert_eq!(throttle.worker_target(), 4);
    }

    #[test]
    fn test_backoff_doubles_and_halves() {
        let throttle = create_test_throttle(8);
        throttle.after_response(429);
        assert!((delay_secs(&throttle) - 1.0).abs() < 1e-6);
        assert_eq!(throttle.worker_target(), 4);

        for _ in 0..10 {
            throttle.after_response(500);
        }
        assert!((delay_secs(&throttle) - 10.0).abs() < 1e-6);
        assert_eq!(throttle.worker_target(), 1);
    }

    #[test]
    fn test_backoff_resets_success_streak() {
        let throttle = create_test_throttle(4);
        for _ in 0..29 {
            throttle.after_response(200);
        }
        throttle.after_response(502);
        throttle.after_response(200);
        assert!((delay_secs(&throttle) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_other_statuses_are_ignored() {
        let throttle = create_test_throttle(4);
        for status in [301, 302, 304, 403, 404, 410] {
            throttle.after_response(status);
        }
        assert!((delay_secs(&throttle) - 0.5).abs() < 1e-6);
        assert_eq!(throttle.worker_target(), 4);

        // 4xx does not break a 2xx streak either
        for _ in 0..15 {
            throttle.after_response(200);
        }
        throttle.after_response(404);
        for _ in 0..15 {
            throttle.after_response(200);
        }
        assert!((delay_secs(&throttle) - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_before_request_waits_delay() {
        let throttle = ThrottleController::new(
            &ThrottleConfig {
                base_delay: 0.05,
                ..ThrottleConfig::default()
            },
            &CrawlerConfig::default(),
        );
        let start = std::time::Instant::now();
        throttle.before_request().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }
}
