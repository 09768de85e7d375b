/// Provider request throttle - 5 requests per second across the process
use lazy_static::lazy_static;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

lazy_static! {
    static ref PROVIDER_RATE_LIMITER: Mutex<RateLimiter> = Mutex::new(RateLimiter::new(5, Duration::from_secs(1)));
}

pub struct RateLimiter {
    /// Timestamps of requests inside the current window
    request_times: VecDeque<Instant>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            request_times: VecDeque::new(),
            max_requests,
            window,
        }
    }

    /// Returns how long the caller must wait; zero means the request was recorded
    fn check_and_record(&mut self, now: Instant) -> Duration {
        while let Some(&front) = self.request_times.front() {
            if now.duration_since(front) >= self.window {
                self.request_times.pop_front();
            } else {
                break;
            }
        }

        if self.request_times.len() >= self.max_requests {
            if let Some(&oldest) = self.request_times.front() {
                let elapsed = now.duration_since(oldest);
                if elapsed < self.window {
                    return self.window - elapsed;
                }
            }
        }

        self.request_times.push_back(now);
        Duration::ZERO
    }
}

/// Wait until the provider throttle admits another request
pub async fn rate_limit_provider() {
    loop {
        let wait_duration = {
            // A poisoned lock only means another caller panicked mid-update
            let mut limiter = PROVIDER_RATE_LIMITER
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            limiter.check_and_record(Instant::now())
        };

        if wait_duration.is_zero() {
            return;
        }
        tracing::debug!("Provider rate limit: waiting {}ms", wait_duration.as_millis());
        tokio::time::sleep(wait_duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_requests_within_limit() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
        let now = Instant::now();

        for _ in 0..5 {
            assert_eq!(limiter.check_and_record(now), Duration::ZERO);
        }
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
        let now = Instant::now();

        for _ in 0..5 {
            limiter.check_and_record(now);
        }

        let wait = limiter.check_and_record(now);
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(1));
    }

    #[test]
    fn test_rate_limiter_frees_slots_after_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(100));
        let start = Instant::now();

        limiter.check_and_record(start);
        limiter.check_and_record(start);
        let later = start + Duration::from_millis(150);

        assert_eq!(limiter.check_and_record(later), Duration::ZERO);
    }

    #[test]
    fn test_rate_limiter_admits_exactly_at_window_edge() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(100));
        let start = Instant::now();

        limiter.check_and_record(start);
        limiter.check_and_record(start);
        let edge = start + Duration::from_millis(100);

        assert_eq!(limiter.check_and_record(edge), Duration::ZERO);
        assert_eq!(limiter.request_times.len(), 1);
    }
}
