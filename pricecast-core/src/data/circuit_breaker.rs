//! Circuit breaker for provider rate limiting and bans.
//!
//! HTTP 403 trips the breaker at once; repeated 429 or server errors trip
//! it after a threshold. While open, every request is refused until the
//! cooldown has elapsed.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { tripped_at: Instant },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// 15-minute cooldown, trips after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(15 * 60), 3)
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // The state is plain data, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_allowed(&self) -> bool {
        let mut state = self.lock();
        match *state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                *state = BreakerState::Closed {
                    consecutive_failures: 0,
                };
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        if let BreakerState::Closed { .. } = *state {
            *state = BreakerState::Closed {
                consecutive_failures: 0,
            };
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.lock();
        if let BreakerState::Closed {
            consecutive_failures,
        } = *state
        {
            let failures = consecutive_failures + 1;
            *state = if failures >= self.failure_threshold {
                tracing::warn!(failures, "circuit breaker tripped");
                BreakerState::Open {
                    tripped_at: Instant::now(),
                }
            } else {
                BreakerState::Closed {
                    consecutive_failures: failures,
                }
            };
        }
    }

    /// Trip immediately (403 Forbidden).
    pub fn trip(&self) {
        tracing::warn!("circuit breaker tripped by provider ban");
        *self.lock() = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match *self.lock() {
            BreakerState::Closed { .. } => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}
