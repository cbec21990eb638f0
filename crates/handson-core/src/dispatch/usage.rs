//! Daily usage ceilings.
//!
//! `UsageLimiter` counts requests, tokens and USD spent per local calendar
//! day. Rollover is lazy: every check and every record first compares the
//! current date with `last_reset_date` and zeroes the counters when the day
//! has changed. The check is advisory and reserves nothing, so concurrent
//! callers may overshoot a ceiling by the number of calls in flight.

use std::sync::{Mutex, MutexGuard};

use chrono::{Local, NaiveDate};
use handson_types::config::DispatchConfig;
use handson_types::dispatch::{LimitViolation, UsageCeiling, UsageStatus};

/// Per-day ceilings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageLimits {
    pub max_requests_per_day: u64,
    pub max_tokens_per_day: u64,
    pub max_cost_per_day_usd: f64,
}

impl From<&DispatchConfig> for UsageLimits {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_requests_per_day: config.max_requests_per_day,
            max_tokens_per_day: config.max_tokens_per_day,
            max_cost_per_day_usd: config.max_cost_per_day_usd,
        }
    }
}

/// Running totals for the current day.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageCounters {
    pub daily_requests: u64,
    pub daily_tokens: u64,
    pub daily_cost_usd: f64,
    pub last_reset_date: NaiveDate,
}

impl UsageCounters {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            daily_requests: 0,
            daily_tokens: 0,
            daily_cost_usd: 0.0,
            last_reset_date: today,
        }
    }
}

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

/// Daily request/token/cost gate.
pub struct UsageLimiter {
    limits: UsageLimits,
    counters: Mutex<UsageCounters>,
    clock: Clock,
}

impl UsageLimiter {
    /// Fresh counters dated today (local time).
    pub fn new(limits: UsageLimits) -> Self {
        Self::from_counters(limits, UsageCounters::new(Local::now().date_naive()))
    }

    /// Start from existing counters.
    pub fn from_counters(limits: UsageLimits, counters: UsageCounters) -> Self {
        Self {
            limits,
            counters: Mutex::new(counters),
            clock: Box::new(|| Local::now().date_naive()),
        }
    }

    /// Replace the date source.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Check every ceiling, in request/token/cost order.
    pub fn can_proceed(&self) -> Result<(), LimitViolation> {
        let counters = self.current();
        let limits = &self.limits;

        if counters.daily_requests >= limits.max_requests_per_day {
            return Err(LimitViolation {
                ceiling: UsageCeiling::Requests,
                message: format!(
                    "daily requests limit reached ({}/{})",
                    counters.daily_requests, limits.max_requests_per_day
                ),
            });
        }
        if counters.daily_tokens >= limits.max_tokens_per_day {
            return Err(LimitViolation {
                ceiling: UsageCeiling::Tokens,
                message: format!(
                    "daily tokens limit reached ({}/{})",
                    counters.daily_tokens, limits.max_tokens_per_day
                ),
            });
        }
        if counters.daily_cost_usd >= limits.max_cost_per_day_usd {
            return Err(LimitViolation {
                ceiling: UsageCeiling::Cost,
                message: format!(
                    "daily cost limit reached (${:.4}/${:.2})",
                    counters.daily_cost_usd, limits.max_cost_per_day_usd
                ),
            });
        }
        Ok(())
    }

    /// Count one completed provider call.
    pub fn record_usage(&self, tokens: u64, cost_usd: f64) {
        let mut counters = self.current();
        counters.daily_requests += 1;
        counters.daily_tokens = counters.daily_tokens.saturating_add(tokens);
        counters.daily_cost_usd += cost_usd.max(0.0);
        tracing::debug!(
            daily_requests = counters.daily_requests,
            daily_tokens = counters.daily_tokens,
            daily_cost_usd = counters.daily_cost_usd,
            "Usage recorded"
        );
    }

    pub fn get_status(&self) -> UsageStatus {
        let counters = self.current();
        UsageStatus {
            daily_requests: counters.daily_requests,
            max_requests_per_day: self.limits.max_requests_per_day,
            daily_tokens: counters.daily_tokens,
            max_tokens_per_day: self.limits.max_tokens_per_day,
            daily_cost_usd: counters.daily_cost_usd,
            max_cost_per_day_usd: self.limits.max_cost_per_day_usd,
            last_reset_date: counters.last_reset_date,
        }
    }

    /// Snapshot of the counters after any pending rollover.
    pub fn counters(&self) -> UsageCounters {
        self.current().clone()
    }

    /// Lock the counters, zeroing them first if the day has changed.
    fn current(&self) -> MutexGuard<'_, UsageCounters> {
        let today = (self.clock)();
        let mut counters = self.counters.lock().expect("usage counters lock poisoned");
        if today > counters.last_reset_date {
            tracing::debug!(
                previous = %counters.last_reset_date,
                today = %today,
                "Daily usage counters reset"
            );
            *counters = UsageCounters::new(today);
        }
        counters
    }
}

impl std::fmt::Debug for UsageLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageLimiter")
            .field("limits", &self.limits)
            .field("counters", &self.counters)
            .finish()
    }
}
