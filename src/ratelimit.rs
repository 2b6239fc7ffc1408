//! Client-side view of the API quota.
//!
//! The limiter never talks to the network. The facade clients ask it for a
//! [`Gate`] before each dispatch and feed it the rate-limit headers of every
//! response.

use std::time::{Duration, Instant};

use crate::models::Headers;

/// Default quota per window, used until the first response reports one.
pub const DEFAULT_RATE_LIMIT: u32 = 60;

/// Window length assumed when the quota runs out and the server never sent
/// `x-ratelimit-reset`.
pub const DEFAULT_RESET: Duration = Duration::from_secs(60);

/// How the client behaves once the local quota is used up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RateLimitMode {
    /// Track headers only. A server 429 is returned as [`Error::RateLimit`].
    ///
    /// [`Error::RateLimit`]: crate::Error::RateLimit
    #[default]
    Reactive,
    /// Sleep until the window resets, then send.
    AutoWait,
    /// Refuse to send with [`Error::HttpRateLimit`] until the window resets.
    ///
    /// [`Error::HttpRateLimit`]: crate::Error::HttpRateLimit
    FailFast,
}

/// Snapshot of the quota as last seen by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: u32,
    pub remaining: u32,
    pub used: u32,
    /// Seconds until the window resets, measured from when the snapshot was taken.
    pub reset_seconds: u64,
}

/// Decision for the next dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Proceed,
    Wait(Duration),
    Reject { reset_seconds: u64 },
}

#[derive(Debug)]
pub(crate) struct RateLimiter {
    mode: RateLimitMode,
    capacity: u32,
    limit: u32,
    remaining: u32,
    used: u32,
    deadline: Option<Instant>,
}

impl RateLimiter {
    pub(crate) fn new(mode: RateLimitMode, capacity: u32) -> Self {
        Self {
            mode,
            capacity,
            limit: capacity,
            remaining: capacity,
            used: 0,
            deadline: None,
        }
    }

    pub(crate) fn mode(&self) -> RateLimitMode {
        self.mode
    }

    /// Back to the initial quota, as after construction.
    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.mode, self.capacity);
    }

    /// A passed deadline refills the window. Running out with no known
    /// deadline starts a [`DEFAULT_RESET`] window from `now`.
    pub(crate) fn gate(&mut self, now: Instant) -> Gate {
        if self.mode == RateLimitMode::Reactive || self.remaining > 0 {
            return Gate::Proceed;
        }
        let deadline = *self.deadline.get_or_insert(now + DEFAULT_RESET);
        if deadline <= now {
            self.window_elapsed();
            return Gate::Proceed;
        }
        let wait = deadline - now;
        match self.mode {
            RateLimitMode::Reactive => Gate::Proceed,
            RateLimitMode::AutoWait => Gate::Wait(wait),
            RateLimitMode::FailFast => Gate::Reject {
                reset_seconds: ceil_seconds(wait),
            },
        }
    }

    /// Called once the wait from [`Gate::Wait`] has elapsed.
    ///
    /// Assumes the server refilled the window to the last known limit.
    pub(crate) fn window_elapsed(&mut self) {
        self.remaining = self.limit;
        self.used = 0;
        self.deadline = None;
    }

    /// Local bookkeeping for a request about to be sent.
    pub(crate) fn dispatched(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
        self.used = self.used.saturating_add(1);
    }

    /// Fields absent from `headers` keep their current value.
    pub(crate) fn record(&mut self, headers: &Headers, now: Instant) {
        if let Some(limit) = headers.x_ratelimit_limit {
            self.limit = limit;
        }
        if let Some(remaining) = headers.x_ratelimit_remaining {
            self.remaining = remaining;
        }
        if let Some(used) = headers.x_ratelimit_used {
            self.used = used;
        }
        if let Some(reset) = headers.x_ratelimit_reset {
            self.deadline = Some(now + Duration::from_secs(u64::from(reset)));
        }
    }

    pub(crate) fn snapshot(&self, now: Instant) -> RateLimitState {
        let reset_seconds = self
            .deadline
            .map(|deadline| ceil_seconds(deadline.saturating_duration_since(now)))
            .unwrap_or(0);
        RateLimitState {
            limit: self.limit,
            remaining: self.remaining,
            used: self.used,
            reset_seconds,
        }
    }
}

fn ceil_seconds(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
