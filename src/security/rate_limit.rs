//! Rate Limiting Module
//!
//! Sliding-window rate limiting over three nested windows (minute, hour,
//! day) with temporary block marks.
//!
//! Window timestamp lists are per-identifier, in-process state; the
//! read-then-append sequence runs under one per-identifier mutex so two
//! concurrent requests cannot both take the last slot. Block marks and
//! repeat-offender strike counters go through the shared KV capability so
//! they survive fan-out across gateway instances.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::security::store::SharedKvStore;

const MINUTE_SECONDS: i64 = 60;
const HOUR_SECONDS: i64 = 3600;
const DAY_SECONDS: i64 = 86400;

/// Per-window request thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitRule {
    /// Maximum requests per minute
    pub requests_per_minute: u32,
    /// Maximum requests per hour
    pub requests_per_hour: u32,
    /// Maximum requests per day
    pub requests_per_day: u32,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1000,
            requests_per_day: 10000,
        }
    }
}

impl RateLimitRule {
    /// Tight limits for sensitive endpoints (credential exchange etc.)
    pub fn strict() -> Self {
        Self {
            requests_per_minute: 20,
            requests_per_hour: 200,
            requests_per_day: 1000,
        }
    }
}

/// Which limit produced a denial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLimitReason {
    /// Identifier carries an active block mark
    IpBlocked,
    Minute,
    Hour,
    Day,
}

impl RateLimitReason {
    /// Stable machine-readable reason code
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitReason::IpBlocked => "ip_blocked",
            RateLimitReason::Minute => "rate_limit_minute",
            RateLimitReason::Hour => "rate_limit_hour",
            RateLimitReason::Day => "rate_limit_day",
        }
    }

    /// Block duration applied when this window trips
    fn block_seconds(&self) -> i64 {
        match self {
            RateLimitReason::IpBlocked => 0,
            RateLimitReason::Minute => MINUTE_SECONDS,
            RateLimitReason::Hour => HOUR_SECONDS,
            RateLimitReason::Day => DAY_SECONDS,
        }
    }
}

/// Remaining capacity per window after an allowed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowRemaining {
    pub minute: u32,
    pub hour: u32,
    pub day: u32,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    /// Request admitted and recorded
    Allowed { remaining: WindowRemaining },
    /// Request denied; not recorded as consumed
    Denied {
        reason: RateLimitReason,
        retry_after: u64,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Multi-window rate limiter with block-until marks
pub struct RateLimiter {
    rule: RateLimitRule,
    /// Request timestamps (unix seconds, ascending) per identifier.
    /// The Arc lets the per-identifier mutex be taken without holding a
    /// map shard lock; different identifiers never contend.
    windows: DashMap<String, Arc<Mutex<VecDeque<i64>>>>,
    store: Arc<dyn SharedKvStore>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(rule: RateLimitRule, store: Arc<dyn SharedKvStore>, enabled: bool) -> Self {
        Self {
            rule,
            windows: DashMap::new(),
            store,
            enabled,
        }
    }

    /// Check the identifier against the block mark, then the minute, hour
    /// and day windows in that order. The first window at or over its
    /// threshold denies the request and applies a block mark for that
    /// window's duration; a denied request is never recorded.
    pub async fn check(&self, identifier: &str) -> Result<RateDecision> {
        self.check_at(identifier, Utc::now()).await
    }

    /// `check` against a supplied instant (deterministic replays/tests)
    pub async fn check_at(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<RateDecision> {
        if !self.enabled {
            return Ok(RateDecision::Allowed {
                remaining: WindowRemaining {
                    minute: self.rule.requests_per_minute,
                    hour: self.rule.requests_per_hour,
                    day: self.rule.requests_per_day,
                },
            });
        }

        let now_ts = now.timestamp();
        let block_key = Self::block_key(identifier);

        // An active block mark supersedes all window checks.
        if let Some(raw) = self.store.get(&block_key).await? {
            match raw.parse::<i64>() {
                Ok(until) if until > now_ts => {
                    return Ok(RateDecision::Denied {
                        reason: RateLimitReason::IpBlocked,
                        retry_after: (until - now_ts) as u64,
                    });
                }
                _ => {
                    // Stale or unparsable mark
                    self.store.delete(&block_key).await?;
                }
            }
        }

        let cell = self
            .windows
            .entry(identifier.to_string())
            .or_default()
            .clone();

        // Per-identifier critical section: prune, count, decide, record.
        let decision = {
            let mut timestamps = cell.lock();

            let day_cutoff = now_ts - DAY_SECONDS;
            while timestamps.front().is_some_and(|t| *t <= day_cutoff) {
                timestamps.pop_front();
            }

            let minute_cutoff = now_ts - MINUTE_SECONDS;
            let hour_cutoff = now_ts - HOUR_SECONDS;

            let day_count = timestamps.len() as u32;
            let hour_count = timestamps.iter().filter(|t| **t > hour_cutoff).count() as u32;
            let minute_count = timestamps.iter().filter(|t| **t > minute_cutoff).count() as u32;

            if minute_count >= self.rule.requests_per_minute {
                RateDecision::Denied {
                    reason: RateLimitReason::Minute,
                    retry_after: MINUTE_SECONDS as u64,
                }
            } else if hour_count >= self.rule.requests_per_hour {
                RateDecision::Denied {
                    reason: RateLimitReason::Hour,
                    retry_after: HOUR_SECONDS as u64,
                }
            } else if day_count >= self.rule.requests_per_day {
                RateDecision::Denied {
                    reason: RateLimitReason::Day,
                    retry_after: DAY_SECONDS as u64,
                }
            } else {
                timestamps.push_back(now_ts);
                RateDecision::Allowed {
                    remaining: WindowRemaining {
                        minute: self.rule.requests_per_minute - minute_count - 1,
                        hour: self.rule.requests_per_hour - hour_count - 1,
                        day: self.rule.requests_per_day - day_count - 1,
                    },
                }
            }
        };

        if let RateDecision::Denied { reason, .. } = &decision {
            let seconds = reason.block_seconds();
            let until = now_ts + seconds;
            self.store
                .set_with_ttl(&block_key, &until.to_string(), seconds as u64)
                .await?;

            let strikes = self
                .store
                .atomic_increment(&Self::strike_key(identifier))
                .await?;
            warn!(
                identifier,
                reason = reason.as_str(),
                strikes,
                "rate limit exceeded, block mark applied"
            );
        }

        Ok(decision)
    }

    /// Lifetime block count for an identifier across all instances
    pub async fn strike_count(&self, identifier: &str) -> Result<i64> {
        Ok(self
            .store
            .get(&Self::strike_key(identifier))
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    /// Drop all state for an identifier (admin/testing)
    pub async fn clear_identifier(&self, identifier: &str) -> Result<()> {
        self.windows.remove(identifier);
        self.store.delete(&Self::block_key(identifier)).await?;
        self.store.delete(&Self::strike_key(identifier)).await?;
        Ok(())
    }

    fn block_key(identifier: &str) -> String {
        format!("rate:block:{}", identifier)
    }

    fn strike_key(identifier: &str) -> String {
        format!("rate:strikes:{}", identifier)
    }
}
