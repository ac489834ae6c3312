//! Process-local sliding-window limits on write actions, keyed by actor id.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Write actions that consume a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Report,
    Comment,
    Like,
    Upload,
}

impl Action {
    fn key(self, who: &str) -> String {
        let prefix = match self {
            Action::Report => "report",
            Action::Comment => "comment",
            Action::Like => "like",
            Action::Upload => "upload",
        };
        format!("{prefix}:{who}")
    }
}

/// At most `limit` hits per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub limit: usize,
    pub window: Duration,
}

impl Budget {
    pub const fn new(limit: usize, window_secs: u64) -> Self {
        Self { limit, window: Duration::from_secs(window_secs) }
    }

    fn from_env(prefix: &str, default: Budget) -> Self {
        let read = |suffix: &str| std::env::var(format!("RL_{prefix}_{suffix}")).ok().and_then(|v| v.parse::<u64>().ok());
        Self {
            limit: read("LIMIT").map(|v| v as usize).unwrap_or(default.limit),
            window: read("WINDOW").map(Duration::from_secs).unwrap_or(default.window),
        }
    }
}

#[derive(Clone)]
pub struct InMemoryRateLimiter {
    hits: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { hits: Arc::new(DashMap::new()), enabled }
    }

    /// Records a hit and returns true, or returns false when the budget is spent.
    pub fn check(&self, key: &str, budget: Budget) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Instant::now();
        let mut recent = self.hits.entry(key.to_string()).or_default();
        while recent.front().is_some_and(|t| now.duration_since(*t) >= budget.window) {
            recent.pop_front();
        }
        if recent.len() >= budget.limit {
            return false;
        }
        recent.push_back(now);
        true
    }
}

/// Budgets per action (`RL_{PROBLEM,COMMENT,LIKE,ASSET}_{LIMIT,WINDOW}`).
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub report: Budget,
    pub comment: Budget,
    pub like: Budget,
    pub upload: Budget,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            report: Budget::new(5, 3600),
            comment: Budget::new(10, 60),
            like: Budget::new(30, 60),
            upload: Budget::new(10, 3600),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            report: Budget::from_env("PROBLEM", d.report),
            comment: Budget::from_env("COMMENT", d.comment),
            like: Budget::from_env("LIKE", d.like),
            upload: Budget::from_env("ASSET", d.upload),
        }
    }

    pub fn budget(&self, action: Action) -> Budget {
        match action {
            Action::Report => self.report,
            Action::Comment => self.comment,
            Action::Like => self.like,
            Action::Upload => self.upload,
        }
    }
}

/// Guard used by handlers.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }

    pub fn allow(&self, action: Action, who: &str) -> bool {
        self.limiter.check(&action.key(who), self.cfg.budget(action))
    }
}
