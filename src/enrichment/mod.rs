//! Credit-aware contact and company enrichment.
//!
//! A run selects the owner's records that need work, groups them by employer
//! domain, resolves each one against zero-cost cache tiers, and only then
//! spends a provider credit. Quota exhaustion halts spending for the rest of
//! the run without stamping what was left, so the next run resumes there.

pub mod breaker;
pub mod cache;
pub mod eligibility;
pub mod grouping;
pub mod mailbox;
pub mod organization;
pub mod person;
pub mod progress;
pub mod runner;

use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

pub use progress::{CancelHandle, NoopProgress, ProgressSink};
pub use runner::run_enrichment;

/// Counters for one run.
///
/// `total == enriched + skipped + errors` once a run returns. The
/// supplementary counters are diagnostics and sit outside that sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total: u32,
    pub enriched: u32,
    pub skipped: u32,
    pub errors: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Provider calls that reached the provider (successful or not).
    #[serde(default)]
    pub credits_used: u32,
    /// Person records answered by another record at zero cost.
    #[serde(default)]
    pub cache_hits: u32,
    #[serde(default)]
    pub organizations_enriched: u32,
}

impl BatchResult {
    pub fn processed(&self) -> u32 {
        self.enriched + self.skipped + self.errors
    }

    pub fn is_balanced(&self) -> bool {
        self.processed() == self.total
    }
}

/// Ten years.
pub const MAX_STALENESS_DAYS: u32 = 3650;
/// One year.
pub const MAX_RETRY_COOLDOWN_HOURS: u32 = 8760;

/// Freshness and pacing knobs, stored under `enrichment` in config.json.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentSettings {
    /// Matched records older than this are re-checked in force mode.
    #[serde(default = "default_staleness_days")]
    pub staleness_days: u32,
    /// No-match records older than this are retried in force mode.
    #[serde(default = "default_retry_cooldown_hours")]
    pub retry_cooldown_hours: u32,
    /// Pause between consecutive paid calls.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// How long a finished run stays pollable in the registry.
    #[serde(default = "default_registry_ttl_secs")]
    pub registry_ttl_secs: u64,
}

fn default_staleness_days() -> u32 {
    7
}

fn default_retry_cooldown_hours() -> u32 {
    24
}

fn default_throttle_ms() -> u64 {
    200
}

fn default_registry_ttl_secs() -> u64 {
    3600
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            staleness_days: default_staleness_days(),
            retry_cooldown_hours: default_retry_cooldown_hours(),
            throttle_ms: default_throttle_ms(),
            registry_ttl_secs: default_registry_ttl_secs(),
        }
    }
}

impl EnrichmentSettings {
    pub fn staleness_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.staleness_days))
    }

    pub fn retry_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.retry_cooldown_hours))
    }

    pub fn throttle(&self) -> StdDuration {
        StdDuration::from_millis(self.throttle_ms)
    }

    pub fn registry_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.registry_ttl_secs)
    }

    /// The negative-cache cooldown must stay shorter than the staleness
    /// window, otherwise "retry no-matches sooner than matches" inverts.
    pub fn validate(&self) -> Result<(), String> {
        if self.staleness_days == 0 {
            return Err("enrichment.stalenessDays must be at least 1".to_string());
        }
        if self.retry_cooldown_hours == 0 {
            return Err("enrichment.retryCooldownHours must be at least 1".to_string());
        }
        if self.staleness_days > MAX_STALENESS_DAYS {
            return Err(format!(
                "enrichment.stalenessDays must be at most {}",
                MAX_STALENESS_DAYS
            ));
        }
        if self.retry_cooldown_hours > MAX_RETRY_COOLDOWN_HOURS {
            return Err(format!(
                "enrichment.retryCooldownHours must be at most {}",
                MAX_RETRY_COOLDOWN_HOURS
            ));
        }
        if self.retry_cooldown() >= self.staleness_window() {
            return Err(format!(
                "enrichment.retryCooldownHours ({}) must be shorter than stalenessDays ({} days)",
                self.retry_cooldown_hours, self.staleness_days
            ));
        }
        Ok(())
    }
}

/// Per-run options supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Also re-check stale matches and cooled-down no-matches.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub settings: EnrichmentSettings,
}

/// Copy `new_value` into `target` when it carries data. Returns true if written.
///
/// Provider answers never blank out a field a previous lookup filled.
pub(crate) fn merge_text(
    target: &mut Option<String>,
    field_name: &str,
    new_value: Option<&str>,
    fields_updated: &mut Vec<String>,
) -> bool {
    let value = match new_value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return false,
    };
    if target.as_deref() == Some(value) {
        return false;
    }
    *target = Some(value.to_string());
    fields_updated.push(field_name.to_string());
    true
}

pub(crate) fn merge_number(
    target: &mut Option<i64>,
    field_name: &str,
    new_value: Option<i64>,
    fields_updated: &mut Vec<String>,
) -> bool {
    match new_value {
        Some(v) if *target != Some(v) => {
            *target = Some(v);
            fields_updated.push(field_name.to_string());
            true
        }
        _ => false,
    }
}
