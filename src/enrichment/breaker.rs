//! Run-scoped stop switch for provider spend.
//!
//! Trips on the first quota-exhaustion error and stays tripped until the run
//! ends. Nothing is persisted; the next run starts closed.

use super::BatchResult;
use crate::error::ProviderError;

#[derive(Debug, Default)]
pub struct CreditBreaker {
    tripped: bool,
}

impl CreditBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Inspect a provider error. Returns true if it exhausted the quota, in
    /// which case the breaker is tripped and `error_message` set (first time only).
    pub fn observe(&mut self, err: &ProviderError, result: &mut BatchResult) -> bool {
        if !err.is_quota_exhausted() {
            return false;
        }
        if !self.tripped {
            log::warn!("Enrichment run: provider credits exhausted, halting paid lookups ({})", err);
        }
        self.tripped = true;
        if result.error_message.is_none() {
            result.error_message = Some(format!(
                "Enrichment credits exhausted. Remaining contacts were left for the next run. {}",
                err.recovery_suggestion()
            ));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_do_not_trip() {
        let mut breaker = CreditBreaker::new();
        let mut result = BatchResult::default();
        assert!(!breaker.observe(&ProviderError::Timeout, &mut result));
        assert!(!breaker.is_tripped());
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_quota_trips_and_message_is_set_once() {
        let mut breaker = CreditBreaker::new();
        let mut result = BatchResult::default();
        assert!(breaker.observe(&ProviderError::QuotaExhausted("first".to_string()), &mut result));
        assert!(breaker.is_tripped());
        let first = result.error_message.clone().expect("message set");
        assert!(first.contains("credits exhausted"));

        breaker.observe(&ProviderError::QuotaExhausted("second".to_string()), &mut result);
        assert_eq!(result.error_message.as_deref(), Some(first.as_str()));
    }
}
