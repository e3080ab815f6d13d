//! Drives one enrichment run for an owner.
//!
//! Sequential by design: one provider call in flight at a time, a fixed
//! pause between paid calls, progress reported after every unit of work.

use chrono::Utc;

use super::breaker::CreditBreaker;
use super::cache::{self, CacheOutcome, CachePolicy, CacheTarget};
use super::eligibility;
use super::grouping::{self, DomainGroup};
use super::mailbox::is_generic_mailbox;
use super::organization::{self, OrganizationOutcome};
use super::person::{self, PersonOutcome};
use super::progress::{CancelHandle, ProgressSink};
use super::{BatchResult, RunOptions};
use crate::db::{DbError, DbPerson, EnrichmentDb};
use crate::error::ProviderError;
use crate::provider::IdentityProvider;
use crate::util::now_timestamp;

/// Run enrichment for every record `owner_id` owns.
///
/// Only failing to load the owner's records is an `Err`. Provider failures,
/// quota exhaustion, and cancellation all end in a normal `BatchResult`
/// whose counters sum to `total`. The returned value equals the last
/// snapshot handed to `progress`.
pub async fn run_enrichment(
    db: &EnrichmentDb,
    provider: &dyn IdentityProvider,
    owner_id: &str,
    options: &RunOptions,
    progress: &dyn ProgressSink,
    cancel: &CancelHandle,
) -> Result<BatchResult, DbError> {
    let now = Utc::now();
    let people = db.list_people_for_owner(owner_id)?;

    let mut result = BatchResult { total: people.len() as u32, ..Default::default() };
    let selection = eligibility::select(people, options.force, now, &options.settings);
    result.skipped += selection.skipped;

    log::info!(
        "Enrichment run: owner={} total={} eligible={} force={}",
        owner_id,
        result.total,
        selection.eligible.len(),
        options.force
    );
    progress.report(&result);

    let mut run = Run {
        db,
        provider,
        options,
        policy: CachePolicy { force: options.force, now, settings: options.settings.clone() },
        progress,
        cancel,
        breaker: CreditBreaker::new(),
        result,
        paid_calls: 0,
    };

    for group in grouping::group_by_domain(selection.eligible) {
        run.process_group(group).await;
    }

    let result = run.result;
    progress.report(&result);

    log::info!(
        "Enrichment run: owner={} done enriched={} skipped={} errors={} credits={} cache_hits={}",
        owner_id,
        result.enriched,
        result.skipped,
        result.errors,
        result.credits_used,
        result.cache_hits
    );
    debug_assert!(result.is_balanced(), "counters must sum to total");
    Ok(result)
}

struct Run<'a> {
    db: &'a EnrichmentDb,
    provider: &'a dyn IdentityProvider,
    options: &'a RunOptions,
    policy: CachePolicy,
    progress: &'a dyn ProgressSink,
    cancel: &'a CancelHandle,
    breaker: CreditBreaker,
    result: BatchResult,
    paid_calls: u32,
}

impl Run<'_> {
    fn halted(&self) -> bool {
        self.breaker.is_tripped() || self.cancel.is_cancelled()
    }

    fn report(&self) {
        self.progress.report(&self.result);
    }

    /// Space consecutive paid calls by the configured throttle.
    async fn before_paid_call(&mut self) {
        let throttle = self.options.settings.throttle();
        if self.paid_calls > 0 && !throttle.is_zero() {
            tokio::time::sleep(throttle).await;
        }
        self.paid_calls += 1;
        self.result.credits_used += 1;
    }

    async fn process_group(&mut self, group: DomainGroup) {
        if !self.halted() {
            if let Some(domain) = group.domain.as_deref() {
                self.process_organization(domain).await;
            }
        }

        for person in &group.people {
            if self.halted() {
                // Left unstamped so the next run picks it up.
                self.result.skipped += 1;
            } else {
                self.process_person(person).await;
            }
            self.report();
        }
    }

    async fn process_organization(&mut self, domain: &str) {
        let org = match self.db.get_organization(domain) {
            Ok(Some(org)) => org,
            Ok(None) => {
                log::debug!("Enrichment run: no organization row for {}, skipping lookup", domain);
                return;
            }
            Err(e) => {
                log::warn!("Enrichment run: failed to load organization {}: {}", domain, e);
                return;
            }
        };

        match cache::resolve(self.db, CacheTarget::Organization(&org), &self.policy) {
            Ok(CacheOutcome::Miss) => {}
            Ok(_) => {
                log::debug!("Enrichment run: organization {} already current", domain);
                self.report();
                return;
            }
            Err(e) => {
                log::warn!("Enrichment run: cache lookup failed for {}: {}", domain, e);
                return;
            }
        }

        self.before_paid_call().await;
        match organization::enrich_organization(self.db, self.provider, &org).await {
            Ok(OrganizationOutcome::Enriched { fields_updated }) => {
                self.result.organizations_enriched += 1;
                log::info!("Enrichment run: {} enriched ({} fields)", domain, fields_updated.len());
            }
            Ok(OrganizationOutcome::NoMatch) => {
                log::debug!("Enrichment run: no company data for {}", domain);
            }
            Ok(OrganizationOutcome::Failed(e)) => {
                if !self.breaker.observe(&e, &mut self.result) {
                    log_lookup_failure(domain, &e);
                }
            }
            Err(e) => {
                log::warn!("Enrichment run: failed to save organization {}: {}", domain, e);
            }
        }
        self.report();
    }

    async fn process_person(&mut self, person: &DbPerson) {
        if is_generic_mailbox(&person.email) {
            match self.stamp_generic_mailbox(person) {
                Ok(()) => self.result.skipped += 1,
                Err(e) => {
                    log::warn!("Enrichment run: failed to stamp {}: {}", person.id, e);
                    self.result.errors += 1;
                }
            }
            return;
        }

        match cache::resolve(self.db, CacheTarget::Person(person), &self.policy) {
            Ok(CacheOutcome::PersonMatch(source)) => {
                match cache::apply_person_match(self.db, person, &source) {
                    Ok(_) => {
                        self.result.enriched += 1;
                        self.result.cache_hits += 1;
                    }
                    Err(e) => {
                        log::warn!("Enrichment run: failed to copy cached match onto {}: {}", person.id, e);
                        self.result.errors += 1;
                    }
                }
                return;
            }
            Ok(CacheOutcome::KnownNoMatch) => {
                match cache::apply_known_no_match(self.db, person) {
                    Ok(()) => self.result.skipped += 1,
                    Err(e) => {
                        log::warn!("Enrichment run: failed to stamp {}: {}", person.id, e);
                        self.result.errors += 1;
                    }
                }
                return;
            }
            Ok(CacheOutcome::Miss | CacheOutcome::OrganizationCurrent) => {}
            Err(e) => {
                log::warn!("Enrichment run: cache lookup failed for {}: {}", person.id, e);
                self.result.errors += 1;
                return;
            }
        }

        self.before_paid_call().await;
        match person::enrich_person(self.db, self.provider, person).await {
            Ok(PersonOutcome::Enriched { .. }) => self.result.enriched += 1,
            Ok(PersonOutcome::NoMatch) => self.result.skipped += 1,
            Ok(PersonOutcome::Failed(e)) => {
                if self.breaker.observe(&e, &mut self.result) {
                    self.result.skipped += 1;
                } else {
                    log_lookup_failure(&person.id, &e);
                    self.result.errors += 1;
                }
            }
            Err(e) => {
                log::warn!("Enrichment run: failed to save {}: {}", person.id, e);
                self.result.errors += 1;
            }
        }
    }

    fn stamp_generic_mailbox(&self, person: &DbPerson) -> Result<(), DbError> {
        self.db.with_transaction(|tx| {
            tx.stamp_person_attempted(&person.id, &now_timestamp())?;
            tx.insert_enrichment_log("person", &person.id, "filter", "generic_mailbox", &[], None)
        })
    }
}

fn log_lookup_failure(subject: &str, e: &ProviderError) {
    if e.requires_user_action() {
        log::error!(
            "Enrichment run: lookup for {} failed: {} ({})",
            subject,
            e,
            e.recovery_suggestion()
        );
    } else {
        let retry = if e.is_retryable() { ", left for the next run" } else { "" };
        log::warn!("Enrichment run: lookup for {} failed{}: {}", subject, retry, e);
    }
}
