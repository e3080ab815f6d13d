//! Zero-cost resolution tiers consulted before any paid call.
//!
//! Person records are answered by any other owner's record with the same
//! email. Organization rows are their own cache: current firmographics or a
//! recent stamp means the domain needs no lookup this run.

use chrono::{DateTime, Utc};

use super::{merge_text, EnrichmentSettings};
use crate::db::{DbError, DbOrganization, DbPerson, EnrichmentDb, EnrichmentState};
use crate::util::{format_timestamp, is_older_than, now_timestamp};

/// What to resolve.
#[derive(Debug, Clone, Copy)]
pub enum CacheTarget<'a> {
    Person(&'a DbPerson),
    Organization(&'a DbOrganization),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome {
    /// Another record with the same email already matched.
    PersonMatch(Box<DbPerson>),
    /// The organization row already holds usable firmographics.
    OrganizationCurrent,
    /// The provider is already known to have nothing for this key.
    KnownNoMatch,
    Miss,
}

/// Freshness bounds for trusting cached answers.
///
/// In a normal run every cached answer is trusted. A forced run is a
/// deliberate re-check, so only answers newer than the window that made the
/// record eligible are reused.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub force: bool,
    pub now: DateTime<Utc>,
    pub settings: EnrichmentSettings,
}

impl CachePolicy {
    fn matched_since(&self) -> Option<String> {
        self.threshold(self.settings.staleness_window())
    }

    fn negative_since(&self) -> Option<String> {
        self.threshold(self.settings.retry_cooldown())
    }

    /// `now - window`, or no bound when that falls outside chrono's range.
    fn threshold(&self, window: chrono::Duration) -> Option<String> {
        if !self.force {
            return None;
        }
        self.now.checked_sub_signed(window).map(format_timestamp)
    }
}

/// Resolve a target against the store without spending credits.
pub fn resolve(
    db: &EnrichmentDb,
    target: CacheTarget<'_>,
    policy: &CachePolicy,
) -> Result<CacheOutcome, DbError> {
    match target {
        CacheTarget::Person(person) => resolve_person(db, person, policy),
        CacheTarget::Organization(org) => Ok(resolve_organization(org, policy)),
    }
}

fn resolve_person(
    db: &EnrichmentDb,
    person: &DbPerson,
    policy: &CachePolicy,
) -> Result<CacheOutcome, DbError> {
    // Positive answers win over negative ones.
    let matched_since = policy.matched_since();
    if let Some(source) =
        db.find_matched_person_by_email(&person.email, &person.id, matched_since.as_deref())?
    {
        return Ok(CacheOutcome::PersonMatch(Box::new(source)));
    }

    let negative_since = policy.negative_since();
    if db
        .find_no_match_person_by_email(&person.email, &person.id, negative_since.as_deref())?
        .is_some()
    {
        return Ok(CacheOutcome::KnownNoMatch);
    }

    Ok(CacheOutcome::Miss)
}

fn resolve_organization(org: &DbOrganization, policy: &CachePolicy) -> CacheOutcome {
    if org.has_firmographics() {
        return CacheOutcome::OrganizationCurrent;
    }
    match org.enrichment_state() {
        EnrichmentState::NeverAttempted => CacheOutcome::Miss,
        EnrichmentState::Matched { attempted_at } | EnrichmentState::NoMatch { attempted_at }
            if is_older_than(attempted_at, policy.now, policy.settings.staleness_window()) =>
        {
            CacheOutcome::Miss
        }
        EnrichmentState::Matched { .. } => CacheOutcome::OrganizationCurrent,
        EnrichmentState::NoMatch { .. } => CacheOutcome::KnownNoMatch,
    }
}

/// Copy a cached match onto `target` and stamp it. Returns the fields written.
pub fn apply_person_match(
    db: &EnrichmentDb,
    target: &DbPerson,
    source: &DbPerson,
) -> Result<Vec<String>, DbError> {
    let mut updated = target.clone();
    let mut fields_updated = Vec::new();

    merge_text(&mut updated.external_id, "external_id", source.external_id.as_deref(), &mut fields_updated);
    merge_text(&mut updated.title, "title", source.title.as_deref(), &mut fields_updated);
    merge_text(&mut updated.headline, "headline", source.headline.as_deref(), &mut fields_updated);
    merge_text(&mut updated.profile_url, "profile_url", source.profile_url.as_deref(), &mut fields_updated);
    merge_text(&mut updated.photo_url, "photo_url", source.photo_url.as_deref(), &mut fields_updated);
    merge_text(&mut updated.city, "city", source.city.as_deref(), &mut fields_updated);
    merge_text(&mut updated.region, "region", source.region.as_deref(), &mut fields_updated);
    merge_text(&mut updated.country, "country", source.country.as_deref(), &mut fields_updated);
    updated.last_enriched_at = Some(now_timestamp());

    let payload = serde_json::json!({ "sourcePersonId": source.id }).to_string();
    db.with_transaction(|tx| {
        tx.update_person_enrichment(&updated)?;
        tx.insert_enrichment_log("person", &target.id, "cache", "cache_hit", &fields_updated, Some(&payload))
    })?;
    Ok(fields_updated)
}

/// Stamp a record attempted because another record already proved there is no match.
pub fn apply_known_no_match(db: &EnrichmentDb, target: &DbPerson) -> Result<(), DbError> {
    db.with_transaction(|tx| {
        tx.stamp_person_attempted(&target.id, &now_timestamp())?;
        tx.insert_enrichment_log("person", &target.id, "cache", "known_no_match", &[], None)
    })
}
