//! Paid per-record identity lookup and its persistence.

use super::merge_text;
use crate::db::{DbError, DbPerson, EnrichmentDb};
use crate::error::ProviderError;
use crate::provider::{IdentityProvider, Lookup, PersonProfile};
use crate::util::now_timestamp;

#[derive(Debug)]
pub enum PersonOutcome {
    Enriched { fields_updated: Vec<String> },
    /// Stamped as attempted; no usable profile.
    NoMatch,
    /// Nothing was written; the record stays eligible.
    Failed(ProviderError),
}

/// Look up one person by email and persist the answer.
///
/// A profile with only an ID (no title, profile URL, photo, or headline) is
/// treated as no match. Provider errors leave the row untouched.
pub async fn enrich_person(
    db: &EnrichmentDb,
    provider: &dyn IdentityProvider,
    person: &DbPerson,
) -> Result<PersonOutcome, DbError> {
    let lookup = match provider.match_person_by_email(&person.email).await {
        Ok(lookup) => lookup,
        Err(e) => {
            if !e.is_quota_exhausted() {
                db.insert_enrichment_log(
                    "person",
                    &person.id,
                    provider.source(),
                    "error",
                    &[],
                    Some(&e.to_string()),
                )?;
            }
            return Ok(PersonOutcome::Failed(e));
        }
    };

    match lookup {
        Lookup::Found(profile) if profile.has_real_data() => {
            let (updated, fields_updated) = merge_profile(person, &profile);
            let raw = serde_json::to_string(&profile).ok();
            db.with_transaction(|tx| {
                tx.update_person_enrichment(&updated)?;
                tx.insert_enrichment_log(
                    "person",
                    &person.id,
                    provider.source(),
                    "enriched",
                    &fields_updated,
                    raw.as_deref(),
                )
            })?;
            log::debug!("Enrichment run: matched {} ({} fields)", person.id, fields_updated.len());
            Ok(PersonOutcome::Enriched { fields_updated })
        }
        _ => {
            db.with_transaction(|tx| {
                tx.stamp_person_attempted(&person.id, &now_timestamp())?;
                tx.insert_enrichment_log("person", &person.id, provider.source(), "no_match", &[], None)
            })?;
            Ok(PersonOutcome::NoMatch)
        }
    }
}

fn merge_profile(person: &DbPerson, profile: &PersonProfile) -> (DbPerson, Vec<String>) {
    let mut updated = person.clone();
    let mut fields = Vec::new();

    merge_text(&mut updated.external_id, "external_id", Some(profile.id.as_str()), &mut fields);
    merge_text(&mut updated.title, "title", profile.title.as_deref(), &mut fields);
    merge_text(&mut updated.headline, "headline", profile.headline.as_deref(), &mut fields);
    merge_text(&mut updated.profile_url, "profile_url", profile.profile_url.as_deref(), &mut fields);
    merge_text(&mut updated.photo_url, "photo_url", profile.photo_url.as_deref(), &mut fields);
    merge_text(&mut updated.city, "city", profile.city.as_deref(), &mut fields);
    merge_text(&mut updated.region, "region", profile.region.as_deref(), &mut fields);
    merge_text(&mut updated.country, "country", profile.country.as_deref(), &mut fields);
    updated.last_enriched_at = Some(now_timestamp());

    (updated, fields)
}
