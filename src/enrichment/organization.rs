//! Paid per-domain company lookup and its persistence.

use super::{merge_number, merge_text};
use crate::db::{DbError, DbOrganization, EnrichmentDb};
use crate::error::ProviderError;
use crate::provider::{IdentityProvider, Lookup, OrgProfile};
use crate::util::now_timestamp;

#[derive(Debug)]
pub enum OrganizationOutcome {
    Enriched { fields_updated: Vec<String> },
    /// Stamped as attempted; the provider has no company for this domain.
    NoMatch,
    /// Nothing was written.
    Failed(ProviderError),
}

/// Look up firmographics for an existing organization row.
pub async fn enrich_organization(
    db: &EnrichmentDb,
    provider: &dyn IdentityProvider,
    org: &DbOrganization,
) -> Result<OrganizationOutcome, DbError> {
    let lookup = match provider.enrich_organization_by_domain(&org.domain).await {
        Ok(lookup) => lookup,
        Err(e) => {
            if !e.is_quota_exhausted() {
                db.insert_enrichment_log(
                    "organization",
                    &org.domain,
                    provider.source(),
                    "error",
                    &[],
                    Some(&e.to_string()),
                )?;
            }
            return Ok(OrganizationOutcome::Failed(e));
        }
    };

    match lookup {
        Lookup::Found(profile) => {
            let (updated, fields_updated) = merge_firmographics(org, &profile);
            let raw = serde_json::to_string(&profile).ok();
            db.with_transaction(|tx| {
                tx.update_organization_enrichment(&updated)?;
                tx.insert_enrichment_log(
                    "organization",
                    &org.domain,
                    provider.source(),
                    "enriched",
                    &fields_updated,
                    raw.as_deref(),
                )
            })?;
            Ok(OrganizationOutcome::Enriched { fields_updated })
        }
        Lookup::NotFound => {
            db.with_transaction(|tx| {
                tx.stamp_organization_attempted(&org.domain, &now_timestamp())?;
                tx.insert_enrichment_log(
                    "organization",
                    &org.domain,
                    provider.source(),
                    "no_match",
                    &[],
                    None,
                )
            })?;
            Ok(OrganizationOutcome::NoMatch)
        }
    }
}

fn merge_firmographics(org: &DbOrganization, profile: &OrgProfile) -> (DbOrganization, Vec<String>) {
    let mut updated = org.clone();
    let mut fields = Vec::new();

    merge_text(&mut updated.external_id, "external_id", Some(profile.id.as_str()), &mut fields);
    merge_text(&mut updated.name, "name", profile.name.as_deref(), &mut fields);
    merge_text(&mut updated.industry, "industry", profile.industry.as_deref(), &mut fields);
    merge_number(&mut updated.employee_count, "employee_count", profile.employee_count, &mut fields);
    merge_number(&mut updated.founded_year, "founded_year", profile.founded_year, &mut fields);
    merge_text(&mut updated.funding_stage, "funding_stage", profile.funding_stage.as_deref(), &mut fields);
    merge_text(
        &mut updated.last_funding_date,
        "last_funding_date",
        profile.last_funding_date.as_deref(),
        &mut fields,
    );
    merge_number(&mut updated.annual_revenue, "annual_revenue", profile.annual_revenue, &mut fields);
    merge_text(&mut updated.city, "city", profile.city.as_deref(), &mut fields);
    merge_text(&mut updated.region, "region", profile.region.as_deref(), &mut fields);
    merge_text(&mut updated.country, "country", profile.country.as_deref(), &mut fields);
    merge_text(&mut updated.description, "description", profile.description.as_deref(), &mut fields);
    updated.last_enriched_at = Some(now_timestamp());

    (updated, fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::provider::testing::{org_profile, Scripted, ScriptedProvider};

    fn seeded(db: &EnrichmentDb) -> DbOrganization {
        db.upsert_organization("acme.com", Some("Acme Corp")).expect("insert");
        db.get_organization("acme.com").expect("query").expect("exists")
    }

    #[tokio::test]
    async fn test_found_merges_firmographics() {
        let db = test_db();
        let org = seeded(&db);
        let provider = ScriptedProvider::new().org("acme.com", Scripted::Found(org_profile("org-1", "Logistics")));

        let outcome = enrich_organization(&db, &provider, &org).await.expect("enrich");
        match outcome {
            OrganizationOutcome::Enriched { fields_updated } => {
                assert!(fields_updated.contains(&"industry".to_string()));
                assert!(!fields_updated.contains(&"name".to_string()), "profile had no name");
            }
            other => panic!("expected enrichment, got {:?}", other),
        }

        let stored = db.get_organization("acme.com").expect("query").expect("exists");
        assert_eq!(stored.name.as_deref(), Some("Acme Corp"));
        assert_eq!(stored.industry.as_deref(), Some("Logistics"));
        assert_eq!(stored.external_id.as_deref(), Some("org-1"));
        assert!(stored.last_enriched_at.is_some());
    }

    #[tokio::test]
    async fn test_not_found_stamps_only() {
        let db = test_db();
        let org = seeded(&db);
        let provider = ScriptedProvider::new();

        let outcome = enrich_organization(&db, &provider, &org).await.expect("enrich");
        assert!(matches!(outcome, OrganizationOutcome::NoMatch));
        let stored = db.get_organization("acme.com").expect("query").expect("exists");
        assert!(stored.last_enriched_at.is_some());
        assert!(stored.external_id.is_none());
        assert_eq!(provider.org_call_count(), 1);
    }

    #[tokio::test]
    async fn test_quota_leaves_row_untouched() {
        let db = test_db();
        let org = seeded(&db);
        let provider = ScriptedProvider::new().org("acme.com", Scripted::QuotaExhausted);

        match enrich_organization(&db, &provider, &org).await.expect("enrich") {
            OrganizationOutcome::Failed(e) => assert!(e.is_quota_exhausted()),
            other => panic!("expected failure, got {:?}", other),
        }
        let stored = db.get_organization("acme.com").expect("query").expect("exists");
        assert!(stored.last_enriched_at.is_none());
        assert!(db.list_enrichment_log("organization", "acme.com").expect("log").is_empty());
    }
}
