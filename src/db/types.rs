//! Row types for the enrichment store.

use serde::{Deserialize, Serialize};

/// Errors from database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// Where a record sits in the enrichment lifecycle, derived from
/// `last_enriched_at` and `external_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentState<'a> {
    /// `last_enriched_at` is null.
    NeverAttempted,
    /// Attempted, provider had no data. Durable negative cache entry.
    NoMatch { attempted_at: &'a str },
    /// Attempted and matched (`external_id` set).
    Matched { attempted_at: &'a str },
}

fn enrichment_state<'a>(
    last_enriched_at: Option<&'a str>,
    external_id: Option<&'a str>,
) -> EnrichmentState<'a> {
    match (last_enriched_at, external_id) {
        (None, _) => EnrichmentState::NeverAttempted,
        (Some(at), Some(_)) => EnrichmentState::Matched { attempted_at: at },
        (Some(at), None) => EnrichmentState::NoMatch { attempted_at: at },
    }
}

/// A row from the `people` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPerson {
    pub id: String,
    pub owner_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub organization_domain: Option<String>,
    pub external_id: Option<String>,
    pub last_enriched_at: Option<String>,
    pub title: Option<String>,
    pub headline: Option<String>,
    pub profile_url: Option<String>,
    pub photo_url: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub last_seen: Option<String>,
    pub updated_at: String,
}

impl DbPerson {
    pub fn enrichment_state(&self) -> EnrichmentState<'_> {
        enrichment_state(self.last_enriched_at.as_deref(), self.external_id.as_deref())
    }
}

/// A row from the `organizations` table, keyed by domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbOrganization {
    pub domain: String,
    pub name: Option<String>,
    pub external_id: Option<String>,
    pub last_enriched_at: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<i64>,
    pub founded_year: Option<i64>,
    pub funding_stage: Option<String>,
    pub last_funding_date: Option<String>,
    pub annual_revenue: Option<i64>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub updated_at: String,
}

impl DbOrganization {
    pub fn enrichment_state(&self) -> EnrichmentState<'_> {
        enrichment_state(self.last_enriched_at.as_deref(), self.external_id.as_deref())
    }

    /// True once a previous lookup has filled in firmographics.
    pub fn has_firmographics(&self) -> bool {
        self.industry.is_some() || self.employee_count.is_some()
    }
}

/// A row from the `enrichment_log` audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEnrichmentLogEntry {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub source: String,
    pub outcome: String,
    pub fields_updated: Vec<String>,
    pub raw_payload: Option<String>,
    pub created_at: String,
}

/// Per-owner breakdown of enrichment state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentCoverage {
    pub total: u32,
    pub never_attempted: u32,
    pub matched: u32,
    pub no_match: u32,
}
