//! Boundary to the paid identity-resolution provider.
//!
//! Every call through [`IdentityProvider`] may cost a credit. Callers are
//! expected to exhaust the zero-cost cache tiers first.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Outcome of a provider lookup that did not error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

/// Person profile returned by an email match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonProfile {
    pub id: String,
    pub title: Option<String>,
    pub headline: Option<String>,
    pub profile_url: Option<String>,
    pub photo_url: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl PersonProfile {
    /// A bare ID with no descriptive fields is not worth storing.
    pub fn has_real_data(&self) -> bool {
        [&self.title, &self.profile_url, &self.photo_url, &self.headline]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Firmographics returned by a domain lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgProfile {
    pub id: String,
    pub name: Option<String>,
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
}

/// The two paid operations the pipeline relies on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short source label recorded in the audit trail (e.g. "apollo").
    fn source(&self) -> &str;

    async fn match_person_by_email(&self, email: &str) -> Result<Lookup<PersonProfile>, ProviderError>;

    async fn enrich_organization_by_domain(
        &self,
        domain: &str,
    ) -> Result<Lookup<OrgProfile>, ProviderError>;
}
