//! HTTP client for the Apollo.io enrichment API.
//!
//! Uses reqwest with `X-Api-Key` auth and a per-request timeout so a hung
//! call cannot stall a run. Status/body classification lives in pure
//! functions so the quota-vs-not-found distinction is testable offline.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::ApolloConfig;
use crate::error::ProviderError;
use crate::provider::{IdentityProvider, Lookup, OrgProfile, PersonProfile};

/// Body fragments Apollo uses when an account is out of credits.
const QUOTA_MARKERS: &[&str] = &[
    "insufficient credits",
    "insufficient_credits",
    "out of credits",
    "credit limit",
    "quota exceeded",
    "exceeded your",
];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PersonMatchResponse {
    #[serde(default)]
    person: Option<ApolloPerson>,
}

#[derive(Debug, Deserialize)]
struct ApolloPerson {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    linkedin_url: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganizationEnrichResponse {
    #[serde(default)]
    organization: Option<ApolloOrganization>,
}

#[derive(Debug, Deserialize)]
struct ApolloOrganization {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    estimated_num_employees: Option<i64>,
    #[serde(default)]
    founded_year: Option<i64>,
    #[serde(default)]
    latest_funding_stage: Option<String>,
    #[serde(default)]
    latest_funding_round_date: Option<String>,
    #[serde(default)]
    annual_revenue: Option<f64>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    short_description: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a raw HTTP response should be treated before body parsing.
#[derive(Debug)]
pub(crate) enum ResponseClass {
    Success,
    NotFound,
    Failed(ProviderError),
}

fn mentions_quota(body: &str) -> bool {
    let lower = body.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub(crate) fn classify_response(status: u16, body: &str) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        404 => ResponseClass::NotFound,
        402 => ResponseClass::Failed(ProviderError::QuotaExhausted(truncate(body))),
        429 if mentions_quota(body) => {
            ResponseClass::Failed(ProviderError::QuotaExhausted(truncate(body)))
        }
        429 => ResponseClass::Failed(ProviderError::RateLimited),
        400..=499 if mentions_quota(body) => {
            ResponseClass::Failed(ProviderError::QuotaExhausted(truncate(body)))
        }
        _ => ResponseClass::Failed(ProviderError::UnexpectedStatus {
            status,
            message: truncate(body),
        }),
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

pub(crate) fn parse_person_response(body: &str) -> Result<Lookup<PersonProfile>, ProviderError> {
    let parsed: PersonMatchResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("people/match: {}", e)))?;

    let Some(person) = parsed.person else {
        return Ok(Lookup::NotFound);
    };
    let Some(id) = non_empty(person.id) else {
        return Ok(Lookup::NotFound);
    };

    Ok(Lookup::Found(PersonProfile {
        id,
        title: non_empty(person.title),
        headline: non_empty(person.headline),
        profile_url: non_empty(person.linkedin_url),
        photo_url: non_empty(person.photo_url),
        city: non_empty(person.city),
        region: non_empty(person.state),
        country: non_empty(person.country),
    }))
}

pub(crate) fn parse_organization_response(body: &str) -> Result<Lookup<OrgProfile>, ProviderError> {
    let parsed: OrganizationEnrichResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("organizations/enrich: {}", e)))?;

    let Some(org) = parsed.organization else {
        return Ok(Lookup::NotFound);
    };
    let Some(id) = non_empty(org.id) else {
        return Ok(Lookup::NotFound);
    };

    Ok(Lookup::Found(OrgProfile {
        id,
        name: non_empty(org.name),
        industry: non_empty(org.industry),
        employee_count: org.estimated_num_employees,
        founded_year: org.founded_year,
        funding_stage: non_empty(org.latest_funding_stage),
        last_funding_date: non_empty(org.latest_funding_round_date),
        annual_revenue: org.annual_revenue.map(|v| v.round() as i64),
        city: non_empty(org.city),
        region: non_empty(org.state),
        country: non_empty(org.country),
        description: non_empty(org.short_description),
    }))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ApolloClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ApolloClient {
    pub fn new(config: &ApolloConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::NoApiKey)?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send a request and return the body of a successful response,
    /// `None` on 404, or the classified error.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<String>, ProviderError> {
        let resp = request
            .header("X-Api-Key", &self.api_key)
            .header("Cache-Control", "no-cache")
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;

        match classify_response(status, &body) {
            ResponseClass::Success => Ok(Some(body)),
            ResponseClass::NotFound => Ok(None),
            ResponseClass::Failed(e) => Err(e),
        }
    }
}

#[async_trait]
impl IdentityProvider for ApolloClient {
    fn source(&self) -> &str {
        "apollo"
    }

    async fn match_person_by_email(&self, email: &str) -> Result<Lookup<PersonProfile>, ProviderError> {
        let url = format!("{}/people/match", self.base_url);
        let request = self.client.post(url).json(&serde_json::json!({
            "email": email,
            "reveal_personal_emails": false,
        }));

        match self.send(request).await? {
            Some(body) => parse_person_response(&body),
            None => Ok(Lookup::NotFound),
        }
    }

    async fn enrich_organization_by_domain(
        &self,
        domain: &str,
    ) -> Result<Lookup<OrgProfile>, ProviderError> {
        let url = format!("{}/organizations/enrich", self.base_url);
        let request = self.client.get(url).query(&[("domain", domain)]);

        match self.send(request).await? {
            Some(body) => parse_organization_response(&body),
            None => Ok(Lookup::NotFound),
        }
    }
}
