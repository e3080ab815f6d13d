//! Apollo.io REST integration for person and company enrichment.
//!
//! Two paid endpoints are used: `people/match` (by email) and
//! `organizations/enrich` (by domain). Each successful answer costs a credit.

pub mod client;

use serde::{Deserialize, Serialize};

pub use client::ApolloClient;

/// Apollo configuration stored under `apollo` in config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApolloConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.apollo.io/api/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ApolloConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
