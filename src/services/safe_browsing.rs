//! Google Safe Browsing v4 lookups.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const LOOKUP_URL: &str = "https://safebrowsing.googleapis.com/v4/threatMatches:find";
const CLIENT_ID: &str = "telegram-bot-safety-check";
const SCAN_TIMEOUT: Duration = Duration::from_secs(5);

const THREAT_TYPES: [&str; 4] = [
    "MALWARE",
    "SOCIAL_ENGINEERING",
    "UNWANTED_SOFTWARE",
    "POTENTIALLY_HARMFUL_APPLICATION",
];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("safe browsing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("safe browsing returned HTTP {0}")]
    Status(u16),
}

#[derive(Clone)]
pub struct SafeBrowsingClient {
    client: Client,
    api_key: String,
}

impl std::fmt::Debug for SafeBrowsingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeBrowsingClient")
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl SafeBrowsingClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(SCAN_TIMEOUT).build()?;
        Ok(Self { client, api_key })
    }

    /// URLs from `urls` that Safe Browsing flags, deduplicated in input order.
    pub async fn find_threats(&self, urls: &[String]) -> Result<Vec<String>, ScanError> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = urls.len(), "checking links with Safe Browsing");

        let response = self
            .client
            .post(LOOKUP_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&FindRequest::new(urls))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status(status.as_u16()));
        }

        let body: FindResponse = response.json().await?;
        Ok(body.flagged_urls())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindRequest<'a> {
    client: ClientInfo,
    threat_info: ThreatInfo<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo {
    client_id: &'static str,
    client_version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatInfo<'a> {
    threat_types: &'static [&'static str],
    platform_types: [&'static str; 1],
    threat_entry_types: [&'static str; 1],
    threat_entries: Vec<ThreatEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ThreatEntry<'a> {
    url: &'a str,
}

impl<'a> FindRequest<'a> {
    fn new(urls: &'a [String]) -> Self {
        Self {
            client: ClientInfo {
                client_id: CLIENT_ID,
                client_version: env!("CARGO_PKG_VERSION"),
            },
            threat_info: ThreatInfo {
                threat_types: &THREAT_TYPES,
                platform_types: ["ANY_PLATFORM"],
                threat_entry_types: ["URL"],
                threat_entries: urls.iter().map(|url| ThreatEntry { url: url.as_str() }).collect(),
            },
        }
    }
}

/// An empty body (`{}`) means no matches.
#[derive(Debug, Default, Deserialize)]
struct FindResponse {
    #[serde(default)]
    matches: Vec<ThreatMatch>,
}

#[derive(Debug, Deserialize)]
struct ThreatMatch {
    threat: MatchedEntry,
}

#[derive(Debug, Deserialize)]
struct MatchedEntry {
    url: String,
}

impl FindResponse {
    fn flagged_urls(self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::with_capacity(self.matches.len());
        for found in self.matches {
            if !urls.contains(&found.threat.url) {
                urls.push(found.threat.url);
            }
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_debug_hides_api_key() {
        let client = SafeBrowsingClient::new("sb-secret".to_string()).unwrap();
        assert!(!format!("{client:?}").contains("sb-secret"));
    }

    #[test]
    fn test_request_payload() {
        let urls = vec!["http://bad.example/".to_string()];
        let value = serde_json::to_value(FindRequest::new(&urls)).unwrap();

        assert_eq!(value["client"]["clientId"], "telegram-bot-safety-check");
        assert_eq!(value["threatInfo"]["threatTypes"].as_array().unwrap().len(), 4);
        assert_eq!(value["threatInfo"]["platformTypes"], json!(["ANY_PLATFORM"]));
        assert_eq!(value["threatInfo"]["threatEntryTypes"], json!(["URL"]));
        assert_eq!(
            value["threatInfo"]["threatEntries"],
            json!([{ "url": "http://bad.example/" }])
        );
    }

    #[test]
    fn test_empty_response_means_clean() {
        let body: FindResponse = serde_json::from_str("{}").unwrap();
        assert!(body.flagged_urls().is_empty());
    }

    #[test]
    fn test_matches_are_deduplicated() {
        let body: FindResponse = serde_json::from_value(json!({
            "matches": [
                {
                    "threatType": "MALWARE",
                    "platformType": "ANY_PLATFORM",
                    "threat": { "url": "http://bad.example/" },
                    "cacheDuration": "300s"
                },
                {
                    "threatType": "SOCIAL_ENGINEERING",
                    "platformType": "ANY_PLATFORM",
                    "threat": { "url": "http://bad.example/" }
                },
                {
                    "threatType": "MALWARE",
                    "threat": { "url": "http://worse.example/" }
                }
            ]
        }))
        .unwrap();

        assert_eq!(
            body.flagged_urls(),
            vec!["http://bad.example/", "http://worse.example/"]
        );
    }
}
