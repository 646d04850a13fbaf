//! HTTP-backed membership source.

use async_trait::async_trait;

use uncorded_common::UncordedError;

use super::polling::MembershipSource;

/// Queries `GET {source_url}?region=..&group=..`, expecting a JSON array of
/// addresses
#[derive(Debug, Clone)]
pub struct HttpMembershipSource {
    client: reqwest::Client,
    source_url: String,
}

impl HttpMembershipSource {
    pub fn new(client: reqwest::Client, source_url: impl Into<String>) -> Self {
        Self {
            client,
            source_url: source_url.into(),
        }
    }
}

#[async_trait]
impl MembershipSource for HttpMembershipSource {
    async fn list(&self, region: &str, group: &str) -> Result<Vec<String>, UncordedError> {
        let response = self
            .client
            .get(&self.source_url)
            .query(&[("region", region), ("group", group)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| UncordedError::Transport(e.to_string()))?;

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| UncordedError::MalformedRecord(e.to_string()))
    }
}
