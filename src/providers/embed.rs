use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::EmbedExtractor;
use super::anime_sama::USER_AGENT;
use crate::error::ApiError;
use crate::types::EmbedPayload;

/// Client for the local backend's embed-extraction endpoint.
pub struct EmbedClient {
    client: Client,
    endpoint: Url,
}

impl EmbedClient {
    pub fn new(backend_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        let endpoint = Url::parse(backend_url)
            .and_then(|base| base.join("/api/embed"))
            .map_err(|err| {
                ApiError::Malformed(format!("invalid backend URL {backend_url}: {err}"))
            })?;
        Ok(Self { client, endpoint })
    }

    pub fn request_url(&self, episode_url: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("url", episode_url);
        url
    }
}

impl EmbedExtractor for EmbedClient {
    async fn extract(&self, episode_url: &str) -> Result<EmbedPayload, ApiError> {
        let url = self.request_url(episode_url);
        debug!("extracting sources via {url}");
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_encodes_episode_url() {
        let client = EmbedClient::new("http://localhost:5000", Duration::from_secs(5)).unwrap();
        let url = client.request_url("https://anime-sama.fr/catalogue/one-piece/saison1/vostfr");
        assert_eq!(url.path(), "/api/embed");
        assert_eq!(
            url.query(),
            Some("url=https%3A%2F%2Fanime-sama.fr%2Fcatalogue%2Fone-piece%2Fsaison1%2Fvostfr")
        );
    }

    #[test]
    fn payload_defaults_to_unsuccessful_and_empty() {
        let payload: EmbedPayload = serde_json::from_str("{}").unwrap();
        assert!(!payload.success);
        assert!(payload.sources.is_empty());
    }
}
