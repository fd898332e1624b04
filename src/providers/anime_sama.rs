use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::AnimeCatalog;
use crate::error::ApiError;
use crate::retry::RetryPolicy;
use crate::types::{AnimeData, Language, RawEpisode, SearchHit, Season};

pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

pub struct AnimeSamaClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl AnimeSamaClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        let base_url = Url::parse(base_url)
            .map_err(|err| ApiError::Malformed(format!("invalid base URL {base_url}: {err}")))?;
        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|err| ApiError::Malformed(format!("invalid endpoint {path}: {err}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// GET with the retry policy applied to transport, status and decode failures.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let name = format!("GET {}", url.path());
        self.retry
            .run(&name, || {
                let url = url.clone();
                async move {
                    debug!("requesting {url}");
                    let response = self
                        .client
                        .get(url.clone())
                        .header("Accept", "application/json")
                        .send()
                        .await?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(ApiError::Http {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                    let text = response.text().await?;
                    Ok(serde_json::from_str::<T>(&text)?)
                }
            })
            .await
    }
}

impl AnimeCatalog for AnimeSamaClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ApiError> {
        let url = self.endpoint("/api/search", &[("query", query)])?;
        let envelope: ResultsEnvelope = self.get_json(url).await?;
        envelope.into_results("search")
    }

    async fn trending(&self) -> Result<Vec<SearchHit>, ApiError> {
        let url = self.endpoint("/api/trending", &[])?;
        let envelope: ResultsEnvelope = self.get_json(url).await?;
        envelope.into_results("trending")
    }

    async fn anime(&self, anime_id: &str) -> Result<AnimeData, ApiError> {
        let url = self.endpoint(&format!("/api/anime/{anime_id}"), &[])?;
        let envelope: DataEnvelope<AnimeData> = self.get_json(url).await?;
        if !envelope.success {
            return Err(ApiError::Malformed(format!(
                "anime {anime_id}: success flag not set"
            )));
        }
        envelope
            .data
            .ok_or_else(|| ApiError::Malformed(format!("anime {anime_id}: missing data")))
    }

    async fn seasons(&self, anime_id: &str) -> Result<Vec<Season>, ApiError> {
        let url = self.endpoint(&format!("/api/seasons/{anime_id}"), &[])?;
        let envelope: SeasonsEnvelope = self.get_json(url).await?;
        if !envelope.success {
            return Err(ApiError::Malformed(format!(
                "seasons {anime_id}: success flag not set"
            )));
        }
        envelope
            .seasons
            .ok_or_else(|| ApiError::Malformed(format!("seasons {anime_id}: missing list")))
    }

    async fn episodes(
        &self,
        anime_id: &str,
        season_value: &str,
        language: Language,
    ) -> Result<Vec<RawEpisode>, ApiError> {
        let url = self.endpoint(
            &format!("/api/episodes/{anime_id}"),
            &[("season", season_value), ("language", language.label())],
        )?;
        let envelope: EpisodesEnvelope = self.get_json(url).await?;
        if !envelope.success {
            return Err(ApiError::Malformed(format!(
                "episodes {anime_id}/{season_value}: success flag not set"
            )));
        }
        envelope.episodes.ok_or_else(|| {
            ApiError::Malformed(format!("episodes {anime_id}/{season_value}: missing list"))
        })
    }
}

// --- Wire envelopes ---

#[derive(Debug, Deserialize)]
struct ResultsEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    results: Option<Vec<SearchHit>>,
}

impl ResultsEnvelope {
    fn into_results(self, what: &str) -> Result<Vec<SearchHit>, ApiError> {
        match (self.success, self.results) {
            (true, Some(results)) => Ok(results),
            _ => Err(ApiError::Malformed(format!("{what}: invalid response format"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SeasonsEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default, alias = "data")]
    seasons: Option<Vec<Season>>,
}

#[derive(Debug, Deserialize)]
struct EpisodesEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    episodes: Option<Vec<RawEpisode>>,
}
