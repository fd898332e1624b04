use crate::error::ApiError;
use crate::types::{AnimeData, EmbedPayload, Language, RawEpisode, SearchHit, Season};

pub mod anime_sama;
pub mod embed;
#[cfg(test)]
pub mod fake;

/// Read side of the third-party anime catalogue.
pub trait AnimeCatalog {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ApiError>;
    async fn trending(&self) -> Result<Vec<SearchHit>, ApiError>;
    async fn anime(&self, anime_id: &str) -> Result<AnimeData, ApiError>;
    async fn seasons(&self, anime_id: &str) -> Result<Vec<Season>, ApiError>;
    async fn episodes(
        &self,
        anime_id: &str,
        season_value: &str,
        language: Language,
    ) -> Result<Vec<RawEpisode>, ApiError>;
}

/// Turns an episode page into direct video sources.
pub trait EmbedExtractor {
    async fn extract(&self, episode_url: &str) -> Result<EmbedPayload, ApiError>;
}
