use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::providers::EmbedExtractor;
use crate::types::{EmbedPayload, Episode, EpisodeDetails, VideoSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Direct URLs from the embed-extraction endpoint.
    Extracted,
    /// The episode's own `streamingSources`.
    Cached,
}

#[derive(Debug, Clone)]
pub struct ResolvedSources {
    pub details: EpisodeDetails,
    pub origin: SourceOrigin,
}

pub struct SourceResolver<'a, E> {
    extractor: &'a E,
}

impl<'a, E: EmbedExtractor> SourceResolver<'a, E> {
    pub fn new(extractor: &'a E) -> Self {
        Self { extractor }
    }

    /// Extracted sources, else the episode's cached sources, else `NoData`.
    pub async fn resolve(
        &self,
        episode: &Episode,
        anime_title: &str,
    ) -> Result<ResolvedSources, ApiError> {
        let extracted = self.extractor.extract(&episode.url).await;
        choose_sources(episode, anime_title, extracted)
    }

    /// Same as `resolve`, abandoned with `Cancelled` once `token` fires.
    pub async fn resolve_cancellable(
        &self,
        episode: &Episode,
        anime_title: &str,
        token: &CancellationToken,
    ) -> Result<ResolvedSources, ApiError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("source load for {} cancelled", episode.id);
                Err(ApiError::Cancelled)
            }
            resolved = self.resolve(episode, anime_title) => resolved,
        }
    }
}

/// Fallback chain over an extraction result. Extraction errors count as an empty extraction.
pub fn choose_sources(
    episode: &Episode,
    anime_title: &str,
    extracted: Result<EmbedPayload, ApiError>,
) -> Result<ResolvedSources, ApiError> {
    let extracted: Vec<VideoSource> = match extracted {
        Ok(payload) if payload.success => payload.sources,
        Ok(_) => {
            debug!("embed extraction for {} reported failure", episode.id);
            Vec::new()
        }
        Err(err) => {
            warn!("embed extraction for {} failed: {err}", episode.id);
            Vec::new()
        }
    };

    if !extracted.is_empty() {
        info!("{} direct sources for {}", extracted.len(), episode.id);
        return Ok(ResolvedSources {
            details: EpisodeDetails::new(episode, anime_title, extracted),
            origin: SourceOrigin::Extracted,
        });
    }

    if !episode.streaming_sources.is_empty() {
        info!("falling back to cached sources for {}", episode.id);
        return Ok(ResolvedSources {
            details: EpisodeDetails::new(episode, anime_title, episode.streaming_sources.clone()),
            origin: SourceOrigin::Cached,
        });
    }

    Err(ApiError::NoData(format!(
        "no video source available for {}",
        episode.title
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fake::{FakeEmbed, source};
    use crate::types::Language;

    fn episode(cached: Vec<VideoSource>) -> Episode {
        Episode {
            id: "one-piece-saison1-ep1-vostfr".into(),
            title: "Épisode 1".into(),
            episode_number: 1,
            url: "https://anime-sama.fr/catalogue/one-piece/saison1/vostfr".into(),
            language: Language::Vostfr,
            available: true,
            streaming_sources: cached,
        }
    }

    #[tokio::test]
    async fn extraction_wins_over_cached_sources() {
        let embed = FakeEmbed::Sources(vec![source("sibnet"), source("vidmoly")]);
        let resolved = SourceResolver::new(&embed)
            .resolve(&episode(vec![source("anime-sama")]), "One Piece")
            .await
            .unwrap();

        assert_eq!(resolved.origin, SourceOrigin::Extracted);
        assert_eq!(resolved.details.available_servers, vec!["sibnet", "vidmoly"]);
        assert_eq!(resolved.details.anime_title, "One Piece");
        assert_eq!(resolved.details.episode_number, 1);
    }

    #[tokio::test]
    async fn empty_or_failed_extraction_uses_cached_sources() {
        for embed in [
            FakeEmbed::Sources(Vec::new()),
            FakeEmbed::Unsuccessful,
            FakeEmbed::Failing,
        ] {
            let resolved = SourceResolver::new(&embed)
                .resolve(&episode(vec![source("anime-sama")]), "One Piece")
                .await
                .unwrap();
            assert_eq!(resolved.origin, SourceOrigin::Cached);
            assert_eq!(resolved.details.sources, vec![source("anime-sama")]);
        }
    }

    #[tokio::test]
    async fn nothing_to_play_is_no_data() {
        let embed = FakeEmbed::Failing;
        let result = SourceResolver::new(&embed)
            .resolve(&episode(Vec::new()), "One Piece")
            .await;
        assert!(matches!(result, Err(ApiError::NoData(_))));
    }

    #[test]
    fn unsuccessful_payload_ignores_its_sources() {
        let payload = EmbedPayload {
            success: false,
            sources: vec![source("stale")],
        };
        let result = choose_sources(&episode(Vec::new()), "One Piece", Ok(payload));
        assert!(matches!(result, Err(ApiError::NoData(_))));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let embed = FakeEmbed::Sources(vec![source("sibnet")]);
        let token = CancellationToken::new();
        token.cancel();
        let result = SourceResolver::new(&embed)
            .resolve_cancellable(&episode(Vec::new()), "One Piece", &token)
            .await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
