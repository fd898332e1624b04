//! In-memory catalogue and extractor used by the resolver tests.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{AnimeCatalog, EmbedExtractor};
use crate::error::ApiError;
use crate::types::{AnimeData, EmbedPayload, Language, RawEpisode, SearchHit, Season};

#[derive(Default)]
pub struct FakeCatalog {
    pub search_results: Option<Vec<SearchHit>>,
    pub trending_results: Option<Vec<SearchHit>>,
    pub animes: HashMap<String, AnimeData>,
    pub seasons: HashMap<String, Vec<Season>>,
    /// Keyed by `anime/season/LANG`.
    pub episodes: HashMap<String, Vec<RawEpisode>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn with_episodes(
        mut self,
        anime_id: &str,
        season: &str,
        language: Language,
        episodes: Vec<RawEpisode>,
    ) -> Self {
        self.episodes.insert(
            format!("{anime_id}/{season}/{}", language.label()),
            episodes,
        );
        self
    }

    pub fn with_anime(mut self, anime: AnimeData) -> Self {
        self.animes.insert(anime.id.clone(), anime);
        self
    }
}

fn unavailable(what: String) -> ApiError {
    ApiError::Http {
        status: 404,
        url: what,
    }
}

impl AnimeCatalog for FakeCatalog {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ApiError> {
        self.record(format!("search:{query}"));
        self.search_results
            .clone()
            .ok_or_else(|| ApiError::Network("search offline".into()))
    }

    async fn trending(&self) -> Result<Vec<SearchHit>, ApiError> {
        self.record("trending".into());
        self.trending_results
            .clone()
            .ok_or_else(|| ApiError::Network("trending offline".into()))
    }

    async fn anime(&self, anime_id: &str) -> Result<AnimeData, ApiError> {
        self.record(format!("anime:{anime_id}"));
        self.animes
            .get(anime_id)
            .cloned()
            .ok_or_else(|| unavailable(format!("/api/anime/{anime_id}")))
    }

    async fn seasons(&self, anime_id: &str) -> Result<Vec<Season>, ApiError> {
        self.record(format!("seasons:{anime_id}"));
        self.seasons
            .get(anime_id)
            .cloned()
            .ok_or_else(|| unavailable(format!("/api/seasons/{anime_id}")))
    }

    async fn episodes(
        &self,
        anime_id: &str,
        season_value: &str,
        language: Language,
    ) -> Result<Vec<RawEpisode>, ApiError> {
        let key = format!("{anime_id}/{season_value}/{}", language.label());
        self.record(format!("episodes:{key}"));
        self.episodes
            .get(&key)
            .cloned()
            .ok_or_else(|| unavailable(format!("/api/episodes/{key}")))
    }
}

pub enum FakeEmbed {
    Sources(Vec<crate::types::VideoSource>),
    Unsuccessful,
    Failing,
}

impl EmbedExtractor for FakeEmbed {
    async fn extract(&self, _episode_url: &str) -> Result<EmbedPayload, ApiError> {
        match self {
            FakeEmbed::Sources(sources) => Ok(EmbedPayload {
                success: true,
                sources: sources.clone(),
            }),
            FakeEmbed::Unsuccessful => Ok(EmbedPayload {
                success: false,
                sources: Vec::new(),
            }),
            FakeEmbed::Failing => Err(ApiError::Http {
                status: 502,
                url: "/api/embed".into(),
            }),
        }
    }
}

pub fn hit(id: &str, kind: Option<&str>) -> SearchHit {
    SearchHit {
        id: id.to_string(),
        title: id.replace('-', " "),
        kind: kind.map(str::to_string),
        ..SearchHit::default()
    }
}

pub fn season(name: &str, value: &str) -> Season {
    Season {
        name: name.to_string(),
        value: value.to_string(),
        ..Season::default()
    }
}

pub fn source(server: &str) -> crate::types::VideoSource {
    crate::types::VideoSource {
        url: format!("https://video.test/{server}.mp4"),
        server: server.to_string(),
        quality: "HD".into(),
        ..Default::default()
    }
}
