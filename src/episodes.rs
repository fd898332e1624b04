use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::providers::AnimeCatalog;
use crate::types::{
    Episode, Language, RawEpisode, STREAMING_PAGE_KIND, Season, VideoSource, catalogue_url,
};

const BUILTIN_TABLE: &str = include_str!("../config/episodes.toml");
pub const PLACEHOLDER_EPISODE_COUNT: u32 = 12;
/// Longest run a table entry may declare.
pub const MAX_RUN_LENGTH: u32 = 5000;
const FALLBACK_SERVER: &str = "Anime-Sama";

/// A contiguous run of episode numbers for one season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SeasonRun {
    pub count: u32,
    #[serde(default = "first_episode")]
    pub start: u32,
}

fn first_episode() -> u32 {
    1
}

impl SeasonRun {
    /// Episode numbers of the run, stopping short of `u32` overflow.
    pub fn numbers(self) -> impl Iterator<Item = u32> {
        (0..self.count).map_while(move |offset| self.start.checked_add(offset))
    }

    fn check(self) -> Result<()> {
        if self.start == 0 {
            bail!("episode numbers start at 1");
        }
        if self.count > MAX_RUN_LENGTH {
            bail!("{} episodes exceeds the limit of {MAX_RUN_LENGTH}", self.count);
        }
        if self.start.checked_add(self.count).is_none() {
            bail!("run of {} from {} overflows episode numbers", self.count, self.start);
        }
        Ok(())
    }
}

/// Where episode counts come from when the episode API has nothing.
pub trait EpisodeTable {
    fn run_for(&self, anime_id: &str, season_value: &str) -> Option<SeasonRun>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticEpisodeTable {
    runs: HashMap<String, HashMap<String, SeasonRun>>,
}

impl StaticEpisodeTable {
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_TABLE).expect("built-in episode table is valid TOML")
    }

    /// Parses and validates a table; every run must fit in `u32` episode numbers.
    pub fn from_toml_str(data: &str) -> Result<Self> {
        let runs: HashMap<String, HashMap<String, SeasonRun>> = toml::from_str(data)?;
        for (anime_id, seasons) in &runs {
            for (season_value, run) in seasons {
                run.check()
                    .with_context(|| format!("invalid entry {anime_id}.{season_value}"))?;
            }
        }
        Ok(Self { runs })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read episode table {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("failed to parse episode table {}", path.display()))
    }
}

impl EpisodeTable for StaticEpisodeTable {
    fn run_for(&self, anime_id: &str, season_value: &str) -> Option<SeasonRun> {
        self.runs.get(anime_id)?.get(season_value).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOrigin {
    Api,
    Table,
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct ResolvedEpisodes {
    pub episodes: Vec<Episode>,
    pub selected: Option<usize>,
    pub origin: EpisodeOrigin,
    /// Why the API list was not used, when it was not.
    pub notice: Option<String>,
}

/// Unique per (anime, season, language) even when the API reuses numbers across tracks.
pub fn episode_id(
    anime_id: &str,
    season_value: &str,
    episode_number: u32,
    language: Language,
) -> String {
    format!(
        "{anime_id}-{season_value}-ep{episode_number}-{}",
        language.as_code()
    )
}

pub struct EpisodeResolver<'a, C, T> {
    catalog: &'a C,
    table: &'a T,
}

impl<'a, C: AnimeCatalog, T: EpisodeTable> EpisodeResolver<'a, C, T> {
    pub fn new(catalog: &'a C, table: &'a T) -> Self {
        Self { catalog, table }
    }

    pub async fn resolve(
        &self,
        anime_id: &str,
        season: &Season,
        language: Language,
        target_episode: Option<u32>,
    ) -> ResolvedEpisodes {
        let api = self
            .catalog
            .episodes(anime_id, &season.value, language)
            .await;
        let (episodes, origin, notice) = match api {
            Ok(raw) if !raw.is_empty() => (
                from_api(anime_id, &season.value, language, raw),
                EpisodeOrigin::Api,
                None,
            ),
            Ok(_) => {
                debug!("episode API returned nothing for {anime_id}/{}", season.value);
                let (episodes, origin) = self.synthesize(anime_id, &season.value, language);
                (episodes, origin, Some(String::from("No episodes listed by the catalogue")))
            }
            Err(err) => {
                warn!(
                    "episode API failed for {anime_id}/{} ({}): {err}",
                    season.value,
                    language.label()
                );
                let (episodes, origin) = self.synthesize(anime_id, &season.value, language);
                (episodes, origin, Some(format!("Episode list unavailable ({err})")))
            }
        };

        let selected = select_episode(&episodes, target_episode);
        ResolvedEpisodes {
            episodes,
            selected,
            origin,
            notice,
        }
    }

    /// Sequential episodes from the table, or a run of placeholders when the season is unknown.
    pub fn synthesize(
        &self,
        anime_id: &str,
        season_value: &str,
        language: Language,
    ) -> (Vec<Episode>, EpisodeOrigin) {
        let (run, origin) = match self.table.run_for(anime_id, season_value) {
            Some(run) => (run, EpisodeOrigin::Table),
            None => (
                SeasonRun {
                    count: PLACEHOLDER_EPISODE_COUNT,
                    start: 1,
                },
                EpisodeOrigin::Placeholder,
            ),
        };
        let url = catalogue_url(anime_id, season_value, language);
        let episodes = run
            .numbers()
            .map(|number| Episode {
                id: episode_id(anime_id, season_value, number, language),
                title: episode_title(number),
                episode_number: number,
                url: url.clone(),
                language,
                available: true,
                streaming_sources: vec![VideoSource {
                    url: url.clone(),
                    server: FALLBACK_SERVER.to_string(),
                    quality: String::from("HD"),
                    language: language.label().to_string(),
                    kind: STREAMING_PAGE_KIND.to_string(),
                    server_index: 0,
                }],
            })
            .collect();
        (episodes, origin)
    }
}

/// Applies ids and defaults to API episodes, ordered by number with repeats dropped.
pub fn from_api(
    anime_id: &str,
    season_value: &str,
    language: Language,
    raw: Vec<RawEpisode>,
) -> Vec<Episode> {
    let episodes: Vec<Episode> = raw
        .into_iter()
        .enumerate()
        .map(|(index, ep)| {
            let number = ep
                .episode_number
                .filter(|n| *n > 0)
                .unwrap_or(index as u32 + 1);
            Episode {
                id: episode_id(anime_id, season_value, number, language),
                title: ep
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| episode_title(number)),
                episode_number: number,
                url: ep
                    .url
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or_else(|| catalogue_url(anime_id, season_value, language)),
                language,
                available: true,
                streaming_sources: ep.streaming_sources.unwrap_or_default(),
            }
        })
        .collect();
    let (unique, dropped) = split_repeated_numbers(episodes);
    for episode in &dropped {
        debug!(
            "dropping duplicate episode {} ({:?}) of {anime_id}/{season_value}",
            episode.episode_number, episode.title
        );
    }
    unique
}

/// Sorts by number; the first episode of each number is kept, the rest are returned apart.
fn split_repeated_numbers(mut episodes: Vec<Episode>) -> (Vec<Episode>, Vec<Episode>) {
    episodes.sort_by_key(|ep| ep.episode_number);
    let mut unique: Vec<Episode> = Vec::with_capacity(episodes.len());
    let mut dropped = Vec::new();
    for episode in episodes {
        if unique
            .last()
            .is_some_and(|kept| kept.episode_number == episode.episode_number)
        {
            dropped.push(episode);
        } else {
            unique.push(episode);
        }
    }
    (unique, dropped)
}

/// Index of the requested episode number, else the first episode.
pub fn select_episode(episodes: &[Episode], target: Option<u32>) -> Option<usize> {
    if episodes.is_empty() {
        return None;
    }
    target
        .and_then(|n| episodes.iter().position(|ep| ep.episode_number == n))
        .or(Some(0))
}

fn episode_title(number: u32) -> String {
    format!("Épisode {number}")
}
