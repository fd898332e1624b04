use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::providers::AnimeCatalog;
use crate::types::{AnimeData, Season};

static SEASON_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)saison|saga").expect("season name pattern is valid"));

#[derive(Debug, Clone)]
pub struct AnimeDetail {
    pub anime: AnimeData,
    /// Seasons that passed the placeholder filter.
    pub seasons: Vec<Season>,
    pub selected: Option<Season>,
}

impl AnimeDetail {
    /// Every season the picker may offer: the valid ones, or the raw list when none passed.
    pub fn selectable_seasons(&self) -> &[Season] {
        if self.seasons.is_empty() {
            &self.anime.seasons
        } else {
            &self.seasons
        }
    }
}

pub struct AnimeDetailResolver<'a, C> {
    catalog: &'a C,
}

impl<'a, C: AnimeCatalog> AnimeDetailResolver<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    pub async fn load(
        &self,
        anime_id: &str,
        target_season: Option<&str>,
    ) -> Result<AnimeDetail, ApiError> {
        let mut anime = self.catalog.anime(anime_id).await?;
        if anime.seasons.is_empty() {
            match self.catalog.seasons(anime_id).await {
                Ok(seasons) => anime.seasons = seasons,
                Err(err) => {
                    warn!("no embedded seasons for {anime_id} and season list failed: {err}")
                }
            }
        }

        let seasons = valid_seasons(&anime.seasons);
        let selected = select_season(&seasons, &anime.seasons, target_season);
        info!(
            "loaded {} ({} seasons, {} valid), selected {:?}",
            anime.title,
            anime.seasons.len(),
            seasons.len(),
            selected.as_ref().map(|s| s.value.as_str())
        );
        Ok(AnimeDetail {
            anime,
            seasons,
            selected,
        })
    }
}

/// Drops the scraper's placeholder rows (`nom`/`url` headers, non-season links).
pub fn valid_seasons(raw: &[Season]) -> Vec<Season> {
    raw.iter().filter(|s| is_valid_season(s)).cloned().collect()
}

pub fn is_valid_season(season: &Season) -> bool {
    !season.name.is_empty()
        && season.name != "nom"
        && season.value != "url"
        && SEASON_NAME.is_match(&season.name)
}

/// Requested season if it is valid, else the first valid one, else the first raw one.
pub fn select_season(valid: &[Season], raw: &[Season], target: Option<&str>) -> Option<Season> {
    if let Some(target) = target {
        if let Some(season) = valid.iter().find(|s| s.value == target) {
            return Some(season.clone());
        }
        debug!("requested season {target:?} is not a valid season, using default");
    }
    valid.first().or_else(|| raw.first()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fake::{FakeCatalog, season};

    fn one_piece() -> AnimeData {
        AnimeData {
            id: "one-piece".into(),
            title: "One Piece".into(),
            seasons: vec![
                season("nom", "url"),
                season("Saison 1", "saison1"),
                season("Saison 2", "saison2"),
                season("Film", "film"),
                season("Saga Egghead", "saison11"),
            ],
            ..AnimeData::default()
        }
    }

    #[test]
    fn filter_rejects_placeholders_and_non_seasons() {
        let valid = valid_seasons(&one_piece().seasons);
        let values: Vec<_> = valid.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, vec!["saison1", "saison2", "saison11"]);

        assert!(!is_valid_season(&season("", "saison1")));
        assert!(!is_valid_season(&season("Saison 3", "url")));
        assert!(is_valid_season(&season("SAISON 3", "saison3")));
    }

    #[test]
    fn selection_prefers_requested_then_first_valid_then_first_raw() {
        let raw = one_piece().seasons;
        let valid = valid_seasons(&raw);

        let picked = select_season(&valid, &raw, Some("saison2")).unwrap();
        assert_eq!(picked.value, "saison2");

        let picked = select_season(&valid, &raw, Some("film")).unwrap();
        assert_eq!(picked.value, "saison1");

        let picked = select_season(&valid, &raw, None).unwrap();
        assert_eq!(picked.value, "saison1");

        let only_films = vec![season("Film", "film")];
        let picked = select_season(&[], &only_films, None).unwrap();
        assert_eq!(picked.value, "film");

        assert!(select_season(&[], &[], Some("saison1")).is_none());
    }

    #[tokio::test]
    async fn load_picks_first_valid_season_without_target() {
        let catalog = FakeCatalog::default().with_anime(one_piece());
        let detail = AnimeDetailResolver::new(&catalog)
            .load("one-piece", None)
            .await
            .unwrap();

        assert_eq!(detail.anime.title, "One Piece");
        assert_eq!(detail.selected.unwrap().value, "saison1");
        assert_eq!(detail.seasons.len(), 3);
        assert_eq!(catalog.calls(), vec!["anime:one-piece".to_string()]);
    }

    #[tokio::test]
    async fn load_falls_back_to_season_endpoint() {
        let mut catalog = FakeCatalog::default().with_anime(AnimeData {
            id: "frieren".into(),
            title: "Frieren".into(),
            ..AnimeData::default()
        });
        catalog
            .seasons
            .insert("frieren".into(), vec![season("Saison 1", "saison1")]);

        let detail = AnimeDetailResolver::new(&catalog)
            .load("frieren", None)
            .await
            .unwrap();
        assert_eq!(detail.selected.unwrap().value, "saison1");
        assert_eq!(
            catalog.calls(),
            vec!["anime:frieren".to_string(), "seasons:frieren".to_string()]
        );
    }

    #[tokio::test]
    async fn load_failure_is_an_error() {
        let catalog = FakeCatalog::default();
        let result = AnimeDetailResolver::new(&catalog).load("missing", None).await;
        assert!(matches!(result, Err(ApiError::Http { status: 404, .. })));
    }
}
