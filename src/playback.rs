use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::detail::{AnimeDetail, AnimeDetailResolver};
use crate::episodes::{EpisodeOrigin, EpisodeResolver, EpisodeTable, ResolvedEpisodes};
use crate::error::ApiError;
use crate::providers::{AnimeCatalog, EmbedExtractor};
use crate::sources::{ResolvedSources, SourceOrigin, SourceResolver};
use crate::types::{Episode, EpisodeDetails, Language, Season, VideoSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Deep-link parameters: which season, episode and track to open on.
#[derive(Debug, Clone, Default)]
pub struct LinkParams {
    pub season: Option<String>,
    pub episode: Option<u32>,
    pub language: Option<Language>,
}

#[derive(Debug)]
pub enum ScreenState {
    Loading,
    Ready(Box<PlaybackSession>),
    /// Anime metadata could not be loaded; only a retry leaves this state.
    Error(String),
}

/// A source load in flight. Results are applied only if it is still the latest one.
#[derive(Debug)]
pub struct LoadTicket {
    generation: u64,
    pub token: CancellationToken,
    pub episode: Episode,
    pub anime_title: String,
}

#[derive(Debug)]
pub struct PlaybackSession {
    pub detail: AnimeDetail,
    pub season: Option<Season>,
    pub language: Language,
    pub episodes: Vec<Episode>,
    pub selected_episode: Option<usize>,
    pub selected_server: usize,
    pub details: Option<EpisodeDetails>,
    pub episode_origin: Option<EpisodeOrigin>,
    pub source_origin: Option<SourceOrigin>,
    /// Inline, non-fatal problem with the current episode list or sources.
    pub notice: Option<String>,
    generation: u64,
    in_flight: Option<CancellationToken>,
}

impl PlaybackSession {
    pub fn new(detail: AnimeDetail, language: Language) -> Self {
        Self {
            season: detail.selected.clone(),
            detail,
            language,
            episodes: Vec::new(),
            selected_episode: None,
            selected_server: 0,
            details: None,
            episode_origin: None,
            source_origin: None,
            notice: None,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn anime_title(&self) -> &str {
        &self.detail.anime.title
    }

    pub fn current_episode(&self) -> Option<&Episode> {
        self.selected_episode.and_then(|idx| self.episodes.get(idx))
    }

    /// Sources resolved for the selected episode. Details left over from
    /// another episode after a failed load do not count.
    pub fn current_details(&self) -> Option<&EpisodeDetails> {
        let episode = self.current_episode()?;
        self.details.as_ref().filter(|d| d.id == episode.id)
    }

    pub fn current_source(&self) -> Option<&VideoSource> {
        self.current_details()
            .and_then(|d| d.sources.get(self.selected_server))
    }

    /// Index one step away from the current episode, if it exists. No wraparound.
    pub fn neighbor(&self, direction: Direction) -> Option<usize> {
        let current = self.selected_episode?;
        let target = match direction {
            Direction::Prev => current.checked_sub(1)?,
            Direction::Next => current + 1,
        };
        (target < self.episodes.len()).then_some(target)
    }

    pub fn can_go(&self, direction: Direction) -> bool {
        self.neighbor(direction).is_some()
    }

    /// Replaces the episode list; selection, sources and any pending load are reset.
    pub fn apply_episodes(&mut self, season: Season, resolved: ResolvedEpisodes) {
        self.invalidate();
        self.season = Some(season);
        self.episodes = resolved.episodes;
        self.selected_episode = resolved.selected;
        self.selected_server = 0;
        self.details = None;
        self.source_origin = None;
        self.episode_origin = Some(resolved.origin);
        self.notice = resolved.notice;
    }

    pub fn select_episode(&mut self, index: usize) -> bool {
        if index >= self.episodes.len() {
            return false;
        }
        self.selected_episode = Some(index);
        true
    }

    pub fn select_server(&mut self, index: usize) -> bool {
        let available = self.current_details().map_or(0, |d| d.sources.len());
        if index >= available {
            return false;
        }
        self.selected_server = index;
        true
    }

    /// Starts a source load for the current episode, cancelling the previous one.
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        let episode = self.current_episode()?.clone();
        self.invalidate();
        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());
        Some(LoadTicket {
            generation: self.generation,
            token,
            episode,
            anime_title: self.anime_title().to_string(),
        })
    }

    /// Applies a load result. Returns false when the ticket is stale or was cancelled.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<ResolvedSources, ApiError>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!("dropping stale sources for {}", ticket.episode.id);
            return false;
        }
        self.in_flight = None;
        match result {
            Ok(resolved) => {
                self.details = Some(resolved.details);
                self.source_origin = Some(resolved.origin);
                self.selected_server = 0;
                self.notice = None;
                true
            }
            Err(err) if err.is_cancelled() => false,
            Err(err) => {
                warn!("no sources for {}: {err}", ticket.episode.id);
                self.notice = Some(format!("No video source for {}", ticket.episode.title));
                true
            }
        }
    }

    fn invalidate(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        self.generation += 1;
    }
}

/// Drives the resolvers against a `PlaybackSession`.
pub struct Player<'a, C, E, T> {
    details: AnimeDetailResolver<'a, C>,
    episodes: EpisodeResolver<'a, C, T>,
    sources: SourceResolver<'a, E>,
    auto_load: bool,
}

impl<'a, C, E, T> Player<'a, C, E, T>
where
    C: AnimeCatalog,
    E: EmbedExtractor,
    T: EpisodeTable,
{
    pub fn new(catalog: &'a C, extractor: &'a E, table: &'a T, auto_load: bool) -> Self {
        Self {
            details: AnimeDetailResolver::new(catalog),
            episodes: EpisodeResolver::new(catalog, table),
            sources: SourceResolver::new(extractor),
            auto_load,
        }
    }

    /// Loading → Ready once metadata, season, episodes (and sources, with auto-load) resolve.
    pub async fn open(
        &self,
        anime_id: &str,
        params: &LinkParams,
        default_language: Language,
    ) -> ScreenState {
        let detail = match self.details.load(anime_id, params.season.as_deref()).await {
            Ok(detail) => detail,
            Err(err) => {
                warn!("failed to load anime {anime_id}: {err}");
                return ScreenState::Error(format!("Could not load anime {anime_id}: {err}"));
            }
        };

        let language = params.language.unwrap_or(default_language);
        let mut session = PlaybackSession::new(detail, language);
        if let Some(season) = session.season.clone() {
            self.load_season(&mut session, season, params.episode, self.auto_load)
                .await;
        } else {
            session.notice = Some(String::from("No season available for this anime"));
        }
        info!("player ready for {}", session.anime_title());
        ScreenState::Ready(Box::new(session))
    }

    pub async fn load_season(
        &self,
        session: &mut PlaybackSession,
        season: Season,
        target_episode: Option<u32>,
        auto_load: bool,
    ) {
        let resolved = self
            .episodes
            .resolve(&session.detail.anime.id, &season, session.language, target_episode)
            .await;
        session.apply_episodes(season, resolved);
        if auto_load {
            self.load_sources(session).await;
        }
    }

    /// Resolves sources for the selected episode. False if nothing was applied.
    pub async fn load_sources(&self, session: &mut PlaybackSession) -> bool {
        let Some(ticket) = session.begin_load() else {
            return false;
        };
        let result = self
            .sources
            .resolve_cancellable(&ticket.episode, &ticket.anime_title, &ticket.token)
            .await;
        session.finish_load(ticket, result)
    }

    /// Moves one episode and loads its sources; a no-op at either end of the list.
    pub async fn navigate(&self, session: &mut PlaybackSession, direction: Direction) -> bool {
        let Some(index) = session.neighbor(direction) else {
            return false;
        };
        session.select_episode(index);
        self.load_sources(session).await;
        true
    }

    pub async fn jump_to(&self, session: &mut PlaybackSession, index: usize) -> bool {
        if !session.select_episode(index) {
            return false;
        }
        self.load_sources(session).await;
        true
    }

    /// Reloads the current season's episodes in the new track.
    pub async fn change_language(&self, session: &mut PlaybackSession, language: Language) {
        session.language = language;
        if let Some(season) = session.season.clone() {
            self.load_season(session, season, None, false).await;
        }
    }

    pub async fn change_season(&self, session: &mut PlaybackSession, season: Season) {
        self.load_season(session, season, None, self.auto_load).await;
    }
}
