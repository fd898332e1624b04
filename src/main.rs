use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use dialoguer::{Confirm, FuzzySelect, Select};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod config;
mod detail;
mod episodes;
mod error;
mod history;
mod player;
mod playback;
mod providers;
mod retry;
mod search;
mod sources;
mod types;

use config::AppConfig;
use episodes::{EpisodeOrigin, EpisodeTable, StaticEpisodeTable};
use history::{
    HistoryEntry, JsonHistoryStore, MemoryHistory, WatchHistory, history_path, select_entry, theme,
};
use playback::{Direction, LinkParams, PlaybackSession, Player, ScreenState};
use player::PlayTarget;
use providers::{
    AnimeCatalog, EmbedExtractor, anime_sama::AnimeSamaClient, embed::EmbedClient,
};
use search::{SearchController, SearchOutcome};
use sources::SourceOrigin;
use types::{AnimeSummary, Language};

#[derive(Debug, Parser)]
#[command(
    name = "otaku-nexus",
    about = "Search anime-sama, resolve episodes and play them via mpv.",
    version
)]
struct Cli {
    /// Resume an anime from watch history.
    #[arg(long)]
    history: bool,
    /// Pick from the trending list instead of searching.
    #[arg(long)]
    trending: bool,
    /// Open the player for this anime id directly.
    #[arg(long, value_name = "ANIME_ID")]
    id: Option<String>,
    #[arg(long, value_name = "SEASON")]
    season: Option<String>,
    #[arg(short = 'e', long, value_name = "EPISODE")]
    episode: Option<u32>,
    #[arg(long, value_enum)]
    lang: Option<Language>,
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
    #[arg(value_name = "QUERY")]
    query: Vec<String>,
}

impl Cli {
    fn link_params(&self) -> LinkParams {
        LinkParams {
            season: self.season.clone(),
            episode: self.episode,
            language: self.lang,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Play,
    Next,
    Prev,
    Episode,
    Language,
    Season,
    Server,
    Browser,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let result = run().await;
    if let Err(err) = &result {
        eprintln!("error: {err:?}");
    }
    result
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "otaku_nexus=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref())?;
    let table = match &config.playback.episode_table {
        Some(path) => StaticEpisodeTable::load(path)?,
        None => StaticEpisodeTable::builtin(),
    };
    let catalog = AnimeSamaClient::new(
        &config.api.base_url,
        config.timeout(),
        config.retry_policy(),
    )
    .context("failed to create anime-sama client")?;
    let embed = EmbedClient::new(&config.api.backend_url, config.timeout())
        .context("failed to create embed client")?;
    let mut history = open_history();

    let (anime_id, params) = if cli.history {
        let Some(entry) = select_entry(history.as_ref())? else {
            return Ok(());
        };
        let params = LinkParams {
            season: Some(entry.season),
            episode: Some(entry.episode),
            language: Some(entry.language),
        };
        (entry.anime_id, params)
    } else if let Some(id) = &cli.id {
        (id.clone(), cli.link_params())
    } else {
        let Some(anime) = browse(&cli, &config, &catalog, history.as_ref()).await? else {
            return Ok(());
        };
        (anime.id, cli.link_params())
    };

    let player = Player::new(&catalog, &embed, &table, config.playback.auto_load);
    let mut screen = ScreenState::Loading;
    loop {
        screen = match screen {
            ScreenState::Loading => {
                println!("Loading {anime_id}...");
                player
                    .open(&anime_id, &params, config.playback.default_language)
                    .await
            }
            ScreenState::Error(message) => {
                println!("{message}");
                if !confirm_retry()? {
                    return Ok(());
                }
                ScreenState::Loading
            }
            ScreenState::Ready(mut session) => {
                return run_session(&player, &mut session, history.as_mut(), &config).await;
            }
        };
    }
}

fn confirm_retry() -> Result<bool> {
    let retry = Confirm::with_theme(&theme())
        .with_prompt("Retry?")
        .default(true)
        .interact_opt()?;
    Ok(retry == Some(true))
}

fn open_history() -> Box<dyn WatchHistory> {
    let opened = history_path().and_then(|path| JsonHistoryStore::open(&path));
    match opened {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!("watch history unavailable, keeping it in memory: {err:#}");
            Box::new(MemoryHistory::default())
        }
    }
}

/// Search (or trending) listing, then a pick. `None` when cancelled or empty.
async fn browse(
    cli: &Cli,
    config: &AppConfig,
    catalog: &impl AnimeCatalog,
    history: &dyn WatchHistory,
) -> Result<Option<AnimeSummary>> {
    let search = SearchController::new(
        catalog,
        config.debounce(),
        config.search.min_query_len,
        config.search.trending_limit,
    );

    let results = if cli.trending || cli.query.is_empty() {
        println!("Loading trending anime...");
        search.trending().await
    } else {
        let query = cli.query.join(" ");
        let outcome = search
            .search_with_retry(&query, |message| {
                println!("{message}");
                confirm_retry()
            })
            .await?;
        match outcome {
            SearchOutcome::Results(results) => results,
            SearchOutcome::Cleared => {
                println!(
                    "Type at least {} characters to search.",
                    config.search.min_query_len
                );
                return Ok(None);
            }
            SearchOutcome::Superseded | SearchOutcome::Failed(_) => return Ok(None),
        }
    };

    if results.is_empty() {
        println!("No anime found.");
        return Ok(None);
    }

    let labels: Vec<String> = results
        .iter()
        .map(|anime| anime.label(history.last_episode(&anime.id)))
        .collect();
    let selection = FuzzySelect::with_theme(&theme())
        .with_prompt("Select an anime (Esc to cancel)")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(None);
    };
    Ok(results.into_iter().nth(idx))
}

async fn run_session<C, E, T>(
    player: &Player<'_, C, E, T>,
    session: &mut PlaybackSession,
    history: &mut dyn WatchHistory,
    config: &AppConfig,
) -> Result<()>
where
    C: AnimeCatalog,
    E: EmbedExtractor,
    T: EpisodeTable,
{
    print_header(session);
    let mut just_played = false;
    loop {
        print_status(session);

        let mut actions = vec![(Action::Play, play_label(session))];
        if session.can_go(Direction::Next) {
            actions.push((Action::Next, String::from("Next episode")));
        }
        if session.can_go(Direction::Prev) {
            actions.push((Action::Prev, String::from("Previous episode")));
        }
        actions.push((Action::Episode, String::from("Choose episode")));
        actions.push((
            Action::Language,
            format!("Switch to {}", session.language.other().label()),
        ));
        if session.detail.selectable_seasons().len() > 1 {
            actions.push((Action::Season, String::from("Change season")));
        }
        if session.current_details().is_some_and(|d| d.sources.len() > 1) {
            actions.push((Action::Server, String::from("Change server")));
        }
        actions.push((Action::Browser, String::from("Open episode page in browser")));
        actions.push((Action::Quit, String::from("Quit")));

        let default = if just_played && session.can_go(Direction::Next) {
            1
        } else {
            0
        };
        let labels: Vec<&str> = actions.iter().map(|(_, label)| label.as_str()).collect();
        let selection = Select::with_theme(&theme())
            .with_prompt("What next? (Esc to quit)")
            .items(&labels)
            .default(default)
            .interact_opt()?;
        let Some(idx) = selection else {
            return Ok(());
        };
        just_played = false;

        match actions[idx].0 {
            Action::Play => {
                if session.current_details().is_none() {
                    println!("Fetching sources...");
                    player.load_sources(session).await;
                }
                let (Some(details), Some(source)) =
                    (session.current_details(), session.current_source())
                else {
                    continue;
                };
                match player::play(&config.playback.player, source, details).await {
                    Ok(PlayTarget::Browser) => println!("Opened {} in the browser.", details.title),
                    Ok(PlayTarget::Player) => {}
                    Err(err) => {
                        println!("Playback failed: {err:#}");
                        continue;
                    }
                }
                record_watch(session, history);
                just_played = true;
            }
            Action::Next => {
                player.navigate(session, Direction::Next).await;
            }
            Action::Prev => {
                player.navigate(session, Direction::Prev).await;
            }
            Action::Episode => {
                let labels: Vec<&str> = session.episodes.iter().map(|e| e.title.as_str()).collect();
                if labels.is_empty() {
                    println!("No episodes to choose from.");
                    continue;
                }
                let choice = FuzzySelect::with_theme(&theme())
                    .with_prompt("Episode (Esc to go back)")
                    .items(&labels)
                    .default(session.selected_episode.unwrap_or(0))
                    .interact_opt()?;
                if let Some(index) = choice {
                    player.jump_to(session, index).await;
                }
            }
            Action::Language => {
                let language = session.language.other();
                player.change_language(session, language).await;
            }
            Action::Season => {
                let seasons = session.detail.selectable_seasons().to_vec();
                let labels: Vec<String> = seasons
                    .iter()
                    .map(|s| match s.episode_count {
                        0 => s.name.clone(),
                        count => format!("{} ({count} episodes)", s.name),
                    })
                    .collect();
                let current = session
                    .season
                    .as_ref()
                    .and_then(|c| seasons.iter().position(|s| s.value == c.value))
                    .unwrap_or(0);
                let choice = Select::with_theme(&theme())
                    .with_prompt("Season (Esc to go back)")
                    .items(&labels)
                    .default(current)
                    .interact_opt()?;
                if let Some(index) = choice {
                    player.change_season(session, seasons[index].clone()).await;
                }
            }
            Action::Server => {
                let Some(details) = session.current_details() else {
                    continue;
                };
                let labels: Vec<String> = details.sources.iter().map(|s| s.label()).collect();
                let choice = Select::with_theme(&theme())
                    .with_prompt("Server (Esc to go back)")
                    .items(&labels)
                    .default(session.selected_server)
                    .interact_opt()?;
                if let Some(index) = choice {
                    session.select_server(index);
                }
            }
            Action::Browser => {
                if let Some(episode) = session.current_episode() {
                    if let Err(err) = player::open_in_browser(&episode.url) {
                        println!("{err:#}");
                    }
                }
            }
            Action::Quit => return Ok(()),
        }
    }
}

fn play_label(session: &PlaybackSession) -> String {
    match (session.current_episode(), session.current_source()) {
        (Some(episode), Some(source)) => format!("Play {} on {}", episode.title, source.label()),
        (Some(episode), None) => format!("Play {}", episode.title),
        (None, _) => String::from("Play"),
    }
}

fn print_header(session: &PlaybackSession) {
    let anime = &session.detail.anime;
    let mut facts = Vec::new();
    if !anime.year.is_empty() {
        facts.push(anime.year.clone());
    }
    if !anime.status.is_empty() {
        facts.push(anime.status.clone());
    }
    if !anime.genres.is_empty() {
        facts.push(anime.genres.join(", "));
    }
    println!();
    if facts.is_empty() {
        println!("{}", anime.title);
    } else {
        println!("{} ({})", anime.title, facts.join(" \u{00b7} "));
    }
    if !anime.description.is_empty() {
        println!("{}", anime.description);
    }
}

fn print_status(session: &PlaybackSession) {
    let season = session
        .season
        .as_ref()
        .map(|s| s.name.as_str())
        .unwrap_or("no season");
    println!();
    println!(
        "{} \u{00b7} {} \u{00b7} {}",
        session.anime_title(),
        season,
        session.language.label()
    );
    if let (Some(index), Some(episode)) = (session.selected_episode, session.current_episode()) {
        let listing = match session.episode_origin {
            Some(EpisodeOrigin::Api) | None => "",
            Some(EpisodeOrigin::Table) => " \u{00b7} from episode table",
            Some(EpisodeOrigin::Placeholder) => " \u{00b7} placeholder list",
        };
        println!(
            "{} ({}/{}){}",
            episode.title,
            index + 1,
            session.episodes.len(),
            listing
        );
    }
    if let Some(details) = session.current_details() {
        let origin = match session.source_origin {
            Some(SourceOrigin::Extracted) => "direct",
            Some(SourceOrigin::Cached) => "catalogue",
            None => "unknown",
        };
        println!(
            "{} server(s) [{}] \u{00b7} {} sources for episode {}",
            details.available_servers.len(),
            details.available_servers.join(", "),
            origin,
            details.episode_number
        );
    }
    if let Some(notice) = &session.notice {
        println!("! {notice}");
    }
}

fn record_watch(session: &PlaybackSession, history: &mut dyn WatchHistory) {
    let Some(episode) = session.current_episode() else {
        return;
    };
    let entry = HistoryEntry {
        anime_id: session.detail.anime.id.clone(),
        anime_title: session.anime_title().to_string(),
        season: session
            .season
            .as_ref()
            .map(|s| s.value.clone())
            .unwrap_or_default(),
        episode: episode.episode_number,
        language: session.language,
        watched_at: Utc::now(),
    };
    if let Err(err) = history.record(entry) {
        warn!("failed to save watch history: {err:#}");
    }
}
