use anyhow::{Context, Result, anyhow, bail};
use tokio::process::Command;
use tracing::{debug, info};

use crate::types::{EpisodeDetails, VideoSource};

pub const PLAYER_ENV_KEY: &str = "NEXUS_PLAYER";

/// `NEXUS_PLAYER` if set, else the configured command.
pub fn detect_player(configured: &str) -> String {
    std::env::var(PLAYER_ENV_KEY)
        .ok()
        .filter(|val| !val.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

/// Builds the player invocation; the player string may carry its own arguments.
pub fn player_command(
    player: &str,
    source: &VideoSource,
    details: &EpisodeDetails,
) -> Result<(String, Vec<String>)> {
    let mut words = shlex::split(player)
        .filter(|w| !w.is_empty())
        .ok_or_else(|| anyhow!("invalid player command: {player}"))?;
    let program = words.remove(0);
    let mut args = words;

    if is_mpv(&program) {
        args.push(String::from("--quiet"));
        args.push(String::from("--terminal=no"));
        args.push(format!(
            "--force-media-title={} - {}",
            details.anime_title, details.title
        ));
        if source.url.contains("anime-sama") {
            args.push(String::from("--referrer=https://anime-sama.fr/"));
        }
    }
    args.push(source.url.clone());
    Ok((program, args))
}

fn is_mpv(program: &str) -> bool {
    program
        .rsplit(['/', '\\'])
        .next()
        .is_some_and(|name| name.trim_end_matches(".exe") == "mpv")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTarget {
    /// Direct media URL, handed to the external player.
    Player,
    /// Catalogue page with an embedded player.
    Browser,
}

pub fn play_target(source: &VideoSource) -> PlayTarget {
    if source.is_browser_only() {
        PlayTarget::Browser
    } else {
        PlayTarget::Player
    }
}

/// Plays `source` wherever it can play and reports where that was.
pub async fn play(
    player: &str,
    source: &VideoSource,
    details: &EpisodeDetails,
) -> Result<PlayTarget> {
    let target = play_target(source);
    match target {
        PlayTarget::Player => launch_player(player, source, details).await?,
        PlayTarget::Browser => {
            info!("opening {} in the browser", details.id);
            open_in_browser(&source.url)?;
        }
    }
    Ok(target)
}

pub async fn launch_player(
    player: &str,
    source: &VideoSource,
    details: &EpisodeDetails,
) -> Result<()> {
    let player = detect_player(player);
    let (program, args) = player_command(&player, source, details)?;
    debug!("launching {program} {args:?}");
    info!("playing {} on {}", details.id, source.label());

    let status = match Command::new(&program).args(&args).status().await {
        Ok(status) => status,
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                return Err(anyhow!(
                    "Player '{}' not found. Install mpv or set {} to a valid command.",
                    program,
                    PLAYER_ENV_KEY
                ));
            }
            return Err(anyhow!(err).context(format!("failed to launch player '{program}'")));
        }
    };

    if !status.success() {
        bail!("player exited with status {status}");
    }
    Ok(())
}

pub fn open_in_browser(url: &str) -> Result<()> {
    open::that(url).with_context(|| format!("failed to open {url} in the browser"))
}
