use serde::{Deserialize, Serialize};

pub const CATALOGUE_BASE_URL: &str = "https://anime-sama.fr/catalogue";
pub const IMAGE_CDN_BASE_URL: &str = "https://cdn.statically.io/gh/Anime-Sama/IMG/img/contenu";
pub const DEFAULT_STATUS: &str = "Disponible";
pub const DEFAULT_KIND: &str = "Anime";
/// Source type of catalogue pages, which embed their players and need a browser.
pub const STREAMING_PAGE_KIND: &str = "streaming";

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[value(name = "vf")]
    Vf,
    #[default]
    #[value(name = "vostfr")]
    Vostfr,
}

impl Language {
    /// Lowercase code used in episode ids and catalogue URLs.
    pub fn as_code(self) -> &'static str {
        match self {
            Language::Vf => "vf",
            Language::Vostfr => "vostfr",
        }
    }

    /// Uppercase label sent to the episode API and shown to the user.
    pub fn label(self) -> &'static str {
        match self {
            Language::Vf => "VF",
            Language::Vostfr => "VOSTFR",
        }
    }

    pub fn other(self) -> Language {
        match self {
            Language::Vf => Language::Vostfr,
            Language::Vostfr => Language::Vf,
        }
    }
}

/// A search or trending hit as the scraper returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeSummary {
    pub id: String,
    pub title: String,
    pub image: String,
    pub status: String,
    pub kind: String,
}

impl AnimeSummary {
    pub fn label(&self, last_episode: Option<u32>) -> String {
        match last_episode {
            Some(ep) => format!(
                "{} [{} \u{00b7} {}] \u{00b7} Ep {}",
                self.title, self.kind, self.status, ep
            ),
            None => format!("{} [{} \u{00b7} {}]", self.title, self.kind, self.status),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub episode_count: u32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnimeData {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: String,
    #[serde(default)]
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSource {
    pub url: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub language: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub server_index: u32,
}

impl VideoSource {
    pub fn is_browser_only(&self) -> bool {
        self.kind == STREAMING_PAGE_KIND
    }

    pub fn label(&self) -> String {
        let server = if self.server.is_empty() {
            format!("Server {}", self.server_index + 1)
        } else {
            self.server.clone()
        };
        let label = if self.quality.is_empty() {
            server
        } else {
            format!("{} ({})", server, self.quality)
        };
        if self.is_browser_only() {
            format!("{label} [browser]")
        } else {
            label
        }
    }
}

/// An episode entry from `/api/episodes`, before ids and defaults are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEpisode {
    #[serde(default)]
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub streaming_sources: Option<Vec<VideoSource>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub episode_number: u32,
    pub url: String,
    pub language: Language,
    pub available: bool,
    pub streaming_sources: Vec<VideoSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeDetails {
    pub id: String,
    pub title: String,
    pub anime_title: String,
    pub episode_number: u32,
    pub sources: Vec<VideoSource>,
    pub available_servers: Vec<String>,
    pub url: String,
}

impl EpisodeDetails {
    pub fn new(episode: &Episode, anime_title: &str, sources: Vec<VideoSource>) -> Self {
        let available_servers = sources.iter().map(|s| s.server.clone()).collect();
        Self {
            id: episode.id.clone(),
            title: episode.title.clone(),
            anime_title: anime_title.to_string(),
            episode_number: episode.episode_number,
            sources,
            available_servers,
            url: episode.url.clone(),
        }
    }
}

/// Payload of the local `/api/embed` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbedPayload {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub sources: Vec<VideoSource>,
}

pub fn catalogue_url(anime_id: &str, season_value: &str, language: Language) -> String {
    format!(
        "{CATALOGUE_BASE_URL}/{anime_id}/{season_value}/{}",
        language.as_code()
    )
}

pub fn default_image_url(anime_id: &str) -> String {
    format!("{IMAGE_CDN_BASE_URL}/{anime_id}.jpg")
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_codes_and_labels() {
        assert_eq!(Language::Vf.as_code(), "vf");
        assert_eq!(Language::Vostfr.label(), "VOSTFR");
        assert_eq!(Language::Vf.other(), Language::Vostfr);
    }

    #[test]
    fn anime_payload_tolerates_numeric_year_and_missing_fields() {
        let json = r#"{"id":"one-piece","title":"One Piece","year":1999,"seasons":[{"name":"Saison 1","value":"saison1"}]}"#;
        let anime: AnimeData = serde_json::from_str(json).unwrap();
        assert_eq!(anime.year, "1999");
        assert_eq!(anime.seasons.len(), 1);
        assert_eq!(anime.seasons[0].episode_count, 0);
        assert!(anime.genres.is_empty());
    }

    #[test]
    fn video_source_reads_camel_case_fields() {
        let json = r#"{"url":"https://v.example/1.mp4","server":"Sibnet","quality":"HD","language":"VF","type":"direct","serverIndex":2}"#;
        let source: VideoSource = serde_json::from_str(json).unwrap();
        assert_eq!(source.kind, "direct");
        assert_eq!(source.server_index, 2);
        assert_eq!(source.label(), "Sibnet (HD)");
        assert!(!source.is_browser_only());

        let page = VideoSource {
            kind: STREAMING_PAGE_KIND.into(),
            ..source
        };
        assert_eq!(page.label(), "Sibnet (HD) [browser]");
    }

    #[test]
    fn catalogue_url_uses_language_code() {
        assert_eq!(
            catalogue_url("one-piece", "saison2", Language::Vf),
            "https://anime-sama.fr/catalogue/one-piece/saison2/vf"
        );
    }
}
