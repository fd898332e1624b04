use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use dialoguer::{Select, theme::ColorfulTheme};
use dirs_next::data_dir;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::types::Language;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    pub anime_id: String,
    pub anime_title: String,
    pub season: String,
    pub episode: u32,
    pub language: Language,
    pub watched_at: DateTime<Utc>,
}

/// Per-user record of the last episode watched for each anime.
pub trait WatchHistory {
    fn entries(&self) -> &[HistoryEntry];
    fn record(&mut self, entry: HistoryEntry) -> Result<()>;

    fn last_watched(&self, anime_id: &str) -> Option<&HistoryEntry> {
        self.entries().iter().find(|e| e.anime_id == anime_id)
    }

    fn last_episode(&self, anime_id: &str) -> Option<u32> {
        self.last_watched(anime_id).map(|e| e.episode)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    entries: Vec<HistoryEntry>,
}

fn upsert(entries: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    entries.retain(|e| e.anime_id != entry.anime_id);
    entries.insert(0, entry);
}

/// JSON file under the user's data directory, rewritten on every record.
#[derive(Debug)]
pub struct JsonHistoryStore {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl JsonHistoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("failed to read history file {}", path.display()))?;
            let file: HistoryFile = serde_json::from_str(&data)
                .with_context(|| format!("failed to parse history file {}", path.display()))?;
            file.entries
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create history directory {}", parent.display())
            })?;
        }
        let data = serde_json::to_string_pretty(&HistoryFile {
            entries: self.entries.clone(),
        })?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write history file {}", self.path.display()))?;
        Ok(())
    }
}

impl WatchHistory for JsonHistoryStore {
    fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    fn record(&mut self, entry: HistoryEntry) -> Result<()> {
        upsert(&mut self.entries, entry);
        self.save()
    }
}

#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Vec<HistoryEntry>,
}

impl WatchHistory for MemoryHistory {
    fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    fn record(&mut self, entry: HistoryEntry) -> Result<()> {
        upsert(&mut self.entries, entry);
        Ok(())
    }
}

pub fn select_entry(history: &dyn WatchHistory) -> Result<Option<HistoryEntry>> {
    let entries = history.entries();
    if entries.is_empty() {
        println!("History is empty.");
        return Ok(None);
    }

    let items: Vec<String> = entries
        .iter()
        .map(|entry| {
            format!(
                "[{}] {} \u{00b7} {} \u{00b7} episode {} \u{00b7} watched {}",
                entry.language.label(),
                entry.anime_title,
                entry.season,
                entry.episode,
                entry.watched_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect();

    let selection = Select::with_theme(&theme())
        .with_prompt("Select an entry to resume (Esc to cancel)")
        .items(&items)
        .default(0)
        .interact_opt()?;
    Ok(selection.map(|idx| entries[idx].clone()))
}

pub fn history_path() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(base.join("otaku-nexus").join("history.json"))
}

pub fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}
