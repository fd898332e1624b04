use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::providers::AnimeCatalog;
use crate::types::{AnimeSummary, DEFAULT_KIND, DEFAULT_STATUS, SearchHit, default_image_url};

pub const SEARCH_FAILED_MESSAGE: &str =
    "Unable to search anime right now. Check your connection and try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Query too short; the result grid is emptied without a request.
    Cleared,
    /// A newer query arrived during the debounce window.
    Superseded,
    Results(Vec<AnimeSummary>),
    Failed(String),
}

pub struct SearchController<'a, C> {
    catalog: &'a C,
    debounce: Duration,
    min_query_len: usize,
    trending_limit: usize,
    generation: AtomicU64,
}

impl<'a, C: AnimeCatalog> SearchController<'a, C> {
    pub fn new(
        catalog: &'a C,
        debounce: Duration,
        min_query_len: usize,
        trending_limit: usize,
    ) -> Self {
        Self {
            catalog,
            debounce,
            min_query_len,
            trending_limit,
            generation: AtomicU64::new(0),
        }
    }

    /// Debounced search; only the latest call within the window reaches the catalogue.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.debounce.is_zero() {
            sleep(self.debounce).await;
        }
        if self.generation.load(Ordering::SeqCst) != ticket {
            debug!("search {query:?} superseded during debounce");
            return SearchOutcome::Superseded;
        }

        let query = query.trim();
        if query.chars().count() < self.min_query_len {
            return SearchOutcome::Cleared;
        }

        match self.catalog.search(query).await {
            Ok(hits) => {
                let results = normalize(hits);
                debug!("search {query:?} returned {} anime", results.len());
                SearchOutcome::Results(results)
            }
            Err(err) => {
                warn!("search {query:?} failed: {err}");
                SearchOutcome::Failed(SEARCH_FAILED_MESSAGE.to_string())
            }
        }
    }

    /// Searches again for as long as `retry` accepts the failure message.
    pub async fn search_with_retry<F>(&self, query: &str, mut retry: F) -> Result<SearchOutcome>
    where
        F: FnMut(&str) -> Result<bool>,
    {
        loop {
            match self.search(query).await {
                SearchOutcome::Failed(message) => {
                    if !retry(&message)? {
                        return Ok(SearchOutcome::Failed(message));
                    }
                    debug!("retrying search {query:?}");
                }
                outcome => return Ok(outcome),
            }
        }
    }

    /// Popular anime; any failure degrades to an empty list.
    pub async fn trending(&self) -> Vec<AnimeSummary> {
        match self.catalog.trending().await {
            Ok(hits) => {
                let mut results = normalize(hits);
                results.truncate(self.trending_limit);
                results
            }
            Err(err) => {
                warn!("trending failed: {err}");
                Vec::new()
            }
        }
    }
}

/// Drops manga entries and fills in the catalogue's image/status/type conventions.
pub fn normalize(hits: Vec<SearchHit>) -> Vec<AnimeSummary> {
    hits.into_iter()
        .filter(|hit| hit.kind.as_deref() != Some("manga"))
        .map(|hit| AnimeSummary {
            image: non_empty(hit.image).unwrap_or_else(|| default_image_url(&hit.id)),
            status: non_empty(hit.status).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            kind: non_empty(hit.kind).unwrap_or_else(|| DEFAULT_KIND.to_string()),
            id: hit.id,
            title: hit.title,
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
