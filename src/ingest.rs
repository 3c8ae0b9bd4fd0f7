#![forbid(unsafe_code)]

//! Video ingestion: single-video add and batch search-save.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::blocking::run_blocking;
use crate::error::{ServiceError, ServiceResult};
use crate::games::{EXCLUDED_TERMS, GameCatalog, GameProfile};
use crate::store::{ContentStore, NewVideo, Video};
use crate::youtube::{
    MAX_SEARCH_RESULTS, PlatformVideo, SearchQuery, VideoPlatform, VideoStatistics,
    extract_video_id,
};

pub const DEFAULT_SEARCH_RESULTS: u32 = 25;
/// Number of scored candidates echoed back in a search report.
pub const PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddVideoRequest {
    pub video_id: Option<String>,
    pub url: Option<String>,
    pub game_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddedVideo {
    pub video: Video,
    pub statistics: VideoStatistics,
}

/// Adds one video by id or URL. An already stored id is a conflict, never an
/// overwrite.
pub async fn add_video(
    store: &ContentStore,
    platform: Arc<dyn VideoPlatform>,
    request: AddVideoRequest,
    default_game_id: i64,
) -> ServiceResult<AddedVideo> {
    let raw = request
        .video_id
        .iter()
        .chain(request.url.iter())
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput("video_id or url is required".into()))?;
    let video_id = extract_video_id(raw)
        .ok_or_else(|| ServiceError::InvalidInput(format!("no video id found in {raw:?}")))?;

    let lookup_id = video_id.clone();
    let details = run_blocking(move || platform.video_details(&lookup_id))
        .await?
        .map_err(|err| ServiceError::UpstreamFailure(err.to_string()))?
        .ok_or_else(|| ServiceError::NotFound(format!("video {video_id} not found on platform")))?;

    if let Some(existing) = store.find_video(&video_id).await? {
        return Err(ServiceError::Conflict {
            message: format!("video {video_id} is already stored"),
            existing_id: existing.id,
        });
    }

    let platform_video = details.video;
    let new_video = NewVideo {
        video_id: video_id.clone(),
        title: platform_video.title,
        description: platform_video.description,
        channel_title: Some(platform_video.channel_title).filter(|name| !name.is_empty()),
        published_at: platform_video.published_at,
        thumbnail_url: platform_video.thumbnail_url,
        search_query: None,
        game_id: request.game_id.unwrap_or(default_game_id),
    };
    let video = store.insert_video(&new_video).await?;
    info!(video_id = %video.video_id, id = video.id, game_id = video.game_id, "video added");

    Ok(AddedVideo {
        video,
        statistics: details.statistics,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchSpec {
    #[serde(default, alias = "searchQuery", alias = "q")]
    pub query: Option<String>,
    #[serde(default, alias = "requiredKeywords")]
    pub required_keywords: Vec<String>,
    #[serde(default, alias = "excludeKeywords", alias = "excluded_keywords")]
    pub exclude_keywords: Vec<String>,
    #[serde(default, alias = "maxResults")]
    pub max_results: Option<u32>,
    #[serde(default, alias = "channelFilter")]
    pub channels: Vec<String>,
    #[serde(default, alias = "gameId")]
    pub game_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredVideo {
    #[serde(flatten)]
    pub video: PlatformVideo,
    pub score: i64,
    pub saved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub found: usize,
    pub filtered: usize,
    pub saved: usize,
    pub errors: Vec<String>,
    pub videos: Vec<ScoredVideo>,
}

/// Composes the single query string sent to the platform: base text, quoted
/// mandatory terms, then negated terms.
pub fn build_query(base: &str, required: &[String], excluded: &[String]) -> String {
    let mut parts = vec![base.trim().to_string()];
    for term in required.iter().map(|term| term.trim()).filter(|term| !term.is_empty()) {
        parts.push(format!("\"{term}\""));
    }
    for term in excluded.iter().map(|term| term.trim()).filter(|term| !term.is_empty()) {
        if term.contains(char::is_whitespace) {
            parts.push(format!("-\"{term}\""));
        } else {
            parts.push(format!("-{term}"));
        }
    }
    parts.retain(|part| !part.is_empty());
    parts.join(" ")
}

fn haystack(video: &PlatformVideo) -> String {
    format!("{}\n{}", video.title, video.description).to_lowercase()
}

/// Keeps everything when no allow-list is given; otherwise the channel name
/// must contain one of the entries (case-insensitive).
pub fn passes_channel_filter(video: &PlatformVideo, channels: &[String]) -> bool {
    let allowed: Vec<String> = channels
        .iter()
        .map(|channel| channel.trim().to_lowercase())
        .filter(|channel| !channel.is_empty())
        .collect();
    if allowed.is_empty() {
        return true;
    }
    let channel = video.channel_title.to_lowercase();
    allowed.iter().any(|entry| channel.contains(entry.as_str()))
}

pub fn is_excluded(video: &PlatformVideo) -> bool {
    let text = haystack(video);
    EXCLUDED_TERMS.iter().any(|term| text.contains(term))
}

pub fn has_required_term(video: &PlatformVideo, game: &GameProfile) -> bool {
    let text = haystack(video);
    game.required_terms
        .iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .any(|term| text.contains(term.as_str()))
}

/// Weighted keyword hits; title hits count double. Used for ordering only.
pub fn relevance_score(video: &PlatformVideo, game: &GameProfile, required: &[String]) -> i64 {
    let title = video.title.to_lowercase();
    let description = video.description.to_lowercase();
    let weighted = game
        .scoring
        .iter()
        .map(|rule| (rule.term.to_lowercase(), rule.weight))
        .chain(required.iter().map(|term| (term.trim().to_lowercase(), 2)));

    weighted
        .filter(|(term, _)| !term.is_empty())
        .map(|(term, weight)| {
            let mut score = 0;
            if title.contains(term.as_str()) {
                score += weight * 2;
            }
            if description.contains(term.as_str()) {
                score += weight;
            }
            score
        })
        .sum()
}

/// Runs one platform search, filters and scores the hits, and upserts every
/// survivor. Store failures are collected per video instead of aborting.
pub async fn advanced_search(
    store: &ContentStore,
    platform: Arc<dyn VideoPlatform>,
    catalog: &GameCatalog,
    spec: SearchSpec,
    default_game_id: i64,
) -> ServiceResult<SearchReport> {
    let game = catalog
        .resolve(spec.game_id, default_game_id)
        .cloned()
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "no search vocabulary configured for game {}",
                spec.game_id.unwrap_or(default_game_id)
            ))
        })?;
    let game_id = spec.game_id.unwrap_or(default_game_id);

    let base = spec
        .query
        .as_deref()
        .map(str::trim)
        .filter(|query| !query.is_empty())
        .unwrap_or(game.base_query.as_str());
    let query = build_query(base, &spec.required_keywords, &spec.exclude_keywords);
    let max_results = spec
        .max_results
        .unwrap_or(DEFAULT_SEARCH_RESULTS)
        .clamp(1, MAX_SEARCH_RESULTS);

    let search = SearchQuery {
        q: query.clone(),
        max_results,
    };
    let results = run_blocking(move || platform.search(&search))
        .await?
        .map_err(|err| ServiceError::UpstreamFailure(err.to_string()))?;
    let found = results.len();

    let mut candidates: Vec<ScoredVideo> = results
        .into_iter()
        .filter(|video| passes_channel_filter(video, &spec.channels))
        .filter(|video| !is_excluded(video))
        .filter(|video| has_required_term(video, &game))
        .map(|video| {
            let score = relevance_score(&video, &game, &spec.required_keywords);
            ScoredVideo {
                video,
                score,
                saved: false,
            }
        })
        .collect();
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    let filtered = candidates.len();

    let mut saved = 0;
    let mut errors = Vec::new();
    for candidate in &mut candidates {
        let video = &candidate.video;
        let record = NewVideo {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            description: video.description.clone(),
            channel_title: Some(video.channel_title.clone()).filter(|name| !name.is_empty()),
            published_at: video.published_at.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
            search_query: Some(query.clone()),
            game_id,
        };
        match store.upsert_video(&record).await {
            Ok(_) => {
                candidate.saved = true;
                saved += 1;
            }
            Err(err) => {
                warn!(
                    video_id = %record.video_id,
                    error = %format!("{err:#}"),
                    "failed to save search hit"
                );
                errors.push(format!("{}: {err:#}", record.video_id));
            }
        }
    }

    info!(%query, found, filtered, saved, "advanced search finished");
    candidates.truncate(PREVIEW_LIMIT);
    Ok(SearchReport {
        query,
        found,
        filtered,
        saved,
        errors,
        videos: candidates,
    })
}
