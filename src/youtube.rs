#![forbid(unsafe_code)]

//! Video platform access: the `VideoPlatform` seam plus a YouTube Data API v3
//! implementation.
//!
//! The client is blocking (`ureq`); async callers go through
//! [`crate::blocking::run_blocking`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::YouTubeConfig;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const USER_AGENT: &str = concat!("gamestudy-academy/", env!("CARGO_PKG_VERSION"));

/// Hard cap the search endpoint accepts for `maxResults`.
pub const MAX_SEARCH_RESULTS: u32 = 50;

static URL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube\.com/watch\?(?:[^#]*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)([A-Za-z0-9_-]{11})",
    )
    .expect("video url pattern is valid")
});
static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("bare id pattern is valid"));

/// Pulls the platform video id out of a watch, short-link, embed or shorts
/// URL, or accepts a bare 11-character id.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }
    URL_ID
        .captures(input)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("video platform returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("video platform request failed: {0}")]
    Transport(String),

    #[error("unexpected video platform response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub max_results: u32,
}

/// Snippet-level data shared by search hits and detail lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformVideo {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub published_at: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Statistics returned alongside a single-video lookup. Reported to callers,
/// never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStatistics {
    pub duration: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub video: PlatformVideo,
    pub statistics: VideoStatistics,
}

pub trait VideoPlatform: Send + Sync {
    /// One call to the search endpoint; no pagination.
    fn search(&self, query: &SearchQuery) -> Result<Vec<PlatformVideo>, PlatformError>;

    /// `Ok(None)` when the platform knows no video with this id.
    fn video_details(&self, video_id: &str) -> Result<Option<VideoDetails>, PlatformError>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_title: String,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    #[serde(rename = "default")]
    fallback: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    content_details: Option<ContentDetails>,
    statistics: Option<RawStatistics>,
}

#[derive(Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

// The API encodes counters as strings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

impl Snippet {
    fn into_video(self, video_id: String) -> PlatformVideo {
        let thumbnail_url = self
            .thumbnails
            .medium
            .or(self.thumbnails.fallback)
            .map(|thumb| thumb.url);
        PlatformVideo {
            video_id,
            title: unescape_html(&self.title),
            description: unescape_html(&self.description),
            channel_title: unescape_html(&self.channel_title),
            published_at: self.published_at,
            thumbnail_url,
        }
    }
}

/// The search endpoint returns HTML-escaped titles.
fn unescape_html(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn parse_count(value: Option<String>) -> Option<u64> {
    value.and_then(|raw| raw.parse().ok())
}

pub struct YouTubeClient {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(config: &YouTubeConfig) -> Self {
        Self::with_base_url(config, YOUTUBE_API_BASE)
    }

    pub fn with_base_url(config: &YouTubeConfig, base_url: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
            api_key: config.api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        let mut request = self
            .agent
            .get(&format!("{}/{endpoint}", self.base_url))
            .query("key", &self.api_key);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(map_ureq_error)?;
        response
            .into_json::<T>()
            .map_err(|err| PlatformError::Decode(err.to_string()))
    }
}

fn map_ureq_error(err: ureq::Error) -> PlatformError {
    match err {
        ureq::Error::Status(status, response) => PlatformError::Http {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => PlatformError::Transport(transport.to_string()),
    }
}

impl VideoPlatform for YouTubeClient {
    fn search(&self, query: &SearchQuery) -> Result<Vec<PlatformVideo>, PlatformError> {
        let max_results = query.max_results.clamp(1, MAX_SEARCH_RESULTS).to_string();
        let response: SearchResponse = self.get_json(
            "search",
            &[
                ("part", "snippet"),
                ("type", "video"),
                ("q", &query.q),
                ("maxResults", &max_results),
                ("order", "relevance"),
                ("relevanceLanguage", "ja"),
                ("regionCode", "JP"),
            ],
        )?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(item.snippet.into_video(video_id))
            })
            .collect())
    }

    fn video_details(&self, video_id: &str) -> Result<Option<VideoDetails>, PlatformError> {
        let response: VideosResponse = self.get_json(
            "videos",
            &[
                ("part", "snippet,contentDetails,statistics"),
                ("id", video_id),
            ],
        )?;
        let Some(item) = response.items.into_iter().next() else {
            return Ok(None);
        };
        let statistics = item.statistics.map_or_else(VideoStatistics::default, |raw| {
            VideoStatistics {
                duration: None,
                view_count: parse_count(raw.view_count),
                like_count: parse_count(raw.like_count),
                comment_count: parse_count(raw.comment_count),
            }
        });
        Ok(Some(VideoDetails {
            video: item.snippet.into_video(item.id),
            statistics: VideoStatistics {
                duration: item.content_details.and_then(|details| details.duration),
                ..statistics
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ids_from_known_url_shapes() {
        let expected = Some("dQw4w9WgXcQ".to_string());
        for input in [
            "dQw4w9WgXcQ",
            "  dQw4w9WgXcQ  ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=10",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
        ] {
            assert_eq!(extract_video_id(input), expected, "input: {input}");
        }
    }

    #[test]
    fn rejects_inputs_without_an_id() {
        for input in [
            "",
            "short",
            "https://example.com/watch?v=dQw4w9WgXcQ-toolong",
            "https://www.youtube.com/channel/UC123",
            "not a video id at all",
        ] {
            assert_eq!(extract_video_id(input), None, "input: {input}");
        }
    }

    #[test]
    fn snippet_prefers_medium_thumbnail_and_unescapes() {
        let raw = r#"{
            "title": "Tom &amp; Jerry&#39;s &quot;build&quot;",
            "description": "d",
            "channelTitle": "Ch",
            "publishedAt": "2024-01-01T00:00:00Z",
            "thumbnails": {
                "default": {"url": "https://i.ytimg.com/default.jpg"},
                "medium": {"url": "https://i.ytimg.com/mq.jpg"}
            }
        }"#;
        let snippet: Snippet = serde_json::from_str(raw).unwrap();
        let video = snippet.into_video("id".into());
        assert_eq!(video.title, "Tom & Jerry's \"build\"");
        assert_eq!(
            video.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/mq.jpg")
        );
    }

    #[test]
    fn snippet_falls_back_to_default_thumbnail() {
        let raw = r#"{"title": "t", "thumbnails": {"default": {"url": "https://d.jpg"}}}"#;
        let snippet: Snippet = serde_json::from_str(raw).unwrap();
        assert_eq!(
            snippet.into_video("id".into()).thumbnail_url.as_deref(),
            Some("https://d.jpg")
        );
    }

    #[test]
    fn search_response_skips_non_video_items() {
        let raw = r#"{"items": [
            {"id": {"kind": "youtube#channel"}, "snippet": {"title": "channel"}},
            {"id": {"videoId": "abc12345678"}, "snippet": {"title": "video"}}
        ]}"#;
        let response: SearchResponse = serde_json::from_str(raw).unwrap();
        let videos: Vec<_> = response
            .items
            .into_iter()
            .filter_map(|item| Some(item.snippet.into_video(item.id.video_id?)))
            .collect();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].video_id, "abc12345678");
    }

    #[test]
    fn statistics_counters_parse_from_strings() {
        assert_eq!(parse_count(Some("1200".into())), Some(1200));
        assert_eq!(parse_count(Some("n/a".into())), None);
        assert_eq!(parse_count(None), None);
    }
}
