#![forbid(unsafe_code)]

//! Rows as they are read from and written to the content database.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// Row of the `videos` table. `video_id` is the platform's id and is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: i64,
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    pub game_id: i64,
    pub created_at: String,
}

/// Insert payload for `videos`; the id and creation time come from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVideo {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: Option<String>,
    pub published_at: Option<String>,
    pub thumbnail_url: Option<String>,
    pub search_query: Option<String>,
    pub game_id: i64,
}

/// Optional links from an article to glossary rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedIds {
    pub boss: Option<i64>,
    pub strategy: Option<i64>,
    pub class: Option<i64>,
    pub tip: Option<i64>,
    pub dungeon: Option<i64>,
    pub story: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoFields {
    pub title: String,
    pub description: String,
    pub keywords: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub video_id: String,
    pub game_id: i64,
    pub published: bool,
    pub created_at: String,
    pub updated_at: String,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
    pub slug: Option<String>,
    pub featured_image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub read_time: Option<i64>,
    pub related: RelatedIds,
    pub related_analysis_id: Option<i64>,
    pub related_beginner_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub video_id: String,
    pub game_id: i64,
    pub read_time: i64,
    pub related: RelatedIds,
    pub related_analysis_id: Option<i64>,
    pub related_beginner_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_ja: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<i64>,
}

impl Category {
    /// Localized name when present, otherwise the canonical one.
    pub fn display_name(&self) -> &str {
        self.name_ja
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// An article together with its categories, expanded from the join table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleListing {
    #[serde(flatten)]
    pub article: Article,
    pub categories: Vec<Category>,
}

/// The six glossary tables an article can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlossaryKind {
    Boss,
    Class,
    Strategy,
    Dungeon,
    Tip,
    Story,
}

impl GlossaryKind {
    pub const ALL: [GlossaryKind; 6] = [
        Self::Boss,
        Self::Class,
        Self::Strategy,
        Self::Dungeon,
        Self::Tip,
        Self::Story,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Self::Boss => "bosses",
            Self::Class => "classes",
            Self::Strategy => "strategies",
            Self::Dungeon => "dungeons",
            Self::Tip => "tips",
            Self::Story => "stories",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "boss" | "bosses" => Some(Self::Boss),
            "class" | "classes" | "character" | "characters" => Some(Self::Class),
            "strategy" | "strategies" => Some(Self::Strategy),
            "dungeon" | "dungeons" => Some(Self::Dungeon),
            "tip" | "tips" => Some(Self::Tip),
            "story" | "stories" => Some(Self::Story),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub game_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Singleton profile row (id = 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminInfo {
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    pub avatar_url: Option<String>,
    pub character_image_url: Option<String>,
    #[serde(default)]
    pub social_links: serde_json::Value,
    #[serde(default)]
    pub favorite_games: Vec<String>,
    #[serde(default)]
    pub gaming_experience: String,
    pub floating_button_image_url: Option<String>,
}

/// Image columns rewritten after an upload. Table and column names are always
/// compile-time constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageColumns {
    pub table: &'static str,
    pub row_id: i64,
    pub columns: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}
