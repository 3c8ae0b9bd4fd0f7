#![forbid(unsafe_code)]

//! Article generation: context assembly, prompt, one generation call,
//! deterministic post-processing, then the insert → links → SEO writes.

use std::{collections::BTreeSet, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::blocking::run_blocking;
use crate::error::{ServiceError, ServiceResult};
use crate::games::{GameCatalog, GameProfile};
use crate::generator::{GenerationRequest, TextGenerator};
use crate::store::{ContentStore, GlossaryKind, NewArticle, RelatedIds, SeoFields, Video};

/// Category ids mirrored into the article's shortcut columns.
pub const ANALYSIS_CATEGORY_ID: i64 = 7;
pub const BEGINNER_CATEGORY_ID: i64 = 8;

pub const TITLE_SUFFIX: &str = " - 攻略ガイド";
pub const SUMMARY_CHARS: usize = 160;
const GENERIC_GAME_NAME: &str = "ゲーム";
const DEFAULT_TITLE_TOKEN: &str = "攻略";
const FORMAT_KEYWORDS: [&str; 3] = ["YouTube", "動画解説", "攻略動画"];
const PROMPT_DESCRIPTION_CHARS: usize = 1500;
/// Japanese reading speed used for `read_time`.
const CHARS_PER_MINUTE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutlineSection {
    pub key: &'static str,
    pub heading: &'static str,
    pub min_chars: u32,
    pub max_chars: u32,
}

/// Section order every generated article must follow.
pub const OUTLINE: [OutlineSection; 6] = [
    OutlineSection {
        key: "why_watch",
        heading: "この動画を見るべき理由",
        min_chars: 200,
        max_chars: 300,
    },
    OutlineSection {
        key: "learning_points",
        heading: "この動画で学べること",
        min_chars: 300,
        max_chars: 400,
    },
    OutlineSection {
        key: "rationale",
        heading: "なぜこの方法が有効なのか",
        min_chars: 300,
        max_chars: 400,
    },
    OutlineSection {
        key: "discovery",
        heading: "動画を見て得られる新しい発見",
        min_chars: 200,
        max_chars: 300,
    },
    OutlineSection {
        key: "skills",
        heading: "身につくスキルと上達のポイント",
        min_chars: 300,
        max_chars: 400,
    },
    OutlineSection {
        key: "social_proof",
        heading: "視聴者の評価と反響",
        min_chars: 150,
        max_chars: 250,
    },
];

const PROHIBITIONS: [&str; 4] = [
    "動画の手順をステップごとに書き出すネタバレをしないこと",
    "見出しの順番を入れ替えたり、見出しを省略したりしないこと",
    "動画に含まれない情報を事実として断定しないこと",
    "リアルマネー取引や外部ツールの利用を勧めないこと",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleRequest {
    #[serde(default, alias = "videoId")]
    pub video_id: Option<String>,
    #[serde(default, alias = "categoryId")]
    pub category_id: Option<i64>,
    #[serde(default, alias = "categoryIds")]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub related_boss_id: Option<i64>,
    #[serde(default)]
    pub related_strategy_id: Option<i64>,
    #[serde(default)]
    pub related_class_id: Option<i64>,
    #[serde(default)]
    pub related_tip_id: Option<i64>,
    #[serde(default)]
    pub related_dungeon_id: Option<i64>,
    #[serde(default)]
    pub related_story_id: Option<i64>,
}

impl ArticleRequest {
    pub fn related(&self) -> RelatedIds {
        RelatedIds {
            boss: self.related_boss_id,
            strategy: self.related_strategy_id,
            class: self.related_class_id,
            tip: self.related_tip_id,
            dungeon: self.related_dungeon_id,
            story: self.related_story_id,
        }
    }

    /// `category_id` followed by `category_ids`, first occurrence wins.
    pub fn all_category_ids(&self) -> Vec<i64> {
        let mut seen = BTreeSet::new();
        self.category_id
            .into_iter()
            .chain(self.category_ids.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub video_id: String,
    pub game_id: i64,
    pub read_time: i64,
    pub categories_linked: usize,
    pub related: RelatedIds,
    pub related_analysis_id: Option<i64>,
    pub related_beginner_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineReport {
    pub sections_found: Vec<&'static str>,
    pub sections_missing: Vec<&'static str>,
    pub in_order: bool,
}

impl OutlineReport {
    pub fn is_complete(&self) -> bool {
        self.sections_missing.is_empty() && self.in_order
    }
}

/// Echo of what the generator produced, for the caller to eyeball.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityCheck {
    pub title_from_heading: bool,
    pub content_chars: usize,
    pub summary_chars: usize,
    pub outline: OutlineReport,
    pub related_context_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceStep {
    CategoryLinks,
    SeoMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistenceIssue {
    pub step: PersistenceStep,
    pub message: String,
}

/// Whether every write after the article insert went through.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Persistence {
    Complete,
    Partial { issues: Vec<PersistenceIssue> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleOutcome {
    pub article: ArticleSummary,
    pub seo: SeoFields,
    pub quality_check: QualityCheck,
    pub persistence: Persistence,
}

/// Everything the prompt is built from.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub game_name: &'a str,
    pub flavor: &'a str,
    pub video: &'a Video,
    pub category_names: &'a [String],
    pub related_lines: &'a [String],
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

pub fn build_prompt(context: &PromptContext<'_>) -> String {
    let video = context.video;
    let published = video
        .published_at
        .as_deref()
        .map(|stamp| truncate_chars(stamp, 10))
        .unwrap_or("不明");
    let channel = video.channel_title.as_deref().unwrap_or("不明");

    let mut lines = vec![
        "あなたはゲーム攻略サイト「Game Study Academy」の編集者です。\
         YouTube の攻略動画を紹介し、読者が動画から学びたくなる記事を日本語で執筆してください。\
         文体は「です・ます」調とし、専門用語には短い説明を添えてください。"
            .to_string(),
        String::new(),
        "## ゲーム情報".to_string(),
        format!("- ゲーム名: {}", context.game_name),
        format!("- ゲームの特徴: {}", context.flavor),
        String::new(),
        "## 動画情報".to_string(),
        format!("- タイトル: {}", video.title),
        format!(
            "- 説明: {}",
            truncate_chars(video.description.trim(), PROMPT_DESCRIPTION_CHARS)
        ),
        format!("- チャンネル: {channel}"),
        format!("- 公開日: {published}"),
    ];

    if !context.category_names.is_empty() {
        lines.push(String::new());
        lines.push("## カテゴリ".to_string());
        lines.push(format!("- カテゴリ: {}", context.category_names.join("、")));
    }
    if !context.related_lines.is_empty() {
        lines.push(String::new());
        lines.push("## 関連コンテンツ".to_string());
        lines.extend(context.related_lines.iter().map(|line| format!("- {line}")));
    }

    lines.push(String::new());
    lines.push("## 記事構成（この順番を厳守）".to_string());
    lines.push(
        "1行目に「# 」で始まる記事タイトルを書き、続けて次の見出しを「## 」で始めて順番通りに書いてください。"
            .to_string(),
    );
    lines.extend(OUTLINE.iter().enumerate().map(|(index, section)| {
        format!(
            "{}. ## {}（{}〜{}文字）",
            index + 1,
            section.heading,
            section.min_chars,
            section.max_chars
        )
    }));
    lines.push(String::new());
    lines.push("## 禁止事項".to_string());
    lines.extend(PROHIBITIONS.iter().map(|rule| format!("- {rule}")));

    let mut prompt = lines.join("\n");
    prompt.push('\n');
    prompt
}

/// First `# ` heading line, or the video title plus a fixed suffix.
pub fn extract_title(content: &str, video_title: &str) -> String {
    content
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("# "))
        .map(str::trim)
        .find(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{video_title}{TITLE_SUFFIX}"))
}

/// Heading-free prefix of the body, newlines flattened, at most
/// `SUMMARY_CHARS` characters followed by `...`.
pub fn derive_summary(content: &str) -> String {
    let body = content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    let prefix = truncate_chars(body.trim(), SUMMARY_CHARS);
    format!("{}...", prefix.replace(['\r', '\n'], " "))
}

/// Text between the first `【` `】` pair of a video title.
pub fn title_token(video_title: &str) -> Option<&str> {
    let (_, rest) = video_title.split_once('【')?;
    let (token, _) = rest.split_once('】')?;
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub fn build_keywords(game: Option<&GameProfile>, video_title: &str) -> String {
    let mut keywords: Vec<&str> = Vec::new();
    if let Some(game) = game {
        keywords.extend(game.seo_keywords.iter().map(String::as_str));
    }
    keywords.push(title_token(video_title).unwrap_or(DEFAULT_TITLE_TOKEN));
    keywords.extend(FORMAT_KEYWORDS);
    if let Some(game) = game {
        keywords.extend(game.focus_terms.iter().map(String::as_str));
    }
    keywords.join(",")
}

pub fn estimate_read_minutes(content: &str) -> i64 {
    let chars = content.chars().filter(|c| !c.is_whitespace()).count();
    chars.div_ceil(CHARS_PER_MINUTE).max(1) as i64
}

/// Locates each outline heading among the `##` lines of the body.
pub fn check_outline(content: &str) -> OutlineReport {
    let headings: Vec<&str> = content
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("## "))
        .collect();

    let mut positions = Vec::new();
    let mut sections_found = Vec::new();
    let mut sections_missing = Vec::new();
    for section in &OUTLINE {
        match headings
            .iter()
            .position(|heading| heading.contains(section.heading))
        {
            Some(position) => {
                positions.push(position);
                sections_found.push(section.key);
            }
            None => sections_missing.push(section.key),
        }
    }
    let in_order = positions.windows(2).all(|pair| pair[0] < pair[1]);
    OutlineReport {
        sections_found,
        sections_missing,
        in_order,
    }
}

const RELATED_LABELS: [(GlossaryKind, &str); 6] = [
    (GlossaryKind::Boss, "関連ボス"),
    (GlossaryKind::Strategy, "関連戦略"),
    (GlossaryKind::Class, "関連クラス"),
    (GlossaryKind::Tip, "関連Tips"),
    (GlossaryKind::Dungeon, "関連ダンジョン"),
    (GlossaryKind::Story, "関連ストーリー"),
];

fn related_id(related: &RelatedIds, kind: GlossaryKind) -> Option<i64> {
    match kind {
        GlossaryKind::Boss => related.boss,
        GlossaryKind::Strategy => related.strategy,
        GlossaryKind::Class => related.class,
        GlossaryKind::Tip => related.tip,
        GlossaryKind::Dungeon => related.dungeon,
        GlossaryKind::Story => related.story,
    }
}

/// One labeled line per related entity that exists. Misses and lookup
/// errors are skipped.
async fn related_context(store: &ContentStore, related: &RelatedIds) -> Vec<String> {
    let mut lines = Vec::new();
    for (kind, label) in RELATED_LABELS {
        let Some(entry_id) = related_id(related, kind) else {
            continue;
        };
        match store.find_glossary_entry(kind, entry_id).await {
            Ok(Some(entry)) => {
                let description = entry.description.trim();
                if description.is_empty() {
                    lines.push(format!("{label}: {}", entry.name));
                } else {
                    lines.push(format!("{label}: {} - {description}", entry.name));
                }
            }
            Ok(None) => {
                warn!(table = kind.table(), entry_id, "related entity not found, skipping");
            }
            Err(err) => {
                warn!(
                    table = kind.table(),
                    entry_id,
                    error = %format!("{err:#}"),
                    "related entity lookup failed, skipping"
                );
            }
        }
    }
    lines
}

/// Generates and stores one article for an already stored video.
pub async fn generate_article(
    store: &ContentStore,
    generator: Arc<dyn TextGenerator>,
    catalog: &GameCatalog,
    request: ArticleRequest,
) -> ServiceResult<ArticleOutcome> {
    let video_id = request
        .video_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput("video_id is required".into()))?
        .to_string();
    let video = store
        .find_video(&video_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("video {video_id} is not stored")))?;

    let related = request.related();
    let category_ids = request.all_category_ids();
    let related_lines = related_context(store, &related).await;
    let category_names = store.category_names(&category_ids).await?;
    let profile = catalog.get(video.game_id);
    let game_name = match store.find_game(video.game_id).await? {
        Some(game) => game.name,
        None => profile
            .map(|game| game.display_name.clone())
            .unwrap_or_else(|| GENERIC_GAME_NAME.to_string()),
    };

    let prompt = build_prompt(&PromptContext {
        game_name: &game_name,
        flavor: catalog.flavor_for(video.game_id),
        video: &video,
        category_names: &category_names,
        related_lines: &related_lines,
    });
    let generation = GenerationRequest::article(prompt);
    let content = run_blocking(move || generator.generate(&generation))
        .await?
        .map_err(|err| ServiceError::GenerationFailed(err.to_string()))?;
    info!(video_id = %video.video_id, chars = content.chars().count(), "article text generated");

    let title = extract_title(&content, &video.title);
    let summary = derive_summary(&content);
    let read_time = estimate_read_minutes(&content);
    let seo = SeoFields {
        title: title.clone(),
        description: summary.clone(),
        keywords: build_keywords(profile, &video.title),
    };
    let quality_check = QualityCheck {
        title_from_heading: title != format!("{}{TITLE_SUFFIX}", video.title),
        content_chars: content.chars().count(),
        summary_chars: summary.chars().count(),
        outline: check_outline(&content),
        related_context_lines: related_lines.len(),
    };

    let new_article = NewArticle {
        title,
        content,
        summary,
        video_id: video.video_id.clone(),
        game_id: video.game_id,
        read_time,
        related,
        related_analysis_id: category_ids
            .contains(&ANALYSIS_CATEGORY_ID)
            .then_some(ANALYSIS_CATEGORY_ID),
        related_beginner_id: category_ids
            .contains(&BEGINNER_CATEGORY_ID)
            .then_some(BEGINNER_CATEGORY_ID),
    };
    let article = store.insert_article(&new_article).await?;
    info!(article_id = article.id, video_id = %article.video_id, "article stored");

    let mut issues = Vec::new();
    let mut categories_linked = 0;
    if !category_ids.is_empty() {
        match store.link_categories(article.id, &category_ids).await {
            Ok(linked) => categories_linked = linked,
            Err(err) => {
                warn!(
                    article_id = article.id,
                    error = %format!("{err:#}"),
                    "category links failed"
                );
                issues.push(PersistenceIssue {
                    step: PersistenceStep::CategoryLinks,
                    message: format!("{err:#}"),
                });
            }
        }
    }
    if let Err(err) = store.update_article_seo(article.id, &seo).await {
        warn!(article_id = article.id, error = %format!("{err:#}"), "SEO update failed");
        issues.push(PersistenceIssue {
            step: PersistenceStep::SeoMetadata,
            message: format!("{err:#}"),
        });
    }

    let persistence = if issues.is_empty() {
        Persistence::Complete
    } else {
        Persistence::Partial { issues }
    };
    Ok(ArticleOutcome {
        article: ArticleSummary {
            id: article.id,
            title: article.title,
            summary: article.summary,
            video_id: article.video_id,
            game_id: article.game_id,
            read_time: article.read_time.unwrap_or(read_time),
            categories_linked,
            related: article.related,
            related_analysis_id: article.related_analysis_id,
            related_beginner_id: article.related_beginner_id,
        },
        seo,
        quality_check,
        persistence,
    })
}
