#![forbid(unsafe_code)]

//! Presentation reads plus sitemap and robots.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::diagnostics::DIAGNOSTIC_PATHS;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{
    Article, ArticleListing, Category, Game, GlossaryEntry, GlossaryKind, Video,
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub(super) struct Paging {
    limit: Option<i64>,
}

impl Paging {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

pub(super) async fn list_games(State(state): State<AppState>) -> ServiceResult<Json<Vec<Game>>> {
    Ok(Json(state.store()?.list_games().await?))
}

pub(super) async fn list_articles(
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
    Query(paging): Query<Paging>,
) -> ServiceResult<Json<Vec<ArticleListing>>> {
    let articles = state
        .store()?
        .list_articles(game_id, paging.limit())
        .await?;
    Ok(Json(articles))
}

pub(super) async fn list_videos(
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
    Query(paging): Query<Paging>,
) -> ServiceResult<Json<Vec<Video>>> {
    Ok(Json(
        state.store()?.list_videos(game_id, paging.limit()).await?,
    ))
}

pub(super) async fn list_categories(
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> ServiceResult<Json<Vec<Category>>> {
    Ok(Json(state.store()?.list_categories(game_id).await?))
}

pub(super) async fn list_glossary(
    State(state): State<AppState>,
    Path((game_id, kind)): Path<(i64, String)>,
) -> ServiceResult<Json<Vec<GlossaryEntry>>> {
    let kind = GlossaryKind::parse(&kind)
        .ok_or_else(|| ServiceError::InvalidInput(format!("unknown glossary kind {kind:?}")))?;
    Ok(Json(state.store()?.list_glossary(kind, game_id).await?))
}

#[derive(Serialize)]
pub(super) struct ArticleDetail {
    article: Article,
    video: Option<Video>,
    categories: Vec<Category>,
    game: Option<Game>,
}

pub(super) async fn article_detail(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
) -> ServiceResult<Json<ArticleDetail>> {
    let store = state.store()?;
    let article = store
        .find_article(article_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("article {article_id} not found")))?;
    let video = store.find_video(&article.video_id).await?;
    let categories = store.article_categories(article.id).await?;
    let game = store.find_game(article.game_id).await?;
    Ok(Json(ArticleDetail {
        article,
        video,
        categories,
        game,
    }))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

struct SitemapEntry {
    path: String,
    lastmod: Option<String>,
}

fn render_sitemap(site_url: &str, entries: &[SitemapEntry]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!(
            "    <loc>{}</loc>\n",
            xml_escape(&format!("{site_url}{}", entry.path))
        ));
        if let Some(lastmod) = &entry.lastmod {
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", xml_escape(lastmod)));
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Home, every game and every published article. Without a database only the
/// home page is listed.
pub(super) async fn sitemap(State(state): State<AppState>) -> ServiceResult<impl IntoResponse> {
    let mut entries = vec![SitemapEntry {
        path: "/".into(),
        lastmod: None,
    }];
    if let Some(store) = &state.store {
        for game in store.list_games().await? {
            entries.push(SitemapEntry {
                path: format!("/games/{}", game.id),
                lastmod: None,
            });
        }
        for stamp in store.article_stamps().await? {
            entries.push(SitemapEntry {
                path: format!("/articles/{}", stamp.id),
                lastmod: stamp.updated_at.get(..10).map(str::to_string),
            });
        }
    }
    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        render_sitemap(&state.site_url, &entries),
    ))
}

pub(super) async fn robots(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = String::from("User-agent: *\nAllow: /\nDisallow: /admin/\n");
    for path in DIAGNOSTIC_PATHS {
        body.push_str(&format!("Disallow: {path}\n"));
    }
    body.push_str(&format!("\nSitemap: {}/sitemap.xml\n", state.site_url));
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}
