#![forbid(unsafe_code)]

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use chrono::Utc;
use libsql::{Row, Value, params, params::Params};

use super::catalog::{CATEGORY_COLUMNS_C, row_to_category};
use super::{Article, ArticleListing, Category, ContentStore, NewArticle, RelatedIds, SeoFields};

const ARTICLE_COLUMNS: &str = "id, title, content, summary, video_id, game_id, published, \
     created_at, updated_at, seo_title, seo_description, seo_keywords, slug, \
     featured_image_url, header_image_url, thumbnail_url, read_time, \
     related_boss_id, related_strategy_id, related_class_id, related_tip_id, \
     related_dungeon_id, related_story_id, related_analysis_id, related_beginner_id";

/// Minimal row data for sitemap generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleStamp {
    pub id: i64,
    pub game_id: i64,
    pub updated_at: String,
}

impl ContentStore {
    /// Inserts a published article and returns the stored row.
    pub async fn insert_article(&self, article: &NewArticle) -> Result<Article> {
        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn()
            .query(
                &format!(
                    r#"
                    INSERT INTO articles (
                        title, content, summary, video_id, game_id, published,
                        created_at, updated_at, read_time,
                        related_boss_id, related_strategy_id, related_class_id,
                        related_tip_id, related_dungeon_id, related_story_id,
                        related_analysis_id, related_beginner_id
                    ) VALUES (
                        ?1, ?2, ?3, ?4, ?5, 1,
                        ?6, ?6, ?7,
                        ?8, ?9, ?10,
                        ?11, ?12, ?13,
                        ?14, ?15
                    )
                    RETURNING {ARTICLE_COLUMNS}
                    "#
                ),
                params![
                    article.title.as_str(),
                    article.content.as_str(),
                    article.summary.as_str(),
                    article.video_id.as_str(),
                    article.game_id,
                    now,
                    article.read_time,
                    article.related.boss,
                    article.related.strategy,
                    article.related.class,
                    article.related.tip,
                    article.related.dungeon,
                    article.related.story,
                    article.related_analysis_id,
                    article.related_beginner_id,
                ],
            )
            .await
            .with_context(|| format!("inserting article for video {}", article.video_id))?;
        let row = rows.next().await?.context("insert returned no row")?;
        row_to_article(&row)
    }

    /// Writes one join row per distinct category id with a single multi-row
    /// insert, so either every link lands or none does. Returns the number of
    /// rows written.
    pub async fn link_categories(&self, article_id: i64, category_ids: &[i64]) -> Result<usize> {
        let unique: BTreeSet<i64> = category_ids.iter().copied().collect();
        if unique.is_empty() {
            return Ok(0);
        }

        let placeholders = (0..unique.len())
            .map(|i| format!("(?{}, ?{})", 2 * i + 1, 2 * i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let values: Vec<Value> = unique
            .iter()
            .flat_map(|category_id| [Value::Integer(article_id), Value::Integer(*category_id)])
            .collect();
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO article_categories (article_id, category_id) VALUES {placeholders}"
                ),
                Params::Positional(values),
            )
            .await
            .with_context(|| format!("linking article {article_id} to categories {unique:?}"))?;
        Ok(unique.len())
    }

    /// Second write after creation; fills the SEO columns.
    pub async fn update_article_seo(&self, article_id: i64, seo: &SeoFields) -> Result<()> {
        let affected = self
            .conn()
            .execute(
                r#"
                UPDATE articles
                SET seo_title = ?1, seo_description = ?2, seo_keywords = ?3, updated_at = ?4
                WHERE id = ?5
                "#,
                params![
                    seo.title.as_str(),
                    seo.description.as_str(),
                    seo.keywords.as_str(),
                    Utc::now().to_rfc3339(),
                    article_id,
                ],
            )
            .await
            .with_context(|| format!("updating SEO fields of article {article_id}"))?;
        anyhow::ensure!(affected == 1, "article {article_id} not found for SEO update");
        Ok(())
    }

    pub async fn find_article(&self, article_id: i64) -> Result<Option<Article>> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"),
                params![article_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_article(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn article_categories(&self, article_id: i64) -> Result<Vec<Category>> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    r#"
                    SELECT ac.article_id, {CATEGORY_COLUMNS_C}
                    FROM article_categories ac
                    JOIN categories c ON c.id = ac.category_id
                    WHERE ac.article_id = ?1
                    ORDER BY c.sort_order, c.id
                    "#
                ),
                params![article_id],
            )
            .await?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next().await? {
            categories.push(row_to_category(&row, 1)?);
        }
        Ok(categories)
    }

    /// Published articles of a game, newest first, each with its categories
    /// expanded from the join table.
    pub async fn list_articles(&self, game_id: i64, limit: i64) -> Result<Vec<ArticleListing>> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    r#"
                    SELECT {ARTICLE_COLUMNS} FROM articles
                    WHERE game_id = ?1 AND published = 1
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?2
                    "#
                ),
                params![game_id, limit],
            )
            .await?;
        let mut articles = Vec::new();
        while let Some(row) = rows.next().await? {
            articles.push(row_to_article(&row)?);
        }

        let mut by_article = self.categories_by_article(game_id).await?;
        Ok(articles
            .into_iter()
            .map(|article| {
                let categories = by_article.remove(&article.id).unwrap_or_default();
                ArticleListing {
                    article,
                    categories,
                }
            })
            .collect())
    }

    async fn categories_by_article(&self, game_id: i64) -> Result<HashMap<i64, Vec<Category>>> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    r#"
                    SELECT ac.article_id, {CATEGORY_COLUMNS_C}
                    FROM article_categories ac
                    JOIN categories c ON c.id = ac.category_id
                    JOIN articles a ON a.id = ac.article_id
                    WHERE a.game_id = ?1
                    ORDER BY c.sort_order, c.id
                    "#
                ),
                params![game_id],
            )
            .await?;
        let mut grouped: HashMap<i64, Vec<Category>> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let article_id: i64 = row.get(0)?;
            grouped
                .entry(article_id)
                .or_default()
                .push(row_to_category(&row, 1)?);
        }
        Ok(grouped)
    }

    pub async fn article_stamps(&self) -> Result<Vec<ArticleStamp>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, game_id, updated_at FROM articles WHERE published = 1 ORDER BY id",
                params![],
            )
            .await?;
        let mut stamps = Vec::new();
        while let Some(row) = rows.next().await? {
            stamps.push(ArticleStamp {
                id: row.get(0)?,
                game_id: row.get(1)?,
                updated_at: row.get(2)?,
            });
        }
        Ok(stamps)
    }
}

// Column order must match ARTICLE_COLUMNS.
fn row_to_article(row: &Row) -> Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        summary: row.get(3)?,
        video_id: row.get(4)?,
        game_id: row.get(5)?,
        published: row.get::<i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        seo_title: row.get(9)?,
        seo_description: row.get(10)?,
        seo_keywords: row.get(11)?,
        slug: row.get(12)?,
        featured_image_url: row.get(13)?,
        header_image_url: row.get(14)?,
        thumbnail_url: row.get(15)?,
        read_time: row.get(16)?,
        related: RelatedIds {
            boss: row.get(17)?,
            strategy: row.get(18)?,
            class: row.get(19)?,
            tip: row.get(20)?,
            dungeon: row.get(21)?,
            story: row.get(22)?,
        },
        related_analysis_id: row.get(23)?,
        related_beginner_id: row.get(24)?,
    })
}
