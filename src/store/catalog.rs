#![forbid(unsafe_code)]

//! Reads of manually seeded reference data: games, categories, glossary
//! entities and the admin profile.

use anyhow::{Context, Result};
use libsql::{Row, params};

use super::{AdminInfo, Category, ContentStore, Game, GlossaryEntry, GlossaryKind};

const CATEGORY_COLUMNS: &str =
    "id, name, slug, name_ja, parent_id, icon, description, sort_order, is_active, game_id";
pub(super) const CATEGORY_COLUMNS_C: &str = "c.id, c.name, c.slug, c.name_ja, c.parent_id, \
     c.icon, c.description, c.sort_order, c.is_active, c.game_id";
const GLOSSARY_COLUMNS: &str =
    "id, name, slug, description, game_id, image_url, thumbnail_url, icon_url";

impl ContentStore {
    pub async fn find_game(&self, game_id: i64) -> Result<Option<Game>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, slug, description, image_url, thumbnail_url \
                 FROM games WHERE id = ?1",
                params![game_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_game(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_games(&self) -> Result<Vec<Game>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, slug, description, image_url, thumbnail_url \
                 FROM games ORDER BY id",
                params![],
            )
            .await?;
        let mut games = Vec::new();
        while let Some(row) = rows.next().await? {
            games.push(row_to_game(&row)?);
        }
        Ok(games)
    }

    /// Active categories of a game in display order.
    pub async fn list_categories(&self, game_id: i64) -> Result<Vec<Category>> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    r#"
                    SELECT {CATEGORY_COLUMNS} FROM categories
                    WHERE game_id = ?1 AND is_active = 1
                    ORDER BY sort_order, id
                    "#
                ),
                params![game_id],
            )
            .await?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next().await? {
            categories.push(row_to_category(&row, 0)?);
        }
        Ok(categories)
    }

    /// Display names for the given ids, in input order. Missing rows and
    /// blank names are dropped.
    pub async fn category_names(&self, category_ids: &[i64]) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for category_id in category_ids {
            let mut rows = self
                .conn()
                .query(
                    &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                    params![*category_id],
                )
                .await
                .with_context(|| format!("looking up category {category_id}"))?;
            if let Some(row) = rows.next().await? {
                let category = row_to_category(&row, 0)?;
                let name = category.display_name().trim();
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    pub async fn find_glossary_entry(
        &self,
        kind: GlossaryKind,
        entry_id: i64,
    ) -> Result<Option<GlossaryEntry>> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {GLOSSARY_COLUMNS} FROM {} WHERE id = ?1",
                    kind.table()
                ),
                params![entry_id],
            )
            .await
            .with_context(|| format!("looking up {} {entry_id}", kind.table()))?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_glossary(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_glossary(
        &self,
        kind: GlossaryKind,
        game_id: i64,
    ) -> Result<Vec<GlossaryEntry>> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {GLOSSARY_COLUMNS} FROM {} WHERE game_id = ?1 ORDER BY id",
                    kind.table()
                ),
                params![game_id],
            )
            .await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(row_to_glossary(&row)?);
        }
        Ok(entries)
    }

    /// The singleton profile, or `None` when it has not been seeded yet.
    pub async fn admin_info(&self) -> Result<Option<AdminInfo>> {
        let mut rows = self
            .conn()
            .query(
                r#"
                SELECT display_name, bio, avatar_url, character_image_url,
                       social_links_json, favorite_games_json, gaming_experience,
                       floating_button_image_url
                FROM admin_info WHERE id = 1
                "#,
                params![],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let social_links_json: String = row.get(4)?;
        let favorite_games_json: String = row.get(5)?;
        Ok(Some(AdminInfo {
            display_name: row.get(0)?,
            bio: row.get(1)?,
            avatar_url: row.get(2)?,
            character_image_url: row.get(3)?,
            social_links: serde_json::from_str(&social_links_json)
                .context("parsing stored social links JSON")?,
            favorite_games: serde_json::from_str(&favorite_games_json)
                .context("parsing stored favorite games JSON")?,
            gaming_experience: row.get(6)?,
            floating_button_image_url: row.get(7)?,
        }))
    }
}

fn row_to_game(row: &Row) -> Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        image_url: row.get(4)?,
        thumbnail_url: row.get(5)?,
    })
}

/// Reads category columns starting at `offset`, so joined queries can put
/// their own columns first.
pub(super) fn row_to_category(row: &Row, offset: i32) -> Result<Category> {
    Ok(Category {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        slug: row.get(offset + 2)?,
        name_ja: row.get(offset + 3)?,
        parent_id: row.get(offset + 4)?,
        icon: row.get(offset + 5)?,
        description: row.get(offset + 6)?,
        sort_order: row.get(offset + 7)?,
        is_active: row.get::<i64>(offset + 8)? != 0,
        game_id: row.get(offset + 9)?,
    })
}

fn row_to_glossary(row: &Row) -> Result<GlossaryEntry> {
    Ok(GlossaryEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        game_id: row.get(4)?,
        image_url: row.get(5)?,
        thumbnail_url: row.get(6)?,
        icon_url: row.get(7)?,
    })
}
