#![forbid(unsafe_code)]

//! Content record store backed by libsql.
//!
//! The same code talks to a hosted database (`libsql://` / `https://` URLs)
//! in production and to a throwaway local file in tests. Every operation is a
//! narrow keyed read or write; there is no caching, so each page render
//! re-issues its reads.

mod articles;
mod catalog;
pub mod models;
mod videos;

use std::path::Path;

use anyhow::{Context, Result, bail};
use libsql::{Builder, Connection, params};

use crate::config::DatabaseConfig;

pub use articles::ArticleStamp;
pub use models::*;

/// Tables reported by diagnostics, in schema order.
pub const TABLES: &[&str] = &[
    "games",
    "videos",
    "articles",
    "categories",
    "article_categories",
    "bosses",
    "classes",
    "strategies",
    "dungeons",
    "tips",
    "stories",
    "admin_info",
];

async fn configure_local_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        "#,
    )
    .await?;
    Ok(())
}

fn glossary_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            game_id INTEGER NOT NULL REFERENCES games(id),
            image_url TEXT,
            thumbnail_url TEXT,
            icon_url TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_game ON {table}(game_id);
        "#
    )
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            image_url TEXT,
            thumbnail_url TEXT
        );

        CREATE TABLE IF NOT EXISTS videos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            video_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            channel_title TEXT,
            published_at TEXT,
            thumbnail_url TEXT,
            search_query TEXT,
            game_id INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            name_ja TEXT,
            parent_id INTEGER REFERENCES categories(id),
            icon TEXT,
            description TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            game_id INTEGER
        );

        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            summary TEXT NOT NULL DEFAULT '',
            video_id TEXT NOT NULL REFERENCES videos(video_id),
            game_id INTEGER NOT NULL,
            published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            seo_title TEXT,
            seo_description TEXT,
            seo_keywords TEXT,
            slug TEXT,
            featured_image_url TEXT,
            header_image_url TEXT,
            thumbnail_url TEXT,
            read_time INTEGER,
            related_boss_id INTEGER,
            related_strategy_id INTEGER,
            related_class_id INTEGER,
            related_tip_id INTEGER,
            related_dungeon_id INTEGER,
            related_story_id INTEGER,
            related_analysis_id INTEGER,
            related_beginner_id INTEGER
        );

        CREATE TABLE IF NOT EXISTS article_categories (
            article_id INTEGER NOT NULL REFERENCES articles(id),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            PRIMARY KEY (article_id, category_id)
        );

        CREATE TABLE IF NOT EXISTS admin_info (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            display_name TEXT NOT NULL DEFAULT '',
            bio TEXT NOT NULL DEFAULT '',
            avatar_url TEXT,
            character_image_url TEXT,
            social_links_json TEXT NOT NULL DEFAULT '{}',
            favorite_games_json TEXT NOT NULL DEFAULT '[]',
            gaming_experience TEXT NOT NULL DEFAULT '',
            floating_button_image_url TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_videos_game ON videos(game_id);
        CREATE INDEX IF NOT EXISTS idx_articles_game ON articles(game_id);
        CREATE INDEX IF NOT EXISTS idx_articles_video ON articles(video_id);
        CREATE INDEX IF NOT EXISTS idx_categories_game ON categories(game_id);
        "#,
    )
    .await?;

    for kind in GlossaryKind::ALL {
        conn.execute_batch(&glossary_table_sql(kind.table()))
            .await
            .with_context(|| format!("creating {} table", kind.table()))?;
    }
    Ok(())
}

/// Shared handle to the content database. Cloning is cheap and every clone
/// uses the same underlying connection.
#[derive(Clone)]
pub struct ContentStore {
    conn: Connection,
}

impl ContentStore {
    /// Connects to the configured database and makes sure the tables exist.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        if !config.is_remote() {
            return Self::open_local(Path::new(&config.url)).await;
        }
        let Some(token) = config.auth_token.clone() else {
            bail!("DATABASE_AUTH_TOKEN is required for hosted database {}", config.url);
        };
        let db = Builder::new_remote(config.url.clone(), token)
            .build()
            .await
            .with_context(|| format!("connecting to hosted database {}", config.url))?;
        let conn = db.connect()?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Opens (and if necessary creates) a local database file.
    pub async fn open_local(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening content DB {}", path.display()))?;
        let conn = db.connect()?;
        configure_local_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Row counts for every known table, used by the diagnostics endpoint.
    pub async fn table_counts(&self) -> Result<Vec<TableCount>> {
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES.iter().copied() {
            let mut rows = self
                .conn
                .query(&format!("SELECT COUNT(*) FROM {table}"), params![])
                .await
                .with_context(|| format!("counting {table}"))?;
            let row = rows.next().await?.context("missing count row")?;
            counts.push(TableCount {
                table,
                rows: row.get(0)?,
            });
        }
        Ok(counts)
    }

    /// Rewrites every column in `target.columns` with `url`. Returns the number
    /// of rows touched so callers can tell a missing row apart from success.
    pub async fn set_image_columns(&self, target: ImageColumns, url: &str) -> Result<u64> {
        let assignments = target
            .columns
            .iter()
            .map(|column| format!("{column} = ?1"))
            .collect::<Vec<_>>()
            .join(", ");
        let affected = self
            .conn
            .execute(
                &format!(
                    "UPDATE {} SET {assignments} WHERE id = ?2",
                    target.table
                ),
                params![url, target.row_id],
            )
            .await
            .with_context(|| format!("updating image columns on {}", target.table))?;
        Ok(affected)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Seeding helpers shared by tests across the crate.

    use super::*;

    pub async fn temp_store() -> (tempfile::TempDir, ContentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open_local(&dir.path().join("content/test.db"))
            .await
            .unwrap();
        (dir, store)
    }

    pub async fn seed_game(store: &ContentStore, id: i64, name: &str) {
        store
            .conn()
            .execute(
                "INSERT INTO games (id, name, slug) VALUES (?1, ?2, ?3)",
                params![id, name, format!("game-{id}")],
            )
            .await
            .unwrap();
    }

    pub async fn seed_category(store: &ContentStore, id: i64, name: &str, name_ja: Option<&str>) {
        store
            .conn()
            .execute(
                "INSERT INTO categories (id, name, slug, name_ja, game_id) \
                 VALUES (?1, ?2, ?3, ?4, 1)",
                params![id, name, format!("cat-{id}"), name_ja],
            )
            .await
            .unwrap();
    }

    pub async fn seed_glossary(
        store: &ContentStore,
        kind: GlossaryKind,
        id: i64,
        name: &str,
        description: &str,
    ) {
        store
            .conn()
            .execute(
                &format!(
                    "INSERT INTO {} (id, name, slug, description, game_id) \
                     VALUES (?1, ?2, ?3, ?4, 1)",
                    kind.table()
                ),
                params![id, name, format!("{}-{id}", kind.table()), description],
            )
            .await
            .unwrap();
    }

    pub async fn seed_admin(store: &ContentStore) {
        store
            .conn()
            .execute(
                "INSERT INTO admin_info (id, display_name, bio) \
                 VALUES (1, 'Sensei', 'Plays a lot')",
                params![],
            )
            .await
            .unwrap();
    }

    pub fn sample_video(video_id: &str) -> NewVideo {
        NewVideo {
            video_id: video_id.to_string(),
            title: format!("【ボス攻略】Video {video_id}"),
            description: "ディアブロ4 のボス解説".into(),
            channel_title: Some("Guide Channel".into()),
            published_at: Some("2024-05-01T10:00:00Z".into()),
            thumbnail_url: Some(format!("https://i.ytimg.com/vi/{video_id}/mqdefault.jpg")),
            search_query: None,
            game_id: 1,
        }
    }
}
