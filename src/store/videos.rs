#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use chrono::Utc;
use libsql::{Row, params};

use super::{ContentStore, NewVideo, Video};

const VIDEO_COLUMNS: &str = "id, video_id, title, description, channel_title, published_at, \
     thumbnail_url, search_query, game_id, created_at";

impl ContentStore {
    pub async fn find_video(&self, video_id: &str) -> Result<Option<Video>> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE video_id = ?1"),
                params![video_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_video(&row)?)),
            None => Ok(None),
        }
    }

    /// Plain insert; fails on a duplicate `video_id`. Callers check for an
    /// existing row first when they need a friendly conflict.
    pub async fn insert_video(&self, video: &NewVideo) -> Result<Video> {
        self.write_video(video, "")
            .await
            .with_context(|| format!("inserting video {}", video.video_id))
    }

    /// Inserts or overwrites the row sharing `video_id`, so repeating a batch
    /// search never produces duplicates. `created_at` of an existing row is
    /// preserved.
    pub async fn upsert_video(&self, video: &NewVideo) -> Result<Video> {
        self.write_video(
            video,
            r#"
            ON CONFLICT(video_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                channel_title = excluded.channel_title,
                published_at = excluded.published_at,
                thumbnail_url = excluded.thumbnail_url,
                search_query = excluded.search_query,
                game_id = excluded.game_id
            "#,
        )
        .await
        .with_context(|| format!("upserting video {}", video.video_id))
    }

    async fn write_video(&self, video: &NewVideo, on_conflict: &str) -> Result<Video> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    r#"
                    INSERT INTO videos (
                        video_id, title, description, channel_title, published_at,
                        thumbnail_url, search_query, game_id, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    {on_conflict}
                    RETURNING {VIDEO_COLUMNS}
                    "#
                ),
                params![
                    video.video_id.as_str(),
                    video.title.as_str(),
                    video.description.as_str(),
                    video.channel_title.as_deref(),
                    video.published_at.as_deref(),
                    video.thumbnail_url.as_deref(),
                    video.search_query.as_deref(),
                    video.game_id,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await?;
        let row = rows.next().await?.context("write returned no row")?;
        row_to_video(&row)
    }

    /// Newest uploads first.
    pub async fn list_videos(&self, game_id: i64, limit: i64) -> Result<Vec<Video>> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    r#"
                    SELECT {VIDEO_COLUMNS} FROM videos
                    WHERE game_id = ?1
                    ORDER BY published_at IS NULL, published_at DESC, id DESC
                    LIMIT ?2
                    "#
                ),
                params![game_id, limit],
            )
            .await?;
        let mut videos = Vec::new();
        while let Some(row) = rows.next().await? {
            videos.push(row_to_video(&row)?);
        }
        Ok(videos)
    }

    pub async fn count_videos(&self) -> Result<i64> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM videos", params![])
            .await?;
        let row = rows.next().await?.context("missing count row")?;
        Ok(row.get(0)?)
    }
}

// Column order must match VIDEO_COLUMNS.
fn row_to_video(row: &Row) -> Result<Video> {
    Ok(Video {
        id: row.get(0)?,
        video_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        channel_title: row.get(4)?,
        published_at: row.get(5)?,
        thumbnail_url: row.get(6)?,
        search_query: row.get(7)?,
        game_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn insert_and_find_roundtrip() -> Result<()> {
        let (_dir, store) = temp_store().await;
        let saved = store.insert_video(&sample_video("abc12345678")).await?;
        assert!(saved.id > 0);
        let found = store.find_video("abc12345678").await?.unwrap();
        assert_eq!(found, saved);
        assert!(store.find_video("missing0000").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_external_id() -> Result<()> {
        let (_dir, store) = temp_store().await;
        store.insert_video(&sample_video("dup00000000")).await?;
        assert!(store.insert_video(&sample_video("dup00000000")).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_overwrites_fields() -> Result<()> {
        let (_dir, store) = temp_store().await;
        let first = store.upsert_video(&sample_video("up000000000")).await?;

        let mut changed = sample_video("up000000000");
        changed.title = "Renamed".into();
        let second = store.upsert_video(&changed).await?;

        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "Renamed");
        assert_eq!(second.created_at, first.created_at);
        let counts = store.table_counts().await?;
        let videos = counts.iter().find(|count| count.table == "videos").unwrap();
        assert_eq!(videos.rows, 1);
        assert_eq!(store.count_videos().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn list_videos_filters_by_game_newest_first() -> Result<()> {
        let (_dir, store) = temp_store().await;
        let mut old = sample_video("old00000000");
        old.published_at = Some("2023-01-01T00:00:00Z".into());
        let mut new = sample_video("new00000000");
        new.published_at = Some("2024-06-01T00:00:00Z".into());
        let mut other = sample_video("other000000");
        other.game_id = 2;
        for video in [&old, &new, &other] {
            store.insert_video(video).await?;
        }

        let listed = store.list_videos(1, 10).await?;
        let ids: Vec<_> = listed.iter().map(|video| video.video_id.as_str()).collect();
        assert_eq!(ids, vec!["new00000000", "old00000000"]);
        Ok(())
    }
}
