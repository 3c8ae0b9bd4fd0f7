#![forbid(unsafe_code)]

//! Image uploads: object store write, public URL, then the owning row's
//! image columns. A failed column update leaves the uploaded object behind.

use std::{path::Path, sync::Arc};

use serde::Serialize;
use tracing::{info, warn};

use crate::blocking::run_blocking;
use crate::config::StorageConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::storage::ObjectStore;
use crate::store::{ContentStore, ImageColumns};

const DEFAULT_EXTENSION: &str = "png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    pub images: String,
    pub game_images: String,
}

impl From<&StorageConfig> for Buckets {
    fn from(config: &StorageConfig) -> Self {
        Self {
            images: config.images_bucket.clone(),
            game_images: config.game_images_bucket.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    Boss(i64),
    Character(i64),
    AdminAvatar,
    AdminCharacter,
    FloatingButton,
}

impl UploadTarget {
    pub fn bucket<'a>(&self, buckets: &'a Buckets) -> &'a str {
        match self {
            Self::Boss(_) | Self::Character(_) => &buckets.game_images,
            Self::AdminAvatar | Self::AdminCharacter | Self::FloatingButton => &buckets.images,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Boss(_) => "bosses",
            Self::Character(_) => "characters",
            Self::AdminAvatar | Self::AdminCharacter | Self::FloatingButton => "admin",
        }
    }

    /// Glossary images keep the uploaded file's extension; admin slots use a
    /// fixed name per slot.
    pub fn preserves_extension(&self) -> bool {
        matches!(self, Self::Boss(_) | Self::Character(_))
    }

    pub fn columns(&self) -> ImageColumns {
        match *self {
            Self::Boss(id) => ImageColumns {
                table: "bosses",
                row_id: id,
                columns: &["image_url", "thumbnail_url"],
            },
            Self::Character(id) => ImageColumns {
                table: "classes",
                row_id: id,
                columns: &["image_url", "icon_url"],
            },
            Self::AdminAvatar => ImageColumns {
                table: "admin_info",
                row_id: 1,
                columns: &["avatar_url"],
            },
            Self::AdminCharacter => ImageColumns {
                table: "admin_info",
                row_id: 1,
                columns: &["character_image_url"],
            },
            Self::FloatingButton => ImageColumns {
                table: "admin_info",
                row_id: 1,
                columns: &["floating_button_image_url"],
            },
        }
    }

    fn slot(&self) -> Option<&'static str> {
        match self {
            Self::Boss(_) | Self::Character(_) => None,
            Self::AdminAvatar => Some("avatar"),
            Self::AdminCharacter => Some("character"),
            Self::FloatingButton => Some("floating-button"),
        }
    }
}

fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Object path for an upload made at `now_millis`.
pub fn storage_path(target: UploadTarget, filename: &str, now_millis: i64) -> String {
    match (target, target.slot()) {
        (UploadTarget::Boss(id) | UploadTarget::Character(id), _) => format!(
            "{}/{id}/{now_millis}.{}",
            target.prefix(),
            file_extension(filename)
        ),
        (_, Some(slot)) => format!("{}/{slot}-{now_millis}", target.prefix()),
        (_, None) => format!("{}/{now_millis}", target.prefix()),
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Declared type, or one guessed from the file name.
    pub fn resolved_content_type(&self) -> String {
        self.content_type
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&self.filename)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub bucket: String,
    pub path: String,
}

pub async fn upload_image(
    store: &ContentStore,
    objects: Arc<dyn ObjectStore>,
    buckets: &Buckets,
    target: UploadTarget,
    upload: ImageUpload,
    now_millis: i64,
) -> ServiceResult<UploadedImage> {
    if upload.bytes.is_empty() {
        return Err(ServiceError::InvalidInput("file is required".into()));
    }
    let content_type = upload.resolved_content_type();
    if !content_type.starts_with("image/") {
        return Err(ServiceError::InvalidInput(format!(
            "expected an image, got {content_type}"
        )));
    }

    let bucket = target.bucket(buckets).to_string();
    let path = storage_path(target, &upload.filename, now_millis);
    let url = {
        let bucket = bucket.clone();
        let path = path.clone();
        run_blocking(move || {
            objects
                .upload(&bucket, &path, &upload.bytes, &content_type)
                .map(|()| objects.public_url(&bucket, &path))
        })
        .await?
        .map_err(|err| ServiceError::UploadFailed(err.to_string()))?
    };
    info!(%bucket, %path, "image uploaded");

    let columns = target.columns();
    let affected = store
        .set_image_columns(columns, &url)
        .await
        .map_err(|err| {
            warn!(
                %bucket,
                %path,
                error = %format!("{err:#}"),
                "column update failed, object left in place"
            );
            ServiceError::PersistenceFailure(format!("{err:#}"))
        })?;
    if affected == 0 {
        warn!(
            %bucket,
            %path,
            table = columns.table,
            row_id = columns.row_id,
            "no owning row, object left in place"
        );
        return Err(ServiceError::PersistenceFailure(format!(
            "no {} row with id {}",
            columns.table, columns.row_id
        )));
    }

    Ok(UploadedImage { url, bucket, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GlossaryKind;
    use crate::store::test_support::*;
    use crate::testing::FakeObjectStore;

    fn buckets() -> Buckets {
        Buckets {
            images: "images".into(),
            game_images: "game-images".into(),
        }
    }

    async fn upload_to(
        store: &ContentStore,
        objects: &Arc<FakeObjectStore>,
        target: UploadTarget,
        image: ImageUpload,
        now_millis: i64,
    ) -> ServiceResult<UploadedImage> {
        upload_image(store, objects.clone(), &buckets(), target, image, now_millis).await
    }

    fn png(name: &str) -> ImageUpload {
        ImageUpload {
            filename: name.into(),
            content_type: None,
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn paths_follow_prefix_id_and_timestamp() {
        assert_eq!(
            storage_path(UploadTarget::Boss(3), "Lilith.PNG", 1700),
            "bosses/3/1700.png"
        );
        assert_eq!(
            storage_path(UploadTarget::Character(5), "noext", 1700),
            "characters/5/1700.png"
        );
        assert_eq!(
            storage_path(UploadTarget::AdminAvatar, "me.jpg", 1700),
            "admin/avatar-1700"
        );
        assert_eq!(
            storage_path(UploadTarget::FloatingButton, "b.gif", 1700),
            "admin/floating-button-1700"
        );
        assert!(!UploadTarget::AdminCharacter.preserves_extension());
    }

    #[test]
    fn glossary_targets_use_game_bucket() {
        let buckets = buckets();
        assert_eq!(UploadTarget::Boss(1).bucket(&buckets), "game-images");
        assert_eq!(UploadTarget::AdminAvatar.bucket(&buckets), "images");
    }

    #[tokio::test]
    async fn boss_upload_sets_image_and_thumbnail() {
        let (_dir, store) = temp_store().await;
        seed_game(&store, 1, "Game").await;
        seed_glossary(&store, GlossaryKind::Boss, 3, "Lilith", "").await;
        let objects = Arc::new(FakeObjectStore::default());

        let uploaded = upload_image(
            &store,
            objects.clone(),
            &buckets(),
            UploadTarget::Boss(3),
            png("lilith.png"),
            42,
        )
        .await
        .unwrap();

        assert_eq!(uploaded.path, "bosses/3/42.png");
        let boss = store
            .find_glossary_entry(GlossaryKind::Boss, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(boss.image_url.as_deref(), Some(uploaded.url.as_str()));
        assert_eq!(boss.thumbnail_url, boss.image_url);
        assert_eq!(objects.uploads()[0].content_type, "image/png");
    }

    #[tokio::test]
    async fn character_upload_sets_image_and_icon() {
        let (_dir, store) = temp_store().await;
        seed_game(&store, 1, "Game").await;
        seed_glossary(&store, GlossaryKind::Class, 5, "Sorcerer", "").await;

        let uploaded = upload_image(
            &store,
            Arc::new(FakeObjectStore::default()),
            &buckets(),
            UploadTarget::Character(5),
            png("s.webp"),
            42,
        )
        .await
        .unwrap();

        let class = store
            .find_glossary_entry(GlossaryKind::Class, 5)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(class.image_url.as_deref(), Some(uploaded.url.as_str()));
        assert_eq!(class.icon_url, class.image_url);
        assert!(class.thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn admin_slots_update_their_own_column() {
        let (_dir, store) = temp_store().await;
        seed_admin(&store).await;
        let objects = Arc::new(FakeObjectStore::default());
        upload_to(&store, &objects, UploadTarget::FloatingButton, png("b.png"), 1)
            .await
            .unwrap();
        let info = store.admin_info().await.unwrap().unwrap();
        assert!(info.floating_button_image_url.is_some());
        assert!(info.avatar_url.is_none());
        assert_eq!(objects.uploads()[0].bucket, "images");
    }

    #[tokio::test]
    async fn missing_row_is_persistence_failure_and_leaves_object() {
        let (_dir, store) = temp_store().await;
        let objects = Arc::new(FakeObjectStore::default());
        let err = upload_image(
            &store,
            objects.clone(),
            &buckets(),
            UploadTarget::Boss(77),
            png("x.png"),
            9,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::PersistenceFailure(_)));
        assert_eq!(objects.uploads().len(), 1);
    }

    #[tokio::test]
    async fn store_rejection_is_upload_failure() {
        let (_dir, store) = temp_store().await;
        seed_game(&store, 1, "Game").await;
        seed_glossary(&store, GlossaryKind::Boss, 3, "Lilith", "").await;
        let err = upload_image(
            &store,
            Arc::new(FakeObjectStore::failing()),
            &buckets(),
            UploadTarget::Boss(3),
            png("x.png"),
            9,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::UploadFailed(_)));
        let boss = store
            .find_glossary_entry(GlossaryKind::Boss, 3)
            .await
            .unwrap()
            .unwrap();
        assert!(boss.image_url.is_none());
    }

    #[tokio::test]
    async fn same_key_twice_is_rejected() {
        let (_dir, store) = temp_store().await;
        seed_admin(&store).await;
        let objects = Arc::new(FakeObjectStore::default());
        upload_to(&store, &objects, UploadTarget::AdminAvatar, png("a.png"), 5)
            .await
            .unwrap();
        let err = upload_to(&store, &objects, UploadTarget::AdminAvatar, png("a.png"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UploadFailed(_)));
    }

    #[tokio::test]
    async fn empty_or_non_image_files_are_rejected() {
        let (_dir, store) = temp_store().await;
        let objects = Arc::new(FakeObjectStore::default());
        let empty = ImageUpload {
            bytes: Vec::new(),
            ..png("a.png")
        };
        let err = upload_to(&store, &objects, UploadTarget::AdminAvatar, empty, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let text = png("notes.txt");
        let err = upload_to(&store, &objects, UploadTarget::AdminAvatar, text, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(objects.uploads().is_empty());
    }
}
