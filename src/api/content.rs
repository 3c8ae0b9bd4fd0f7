#![forbid(unsafe_code)]

//! Mutation endpoints: ingestion, generation, image uploads.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Multipart, State, rejection::JsonRejection},
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::{AppState, Success, json_body, success};
use crate::article::{self, ArticleOutcome, ArticleRequest};
use crate::error::{ServiceError, ServiceResult};
use crate::ingest::{self, AddVideoRequest, AddedVideo, SearchReport, SearchSpec};
use crate::media::{self, ImageUpload, UploadTarget};

type JsonResult<T> = ServiceResult<Json<Success<T>>>;

pub(super) async fn add_video(
    State(state): State<AppState>,
    payload: Result<Json<AddVideoRequest>, JsonRejection>,
) -> JsonResult<AddedVideo> {
    let request = json_body(payload)?;
    let store = state.store()?;
    let platform = state.platform()?;
    let added = ingest::add_video(store, platform, request, state.default_game_id).await?;
    Ok(success(added))
}

pub(super) async fn advanced_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchSpec>, JsonRejection>,
) -> JsonResult<SearchReport> {
    let spec = json_body(payload)?;
    let store = state.store()?;
    let platform = state.platform()?;
    let report =
        ingest::advanced_search(store, platform, &state.catalog, spec, state.default_game_id)
            .await?;
    Ok(success(report))
}

pub(super) async fn generate_article(
    State(state): State<AppState>,
    payload: Result<Json<ArticleRequest>, JsonRejection>,
) -> JsonResult<ArticleOutcome> {
    let request = json_body(payload)?;
    let store = state.store()?;
    let generator = state.generator()?;
    let outcome = article::generate_article(store, generator, &state.catalog, request).await?;
    Ok(success(outcome))
}

#[derive(Serialize)]
pub(super) struct UploadResponse {
    url: String,
    path: String,
}

struct UploadForm {
    file: Option<ImageUpload>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    fn field(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.fields.get(*name))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    fn entity_id(&self, names: &[&str]) -> ServiceResult<i64> {
        let raw = self
            .field(names)
            .ok_or_else(|| ServiceError::InvalidInput(format!("{} is required", names[0])))?;
        raw.parse().map_err(|_| {
            ServiceError::InvalidInput(format!("{} must be an integer, got {raw:?}", names[0]))
        })
    }
}

async fn read_upload_form(mut multipart: Multipart) -> ServiceResult<UploadForm> {
    let invalid = |err: axum::extract::multipart::MultipartError| {
        ServiceError::InvalidInput(format!("malformed multipart body: {}", err.body_text()))
    };
    let mut form = UploadForm {
        file: None,
        fields: HashMap::new(),
    };
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(invalid)?;
            form.file = Some(ImageUpload {
                filename,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(invalid)?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

async fn store_upload(
    state: &AppState,
    target: UploadTarget,
    form: UploadForm,
) -> JsonResult<UploadResponse> {
    let upload = form
        .file
        .ok_or_else(|| ServiceError::InvalidInput("file is required".into()))?;
    let store = state.store()?;
    let objects = state.objects()?;
    let uploaded = media::upload_image(
        store,
        objects,
        &state.buckets,
        target,
        upload,
        Utc::now().timestamp_millis(),
    )
    .await?;
    info!(url = %uploaded.url, ?target, "image attached");
    Ok(success(UploadResponse {
        url: uploaded.url,
        path: uploaded.path,
    }))
}

pub(super) async fn upload_boss_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> JsonResult<UploadResponse> {
    let form = read_upload_form(multipart).await?;
    let boss_id = form.entity_id(&["boss_id", "bossId", "id"])?;
    store_upload(&state, UploadTarget::Boss(boss_id), form).await
}

pub(super) async fn upload_character_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> JsonResult<UploadResponse> {
    let form = read_upload_form(multipart).await?;
    let character_id = form.entity_id(&["character_id", "characterId", "class_id", "id"])?;
    store_upload(&state, UploadTarget::Character(character_id), form).await
}

pub(super) async fn upload_admin_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> JsonResult<UploadResponse> {
    let form = read_upload_form(multipart).await?;
    let target = match form.field(&["slot", "type", "image_type"]) {
        Some("avatar") => UploadTarget::AdminAvatar,
        Some("character") => UploadTarget::AdminCharacter,
        Some(other) => {
            return Err(ServiceError::InvalidInput(format!(
                "slot must be avatar or character, got {other:?}"
            )));
        }
        None => return Err(ServiceError::InvalidInput("slot is required".into())),
    };
    store_upload(&state, target, form).await
}

pub(super) async fn upload_floating_button_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> JsonResult<UploadResponse> {
    let form = read_upload_form(multipart).await?;
    store_upload(&state, UploadTarget::FloatingButton, form).await
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::api::test_support::*;
    use crate::store::GlossaryKind;
    use crate::store::test_support::{sample_video, seed_admin, seed_game, seed_glossary};
    use crate::testing::{FakeGenerator, FakePlatform};
    use crate::youtube::PlatformVideo;

    fn platform_video(id: &str) -> PlatformVideo {
        PlatformVideo {
            video_id: id.into(),
            title: "ディアブロ4 ボス攻略".into(),
            description: "解説".into(),
            channel_title: "Guide".into(),
            published_at: Some("2024-01-01T00:00:00Z".into()),
            thumbnail_url: None,
        }
    }

    #[tokio::test]
    async fn add_video_then_duplicate_conflicts() {
        let h = harness(
            FakePlatform::with_video(platform_video("abc12345678")),
            FakeGenerator::replying("# T"),
        )
        .await;

        let (status, body) = send_json(
            &h.state,
            post_json("/youtube/add-video", json!({ "video_id": "abc12345678" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["video"]["video_id"], "abc12345678");
        assert_eq!(body["statistics"]["view_count"], 1000);
        let first_id = body["video"]["id"].as_i64().unwrap();

        let (status, body) = send_json(
            &h.state,
            post_json(
                "/youtube/add-video",
                json!({ "url": "https://www.youtube.com/watch?v=abc12345678" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Conflict");
        assert_eq!(body["existing_id"], first_id);
    }

    #[tokio::test]
    async fn add_video_without_id_is_bad_request() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;
        let (status, _) = send_json(&h.state, post_json("/youtube/add-video", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn advanced_search_reports_counts() {
        let h = harness(
            FakePlatform::with_search(vec![platform_video("srch0000001"), {
                let mut off = platform_video("srch0000002");
                off.title = "料理".into();
                off.description = "レシピ".into();
                off
            }]),
            FakeGenerator::replying("# T"),
        )
        .await;
        let (status, body) = send_json(
            &h.state,
            post_json("/youtube/advanced-search", json!({ "maxResults": 5, "gameId": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["found"], 2);
        assert_eq!(body["filtered"], 1);
        assert_eq!(body["saved"], 1);
        assert_eq!(body["videos"][0]["video_id"], "srch0000001");
        assert_eq!(h.platform.last_query().unwrap().max_results, 5);
    }

    #[tokio::test]
    async fn generate_article_for_missing_video_is_not_found() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;
        let (status, body) = send_json(
            &h.state,
            post_json("/generate-article", json!({ "video_id": "missing0000" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");
        assert_eq!(h.generator.calls(), 0);
        let store = h.state.store.as_ref().unwrap();
        let counts = store.table_counts().await.unwrap();
        assert!(counts.iter().all(|count| count.rows == 0));
    }

    #[tokio::test]
    async fn generate_article_returns_outcome_blocks() {
        let h = harness(
            FakePlatform::default(),
            FakeGenerator::replying("# 見出し\n\n本文"),
        )
        .await;
        let store = h.state.store.as_ref().unwrap();
        store.insert_video(&sample_video("vid00000009")).await.unwrap();

        let (status, body) = send_json(
            &h.state,
            post_json("/generate-article", json!({ "video_id": "vid00000009" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["article"]["title"], "見出し");
        assert_eq!(body["seo"]["title"], "見出し");
        assert_eq!(body["persistence"]["status"], "complete");
        assert_eq!(body["quality_check"]["outline"]["in_order"], true);
    }

    #[tokio::test]
    async fn generation_failure_is_surfaced_with_message() {
        let h = harness(FakePlatform::default(), FakeGenerator::failing()).await;
        let store = h.state.store.as_ref().unwrap();
        store.insert_video(&sample_video("vid00000010")).await.unwrap();
        let (status, body) = send_json(
            &h.state,
            post_json("/generate-article", json!({ "video_id": "vid00000010" })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "GenerationFailed");
        assert!(body["message"].as_str().unwrap().contains("RESOURCE_EXHAUSTED"));
    }

    #[tokio::test]
    async fn boss_upload_returns_public_url() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;
        let store = h.state.store.as_ref().unwrap();
        seed_game(store, 1, "Game").await;
        seed_glossary(store, GlossaryKind::Boss, 3, "Lilith", "").await;

        let (status, body) = send_json(
            &h.state,
            post_multipart("/upload-boss-image", &[("boss_id", "3")], Some(("l.png", &b"png"[..]))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with("https://cdn.test/game-images/bosses/3/"));
        let boss = store
            .find_glossary_entry(GlossaryKind::Boss, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(boss.thumbnail_url.as_deref(), Some(url));
        assert_eq!(h.objects.uploads().len(), 1);
    }

    #[tokio::test]
    async fn upload_requires_file_and_id() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;
        let (status, _) = send_json(
            &h.state,
            post_multipart("/upload-boss-image", &[("boss_id", "3")], None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(
            &h.state,
            post_multipart("/upload-character-image", &[], Some(("c.png", &b"png"[..]))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(
            &h.state,
            post_multipart(
                "/upload-admin-image",
                &[("slot", "banner")],
                Some(("a.png", &b"png"[..])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.objects.uploads().is_empty());
    }

    #[tokio::test]
    async fn admin_avatar_upload_updates_profile() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;
        let store = h.state.store.as_ref().unwrap();
        seed_admin(store).await;
        let (status, body) = send_json(
            &h.state,
            post_multipart(
                "/upload-admin-image",
                &[("slot", "avatar")],
                Some(("me.png", &b"png"[..])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let info = store.admin_info().await.unwrap().unwrap();
        assert_eq!(info.avatar_url.as_deref(), body["url"].as_str());
    }
}
