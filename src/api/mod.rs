#![forbid(unsafe_code)]

//! HTTP surface. Handlers stay thin: extract, pick the configured clients,
//! call into the service modules, wrap the result.

mod admin;
mod content;
mod diagnostics;
mod pages;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, rejection::JsonRejection},
    middleware,
    routing::{get, post},
};
use serde::Serialize;
use tracing::info;

use crate::admin::{AdminGate, require_admin};
use crate::config::{DEFAULT_GAME_IMAGES_BUCKET, DEFAULT_IMAGES_BUCKET, Settings};
use crate::error::{ServiceError, ServiceResult};
use crate::games::GameCatalog;
use crate::generator::{GeminiClient, TextGenerator};
use crate::media::Buckets;
use crate::storage::{ObjectStore, StorageClient};
use crate::store::ContentStore;
use crate::youtube::{VideoPlatform, YouTubeClient};

const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Process-wide handles, built once at startup and cloned into every handler.
/// A `None` client means its configuration was absent.
#[derive(Clone)]
pub struct AppState {
    pub store: Option<ContentStore>,
    pub platform: Option<Arc<dyn VideoPlatform>>,
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub objects: Option<Arc<dyn ObjectStore>>,
    pub buckets: Buckets,
    pub catalog: Arc<GameCatalog>,
    pub admin: Arc<AdminGate>,
    pub site_url: String,
    pub default_game_id: i64,
}

impl AppState {
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let store = match &settings.database {
            Some(database) => Some(ContentStore::open(database).await?),
            None => None,
        };
        let catalog = GameCatalog::load(settings.games_file.as_deref())?;
        let buckets = match &settings.storage {
            Some(storage) => Buckets::from(storage),
            None => Buckets {
                images: DEFAULT_IMAGES_BUCKET.to_string(),
                game_images: DEFAULT_GAME_IMAGES_BUCKET.to_string(),
            },
        };

        let state = Self {
            store,
            platform: settings
                .youtube
                .as_ref()
                .map(|config| Arc::new(YouTubeClient::new(config)) as Arc<dyn VideoPlatform>),
            generator: settings
                .gemini
                .as_ref()
                .map(|config| Arc::new(GeminiClient::new(config)) as Arc<dyn TextGenerator>),
            objects: settings
                .storage
                .as_ref()
                .map(|config| Arc::new(StorageClient::new(config)) as Arc<dyn ObjectStore>),
            buckets,
            catalog: Arc::new(catalog),
            admin: Arc::new(AdminGate::new(settings.admin_password.as_deref())),
            site_url: settings.site_url.trim_end_matches('/').to_string(),
            default_game_id: settings.default_game_id,
        };
        info!(
            database = state.store.is_some(),
            youtube = state.platform.is_some(),
            gemini = state.generator.is_some(),
            storage = state.objects.is_some(),
            admin_gate = state.admin.is_enabled(),
            games = state.catalog.games().len(),
            "services configured"
        );
        Ok(state)
    }

    pub fn store(&self) -> ServiceResult<&ContentStore> {
        self.store.as_ref().ok_or_else(|| {
            ServiceError::ServiceUnavailable("DATABASE_URL is not configured".into())
        })
    }

    pub fn platform(&self) -> ServiceResult<Arc<dyn VideoPlatform>> {
        self.platform.clone().ok_or_else(|| {
            ServiceError::ServiceUnavailable("YOUTUBE_API_KEY is not configured".into())
        })
    }

    pub fn generator(&self) -> ServiceResult<Arc<dyn TextGenerator>> {
        self.generator.clone().ok_or_else(|| {
            ServiceError::ServiceUnavailable("GEMINI_API_KEY is not configured".into())
        })
    }

    pub fn objects(&self) -> ServiceResult<Arc<dyn ObjectStore>> {
        self.objects.clone().ok_or_else(|| {
            ServiceError::ServiceUnavailable(
                "STORAGE_URL / STORAGE_SERVICE_KEY are not configured".into(),
            )
        })
    }
}

/// `{ "success": true, ...body }`
#[derive(Serialize)]
pub(crate) struct Success<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

pub(crate) fn success<T: Serialize>(body: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        body,
    })
}

/// Malformed JSON bodies become `InvalidInput` instead of axum's plain-text
/// rejection.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ServiceResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServiceError::InvalidInput(rejection.body_text()))
}

pub fn build_router(state: AppState) -> Router {
    let admin_pages = Router::new()
        .route("/admin/dashboard", get(admin::dashboard))
        .route_layer(middleware::from_fn_with_state(
            state.admin.clone(),
            require_admin,
        ));

    Router::new()
        .route("/upload-boss-image", post(content::upload_boss_image))
        .route("/upload-character-image", post(content::upload_character_image))
        .route("/upload-admin-image", post(content::upload_admin_image))
        .route(
            "/upload-floating-button-image",
            post(content::upload_floating_button_image),
        )
        .route("/generate-article", post(content::generate_article))
        .route("/youtube/add-video", post(content::add_video))
        .route("/youtube/advanced-search", post(content::advanced_search))
        .route("/admin-info", get(diagnostics::admin_info))
        .route("/test", get(diagnostics::config_test))
        .route("/supabase-test", get(diagnostics::database_test))
        .route("/test-storage", get(diagnostics::storage_test))
        .route("/api/games", get(pages::list_games))
        .route("/api/games/{id}/articles", get(pages::list_articles))
        .route("/api/games/{id}/videos", get(pages::list_videos))
        .route("/api/games/{id}/categories", get(pages::list_categories))
        .route("/api/games/{id}/glossary/{kind}", get(pages::list_glossary))
        .route("/api/articles/{id}", get(pages::article_detail))
        .route("/sitemap.xml", get(pages::sitemap))
        .route("/robots.txt", get(pages::robots))
        .route("/admin/login", post(admin::login))
        .route("/admin/logout", post(admin::logout))
        .route("/admin/session", get(admin::session))
        .merge(admin_pages)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(state)
}

async fn not_found() -> ServiceError {
    ServiceError::NotFound("endpoint not found".into())
}
