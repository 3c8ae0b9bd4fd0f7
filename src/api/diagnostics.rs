#![forbid(unsafe_code)]

//! Read-only diagnostics. Never listed in the sitemap.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::warn;

use super::{AppState, Success, success};
use crate::blocking::run_blocking;
use crate::error::ServiceResult;
use crate::store::{AdminInfo, TableCount};

/// Paths kept out of the sitemap and disallowed in robots.txt.
pub(crate) const DIAGNOSTIC_PATHS: [&str; 4] =
    ["/admin-info", "/test", "/supabase-test", "/test-storage"];

#[derive(Serialize)]
pub(super) struct AdminInfoResponse {
    admin_info: Option<AdminInfo>,
}

/// Missing profile is an empty state, not an error.
pub(super) async fn admin_info(
    State(state): State<AppState>,
) -> ServiceResult<Json<Success<AdminInfoResponse>>> {
    let admin_info = state.store()?.admin_info().await?;
    Ok(success(AdminInfoResponse { admin_info }))
}

#[derive(Serialize)]
pub(super) struct ConfigPresence {
    database: bool,
    youtube: bool,
    gemini: bool,
    storage: bool,
    admin_gate: bool,
    games: usize,
    default_game_id: i64,
}

pub(super) async fn config_test(State(state): State<AppState>) -> Json<Success<ConfigPresence>> {
    success(ConfigPresence {
        database: state.store.is_some(),
        youtube: state.platform.is_some(),
        gemini: state.generator.is_some(),
        storage: state.objects.is_some(),
        admin_gate: state.admin.is_enabled(),
        games: state.catalog.games().len(),
        default_game_id: state.default_game_id,
    })
}

#[derive(Serialize)]
pub(super) struct DatabaseReport {
    tables: Vec<TableCount>,
}

pub(super) async fn database_test(
    State(state): State<AppState>,
) -> ServiceResult<Json<Success<DatabaseReport>>> {
    let tables = state.store()?.table_counts().await?;
    Ok(success(DatabaseReport { tables }))
}

#[derive(Serialize)]
pub(super) struct BucketReport {
    bucket: String,
    objects: usize,
    sample: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub(super) struct StorageReport {
    buckets: Vec<BucketReport>,
}

/// Lists both buckets. A failing bucket is reported in place.
pub(super) async fn storage_test(
    State(state): State<AppState>,
) -> ServiceResult<Json<Success<StorageReport>>> {
    let objects = state.objects()?;
    let mut buckets = Vec::new();
    for bucket in [&state.buckets.images, &state.buckets.game_images] {
        let client = objects.clone();
        let name = bucket.clone();
        let listed = run_blocking(move || client.list(&name, "")).await?;
        let report = match listed {
            Ok(entries) => BucketReport {
                bucket: bucket.clone(),
                objects: entries.len(),
                sample: entries.into_iter().take(5).map(|entry| entry.name).collect(),
                error: None,
            },
            Err(err) => {
                warn!(%bucket, error = %err, "bucket listing failed");
                BucketReport {
                    bucket: bucket.clone(),
                    objects: 0,
                    sample: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        };
        buckets.push(report);
    }
    Ok(success(StorageReport { buckets }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::api::test_support::*;
    use crate::store::test_support::seed_admin;
    use crate::testing::{FakeGenerator, FakePlatform};

    #[tokio::test]
    async fn config_test_reports_presence_only() {
        let (status, body) = send_json(&bare_state(), get("/test")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], false);
        assert_eq!(body["admin_gate"], true);
        assert_eq!(body["games"], 2);
    }

    #[tokio::test]
    async fn database_test_counts_tables() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;
        let (status, body) = send_json(&h.state, get("/supabase-test")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tables"].as_array().unwrap().len(), 12);

        let (status, _) = send_json(&bare_state(), get("/supabase-test")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn admin_info_is_empty_until_seeded() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;
        let (status, body) = send_json(&h.state, get("/admin-info")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["admin_info"].is_null());

        seed_admin(h.state.store.as_ref().unwrap()).await;
        let (_, body) = send_json(&h.state, get("/admin-info")).await;
        assert_eq!(body["admin_info"]["display_name"], "Sensei");
    }

    #[tokio::test]
    async fn storage_test_lists_both_buckets() {
        let h = harness(FakePlatform::default(), FakeGenerator::replying("# T")).await;
        let (status, body) = send_json(&h.state, get("/test-storage")).await;
        assert_eq!(status, StatusCode::OK);
        let buckets = body["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0]["bucket"], "images");
        assert_eq!(buckets[1]["objects"], 0);
    }
}
