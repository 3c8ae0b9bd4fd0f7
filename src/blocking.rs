#![forbid(unsafe_code)]

use crate::error::ServiceError;

/// Runs a blocking upstream call (the HTTP clients are synchronous) on the
/// blocking pool.
pub async fn run_blocking<T, F>(task: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ServiceError::UpstreamFailure(format!("upstream worker failed: {err}")))
}
