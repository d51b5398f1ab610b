//! Small helpers shared by handler modules

use anyhow::anyhow;

use crate::errors::AppError;
use crate::records::StoreError;

/// Run a blocking store operation on the blocking pool, folding pool and
/// store failures into `AppError`.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(anyhow!("blocking task failed: {e}")))?
        .map_err(Into::into)
}
