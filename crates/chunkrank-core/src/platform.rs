//! Execution helpers for CPU-bound work.
//!
//! Keyword indexing and scoring are pure computation over in-memory data; in
//! hybrid mode they run on tokio's blocking pool so the vector path (which
//! awaits collaborators) proceeds concurrently on the async runtime.

/// Runs `f` on tokio's blocking thread pool.
///
/// Join failures (a panicking task or a shut-down runtime) are converted into
/// `E` through `From<String>`.
///
/// ```ignore
/// let outcome = run_blocking(move || Ok::<_, SearchError>(matcher.search(&query, &index))).await?;
/// ```
pub async fn run_blocking<F, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| E::from(format!("Blocking task join failed: {e}")))?
}
