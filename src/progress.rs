//! Step-by-step narration for long-running operations

use async_trait::async_trait;

/// Receives narration while sync, merge, and move run.
///
/// Engines report every step here so partial progress is visible even when a
/// later step fails or pauses.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// A step started or finished
    async fn on_message(&self, message: &str);

    /// A best-effort step failed; the operation continues
    async fn on_warning(&self, message: &str);
}

/// Discards all narration
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_message(&self, _message: &str) {}

    async fn on_warning(&self, _message: &str) {}
}
