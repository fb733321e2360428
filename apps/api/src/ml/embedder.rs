use crate::error::Result;
use async_trait::async_trait;

/// Maps a text to a fixed-length embedding vector.
///
/// Implementations may fail (timeouts, rate limits, malformed responses);
/// callers decide how to degrade. The same text need not produce a
/// bit-identical vector across calls.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Short human-readable identifier used in logs.
    fn model_info(&self) -> String {
        "unknown embedder".to_string()
    }
}
