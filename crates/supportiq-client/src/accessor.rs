//! Credential capability injected into the client.
//!
//! The client never owns tokens. It asks a [`TokenAccessor`] for the
//! `Authorization` header value right before each request, so token
//! storage and refresh live entirely behind this seam.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Supplies the `Authorization` header value for outbound requests.
#[async_trait]
pub trait TokenAccessor: Send + Sync {
    /// The exact header value to send, or `None` to send no credential.
    async fn authorization(&self) -> Result<Option<String>>;
}

/// Shared accessor handle.
pub type SharedTokenAccessor = Arc<dyn TokenAccessor>;

/// Adapter turning an async closure into a [`TokenAccessor`].
pub struct FnAccessor<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnAccessor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAccessor").finish_non_exhaustive()
    }
}

/// Wrap an async closure as a token accessor.
///
/// ```
/// use supportiq_client::accessor_fn;
///
/// let accessor = accessor_fn(|| async { Ok(Some("Bearer xyz".to_string())) });
/// # let _ = accessor;
/// ```
pub fn accessor_fn<F, Fut>(f: F) -> FnAccessor<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<String>>> + Send + 'static,
{
    FnAccessor { f }
}

#[async_trait]
impl<F, Fut> TokenAccessor for FnAccessor<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<String>>> + Send + 'static,
{
    async fn authorization(&self) -> Result<Option<String>> {
        (self.f)().await
    }
}
