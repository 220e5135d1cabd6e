//! Loopback listener for the provider's redirect.
//!
//! Binds the redirect URI's host and port, accepts the first request on its
//! path that carries the pending sign-in's `state`, and hands the query back
//! to the caller. Callbacks with any other state are refused and the listener
//! keeps waiting. Everything else on the port gets a 404.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use axum::{
    Router,
    extract::{RawQuery, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse},
    routing::get,
};
use supportiq_auth::CallbackQuery;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tower_http::trace::TraceLayer;
use url::Url;

const RECEIVED_PAGE: &str = "<!doctype html><title>SupportIQ</title>\
<h1>Sign-in received</h1><p>You can close this tab and return to the terminal.</p>";

const INCOMPLETE_PAGE: &str = "<!doctype html><title>SupportIQ</title>\
<h1>Not a sign-in response</h1><p>The request did not carry an authorization result.</p>";

const FOREIGN_PAGE: &str = "<!doctype html><title>SupportIQ</title>\
<h1>Not this sign-in</h1><p>This response does not belong to the sign-in in progress.</p>";

const ALREADY_PAGE: &str = "<!doctype html><title>SupportIQ</title>\
<h1>Already handled</h1><p>A sign-in response was already received.</p>";

/// Shared state for the listener.
#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<oneshot::Sender<CallbackQuery>>>>,
}

/// Build the callback router for `path`, forwarding only callbacks whose
/// `state` equals `expected_state`.
pub fn router(
    path: &str,
    expected_state: &str,
    sender: oneshot::Sender<CallbackQuery>,
) -> Router {
    Router::new()
        .route(path, get(handle_callback))
        .with_state(CallbackState {
            expected_state: Arc::from(expected_state),
            sender: Arc::new(Mutex::new(Some(sender))),
        })
        .layer(TraceLayer::new_for_http())
}

/// Handle GET on the redirect path.
async fn handle_callback(
    State(state): State<CallbackState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let query = CallbackQuery::from_query(query.as_deref().unwrap_or_default());
    let close = [(header::CONNECTION, "close")];

    if !query.is_callback() {
        return (StatusCode::BAD_REQUEST, close, Html(INCOMPLETE_PAGE));
    }

    if query.state.as_deref() != Some(&*state.expected_state) {
        tracing::warn!("Ignoring callback for a different sign-in");
        return (StatusCode::BAD_REQUEST, close, Html(FOREIGN_PAGE));
    }

    match state.sender.lock().await.take() {
        Some(sender) => {
            // Receiver gone means the CLI already gave up waiting.
            let _ = sender.send(query);
            (StatusCode::OK, close, Html(RECEIVED_PAGE))
        }
        None => (StatusCode::CONFLICT, close, Html(ALREADY_PAGE)),
    }
}

/// A bound, not yet serving, callback listener.
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Bind the host and port of an `http://` loopback redirect URI.
    pub async fn bind(redirect_uri: &Url) -> Result<Self> {
        if redirect_uri.scheme() != "http" {
            bail!(
                "redirect_uri {} is not an http:// loopback address; use 'supportiq auth callback' instead",
                redirect_uri
            );
        }
        let host = redirect_uri
            .host_str()
            .context("redirect_uri has no host")?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = redirect_uri
            .port_or_known_default()
            .context("redirect_uri has no port")?;

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .with_context(|| format!("Failed to listen on {}:{}", host, port))?;

        Ok(Self {
            listener,
            path: redirect_uri.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until a callback for `expected_state` arrives or `timeout`
    /// elapses.
    pub async fn wait(self, expected_state: &str, timeout: Duration) -> Result<CallbackQuery> {
        let addr = self.local_addr()?;
        let (query_tx, query_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(&self.path, expected_state, query_tx);

        tracing::info!(addr = %addr, path = %self.path, "Waiting for sign-in callback");
        let server = tokio::spawn(async move {
            axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let received = tokio::time::timeout(timeout, query_rx).await;

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(Duration::from_secs(2), server).await {
            Ok(Ok(Err(e))) => tracing::debug!(error = %e, "Callback listener stopped with error"),
            Err(_) => tracing::debug!("Callback listener did not stop in time"),
            _ => {}
        }

        match received {
            Ok(Ok(query)) => Ok(query),
            Ok(Err(_)) => bail!("Callback listener closed before a response arrived"),
            Err(_) => bail!(
                "Timed out after {}s waiting for the browser to return. \
                 If the browser did reach the redirect page, finish with \
                 'supportiq auth callback <redirect-url>'.",
                timeout.as_secs()
            ),
        }
    }
}
