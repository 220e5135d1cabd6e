//! HTTP client for the SupportIQ analytics API.
//!
//! Every request carries an optional static API key and an optional
//! `Authorization` value obtained from a [`TokenAccessor`] immediately
//! before sending.
//!
//! # Example
//!
//! ```no_run
//! use supportiq_client::{ApiClient, ListQuery, Result, accessor_fn};
//!
//! # async fn example() -> Result<()> {
//! let client = ApiClient::builder()
//!     .base_url("https://api.example.com/prod")
//!     .api_key("key")
//!     .token_accessor(accessor_fn(|| async { Ok(Some("Bearer abc".to_string())) }))
//!     .build()?;
//!
//! let page = client
//!     .calls()
//!     .list(ListQuery {
//!         page_size: Some(25),
//!         ..Default::default()
//!     })
//!     .await?;
//! for item in &page.items {
//!     println!("{}", item.label());
//! }
//!
//! // Arbitrary endpoints
//! let users = client.get("users").await?;
//! println!("{}", users);
//! # Ok(())
//! # }
//! ```

mod accessor;
mod api;
mod client;
mod error;
mod request;
mod types;

pub use accessor::{FnAccessor, SharedTokenAccessor, TokenAccessor, accessor_fn};
pub use api::{CallsApi, ListQuery};
pub use client::{API_KEY_HEADER, ApiClient, ClientBuilder};
pub use error::{Error, Result};
pub use request::{ApiRequest, ApiResponse, Method};
pub use types::{ListItem, ListPage};
