//! API endpoint implementations.

mod calls;

pub use calls::{CallsApi, ListQuery};
