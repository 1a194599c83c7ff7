//! JSON HTTP API.
//!
//! `api_router()` returns a composable `Router` with every route under
//! `/api/`; `start_server()` binds it and runs it in the background.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_server, ApiServer, ServerError, ServerSession};
pub use types::ApiContext;
