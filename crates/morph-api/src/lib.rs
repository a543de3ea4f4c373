//! Morph API Library
//!
//! HTTP handlers, error rendering, application state and startup wiring for the morph
//! backend.

mod api_doc;
pub mod constants;
mod handlers;

pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::get_openapi_spec;
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
