//! Relay gateway — library crate, also used by the integration tests in `tests/`.

pub mod api;
pub mod cache;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod gateway;
pub mod proxy;
pub mod resources;

pub use envelope::ApiEnvelope;
pub use gateway::{ApiRequest, Gateway};
