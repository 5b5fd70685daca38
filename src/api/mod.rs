//! Admin HTTP API
//!
//! One axum server fronts all three services; handlers delegate into the
//! application container and wrap results in the response envelope.

pub mod envelope;
pub mod handlers;
mod routes;

pub use routes::create_app;
