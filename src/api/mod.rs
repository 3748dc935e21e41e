//! API Module
//!
//! HTTP handlers and routing for the admin REST API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats`, `POST /stats/reset` - Cache and rate limit statistics
//! - `GET|PUT|DELETE /limits` - Route rate limit overrides
//! - `DELETE /cache`, `POST /cache/cleanup` - Cache maintenance
//! - `DELETE /cache/{credentials,subjects,resources}/:id` - Scoped invalidation

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
