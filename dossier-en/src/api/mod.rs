//! HTTP API routes

pub mod health;
pub mod research;
pub mod sse;

pub use health::health_routes;
pub use research::research_routes;
pub use sse::event_stream;
