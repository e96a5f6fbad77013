//! HTML pages, health checks and the application router

pub mod handlers;
pub mod routes;
pub mod templates;

pub use routes::create_router;
