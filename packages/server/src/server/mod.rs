// HTTP server setup (Axum edge gateway)
pub mod app;
pub mod middleware;
pub mod routes;

pub use app::*;
