// Speaks edge gateway - server core
//
// Gates every request to the Speaks web application before any page runs:
// resolves the caller's session, then passes the request through to the
// upstream app or redirects to login / the default landing page.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
