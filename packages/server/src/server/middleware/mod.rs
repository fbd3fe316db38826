// HTTP middleware
pub mod ip_extractor;
pub mod route_gate;

pub use ip_extractor::*;
pub use route_gate::*;
