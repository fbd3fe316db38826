// HTTP routes
pub mod health;
pub mod proxy;

pub use health::*;
pub use proxy::*;
