//! Authentication types shared by the gate and its collaborators.
//!
//! The gate never creates sessions. It reads the identity a provider resolves
//! from cookies and forwards any cookies the provider refreshed on the way.
mod errors;
mod session;

pub use errors::AuthError;
pub use session::{SessionResolution, SessionUser};
