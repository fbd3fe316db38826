//! Kernel module - external collaborators and their test doubles.

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::{GateDeps, SupabaseSessionProvider, SupabaseUserStore};
pub use test_dependencies::{test_user, MockSessionProvider, MockUserStore, TestDependencies};
pub use traits::*;
