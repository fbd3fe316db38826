// Common types shared across domains
pub mod auth;
