use thiserror::Error;

/// Failures raised by the gate's collaborators.
///
/// None of these ever reach the client; the gate folds each one into the
/// negative case (unauthenticated, or not an organizer).
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Session resolution failed: {0}")]
    SessionResolution(String),

    #[error("Organizer lookup failed: {0}")]
    OrganizerLookup(String),

    #[error("User record not found")]
    RecordNotFound,

    #[error("Collaborator timed out after {0}ms")]
    Timeout(u64),

    #[error("Supabase error: {0}")]
    Supabase(#[from] supabase::SupabaseError),
}
