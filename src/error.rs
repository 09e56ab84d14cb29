//! Error kinds shared across the mesh, modal, and simulation pipelines.

use thiserror::Error;

/// Top-level failure modes of the modal-synthesis pipeline.
///
/// Each variant corresponds to one of the status codes the local [`crate::api::Modal`]
/// facade and the HTTP layer (`crate::http`) translate into a response.
#[derive(Debug, Error)]
pub enum BonkError {
    /// A mesh file could not be opened, parsed, or repaired into a valid surface.
    #[error("failed to open or repair mesh file: {0}")]
    FileOpenFailure(String),

    /// The generalized eigenproblem failed to converge, or produced no modes.
    #[error("modal solver failed to converge: {0}")]
    ModalSetupFailure(String),

    /// An API call was made out of the required invocation order (e.g. `bonk`
    /// before `initModalContext`).
    #[error("invalid invocation order: {0}")]
    BadInvocation(String),

    /// All modal amplitudes decayed to zero; normal end-of-sound, not a fault.
    #[error("modal amplitudes fully decayed")]
    ModalCompleteExtinction,
}

pub type Result<T> = std::result::Result<T, BonkError>;
