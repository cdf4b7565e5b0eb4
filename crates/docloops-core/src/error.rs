use thiserror::Error;

#[derive(Error, Debug)]
pub enum CycleError {
    /// No collaborators for the document type, or invalid options.
    /// Raised before any evaluation happens.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Improvement failed: {0}")]
    Improvement(#[from] docloops_eval::ImproveError),
}
