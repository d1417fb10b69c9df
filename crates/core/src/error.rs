#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Keypoint schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
