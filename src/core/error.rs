#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Computation overflow: {0}")]
    ComputationOverflow(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
