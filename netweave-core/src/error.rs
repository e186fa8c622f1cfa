use thiserror::Error;

/// Reasons a crawl is refused before it starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("Analyzer is busy with another network")]
    Busy,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
