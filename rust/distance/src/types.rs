use dumbvec_error::{DumbvecError, ErrorCodes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a query is scored against stored vectors. Higher is more similar.
///
/// `Dot` assumes both sides are unit length and is the fast path.
/// `Cosine` divides by both magnitudes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Dot,
    Cosine,
}

#[derive(Error, Debug)]
pub enum SimilarityMetricError {
    #[error("Invalid similarity metric `{0}`")]
    InvalidSimilarityMetric(String),
}

impl DumbvecError for SimilarityMetricError {
    fn code(&self) -> ErrorCodes {
        match self {
            SimilarityMetricError::InvalidSimilarityMetric(_) => ErrorCodes::InvalidArgument,
        }
    }
}

impl TryFrom<&str> for SimilarityMetric {
    type Error = SimilarityMetricError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "dot" | "ip" => Ok(SimilarityMetric::Dot),
            "cosine" => Ok(SimilarityMetric::Cosine),
            _ => Err(SimilarityMetricError::InvalidSimilarityMetric(
                value.to_string(),
            )),
        }
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = SimilarityMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SimilarityMetric::try_from(s)
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityMetric::Dot => write!(f, "dot"),
            SimilarityMetric::Cosine => write!(f, "cosine"),
        }
    }
}
