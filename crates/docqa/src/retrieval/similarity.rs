//! Vector similarity metrics

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Metric used to rank chunks against a query (higher is more similar)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Raw dot product
    Dot,
    /// Dot product of the normalized vectors; zero vectors score 0
    #[default]
    Cosine,
}

impl SimilarityMetric {
    /// Score two vectors of equal length
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot = dot(a, b);
        match self {
            Self::Dot => dot,
            Self::Cosine => {
                let norms = norm(a) * norm(b);
                if norms == 0.0 {
                    0.0
                } else {
                    dot / norms
                }
            }
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dot => write!(f, "dot"),
            Self::Cosine => write!(f, "cosine"),
        }
    }
}

impl FromStr for SimilarityMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dot" | "dot_product" => Ok(Self::Dot),
            "cosine" => Ok(Self::Cosine),
            other => Err(Error::invalid_argument(format!(
                "unknown similarity metric '{}' (expected dot or cosine)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_and_cosine() {
        let a = [3.0, 4.0];
        let b = [6.0, 8.0];
        assert_eq!(SimilarityMetric::Dot.score(&a, &b), 50.0);
        assert!((SimilarityMetric::Cosine.score(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_ignores_magnitude_but_dot_does_not() {
        let query = [1.0, 0.0];
        let long_off_axis = [10.0, 10.0];
        let short_on_axis = [1.0, 0.0];

        let dot = SimilarityMetric::Dot;
        assert!(dot.score(&query, &long_off_axis) > dot.score(&query, &short_on_axis));

        let cosine = SimilarityMetric::Cosine;
        assert!(cosine.score(&query, &short_on_axis) > cosine.score(&query, &long_off_axis));
    }

    #[test]
    fn test_zero_vector_scores_zero_under_cosine() {
        assert_eq!(SimilarityMetric::Cosine.score(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_parse() {
        assert_eq!("DOT".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Dot);
        assert_eq!("cosine".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Cosine);
        assert!("l2".parse::<SimilarityMetric>().is_err());
        assert_eq!(SimilarityMetric::Dot.to_string(), "dot");
    }
}
