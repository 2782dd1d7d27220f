//! Error types for the optimizer passes.

use thiserror::Error;

/// Errors raised inside an optimization pass.
///
/// None of these reach the evaluator: [`AlgebraOptimizer::optimize`]
/// turns any error into "input unchanged". The implicit-join pass is the
/// only caller that inspects [`OptimizerError::UnsupportedConstruct`] to
/// choose a fallback rewrite.
///
/// [`AlgebraOptimizer::optimize`]: crate::optimizer::AlgebraOptimizer::optimize
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptimizerError {
    /// A rewrite met a construct it cannot see through (SERVICE,
    /// sub-queries, property paths, assignment targets)
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// Property function metadata claimed a pattern that was already consumed
    #[error("Inconsistent property function extraction: {0}")]
    InconsistentExtraction(String),

    /// A specialized node was asked to hold patterns it cannot evaluate
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Malformed statistics input
    #[error("Statistics error: {0}")]
    Statistics(String),
}

impl OptimizerError {
    /// Whether this error signals an expected "cannot rewrite here" outcome
    /// rather than a bug in pass metadata.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OptimizerError::UnsupportedConstruct(_) | OptimizerError::InvalidPattern(_)
        )
    }
}

/// Result alias used throughout the crate
pub type OptimizerResult<T> = Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OptimizerError::UnsupportedConstruct("SERVICE".to_string());
        assert_eq!(err.to_string(), "Unsupported construct: SERVICE");

        let err = OptimizerError::InconsistentExtraction("?s <p> ?o".to_string());
        assert!(err.to_string().contains("?s <p> ?o"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(OptimizerError::UnsupportedConstruct(String::new()).is_recoverable());
        assert!(OptimizerError::InvalidPattern(String::new()).is_recoverable());
        assert!(!OptimizerError::InconsistentExtraction(String::new()).is_recoverable());
        assert!(!OptimizerError::Statistics(String::new()).is_recoverable());
    }
}
