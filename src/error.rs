//! Error taxonomy for scenario set-up and optimisation.
//!
//! Errors are propagated with [`anyhow`] throughout the crate. Where the caller needs to know what
//! kind of failure occurred (e.g. to distinguish a bad input from an infeasible window), the
//! underlying error is a [`ModelError`], which can be recovered with
//! [`anyhow::Error::downcast_ref`].
use thiserror::Error;

/// The kinds of failure that can abort a scenario or an optimisation window
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// A required parameter is missing or the sizing configuration is inconsistent.
    ///
    /// Contains every problem found, not just the first.
    #[error("Invalid configuration:\n  * {}", .0.join("\n  * "))]
    Configuration(Vec<String>),
    /// The requested formulation cannot be expressed as a convex problem
    #[error("Formulation conflict: {0}")]
    FormulationConflict(String),
    /// The solver did not return an optimal solution
    #[error("Solver did not find an optimal solution (status: {status})")]
    Solver {
        /// Status reported by the solver
        status: String,
    },
}

impl ModelError {
    /// Create a [`ModelError::Configuration`] from a single message
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(vec![message.into()])
    }
}
