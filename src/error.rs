//! Error types for selection, validation and training.
//!
//! Every failure the core can raise falls into one of four kinds. Two of them
//! (`Data`, `Fit`) are local: the component that hit them degrades to a safe
//! fallback and the run continues. The other two (`Configuration`,
//! `EmptySelection`) stop the current run before anything is registered.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, SieveError>;

/// Errors raised by the selection and evaluation pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SieveError {
    /// Invalid or contradictory parameters.
    ///
    /// Detected before any estimator is fitted, so raising it has no side effects.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The data cannot support the requested operation.
    ///
    /// Examples: a non-numeric target for the correlation scorer, an all-null
    /// column, or a single-class target for stratified folding.
    #[error("Data error: {0}")]
    Data(String),

    /// An underlying estimator or resampler could not be fitted.
    #[error("Fit error: {0}")]
    Fit(String),

    /// A selection stage or combiner retained zero features.
    #[error("No features selected by {stage}")]
    EmptySelection {
        /// Name of the stage, phase or combiner that came up empty
        stage: String,
    },
}

impl SieveError {
    pub fn config(message: impl Into<String>) -> Self {
        SieveError::Configuration(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        SieveError::Data(message.into())
    }

    pub fn fit(message: impl Into<String>) -> Self {
        SieveError::Fit(message.into())
    }

    pub fn empty(stage: impl Into<String>) -> Self {
        SieveError::EmptySelection {
            stage: stage.into(),
        }
    }

    /// Whether the failure may be absorbed by falling back to the un-processed input.
    ///
    /// `Data` and `Fit` errors degrade; `Configuration` and `EmptySelection`
    /// abort the run and must not populate the model registry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SieveError::Data(_) | SieveError::Fit(_))
    }
}

/// A recoverable failure that was absorbed by a fallback.
///
/// Degradations are reported alongside results so they are never silently lost.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Degradation {
    /// Component that fell back (e.g. "cascade", "imbalance", "grid_search")
    pub component: String,
    /// What went wrong and what was used instead
    pub reason: String,
}

impl Degradation {
    pub fn new(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Degradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.component, self.reason)
    }
}
