//! Error types for the collusion crate

use thiserror::Error;

use crate::solver::Failure;

/// Which reference equilibrium a root-finding call was solving for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Equilibrium {
    #[strum(serialize = "competitive")]
    Competitive,
    #[strum(serialize = "monopoly")]
    Monopoly,
}

/// Main error type for the collusion crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {field} {message}")]
    InvalidConfig { field: &'static str, message: String },

    #[error("failed to solve the {equilibrium} first-order conditions: {source}")]
    RootFinding {
        equilibrium: Equilibrium,
        #[source]
        source: Failure,
    },

    #[error("degenerate price range [{low}, {high}]: monopoly price must exceed competitive price")]
    DegenerateGrid { low: f64, high: f64 },

    #[error(
        "state space of {actions}^{agents} joint actions needs more than {} value table entries",
        crate::learning::state_space::MAX_TABLE_CELLS
    )]
    StateSpaceTooLarge { agents: usize, actions: usize },

    #[error("learning rate {value} must lie in [0, 1]")]
    InvalidLearningRate { value: f64 },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(field: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }
}
