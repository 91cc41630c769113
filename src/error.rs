//! Errors raised while setting up equations and the solidification module.
//!
//! These are configuration errors: they are detected once, before any cellwise loop runs, and
//! are not meant to be recovered from.
use crate::equation::param::{EnforcementAlgorithm, SpaceScheme};
use crate::solidification::Strategy;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SetupError {
    InvalidSpaceScheme {
        equation: String,
        scheme: SpaceScheme,
    },
    UnsupportedEnforcement {
        equation: String,
        algorithm: EnforcementAlgorithm,
    },
    IncompatibleStrategy {
        strategy: Strategy,
        option: &'static str,
    },
    PropertyLength {
        name: String,
        expected: usize,
        got: usize,
    },
    InvalidParameter {
        name: String,
        reason: String,
    },
    MissingEquation {
        name: &'static str,
    },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSpaceScheme { equation, scheme } => {
                write!(f, "Invalid space scheme {scheme:?} for equation {equation}.")
            }
            Self::UnsupportedEnforcement { equation, algorithm } => {
                write!(f, "Enforcement algorithm {algorithm:?} is not available for equation {equation}.")
            }
            Self::IncompatibleStrategy { strategy, option } => {
                write!(f, "Strategy {strategy:?} cannot be combined with option {option}.")
            }
            Self::PropertyLength { name, expected, got } => {
                write!(f, "Property {name} has {got} cell values, expected {expected}.")
            }
            Self::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter {name}: {reason}.")
            }
            Self::MissingEquation { name } => write!(f, "Equation {name} is required but was not provided."),
        }
    }
}

impl std::error::Error for SetupError {}
