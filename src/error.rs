//! Error handling
//!
use serde_json::Value;
use thiserror;

use crate::interp::builtins::NumParams;

/// Public error enumeration
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unbalanced delimiters - still expecting closers: {unclosed:?}")]
    UnbalancedDelimiters { unclosed: Vec<String> },

    #[error("Invalid arrow function - no top-level '=>' in {text:?}")]
    MissingArrow { text: String },

    #[error("Invalid function - no parameter list in {text:?}")]
    MissingParameterList { text: String },

    #[error("Syntax error at offset {offset}: {reason}")]
    Syntax { offset: usize, reason: String },

    #[error("Unsupported construct - '{construct}' cannot be interpreted")]
    Unsupported { construct: String },

    #[error("Undefined variable - '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Invalid assignment - '{0}' is a constant")]
    ConstAssignment(String),

    #[error("Invalid call - '{0}' is not a function")]
    NotCallable(String),

    #[error("Invalid argument for '{operation}' - '{value:?}', reason: {reason}")]
    InvalidArgument {
        value: Value,
        operation: String,
        reason: String,
    },

    #[error("Wrong argument count - expected: {expected:?}, actual: {actual:?}")]
    WrongArgumentCount { expected: NumParams, actual: usize },

    #[error("Could not represent the result of '{operation}' ({number}) as a JSON number")]
    UnrepresentableNumber { operation: String, number: f64 },

    #[error("Step limit of {0} exceeded while running function body")]
    StepLimitExceeded(usize),

    #[error("Encountered an unexpected error. Please raise an issue and include the following error message: {0}")]
    UnexpectedError(String),
}
