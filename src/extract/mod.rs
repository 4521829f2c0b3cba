//! Extractors
//!
//! This module routes function source to the extractor for its form and
//! carries the result back together with anything that went wrong along
//! the way. Extraction itself never fails: malformed input produces a
//! degraded record plus a `problem`, and the caller decides whether that
//! problem is fatal.

use log::debug;

use crate::error::Error;
use crate::function::ParsedFunction;

pub mod arrow;
pub mod standard;

/// The keyword that introduces a standard or generator function
pub const KEYWORD: &str = "function";

/// An extracted function and the first problem noticed while extracting it
#[derive(Debug)]
pub struct Outcome {
    pub parsed: ParsedFunction,
    pub problem: Option<Error>,
}

impl Outcome {
    pub fn clean(parsed: ParsedFunction) -> Self {
        Outcome {
            parsed,
            problem: None,
        }
    }

    pub fn into_result(self) -> Result<ParsedFunction, Error> {
        match self.problem {
            Some(err) => Err(err),
            None => Ok(self.parsed),
        }
    }
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// Whether the source starts with the `function` keyword.
///
/// The keyword must stand alone, so an arrow function whose parameter
/// merely begins with "function" (`functional => 1`) is not mistaken for
/// one.
pub fn is_keyword_form(source: &str) -> bool {
    source
        .strip_prefix(KEYWORD)
        .map(|rest| !rest.starts_with(is_identifier_char))
        .unwrap_or(false)
}

/// Route source text to the matching extractor.
pub fn dispatch(source: &str) -> Outcome {
    let source = source.trim_start();
    if is_keyword_form(source) {
        debug!("Extracting keyword-form function");
        standard::extract(source)
    } else {
        debug!("Extracting arrow-form function");
        arrow::extract(source)
    }
}
