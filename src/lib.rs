//! Parse JavaScript function source into its parts, and back again.
//!
//! The heart of the crate is a context-aware scanner ([`scan`]) that
//! tracks brackets, strings and comments on a delimiter stack. The
//! extractors built on it split function source into a [`ParsedFunction`]:
//!
//! ```rust
//! use farse_rs::{parse, Kind};
//!
//! let parsed = parse("function something (alpha,bravo) {return alpha+bravo;}");
//! assert_eq!(parsed.name, "something");
//! assert_eq!(parsed.params, vec!["alpha", "bravo"]);
//! assert_eq!(parsed.body, "return alpha+bravo;");
//! assert_eq!(parsed.kind, Kind::StandardFunction);
//! ```
//!
//! The [`inverse`] module turns a record back into something callable,
//! using the small interpreter in [`interp`].

use log::warn;

pub mod delim;
pub mod error;
pub mod extract;
pub mod function;
pub mod interp;
pub mod inverse;
pub mod js_op;
pub mod scan;
pub mod split;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::Error;
pub use function::{Kind, ParsedFunction};
pub use inverse::{Function, Generator, IterResult, Output};

/// Options controlling how function source is parsed
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Fail on unbalanced delimiters or a missing arrow / parameter list
    /// instead of returning a degraded record.
    pub strict: bool,
}

impl ParseOptions {
    pub fn strict() -> Self {
        ParseOptions { strict: true }
    }
}

/// Parse function source, never failing.
///
/// Malformed input produces a best-effort record whose fields may be
/// truncated or contain trailing garbage.
pub fn parse(source: &str) -> ParsedFunction {
    let outcome = extract::dispatch(source);
    if let Some(problem) = &outcome.problem {
        warn!("Parsed malformed function source: {}", problem);
    }
    outcome.parsed
}

/// Parse function source, failing on malformed input.
///
/// ```rust
/// use farse_rs::{parse_strict, Error};
///
/// assert!(parse_strict("(a, b) => a + b").is_ok());
/// assert!(matches!(
///     parse_strict("function (a, b) { return a"),
///     Err(Error::UnbalancedDelimiters { .. })
/// ));
/// ```
pub fn parse_strict(source: &str) -> Result<ParsedFunction, Error> {
    extract::dispatch(source).into_result()
}

/// Parse function source with the given options.
pub fn parse_with(source: &str, options: &ParseOptions) -> Result<ParsedFunction, Error> {
    match options.strict {
        true => parse_strict(source),
        false => Ok(parse(source)),
    }
}
