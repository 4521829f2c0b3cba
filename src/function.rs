//! Parsed Functions

use serde::{Deserialize, Serialize};
use std::fmt;

/// The syntactic form a function was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    StandardFunction,
    ArrowFunction,
    GeneratorFunction,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StandardFunction => write!(f, "StandardFunction"),
            Self::ArrowFunction => write!(f, "ArrowFunction"),
            Self::GeneratorFunction => write!(f, "GeneratorFunction"),
        }
    }
}

/// A function definition broken into its parts.
///
/// Serializes to the same shape the record has in JavaScript:
///
/// ```rust
/// use serde_json::json;
/// use farse_rs::{parse, Kind, ParsedFunction};
///
/// let parsed = parse("function foobar () {}");
/// assert_eq!(parsed.kind, Kind::StandardFunction);
/// assert_eq!(
///     serde_json::to_value(&parsed).unwrap(),
///     json!({"name": "foobar", "params": [], "body": "", "kind": "StandardFunction"})
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: String,
    pub kind: Kind,
}

impl ParsedFunction {
    pub fn is_arrow(&self) -> bool {
        self.kind == Kind::ArrowFunction
    }

    pub fn is_generator(&self) -> bool {
        self.kind == Kind::GeneratorFunction
    }

    /// Source text that parses back into this record.
    ///
    /// Arrow functions always get a parenthesized parameter list and a
    /// braced body.
    pub fn to_source(&self) -> String {
        let params = self.params.join(",");
        match self.kind {
            Kind::ArrowFunction => format!("({})=>{{{}}}", params, self.body),
            Kind::StandardFunction => {
                format!("function {}({}) {{{}}}", self.name, params, self.body)
            }
            Kind::GeneratorFunction => {
                format!("function* {}({}) {{{}}}", self.name, params, self.body)
            }
        }
    }
}

impl fmt::Display for ParsedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_source())
    }
}
