//! Delimiters
//!
//! The global delimiter map, pairing every construct that opens a nested
//! scanning context with the marker that closes it. Two-character openers
//! (the comment starters) are keyed by both characters.

use phf::phf_map;
use std::fmt;

/// The lexical context a delimiter opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Code,
    String,
    Comment,
}

impl Context {
    /// Derive the context from the closer on top of a delimiter stack.
    ///
    /// An empty stack, or a bracket closer, is plain code.
    pub fn of(top: Option<&str>) -> Self {
        match top {
            Some("\"") | Some("'") => Self::String,
            Some("*/") | Some("\n") => Self::Comment,
            _ => Self::Code,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code => write!(f, "Code"),
            Self::String => write!(f, "String"),
            Self::Comment => write!(f, "Comment"),
        }
    }
}

pub struct Delimiter {
    pub opener: &'static str,
    pub closer: &'static str,
    pub context: Context,
}
impl fmt::Debug for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delimiter")
            .field("opener", &self.opener)
            .field("closer", &self.closer)
            .finish()
    }
}

pub static DELIMITER_MAP: phf::Map<&'static str, Delimiter> = phf_map! {
    "(" => Delimiter { opener: "(", closer: ")", context: Context::Code },
    "[" => Delimiter { opener: "[", closer: "]", context: Context::Code },
    "{" => Delimiter { opener: "{", closer: "}", context: Context::Code },
    "\"" => Delimiter { opener: "\"", closer: "\"", context: Context::String },
    "'" => Delimiter { opener: "'", closer: "'", context: Context::String },
    // Line comments have no literal closer; the next line break ends them.
    "//" => Delimiter { opener: "//", closer: "\n", context: Context::Comment },
    "/*" => Delimiter { opener: "/*", closer: "*/", context: Context::Comment },
};

/// Find the closer for a delimiter opened at `ch`.
///
/// A preceding `/` makes `ch` a candidate second character of a comment
/// opener, so the two-character key is tried first. Anything else (and a
/// `/` followed by a non-comment character, i.e. division) falls back to
/// the single character.
pub fn closer_for(prev: Option<char>, ch: char) -> Option<&'static str> {
    let mut buf = [0u8; 8];
    if prev == Some('/') {
        let mut pair = String::with_capacity(2);
        pair.push('/');
        pair.push(ch);
        if let Some(delim) = DELIMITER_MAP.get(pair.as_str()) {
            return Some(delim.closer);
        }
    }
    DELIMITER_MAP
        .get(&*ch.encode_utf8(&mut buf))
        .map(|delim| delim.closer)
}

#[cfg(test)]
mod test_delimiters {
    use super::*;

    /// All delimiter openers must match their keys
    #[test]
    fn test_delimiter_map_openers() {
        DELIMITER_MAP
            .into_iter()
            .for_each(|(k, delim)| assert_eq!(*k, delim.opener))
    }

    /// The context a delimiter opens is the context its closer reports
    #[test]
    fn test_closer_context_matches() {
        DELIMITER_MAP
            .into_iter()
            .for_each(|(_, delim)| assert_eq!(Context::of(Some(delim.closer)), delim.context))
    }

    #[test]
    fn test_closer_for() {
        let cases: Vec<(Option<char>, char, Option<&str>)> = vec![
            (None, '(', Some(")")),
            (None, '[', Some("]")),
            (Some('x'), '{', Some("}")),
            (None, '"', Some("\"")),
            (None, '\'', Some("'")),
            (Some('/'), '/', Some("\n")),
            (Some('/'), '*', Some("*/")),
            (Some('/'), '(', Some(")")),
            (Some('/'), ' ', None),
            (None, '/', None),
            (None, '*', None),
            (None, 'a', None),
        ];
        cases.into_iter().for_each(|(prev, ch, exp)| {
            println!("{:?}-{:?}", prev, ch);
            assert_eq!(closer_for(prev, ch), exp);
        })
    }

    #[test]
    fn test_context_of() {
        assert_eq!(Context::of(None), Context::Code);
        assert_eq!(Context::of(Some(")")), Context::Code);
        assert_eq!(Context::of(Some("}")), Context::Code);
        assert_eq!(Context::of(Some("'")), Context::String);
        assert_eq!(Context::of(Some("\n")), Context::Comment);
    }
}
