//! Context Scanner
//!
//! A single left-to-right pass over source text that tracks open
//! delimiters on a stack and reports, for every character, which lexical
//! context it sits in. The pass is exposed as an iterator of [`Step`]s so
//! callers fold over it instead of registering callbacks.

use crate::delim::{closer_for, Context};
use crate::error::Error;

/// The scanner's view of one character, taken before the character
/// mutates the delimiter stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Byte offset of `ch` in the scanned text
    pub offset: usize,
    pub ch: char,
    pub context: Context,
    /// Number of open delimiters
    pub depth: usize,
    /// Closer of the outermost open delimiter
    pub bottom: Option<&'static str>,
    /// Closer of the innermost open delimiter
    pub top: Option<&'static str>,
}

impl Step {
    pub fn is_top_level(&self) -> bool {
        self.depth == 0
    }
}

/// Lazy scan over a string.
///
/// Cloning a `Scan` forks it: both copies continue independently from the
/// same position.
#[derive(Debug, Clone)]
pub struct Scan<'a> {
    chars: std::str::CharIndices<'a>,
    stack: Vec<&'static str>,
    prev: Option<char>,
}

impl<'a> Scan<'a> {
    pub fn new(text: &'a str) -> Self {
        Scan {
            chars: text.char_indices(),
            stack: Vec::new(),
            prev: None,
        }
    }

    /// The closers still expected, outermost first.
    pub fn stack(&self) -> &[&'static str] {
        &self.stack
    }

    pub fn is_balanced(&self) -> bool {
        self.stack.is_empty()
    }

    /// Run the scan to the end and return the closers left open.
    pub fn finish(mut self) -> Vec<&'static str> {
        while self.next().is_some() {}
        self.stack
    }

    /// Run the scan to the end, failing if any delimiter was left open.
    pub fn check(self) -> Result<(), Error> {
        let unclosed = self.finish();
        match unclosed.is_empty() {
            true => Ok(()),
            false => Err(Error::UnbalancedDelimiters {
                unclosed: unclosed.into_iter().map(String::from).collect(),
            }),
        }
    }

    fn top_matches(&self, token: &str) -> bool {
        self.stack.last().map(|top| *top == token).unwrap_or(false)
    }

    fn advance(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        let current: &str = ch.encode_utf8(&mut buf);
        match Context::of(self.stack.last().copied()) {
            Context::String => {
                // An escaped quote does not end the string
                if self.prev != Some('\\') && self.top_matches(current) {
                    self.stack.pop();
                }
            }
            Context::Comment => {
                let closes_pair = self
                    .prev
                    .map(|prev| {
                        let mut pair = String::with_capacity(2);
                        pair.push(prev);
                        pair.push(ch);
                        self.top_matches(&pair)
                    })
                    .unwrap_or(false);
                if self.top_matches(current) || closes_pair {
                    self.stack.pop();
                }
            }
            Context::Code => {
                if self.top_matches(current) {
                    self.stack.pop();
                } else if let Some(closer) = closer_for(self.prev, ch) {
                    self.stack.push(closer);
                }
            }
        }
        self.prev = Some(ch);
    }
}

impl<'a> Iterator for Scan<'a> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        let (offset, ch) = self.chars.next()?;
        let step = Step {
            offset,
            ch,
            context: Context::of(self.stack.last().copied()),
            depth: self.stack.len(),
            bottom: self.stack.first().copied(),
            top: self.stack.last().copied(),
        };
        self.advance(ch);
        Some(step)
    }
}

/// Scan `text` from the beginning with an empty delimiter stack.
///
/// ```rust
/// use farse_rs::delim::Context;
/// use farse_rs::scan::scan;
///
/// let contexts: Vec<Context> = scan("a'b'").map(|step| step.context).collect();
/// assert_eq!(
///     contexts,
///     vec![Context::Code, Context::Code, Context::String, Context::String]
/// );
/// ```
pub fn scan(text: &str) -> Scan<'_> {
    Scan::new(text)
}

#[cfg(test)]
mod test_scan {
    use super::*;

    fn contexts(text: &str) -> String {
        scan(text)
            .map(|step| match step.context {
                Context::Code => 'c',
                Context::String => 's',
                Context::Comment => 'm',
            })
            .collect()
    }

    fn balanced() -> Vec<&'static str> {
        vec![
            "",
            "a + b",
            "(a, [b, {c: d}])",
            "f(\"a)\", ')')",
            "x = '\\'';",
            "// }\nreturn;",
            "/*}*/return;",
            "a / b / (c)",
            "{var x = {}; if (true) {x=5;} return x;}",
            "console.log('}');return;",
        ]
    }

    fn unbalanced() -> Vec<(&'static str, Vec<&'static str>)> {
        vec![
            ("(", vec![")"]),
            ("{ [", vec!["}", "]"]),
            ("'abc", vec!["'"]),
            ("/* never closed", vec!["*/"]),
            ("// no newline", vec!["\n"]),
            ("f(\"\\\")", vec![")", "\""]),
        ]
    }

    #[test]
    fn test_balanced_inputs_end_empty() {
        balanced().into_iter().for_each(|text| {
            println!("{:?}", text);
            let mut s = scan(text);
            assert!(s.is_balanced());
            while s.next().is_some() {}
            assert!(s.is_balanced());
            assert!(scan(text).check().is_ok());
        })
    }

    #[test]
    fn test_unbalanced_inputs_report_leftovers() {
        unbalanced().into_iter().for_each(|(text, exp)| {
            println!("{:?}", text);
            assert_eq!(scan(text).finish(), exp);
            match scan(text).check() {
                Err(Error::UnbalancedDelimiters { unclosed }) => assert_eq!(unclosed, exp),
                other => panic!("expected unbalanced error, got {:?}", other),
            }
        })
    }

    #[test]
    fn test_string_context() {
        assert_eq!(contexts("a'b'c"), "ccssc");
        assert_eq!(contexts("\"a\\\"b\"c"), "csssssc");
    }

    #[test]
    fn test_comment_context() {
        assert_eq!(contexts("a//b\nc"), "cccmmc");
        assert_eq!(contexts("/*x*/y"), "ccmmmc");
    }

    #[test]
    fn test_nothing_opens_inside_strings_or_comments() {
        let s = scan("'({['");
        assert!(s.clone().all(|step| step.depth <= 1));
        assert!(s.check().is_ok());
        assert!(scan("/* ( */").check().is_ok());
        assert!(scan("// ' \n").check().is_ok());
    }

    #[test]
    fn test_steps_describe_pre_mutation_stack() {
        let steps: Vec<Step> = scan("(a)").collect();
        assert_eq!(steps[0].depth, 0);
        assert_eq!(steps[0].bottom, None);
        assert_eq!(steps[1].depth, 1);
        assert_eq!(steps[1].bottom, Some(")"));
        assert_eq!(steps[2].top, Some(")"));
        assert_eq!(steps[2].offset, 2);
    }

    #[test]
    fn test_bottom_and_top_frames() {
        let steps: Vec<Step> = scan("{(x)}").collect();
        assert_eq!(steps[2].bottom, Some("}"));
        assert_eq!(steps[2].top, Some(")"));
    }

    #[test]
    fn test_scan_is_restartable() {
        let mut s = scan("(a, b)");
        s.next();
        let forked = s.clone();
        assert_eq!(s.collect::<Vec<_>>(), forked.collect::<Vec<_>>());
    }
}
