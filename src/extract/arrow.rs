//! Arrow Function Extraction

use crate::error::Error;
use crate::extract::Outcome;
use crate::function::{Kind, ParsedFunction};
use crate::scan::scan;
use crate::split::split_param_list;

/// Byte offset of the `>` in the first top-level `=>`, if any.
fn find_arrow(source: &str) -> (Option<usize>, Vec<&'static str>) {
    let mut steps = scan(source);
    let mut prev = None;
    let mut arrow = None;
    for step in steps.by_ref() {
        if step.is_top_level() && prev == Some('=') && step.ch == '>' {
            arrow = Some(step.offset);
            break;
        }
        prev = Some(step.ch);
    }
    (arrow, steps.finish())
}

fn params_from(left: &str) -> Vec<String> {
    let left = left.trim();
    let inner = match left.strip_prefix('(') {
        Some(rest) => rest.strip_suffix(')').unwrap_or(rest),
        None => left,
    };
    split_param_list(inner)
}

fn body_from(right: &str) -> String {
    let right = right.trim();
    match right.strip_prefix('{') {
        Some(rest) => rest.strip_suffix('}').unwrap_or(rest).to_string(),
        // An expression body returns its value
        None => format!("return {};", right),
    }
}

/// Extract the parts of an arrow function.
///
/// ```rust
/// use farse_rs::extract::arrow;
///
/// let parsed = arrow::extract("obj=>obj.prop").parsed;
/// assert_eq!(parsed.params, vec!["obj"]);
/// assert_eq!(parsed.body, "return obj.prop;");
/// ```
pub fn extract(source: &str) -> Outcome {
    let (arrow, unclosed) = find_arrow(source);
    let (left, right) = match arrow {
        // `=` is a single byte, so the marker starts one byte earlier
        Some(offset) => (&source[..offset - 1], &source[offset + 1..]),
        None => (source, ""),
    };
    let parsed = ParsedFunction {
        name: String::new(),
        params: params_from(left),
        body: body_from(right),
        kind: Kind::ArrowFunction,
    };
    let problem = match arrow {
        None => Some(Error::MissingArrow {
            text: source.to_string(),
        }),
        Some(_) if !unclosed.is_empty() => Some(Error::UnbalancedDelimiters {
            unclosed: unclosed.into_iter().map(String::from).collect(),
        }),
        Some(_) => None,
    };
    Outcome { parsed, problem }
}

#[cfg(test)]
mod test_arrow {
    use super::*;

    fn parsed(source: &str) -> ParsedFunction {
        let outcome = extract(source);
        assert!(outcome.problem.is_none(), "{:?}", outcome.problem);
        outcome.parsed
    }

    #[test]
    fn test_forms() {
        let cases: Vec<(&str, Vec<&str>, &str)> = vec![
            ("()=>{}", vec![], ""),
            ("(a,x,b,y)=>{}", vec!["a", "x", "b", "y"], ""),
            ("(foo,bar)=>foo-bar", vec!["foo", "bar"], "return foo-bar;"),
            ("n=>{return n*100;}", vec!["n"], "return n*100;"),
            ("obj=>obj.prop", vec!["obj"], "return obj.prop;"),
            ("(a, b) => a + b", vec!["a", " b"], "return a + b;"),
            ("x => ({y: x})", vec!["x"], "return ({y: x});"),
        ];
        cases.into_iter().for_each(|(source, params, body)| {
            println!("{:?}", source);
            let p = parsed(source);
            assert_eq!(p.name, "");
            assert_eq!(p.params, params);
            assert_eq!(p.body, body);
            assert_eq!(p.kind, Kind::ArrowFunction);
        })
    }

    #[test]
    fn test_nested_arrows_split_at_first_top_level() {
        let p = parsed("(f = (a) => a) => f(1)");
        assert_eq!(p.params, vec!["f = (a) => a"]);
        assert_eq!(p.body, "return f(1);");

        let p = parsed("a => b => a + b");
        assert_eq!(p.params, vec!["a"]);
        assert_eq!(p.body, "return b => a + b;");
    }

    #[test]
    fn test_arrow_inside_string_param_is_ignored() {
        let p = parsed("(s = '=>') => s");
        assert_eq!(p.params, vec!["s = '=>'"]);
        assert_eq!(p.body, "return s;");
    }

    #[test]
    fn test_missing_arrow_is_reported() {
        let outcome = extract("(a, b)");
        assert_eq!(outcome.parsed.params, vec!["a", " b"]);
        match outcome.problem {
            Some(Error::MissingArrow { text }) => assert_eq!(text, "(a, b)"),
            other => panic!("expected missing arrow, got {:?}", other),
        }
    }

    #[test]
    fn test_unbalanced_body_is_reported() {
        let outcome = extract("() => { return 1;");
        assert_eq!(outcome.parsed.body, " return 1;");
        match outcome.problem {
            Some(Error::UnbalancedDelimiters { unclosed }) => assert_eq!(unclosed, vec!["}"]),
            other => panic!("expected unbalanced, got {:?}", other),
        }
    }
}
