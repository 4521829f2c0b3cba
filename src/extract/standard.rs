//! Standard and Generator Function Extraction

use crate::error::Error;
use crate::extract::{Outcome, KEYWORD};
use crate::function::{Kind, ParsedFunction};
use crate::scan::scan;
use crate::split::split_param_list;

/// Extract the parts of a `function` or `function*` definition.
///
/// The name is everything between the keyword (and generator marker) and
/// the first `(`, so names containing parentheses are not supported.
///
/// ```rust
/// use farse_rs::extract::standard;
/// use farse_rs::Kind;
///
/// let parsed = standard::extract("function* gen (a, b) {yield a;}").parsed;
/// assert_eq!(parsed.name, "gen");
/// assert_eq!(parsed.params, vec!["a", " b"]);
/// assert_eq!(parsed.body, "yield a;");
/// assert_eq!(parsed.kind, Kind::GeneratorFunction);
/// ```
pub fn extract(source: &str) -> Outcome {
    let rest = source.strip_prefix(KEYWORD).unwrap_or(source).trim_start();
    let (kind, rest) = match rest.strip_prefix('*') {
        Some(rest) => (Kind::GeneratorFunction, rest),
        None => (Kind::StandardFunction, rest),
    };

    let open = match rest.find('(') {
        Some(open) => open,
        None => {
            return Outcome {
                parsed: ParsedFunction {
                    name: rest.trim().to_string(),
                    params: Vec::new(),
                    body: String::new(),
                    kind,
                },
                problem: Some(Error::MissingParameterList {
                    text: source.to_string(),
                }),
            }
        }
    };
    let name = rest[..open].trim().to_string();

    let mut params = String::new();
    let mut body = String::new();
    let mut in_body = false;
    let mut closed = false;
    let mut steps = scan(&rest[open..]);
    for step in steps.by_ref() {
        match step.bottom {
            Some(")") if !in_body => params.push(step.ch),
            Some("}") => {
                in_body = true;
                body.push(step.ch);
            }
            // The body's closing brace has been consumed
            None if in_body => {
                closed = true;
                break;
            }
            _ => {}
        }
    }
    // Whatever follows the body is not ours to balance
    let unclosed = match closed {
        true => Vec::new(),
        false => steps.stack().to_vec(),
    };

    // Drop the closers that ended each region
    let params = params.strip_suffix(')').unwrap_or(&params);
    let body = body.strip_suffix('}').unwrap_or(&body);

    let parsed = ParsedFunction {
        name,
        params: split_param_list(params),
        body: body.to_string(),
        kind,
    };
    match unclosed.is_empty() {
        true => Outcome::clean(parsed),
        false => Outcome {
            parsed,
            problem: Some(Error::UnbalancedDelimiters {
                unclosed: unclosed.into_iter().map(String::from).collect(),
            }),
        },
    }
}

#[cfg(test)]
mod test_standard {
    use super::*;

    fn parsed(source: &str) -> ParsedFunction {
        let outcome = extract(source);
        assert!(outcome.problem.is_none(), "{:?}", outcome.problem);
        outcome.parsed
    }

    #[test]
    fn test_forms() {
        let cases: Vec<(&str, &str, Vec<&str>, &str, Kind)> = vec![
            ("function () {}", "", vec![], "", Kind::StandardFunction),
            ("function foobar () {}", "foobar", vec![], "", Kind::StandardFunction),
            ("function(){}", "", vec![], "", Kind::StandardFunction),
            ("function (a,x,b,y) {}", "", vec!["a", "x", "b", "y"], "", Kind::StandardFunction),
            (
                "function something (alpha,bravo,charlie) {return alpha+bravo+charlie;}",
                "something",
                vec!["alpha", "bravo", "charlie"],
                "return alpha+bravo+charlie;",
                Kind::StandardFunction,
            ),
            ("function* () {}", "", vec![], "", Kind::GeneratorFunction),
            ("function *foobar() {}", "foobar", vec![], "", Kind::GeneratorFunction),
            (
                "function* something (alpha,bravo,charlie) {return alpha+bravo+charlie;}",
                "something",
                vec!["alpha", "bravo", "charlie"],
                "return alpha+bravo+charlie;",
                Kind::GeneratorFunction,
            ),
        ];
        cases.into_iter().for_each(|(source, name, params, body, kind)| {
            println!("{:?}", source);
            let p = parsed(source);
            assert_eq!(p.name, name);
            assert_eq!(p.params, params);
            assert_eq!(p.body, body);
            assert_eq!(p.kind, kind);
        })
    }

    #[test]
    fn test_confounding_bodies() {
        let cases = vec![
            (
                "function () {var x = {}; if (true) {x=5;} return x;}",
                "var x = {}; if (true) {x=5;} return x;",
            ),
            ("function () {console.log('}');return;}", "console.log('}');return;"),
            ("function () {\"}\"; return;}", "\"}\"; return;"),
            ("function () {// }\nreturn;}", "// }\nreturn;"),
            ("function () {/*}*/return;}", "/*}*/return;"),
        ];
        cases.into_iter().for_each(|(source, body)| {
            println!("{:?}", source);
            assert_eq!(parsed(source).body, body);
        })
    }

    #[test]
    fn test_confounding_params() {
        let cases: Vec<(&str, Vec<&str>)> = vec![
            ("function (foo, bar=someCall(), baz) {}", vec!["foo", " bar=someCall()", " baz"]),
            ("function (a,b=\")\",c) {}", vec!["a", "b=\")\"", "c"]),
            ("function (// )\nx,y,z) {}", vec!["// )\nx", "y", "z"]),
            ("function (x,y/*)*/,z) {}", vec!["x", "y/*)*/", "z"]),
        ];
        cases.into_iter().for_each(|(source, params)| {
            println!("{:?}", source);
            assert_eq!(parsed(source).params, params);
        })
    }

    #[test]
    fn test_trailing_text_is_not_captured() {
        let p = extract("function f(a) {return a;} (1)").parsed;
        assert_eq!(p.params, vec!["a"]);
        assert_eq!(p.body, "return a;");
    }

    #[test]
    fn test_unbalanced_trailing_text_is_ignored() {
        ["function f(a) {return a;} (", "function f(a) {return a;} {[", "function f(a) {return a;}'"]
            .iter()
            .for_each(|source| {
                println!("{:?}", source);
                let outcome = extract(source);
                assert!(outcome.problem.is_none(), "{:?}", outcome.problem);
                assert_eq!(outcome.parsed.body, "return a;");
            })
    }

    #[test]
    fn test_missing_parameter_list() {
        let outcome = extract("function broken {}");
        assert_eq!(outcome.parsed.name, "broken {}");
        assert!(matches!(
            outcome.problem,
            Some(Error::MissingParameterList { .. })
        ));
    }

    #[test]
    fn test_unterminated_body() {
        let outcome = extract("function f() { if (x) {");
        assert_eq!(outcome.parsed.body, " if (x) {");
        match outcome.problem {
            Some(Error::UnbalancedDelimiters { unclosed }) => {
                assert_eq!(unclosed, vec!["}", "}"])
            }
            other => panic!("expected unbalanced, got {:?}", other),
        }
    }
}
