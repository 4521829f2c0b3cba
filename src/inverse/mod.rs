//! Reconstruction
//!
//! Turn a [`ParsedFunction`] back into a callable [`Function`]. There are
//! two ways to do it:
//!
//! - [`inexact`] builds an anonymous function from the parameters and
//!   body alone, the way a `Function` constructor would. The name is
//!   always `"anonymous"`, and arrow records lose their arrow-ness.
//! - [`exact`] regenerates source text for the record and parses it
//!   again, so the name and form survive.
//!
//! ```rust
//! use serde_json::json;
//! use farse_rs::{inverse, parse};
//!
//! let parsed = parse("function sum(a, b) { return a + b; }");
//! let sum = inverse::exact(&parsed).unwrap();
//! assert_eq!(sum.name(), "sum");
//! assert_eq!(sum.length(), 2);
//! assert_eq!(sum.call(&[json!(10), json!(20)]).unwrap().into_value(), json!(30));
//! ```

use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;

use crate::error::Error;
use crate::function::{Kind, ParsedFunction};
use crate::interp::Program;

/// Steps a single call may take. Each statement and loop iteration is a
/// step, and so is each allocated array slot or 64 bytes of string.
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

const ANONYMOUS: &str = "anonymous";

/// A reconstructed, callable function
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    params: Vec<String>,
    kind: Kind,
    source: String,
    program: Program,
    step_limit: usize,
}

/// What calling a [`Function`] produced
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Value(Value),
    Generator(Generator),
}

impl Output {
    /// The returned value, or null for a generator.
    pub fn into_value(self) -> Value {
        match self {
            Output::Value(value) => value,
            Output::Generator(_) => Value::Null,
        }
    }

    pub fn into_generator(self) -> Option<Generator> {
        match self {
            Output::Generator(generator) => Some(generator),
            Output::Value(_) => None,
        }
    }
}

/// One step of a generator, shaped like a JavaScript iterator result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterResult {
    pub value: Value,
    pub done: bool,
}

/// The iterator returned by calling a generator function.
///
/// The body has already run to completion when the generator is created,
/// so stepping it only replays what was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    yields: VecDeque<Value>,
    returned: Option<Value>,
}

impl Generator {
    /// Advance like JavaScript's `next()`.
    ///
    /// Each yielded value comes back with `done: false`, then the return
    /// value with `done: true`, then `{value: null, done: true}` forever.
    pub fn step(&mut self) -> IterResult {
        match self.yields.pop_front() {
            Some(value) => IterResult { value, done: false },
            None => IterResult {
                value: self.returned.take().unwrap_or(Value::Null),
                done: true,
            },
        }
    }
}

impl Iterator for Generator {
    type Item = Value;

    /// The yielded values, without the return value
    fn next(&mut self) -> Option<Value> {
        self.yields.pop_front()
    }
}

/// Source text the `Function` constructor would report
fn anonymous_source(parsed: &ParsedFunction) -> String {
    let keyword = match parsed.kind {
        Kind::GeneratorFunction => "function*",
        _ => "function",
    };
    format!(
        "{} {}({}\n) {{\n{}\n}}",
        keyword,
        ANONYMOUS,
        parsed.params.join(","),
        parsed.body
    )
}

/// Rebuild a function from its parameters and body alone.
///
/// Generator records stay generators; everything else becomes a standard
/// function named `anonymous`.
pub fn inexact(parsed: &ParsedFunction) -> Result<Function, Error> {
    let kind = match parsed.kind {
        Kind::GeneratorFunction => Kind::GeneratorFunction,
        _ => Kind::StandardFunction,
    };
    let program = Program::compile(&parsed.params, &parsed.body, parsed.is_generator())?;
    debug!("Rebuilt anonymous {} with length {}", kind, program.length());
    Ok(Function {
        name: String::from(ANONYMOUS),
        params: parsed.params.clone(),
        kind,
        source: anonymous_source(parsed),
        program,
        step_limit: DEFAULT_STEP_LIMIT,
    })
}

/// Rebuild a function from regenerated source, keeping its name and form.
pub fn exact(parsed: &ParsedFunction) -> Result<Function, Error> {
    let source = parsed.to_source();
    let reparsed = crate::parse_strict(&source)?;
    let program = Program::compile(&reparsed.params, &reparsed.body, reparsed.is_generator())?;
    debug!(
        "Rebuilt {} {:?} with length {}",
        reparsed.kind,
        reparsed.name,
        program.length()
    );
    Ok(Function {
        name: reparsed.name,
        params: reparsed.params,
        kind: reparsed.kind,
        source,
        program,
        step_limit: DEFAULT_STEP_LIMIT,
    })
}

impl Function {
    /// Replace the per-call step limit.
    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of parameters before the first default or rest parameter
    pub fn length(&self) -> usize {
        self.program.length()
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_arrow(&self) -> bool {
        self.kind == Kind::ArrowFunction
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The raw parameter fragments the function was built from
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Call the function.
    ///
    /// A generator function runs its whole body immediately and returns a
    /// [`Generator`] replaying what it yielded.
    pub fn call(&self, args: &[Value]) -> Result<Output, Error> {
        let completion = self.program.run(args, self.step_limit)?;
        match self.kind {
            Kind::GeneratorFunction => Ok(Output::Generator(Generator {
                yields: completion.yields.into(),
                returned: Some(completion.value),
            })),
            _ => Ok(Output::Value(completion.value)),
        }
    }
}

#[cfg(test)]
mod test_inverse {
    use super::*;
    use crate::parse;
    use serde_json::json;

    fn sources() -> Vec<&'static str> {
        vec![
            "function (a,b) {return a+b;}",
            "function sum (a,b) {return a+b;}",
            "(a,b)=>a+b",
            "(a,b)=>{return a+b;}",
        ]
    }

    #[test]
    fn test_inexact() {
        sources().into_iter().for_each(|source| {
            println!("{:?}", source);
            let func = inexact(&parse(source)).unwrap();
            assert_eq!(func.name(), "anonymous");
            assert_eq!(func.length(), 2);
            assert!(!func.is_arrow());
            assert!(func.source().starts_with("function anonymous(a,b\n) {\n"));
            assert_eq!(
                func.call(&[json!(10), json!(20)]).unwrap(),
                Output::Value(json!(30))
            );
        })
    }

    #[test]
    fn test_exact() {
        sources().into_iter().for_each(|source| {
            println!("{:?}", source);
            let parsed = parse(source);
            let func = exact(&parsed).unwrap();
            assert_eq!(func.name(), parsed.name);
            assert_eq!(func.length(), 2);
            assert_eq!(func.kind(), parsed.kind);
            assert_eq!(func.is_arrow(), !func.source().starts_with("function"));
            assert_eq!(
                func.call(&[json!(10), json!(20)]).unwrap().into_value(),
                json!(30)
            );
        })
    }

    #[test]
    fn test_generators() {
        let parsed = parse("function* gen (a,b) {yield a+b; return a-b;}");
        let funcs = vec![inexact(&parsed).unwrap(), exact(&parsed).unwrap()];
        assert_eq!(funcs[0].name(), "anonymous");
        assert_eq!(funcs[1].name(), "gen");
        funcs.into_iter().for_each(|func| {
            assert_eq!(func.kind(), Kind::GeneratorFunction);
            let mut generator = func
                .call(&[json!(10), json!(20)])
                .unwrap()
                .into_generator()
                .unwrap();
            assert_eq!(generator.step(), IterResult { value: json!(30), done: false });
            assert_eq!(generator.step(), IterResult { value: json!(-10), done: true });
            assert_eq!(generator.step(), IterResult { value: json!(null), done: true });
        })
    }

    #[test]
    fn test_generator_iterates_yields() {
        let parsed = parse("function* (n) { for (let i = 0; i < n; i++) yield i; }");
        let generator = inexact(&parsed)
            .unwrap()
            .call(&[json!(3)])
            .unwrap()
            .into_generator()
            .unwrap();
        assert_eq!(generator.collect::<Vec<Value>>(), vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_iter_result_serializes_like_js() {
        assert_eq!(
            serde_json::to_value(IterResult { value: json!(30), done: false }).unwrap(),
            json!({"value": 30, "done": false})
        );
    }

    #[test]
    fn test_step_limit() {
        let func = inexact(&parse("function () { while (true) {} }"))
            .unwrap()
            .with_step_limit(50);
        assert!(matches!(func.call(&[]), Err(Error::StepLimitExceeded(50))));
    }

    #[test]
    fn test_unsupported_bodies_fail_to_compile() {
        assert!(matches!(
            inexact(&parse("function () { return new Date(); }")),
            Err(Error::Unsupported { .. })
        ));
        assert!(matches!(
            exact(&parse("function (a) { return a +; }")),
            Err(Error::Syntax { .. })
        ));
    }
}
