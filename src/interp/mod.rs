//! Interpreter
//!
//! A small interpreter for the function bodies the extractors produce.
//! Arguments and results are JSON values. Inside a call, arrays and
//! objects are shared handles (see [`value`]). Operators follow the
//! JavaScript abstract operations in [`crate::js_op`], and the supported
//! globals live in [`builtins`].

use log::debug;
use serde_json::Value;

use crate::error::Error;

pub mod ast;
pub mod builtins;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

use ast::{Param, Stmt};
use eval::Interpreter;

/// The result of running a program to completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The returned value, or null if the body fell off the end
    pub value: Value,
    /// Everything the body yielded, in order
    pub yields: Vec<Value>,
}

/// A compiled parameter list and body
#[derive(Debug, Clone)]
pub struct Program {
    params: Vec<Param>,
    body: Vec<Stmt>,
}

impl Program {
    /// Compile parameter fragments and a body.
    ///
    /// Blank fragments are skipped, so `["a", " "]` declares one parameter.
    pub fn compile(params: &[String], body: &str, generator: bool) -> Result<Self, Error> {
        let params = params
            .iter()
            .filter(|fragment| !fragment.trim().is_empty())
            .map(|fragment| parser::parse_param(fragment))
            .collect::<Result<Vec<Param>, Error>>()?;
        if let Some(pos) = params.iter().position(|param| param.rest) {
            if pos + 1 != params.len() {
                return Err(Error::Syntax {
                    offset: 0,
                    reason: "rest parameter must be last".into(),
                });
            }
        }
        let body = parser::parse_program(body, generator)?;
        debug!(
            "Compiled {} parameter(s) and {} statement(s)",
            params.len(),
            body.len()
        );
        Ok(Program { params, body })
    }

    /// The number of parameters before the first default or rest parameter.
    pub fn length(&self) -> usize {
        self.params
            .iter()
            .take_while(|param| param.is_simple())
            .count()
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|param| param.name.as_str()).collect()
    }

    /// Run the body with the given arguments.
    ///
    /// Missing arguments are null. A default applies when its argument is
    /// missing or null.
    pub fn run(&self, args: &[Value], step_limit: usize) -> Result<Completion, Error> {
        let mut interpreter = Interpreter::new(step_limit);
        for (idx, param) in self.params.iter().enumerate() {
            let value = match (param.rest, args.get(idx), &param.default) {
                (true, _, _) => {
                    interpreter.adopt(Value::Array(args.iter().skip(idx).cloned().collect()))?
                }
                (false, Some(arg), _) if !arg.is_null() => interpreter.adopt(arg.clone())?,
                (false, _, Some(default)) => interpreter.eval(default)?,
                (false, arg, None) => interpreter.adopt(arg.cloned().unwrap_or(Value::Null))?,
            };
            interpreter.bind(&param.name, value);
        }
        let value = interpreter.execute(&self.body)?;
        Ok(Completion {
            value,
            yields: interpreter.into_yields(),
        })
    }
}

#[cfg(test)]
mod test_program {
    use super::*;
    use serde_json::json;

    const LIMIT: usize = 100_000;

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn run(names: &[&str], body: &str, args: Vec<Value>) -> Result<Value, Error> {
        Program::compile(&params(names), body, false)?
            .run(&args, LIMIT)
            .map(|completion| completion.value)
    }

    #[test]
    fn test_bodies() {
        let cases: Vec<(Vec<&str>, &str, Vec<Value>, Value)> = vec![
            (vec!["a", "b"], "return a+b;", vec![json!(10), json!(20)], json!(30)),
            (vec!["a", "b"], "return a+b;", vec![json!("a"), json!(1)], json!("a1")),
            (vec!["n"], "return n*100;", vec![json!(2)], json!(200)),
            (vec!["obj"], "return obj.prop;", vec![json!({"prop": [1]})], json!([1])),
            (vec![], "", vec![], json!(null)),
            (vec![], "return;", vec![], json!(null)),
            (
                vec![],
                "var x = {}; if (true) {x=5;} return x;",
                vec![],
                json!(5),
            ),
            (vec![], "console.log('}');return;", vec![], json!(null)),
            (vec![], "// }\nreturn 1;", vec![], json!(1)),
            (vec![], "/*}*/return 2;", vec![], json!(2)),
            (
                vec!["n"],
                "let total = 0; for (let i = 1; i <= n; i++) { if (i % 2) continue; total += i; } return total;",
                vec![json!(10)],
                json!(30),
            ),
            (
                vec!["n"],
                "var fib = [0, 1]; while (fib.length <= n) { fib.push(fib[fib.length - 1] + fib[fib.length - 2]); } return fib[n];",
                vec![json!(10)],
                json!(55),
            ),
            (
                vec!["xs"],
                "const out = []; for (var i = 0; i < xs.length; i++) { if (xs[i] === null) break; out.push(xs[i] * 2); } return out.join('-');",
                vec![json!([1, 2, null, 4])],
                json!("2-4"),
            ),
            (
                vec!["s"],
                "return typeof s === 'string' ? s.trim().toUpperCase() : String(s);",
                vec![json!("  hi ")],
                json!("HI"),
            ),
            (vec!["a"], "return a ?? 'fallback';", vec![], json!("fallback")),
            (vec!["a"], "return a || a === 0 && 'zero';", vec![json!(0)], json!("zero")),
            (vec![], "return Math.max(1, 5, 3) + Math.floor(Math.PI);", vec![], json!(8)),
            (vec![], "return 2 ** 3 ** 2;", vec![], json!(512)),
            (vec![], "let o = {a: {b: 1}}; o.a.b += 2; o.a['c'] = [o.a.b]; return o;", vec![], json!({"a": {"b": 3, "c": [3]}})),
            (vec![], "let i = 5; let j = i++; return [i, j, ++i, -i, !i];", vec![], json!([6, 5, 7, -7, false])),
            (vec![], "undeclared = 4; return undeclared;", vec![], json!(4)),
            (vec![], "x = hoisted; var hoisted = 1; return x;", vec![], json!(null)),
            (vec![], "return typeof nothing + typeof Math.max + typeof null;", vec![], json!("undefinedfunctionobject")),
            (vec![], "let s = 'abc'; return s[1] + s.length + s.slice(1).indexOf('c');", vec![], json!("b31")),
            (vec![], "return JSON.stringify({a: [1, 'b']});", vec![], json!("{\"a\":[1,\"b\"]}")),
        ];
        cases.into_iter().for_each(|(names, body, args, exp)| {
            println!("{:?}", body);
            assert_eq!(run(&names, body, args).unwrap(), exp);
        })
    }

    #[test]
    fn test_block_scoping() {
        let body = "let x = 1; { let x = 2; var y = x; } return [x, y];";
        assert_eq!(run(&[], body, vec![]).unwrap(), json!([1, 2]));
        assert!(matches!(
            run(&[], "{ let inner = 1; } return inner;", vec![]),
            Err(Error::UndefinedVariable(name)) if name == "inner"
        ));
    }

    #[test]
    fn test_params() {
        let names = ["a", " b = a + 1", " ...rest"];
        let program = Program::compile(&params(&names), "return [a, b, rest];", false).unwrap();
        assert_eq!(program.length(), 1);
        assert_eq!(program.param_names(), vec!["a", "b", "rest"]);
        let cases = vec![
            (vec![json!(1)], json!([1, 2, []])),
            (vec![json!(1), json!(null)], json!([1, 2, []])),
            (vec![json!(1), json!(5), json!(6), json!(7)], json!([1, 5, [6, 7]])),
            (vec![], json!([null, 1, []])),
        ];
        cases.into_iter().for_each(|(args, exp)| {
            println!("{:?}", &args);
            assert_eq!(program.run(&args, LIMIT).unwrap().value, exp);
        })
    }

    #[test]
    fn test_blank_params_are_skipped() {
        let program = Program::compile(&params(&[" "]), "return 1;", false).unwrap();
        assert_eq!(program.length(), 0);
    }

    #[test]
    fn test_rest_must_be_last() {
        assert!(matches!(
            Program::compile(&params(&["...a", "b"]), "", false),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_generator_collects_yields() {
        let program =
            Program::compile(&params(&["a", "b"]), "yield a+b; return a-b;", true).unwrap();
        let completion = program.run(&[json!(10), json!(20)], LIMIT).unwrap();
        assert_eq!(completion.yields, vec![json!(30)]);
        assert_eq!(completion.value, json!(-10));

        let program = Program::compile(
            &params(&["n"]),
            "for (let i = 0; i < n; i++) yield i * i;",
            true,
        )
        .unwrap();
        let completion = program.run(&[json!(4)], LIMIT).unwrap();
        assert_eq!(completion.yields, vec![json!(0), json!(1), json!(4), json!(9)]);
        assert_eq!(completion.value, json!(null));
    }

    #[test]
    fn test_runtime_errors() {
        assert!(matches!(
            run(&[], "return missing;", vec![]),
            Err(Error::UndefinedVariable(_))
        ));
        assert!(matches!(
            run(&[], "const c = 1; c = 2;", vec![]),
            Err(Error::ConstAssignment(_))
        ));
        assert!(matches!(
            run(&[], "let n = 1; n();", vec![]),
            Err(Error::NotCallable(_))
        ));
        assert!(matches!(
            run(&[], "return Math.abs();", vec![]),
            Err(Error::WrongArgumentCount { .. })
        ));
        assert!(matches!(
            run(&[], "return null.x;", vec![]),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            run(&[], "return 1 / 0;", vec![]),
            Err(Error::UnrepresentableNumber { .. })
        ));
        assert!(matches!(run(&[], "break;", vec![]), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_step_limit() {
        ["while (true) {}", "for (;;);", "while (1) { let x = 1; }"]
            .iter()
            .for_each(|body| {
                println!("{:?}", body);
                assert!(matches!(
                    run(&[], body, vec![]),
                    Err(Error::StepLimitExceeded(LIMIT))
                ));
            })
    }

    #[test]
    fn test_arrays_and_objects_compare_by_identity() {
        let cases = vec![
            (
                "let a = [1]; let o = {}; return [a === a, o === o, [a].indexOf(a), [a].includes(a)];",
                json!([true, true, 0, true]),
            ),
            ("let a = [1]; return [a == a, a != a, a !== a];", json!([true, false, false])),
            ("return [[1] === [1], [1] == [1], {} == {}];", json!([false, false, false])),
            ("let a = [1]; return [[1].indexOf(a), [[1]].includes(a)];", json!([-1, false])),
            ("let a = [1]; let b = a; return [a === b, [b].indexOf(a)];", json!([true, 0])),
            ("let o = {k: [2]}; return o.k === o.k;", json!(true)),
            ("return [[1] == 1, [1, 2] == '1,2'];", json!([true, true])),
        ];
        cases.into_iter().for_each(|(body, exp)| {
            println!("{:?}", body);
            assert_eq!(run(&[], body, vec![]).unwrap(), exp);
        })
    }

    #[test]
    fn test_aliases_share_mutations() {
        let cases = vec![
            ("let a = []; let b = a; b.push(1); return a;", json!([1])),
            ("let a = [0]; let b = a; b[1] = 2; return a;", json!([0, 2])),
            ("let o = {}; let p = o; p.x = 1; return o;", json!({"x": 1})),
            ("let inner = []; let outer = {inner}; outer.inner.push(3); return inner;", json!([3])),
            ("let a = [1]; let b = a.slice(); b.push(2); return [a, b];", json!([[1], [1, 2]])),
        ];
        cases.into_iter().for_each(|(body, exp)| {
            println!("{:?}", body);
            assert_eq!(run(&[], body, vec![]).unwrap(), exp);
        });
        assert_eq!(
            run(&["xs"], "let ys = xs; ys.push(2); return xs;", vec![json!([1])]).unwrap(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_circular_values_cannot_leave() {
        assert!(matches!(
            run(&[], "let a = []; a.push(a); return a;", vec![]),
            Err(Error::InvalidArgument { .. })
        ));
        assert_eq!(
            run(&[], "let a = []; a.push(a); return a[0] === a;", vec![]).unwrap(),
            json!(true)
        );
        assert_eq!(
            run(&[], "let a = []; for (let i = 0; i < 5000; i++) a = [a]; return 1;", vec![])
                .unwrap(),
            json!(1)
        );
    }

    #[test]
    fn test_long_expressions_are_rejected() {
        let body = format!("return {}1;", "1+".repeat(5000));
        assert!(matches!(
            run(&[], &body, vec![]),
            Err(Error::Syntax { reason, .. }) if reason == "nesting is too deep"
        ));
        let body = format!("return {}1;", "1+".repeat(100));
        assert_eq!(run(&[], &body, vec![]).unwrap(), json!(101));
    }

    #[test]
    fn test_memory_is_bounded() {
        const DEFAULT: usize = crate::inverse::DEFAULT_STEP_LIMIT;
        let run_with = |body: &str, limit: usize| -> Result<Value, Error> {
            Program::compile(&[], body, false)?
                .run(&[], limit)
                .map(|completion| completion.value)
        };
        let cases = vec![
            "let s = 'ab'; while (true) s += s;",
            "let a = []; a[2000000] = 1;",
            "let s = 'abcd'; while (true) s = s.concat(s);",
            "let a = [1]; a.push(a); return JSON.stringify(a);",
        ];
        cases.into_iter().for_each(|body| {
            println!("{:?}", body);
            assert!(matches!(
                run_with(body, DEFAULT),
                Err(Error::InvalidArgument { .. })
            ));
        });
        let cases = vec![
            "let a = []; while (true) a[a.length + 60000] = 1;",
            "let a = [1]; while (true) a = a.concat(a);",
            "let o = {}; let i = 0; while (true) o['k' + i++] = [i];",
        ];
        cases.into_iter().for_each(|body| {
            println!("{:?}", body);
            assert!(matches!(
                run_with(body, DEFAULT),
                Err(Error::StepLimitExceeded(DEFAULT))
            ));
        })
    }

    #[test]
    fn test_const_contents_are_mutable() {
        assert_eq!(
            run(&[], "const xs = [1]; xs.push(2); xs[2] = 3; return xs;", vec![]).unwrap(),
            json!([1, 2, 3])
        );
    }
}
