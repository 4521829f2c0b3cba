use std::io;
use std::io::Read;

use anyhow::{bail, Context, Result};
use clap::{App, Arg};
use serde_json;
use serde_json::Value;

use farse_rs::{inverse, IterResult, Output, ParseOptions};

fn configure_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.version(env!("CARGO_PKG_VERSION"))
        .about(
            "Break JavaScript function source into its name, parameters and body.\n\
            \n\
            When no <source> is given, or <source> is -, read from stdin.\n\
            \n\
            The parsed record is written to stdout as JSON. With --call, the\n\
            function is rebuilt and called instead, and its result is written.",
        )
        .arg(
            Arg::with_name("source")
                .help("JavaScript function source. May be provided as stdin.")
                .required(false)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("strict")
                .long("strict")
                .help("Fail on malformed source instead of printing a best-effort record"),
        )
        .arg(
            Arg::with_name("call")
                .long("call")
                .value_name("ARGS")
                .help("Rebuild the function and call it with a JSON array of arguments")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("inexact")
                .long("inexact")
                .requires("call")
                .help("Rebuild from the parameters and body alone, as an anonymous function"),
        )
        .after_help(
            r#"EXAMPLES:
    farse 'function sum(a, b) { return a + b; }'
    farse --call '[10, 20]' '(a, b) => a + b'
    echo 'function* g(a) { yield a; }' | farse --call '[1]'

Generators are run to completion, and each step is written as
{"value": ..., "done": ...}."#,
        )
}

/// Every step a generator takes, ending with its return value.
fn drain(mut generator: farse_rs::Generator) -> Vec<IterResult> {
    let mut steps = Vec::new();
    loop {
        let step = generator.step();
        let done = step.done;
        steps.push(step);
        if done {
            return steps;
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let app = configure_args(App::new("farse"));
    let matches = app.get_matches();

    let source_arg = matches.value_of("source").unwrap_or("-");
    let source = match source_arg {
        "-" => {
            let mut source = String::new();
            io::stdin().lock().read_to_string(&mut source)?;
            source
        }
        _ => source_arg.to_string(),
    };

    let options = ParseOptions {
        strict: matches.is_present("strict"),
    };
    let parsed =
        farse_rs::parse_with(&source, &options).context("Could not parse function source")?;

    let call_args = match matches.value_of("call") {
        Some(call_args) => call_args,
        None => {
            println!("{}", serde_json::to_string(&parsed)?);
            return Ok(());
        }
    };
    let args: Vec<Value> = match serde_json::from_str::<Value>(call_args)
        .context("Could not parse call arguments as JSON")?
    {
        Value::Array(args) => args,
        other => bail!("Call arguments must be a JSON array, got {}", other),
    };

    let function = match matches.is_present("inexact") {
        true => inverse::inexact(&parsed),
        false => inverse::exact(&parsed),
    }
    .context("Could not rebuild function")?;

    let result = match function.call(&args).context("Could not call function")? {
        Output::Value(value) => value,
        Output::Generator(generator) => serde_json::to_value(drain(generator))?,
    };
    println!("{}", result.to_string());

    Ok(())
}
