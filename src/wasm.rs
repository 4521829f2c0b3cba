//! JavaScript bindings
//!
//! Exposes the parser to JS hosts. Records cross the boundary as plain
//! objects with `name`, `params`, `body` and `kind` fields.

use wasm_bindgen::prelude::*;

use crate::ParsedFunction;

fn to_js(parsed: &ParsedFunction) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(parsed).map_err(|err| JsValue::from(err.to_string()))
}

/// Parse function source, returning a best-effort record for malformed input.
#[wasm_bindgen]
pub fn farse(source: &str) -> Result<JsValue, JsValue> {
    to_js(&crate::parse(source))
}

/// Parse function source, throwing on malformed input.
#[wasm_bindgen(js_name = farseStrict)]
pub fn farse_strict(source: &str) -> Result<JsValue, JsValue> {
    let parsed = crate::parse_strict(source).map_err(|err| JsValue::from(err.to_string()))?;
    to_js(&parsed)
}

/// Regenerate source text for a record produced by `farse`.
#[wasm_bindgen(js_name = toSource)]
pub fn to_source(record: JsValue) -> Result<String, JsValue> {
    let parsed: ParsedFunction = serde_wasm_bindgen::from_value(record)
        .map_err(|err| JsValue::from(err.to_string()))?;
    Ok(parsed.to_source())
}
