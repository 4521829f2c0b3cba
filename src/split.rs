//! Parameter Splitting

use crate::scan::scan;

/// Split raw parameter-list text on its top-level commas.
///
/// Commas nested inside brackets, strings or comments never split. The
/// fragments are returned untrimmed, and the trailing fragment is always
/// kept, so empty text yields a single empty fragment.
///
/// ```rust
/// use farse_rs::split::split_params;
///
/// assert_eq!(
///     split_params("foo, bar=f(1, 2), baz"),
///     vec!["foo", " bar=f(1, 2)", " baz"]
/// );
/// assert_eq!(split_params(""), vec![""]);
/// ```
pub fn split_params(text: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut current = String::new();
    scan(text).for_each(|step| {
        if step.is_top_level() && step.ch == ',' {
            params.push(std::mem::take(&mut current));
        } else {
            current.push(step.ch);
        }
    });
    params.push(current);
    params
}

/// Split parameter text, treating blank text as an empty parameter list.
pub fn split_param_list(text: &str) -> Vec<String> {
    let params = split_params(text);
    match params.as_slice() {
        [only] if only.trim().is_empty() => Vec::new(),
        _ => params,
    }
}
