//! Template interpolation for action messages.
//!
//! Supports:
//! - `{{ $1 }}`, `{{ $2 }}` - Positional capture groups
//! - `{{ $name }}` - Named capture groups
//! - `{{ $rule }}`, `{{ $file_path }}` - Values supplied by the engine

use std::collections::BTreeMap;

/// Captures from a regex match for template interpolation.
///
/// Keys are `"0"`, `"1"`, `"2"` for positional groups and the group name for
/// named groups. Ordered so reports list captures deterministically.
pub type Captures = BTreeMap<String, String>;

const OPEN: &str = "{{ $";
const CLOSE: &str = " }}";

/// Interpolate a template string with the given captures.
///
/// The template is scanned once, so a captured value that itself looks like a
/// placeholder is inserted verbatim. Placeholders without a matching capture
/// are left as-is.
///
/// # Examples
///
/// ```
/// use rulecheck::template::{Captures, interpolate};
///
/// let mut captures = Captures::new();
/// captures.insert("1".to_string(), "foo".to_string());
/// captures.insert("var".to_string(), "bar".to_string());
///
/// let result = interpolate("Use {{ $var }} instead of {{ $1 }}", &captures);
/// assert_eq!(result, "Use bar instead of foo");
/// ```
pub fn interpolate(template: &str, captures: &Captures) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let substitution = placeholder_key(after_open)
            .and_then(|key| captures.get(key).map(|value| (key.len(), value)));
        match substitution {
            Some((key_len, value)) => {
                result.push_str(value);
                rest = &after_open[key_len + CLOSE.len()..];
            }
            None => {
                result.push_str(OPEN);
                rest = after_open;
            }
        }
    }

    result.push_str(rest);
    result
}

/// The key of the placeholder starting at `s`, which follows an opening `{{ $`.
fn placeholder_key(s: &str) -> Option<&str> {
    let key = &s[..s.find(CLOSE)?];
    let valid = !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then_some(key)
}
