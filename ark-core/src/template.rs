//! Pure `{{name}}` parameter templating.

use crate::error::{EngineError, ErrorKind};
use std::collections::BTreeMap;

/// Substitute every `{{name}}` placeholder in `input` with `resolved[name]`.
///
/// Pure: no I/O, no clock reads. An unresolved placeholder is `ErrTemplate`
///, not a silent pass-through.
pub fn render(input: &str, resolved: &BTreeMap<String, String>) -> Result<String, EngineError> {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = input[i..].find("}}") {
                let name = input[i + 2..i + end].trim();
                let value = resolved.get(name).ok_or_else(|| {
                    EngineError::new(ErrorKind::Template, format!("unresolved template parameter '{{{{{name}}}}}'"))
                })?;
                out.push_str(value);
                i += end + 2;
                continue;
            }
        }
        let ch = input[i..].chars().next().expect("index within bounds");
        out.push(ch);
        i += ch.len_utf8();
    }
    Ok(out)
}
