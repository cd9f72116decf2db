//! Guards the render context against prototype pollution.
//!
//! The batch render context is arbitrary caller JSON that gets inlined into
//! the sandbox as an object literal. Keys like `__proto__` would let it
//! pollute `Object.prototype` for every subsequent render in the batch, so
//! the context is rejected up front instead of silently rewritten.

use serde_json::Value;
use thiserror::Error;

/// Nesting ceiling; deeper contexts are rejected rather than walked.
const MAX_DEPTH: usize = 64;

const FORBIDDEN_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("render context key '{0}' could pollute Object.prototype inside the sandbox")]
    ForbiddenKey(String),
    #[error("render context nests deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// Validates a render context before it is handed to the sandbox.
pub fn check_render_context(context: &Value) -> Result<(), ContextError> {
    walk(context, 0)
}

fn walk(value: &Value, depth: usize) -> Result<(), ContextError> {
    if depth > MAX_DEPTH {
        return Err(ContextError::TooDeep);
    }
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if FORBIDDEN_KEYS.contains(&key.as_str()) {
                    return Err(ContextError::ForbiddenKey(key.clone()));
                }
                walk(nested, depth + 1)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                walk(item, depth + 1)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_ordinary_context() {
        let context = json!({
            "site": { "title": "Example", "locale": "en" },
            "nav": [{ "label": "Home", "href": "/" }],
        });
        assert_eq!(check_render_context(&context), Ok(()));
    }

    #[test]
    fn rejects_proto_key_at_any_level() {
        let context = json!({ "outer": { "inner": { "__proto__": { "polluted": 1 } } } });
        assert_eq!(
            check_render_context(&context),
            Err(ContextError::ForbiddenKey("__proto__".to_string()))
        );
    }

    #[test]
    fn rejects_constructor_inside_arrays() {
        let context = json!({ "items": [{ "ok": 1 }, { "constructor": {} }] });
        assert!(matches!(
            check_render_context(&context),
            Err(ContextError::ForbiddenKey(_))
        ));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut context = json!(true);
        for _ in 0..(MAX_DEPTH + 2) {
            context = json!([context]);
        }
        assert_eq!(check_render_context(&context), Err(ContextError::TooDeep));
    }
}
