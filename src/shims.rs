//! Placeholder globals injected into the sandbox before the bundle runs.
//!
//! Compiled bundles can reference build-time identifiers (`__filename`,
//! `process.env.NODE_ENV`) that have no meaning at generation time. The shim
//! map is a fixed, enumerated set of `{identifier: placeholder}` pairs turned
//! into one injection script, not ambient environment mutation. Browser
//! globals are intentionally absent so client-only code fails loudly and can
//! be diagnosed.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("shim global '{0}' is not a valid identifier")]
pub struct ShimError(pub String);

/// Default shim set: blank stand-ins for "current file" identifiers plus a
/// production-flavoured `process.env`.
pub fn default_shims() -> BTreeMap<String, Value> {
    [
        ("__filename", json!("")),
        ("__dirname", json!("")),
        ("process", json!({ "env": { "NODE_ENV": "production" } })),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

/// Builds the script that installs the shim map on `globalThis`.
///
/// Shim names must be plain identifiers; values are serialized as JSON,
/// which is a valid JavaScript expression.
pub fn injection_script(shims: &BTreeMap<String, Value>) -> Result<String, ShimError> {
    let mut script = String::new();
    for (name, value) in shims {
        if !is_identifier(name) {
            return Err(ShimError(name.clone()));
        }
        script.push_str("globalThis.");
        script.push_str(name);
        script.push_str(" = ");
        script.push_str(&value.to_string());
        script.push_str(";\n");
    }
    Ok(script)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shims_install_cleanly() {
        let script = injection_script(&default_shims()).unwrap();
        assert!(script.contains("globalThis.__filename = \"\";"));
        assert!(script.contains("globalThis.__dirname = \"\";"));
        assert!(script.contains("\"NODE_ENV\":\"production\""));
    }

    #[test]
    fn rejects_non_identifier_names() {
        let mut shims = BTreeMap::new();
        shims.insert("foo;globalThis.evil=1".to_string(), json!(1));
        assert_eq!(
            injection_script(&shims),
            Err(ShimError("foo;globalThis.evil=1".to_string()))
        );
    }

    #[test]
    fn rejects_empty_and_leading_digit_names() {
        for bad in ["", "1abc", "a-b", "a.b"] {
            let mut shims = BTreeMap::new();
            shims.insert(bad.to_string(), json!(null));
            assert!(injection_script(&shims).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn values_serialize_as_json_expressions() {
        let mut shims = BTreeMap::new();
        shims.insert("flags".to_string(), json!({ "beta": true, "count": 3 }));
        let script = injection_script(&shims).unwrap();
        assert!(script.contains(r#"globalThis.flags = {"beta":true,"count":3};"#));
    }
}
