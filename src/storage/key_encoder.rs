//! Deterministic storage keys.
//!
//! Keys are `"{descriptor}:{encoded params}"`, where the encoding is canonical JSON: object
//! members sorted by name at every depth, arrays kept in order. Two parameter maps with the
//! same members produce the same key whatever order they were built in.

use super::StoreResult;
use crate::action::ActionParams;
use serde_json::Value;
use std::fmt::Write;

/// Canonical JSON encoding of `value`
pub fn ordered_encode(value: &Value) -> StoreResult<String> {
    let mut out = String::new();
    write_ordered(value, &mut out)?;
    Ok(out)
}

fn write_ordered(value: &Value, out: &mut String) -> StoreResult<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (name, member)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(name)?);
                out.push(':');
                write_ordered(member, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_ordered(item, out)?;
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
    Ok(())
}

/// Canonical encoding of the defined parameters
pub fn encode_params(params: &ActionParams) -> StoreResult<String> {
    ordered_encode(&params.to_value())
}

/// Storage key of an action with `descriptor` and `params`
pub fn storage_key(descriptor: &str, params: &ActionParams) -> StoreResult<String> {
    Ok(format!("{descriptor}:{}", encode_params(params)?))
}
