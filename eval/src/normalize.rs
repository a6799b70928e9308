//! Deep forcing: turns a head-normal [`Value`] into a fully evaluated
//! [`NormalValue`] tree (spec.md §3, §4.6).
//!
//! Atoms, strings, paths, and builtins are already in normal form and
//! pass through unchanged. Lists and sets recurse into every element;
//! functions stay opaque past their parameter shape (forcing a
//! function's body would mean calling it, which normalization must
//! not do).

use crate::errors::EvalResult;
use crate::eval::Evaluator;
use crate::value::{NormalValue, Value};

pub fn normalize(ev: &Evaluator, value: Value) -> EvalResult<NormalValue> {
    match value {
        Value::Constant(a) => Ok(NormalValue::Constant(a)),
        Value::Str(s) => Ok(NormalValue::Str(s)),
        Value::LiteralPath(p) => Ok(NormalValue::LiteralPath(p)),
        Value::EnvPath(p) => Ok(NormalValue::EnvPath(p)),
        Value::Builtin(b) => Ok(NormalValue::Builtin(b.name())),

        Value::List(list) => {
            let mut items = Vec::with_capacity(list.len());
            for thunk in list.iter() {
                let forced = thunk.force(ev)?;
                items.push(normalize(ev, forced)?);
            }
            Ok(NormalValue::List(items))
        }

        Value::Set(attrs) => {
            let mut map = std::collections::BTreeMap::new();
            for (name, thunk) in attrs.iter() {
                let forced = thunk.force(ev)?;
                map.insert(name.clone(), normalize(ev, forced)?);
            }
            Ok(NormalValue::Set(map))
        }

        // A function's body can only be evaluated once bound to a
        // call-site argument; deep-forcing must not invent one, so
        // functions stay opaque past their parameter shape, the same
        // way real Nix's `deepSeq`/`builtins.trace` never descend into
        // a lambda's body.
        Value::Function(func) => Ok(NormalValue::Function(func.params.clone())),
    }
}
