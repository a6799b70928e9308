//! Attribute path resolution and the `alter` primitive used to build
//! (possibly nested) attribute sets from dotted bindings (spec.md §4.4,
//! §4.5).

use codemap::Span;

use crate::ast::AttrName;
use crate::errors::{Error, ErrorKind, EvalResult};
use crate::eval::Evaluator;
use crate::scope::Env;
use crate::value::{NixAttrs, NixString, Thunk, Value};

/// Evaluates every segment of an AST attribute path to a concrete
/// [`NixString`] key. Dynamic segments (`${expr}`) are evaluated and
/// coerced to a string *without* context (spec.md §4.4: "coercing
/// without context").
pub fn resolve(ev: &Evaluator, env: &Env, segments: &[AttrName]) -> EvalResult<Vec<NixString>> {
    segments
        .iter()
        .map(|seg| match seg {
            AttrName::Static(name) => Ok(name.clone()),
            AttrName::Dynamic(expr) => {
                let value = ev.eval_expr(env, expr)?;
                let s = ev.coerce_to_string(&value, expr.span())?;
                Ok(s.without_context())
            }
        })
        .collect()
}

/// Looks up a (possibly multi-segment) path in `attrs`, returning
/// `None` as soon as any segment is missing, and erroring if an
/// intermediate segment names something that is not itself a set
/// (spec.md §4.4's `Select`/`HasAttr` rule).
pub fn select(
    ev: &Evaluator,
    attrs: &NixAttrs,
    path: &[NixString],
    span: Span,
) -> EvalResult<Option<Thunk>> {
    let (head, rest) = match path.split_first() {
        Some(x) => x,
        None => return Ok(None),
    };

    let Some(thunk) = attrs.select(head.as_str()) else {
        return Ok(None);
    };

    if rest.is_empty() {
        return Ok(Some(thunk.clone()));
    }

    match thunk.force(ev)? {
        Value::Set(nested) => select(ev, &nested, rest, span),
        other => Err(Error::new(
            ErrorKind::NotASet {
                prefix: vec![head.to_string()],
                actual: other.type_name(),
            },
            span,
        )),
    }
}

/// Inserts `leaf` at `path` inside `attrs`, creating intermediate
/// nested sets as needed (spec.md §4.5: `a.b.c = value;` constructs
/// `{ a = { b = { c = value; }; }; }`). `leaf` receives whatever thunk
/// (if any) already occupied the final path segment, so duplicate
/// top-level keys can be rejected by the caller.
///
/// `path` must have at least one segment; this is an invariant of
/// [`crate::ast::AttrPath`] construction, never of user input, so it is
/// asserted rather than reported as an [`EvalResult`] error.
pub fn alter(
    ev: &Evaluator,
    attrs: NixAttrs,
    path: &[NixString],
    span: Span,
    leaf: impl FnOnce(Option<Thunk>) -> EvalResult<Thunk>,
) -> EvalResult<NixAttrs> {
    let (head, rest) = path
        .split_first()
        .expect("attribute path must have at least one component");

    if rest.is_empty() {
        let existing = attrs.select(head.as_str()).cloned();
        let value = leaf(existing)?;
        return Ok(attrs.insert(head.clone(), value));
    }

    let nested = match attrs.select(head.as_str()) {
        Some(thunk) => match thunk.force(ev)? {
            Value::Set(s) => s,
            other => {
                return Err(Error::new(
                    ErrorKind::NotASet {
                        prefix: vec![head.to_string()],
                        actual: other.type_name(),
                    },
                    span,
                ))
            }
        },
        None => NixAttrs::empty(),
    };

    let updated = alter(ev, nested, rest, span, leaf)?;
    Ok(attrs.insert(head.clone(), Thunk::forced(Value::Set(updated))))
}
