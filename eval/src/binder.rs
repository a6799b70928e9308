//! The argument binder: aligns a function's [`ParamShape`] against a
//! caller-supplied argument thunk, producing the `Env` the function
//! body (and, for parameter sets, each default expression) evaluates
//! in (spec.md §4.3).

use codemap::Span;

use crate::errors::{Error, ErrorKind, EvalResult};
use crate::eval::Evaluator;
use crate::scope::Env;
use crate::value::{Function, ParamShape, Thunk, Value};

/// Binds `arg` against `function`'s parameter shape, returning the
/// environment the function body should be evaluated in.
pub fn bind(ev: &Evaluator, function: &Function, arg: Thunk, span: Span) -> EvalResult<Env> {
    match &*function.params {
        ParamShape::Named(name) => {
            Ok(function.env.push_lexical(vec![(name.clone(), arg)]))
        }
        ParamShape::FixedParamSet { fields, self_name } => {
            bind_param_set(ev, &function.env, fields, self_name.as_ref(), arg, span, false)
        }
        ParamShape::VariadicParamSet { fields, self_name } => {
            bind_param_set(ev, &function.env, fields, self_name.as_ref(), arg, span, true)
        }
    }
}

fn bind_param_set(
    ev: &Evaluator,
    closure_env: &Env,
    fields: &[crate::value::Formal],
    self_name: Option<&crate::value::NixString>,
    arg: Thunk,
    span: Span,
    variadic: bool,
) -> EvalResult<Env> {
    let value = arg.force(ev)?;
    let Value::Set(attrs) = value else {
        return Err(Error::new(
            ErrorKind::TypeError(format!(
                "a set was expected as the function argument, got a {}",
                value.type_name()
            )),
            span,
        ));
    };

    if !variadic {
        let known: std::collections::HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        for key in attrs.keys() {
            if !known.contains(key.as_str()) {
                return Err(Error::new(ErrorKind::UnexpectedArg(key.to_string()), span));
            }
        }
    }

    for formal in fields {
        if attrs.select(formal.name.as_str()).is_none() && formal.default.is_none() {
            return Err(Error::new(
                ErrorKind::MissingArg(formal.name.to_string()),
                span,
            ));
        }
    }

    // Defaults may reference sibling parameters (including ones that
    // themselves fall back to a default) and, if present, `self_name`.
    // Tie that knot the same way a `rec` set does: thunks close over an
    // `Env` handle that isn't filled in until after the whole frame is
    // built, via a shared back-patch cell.
    let env_cell: std::rc::Rc<std::cell::RefCell<Option<Env>>> =
        std::rc::Rc::new(std::cell::RefCell::new(None));

    let mut names = Vec::with_capacity(fields.len() + 1);

    for formal in fields {
        let thunk = match attrs.select(formal.name.as_str()) {
            Some(t) => t.clone(),
            None => {
                let default = formal
                    .default
                    .clone()
                    .expect("checked above: either present or defaulted");
                let env_cell = env_cell.clone();
                Thunk::suspended(span, move |ev| {
                    let env = env_cell
                        .borrow()
                        .clone()
                        .expect("parameter-set env not yet bound");
                    ev.eval_expr(&env, &default)
                })
            }
        };
        names.push((formal.name.clone(), thunk));
    }

    if let Some(self_name) = self_name {
        names.push((self_name.clone(), Thunk::forced(Value::Set(attrs))));
    }

    let env = closure_env.push_lexical(names);
    *env_cell.borrow_mut() = Some(env.clone());
    Ok(env)
}
