//! Static (weak) variable-resolution checker (spec.md §4.7).
//!
//! This is deliberately not a type checker: Nix's types are too dynamic
//! for anything stronger, so the only static guarantee made here is
//! that every reachable `Sym` resolves to *some* binding. The checker
//! walks the same scope-construction rules the evaluator does, but
//! with a single shared placeholder thunk standing in for every bound
//! name's value, so that checking a function body never actually has
//! to call anything.

use crate::ast::{AttrName, Binding, Expr, Params};
use crate::errors::{Error, ErrorKind};
use crate::scope::Env;
use crate::value::{Atom, NixString, Thunk, Value};

/// A non-forcing stand-in for "some value is bound here". Using a
/// pre-forced constant means checking never triggers the evaluator at
/// all, not even by accident.
fn null_thunk() -> Thunk {
    Thunk::forced(Value::Constant(Atom::Null))
}

/// Walks `expr`, collecting one [`ErrorKind::UndefinedVariable`] error
/// per `Sym` that has no enclosing binding. `with` scopes are modeled
/// conservatively: since their contents can't be known without forcing
/// the set expression, a name unresolved by any lexical scope is
/// assumed to be provided by the nearest enclosing `with` rather than
/// reported as undefined (the same approximation real Nix's own
/// "unused binding" lints make).
pub fn check(root: &Expr, env: &Env) -> Vec<Error> {
    let mut errors = Vec::new();
    walk(root, env, &mut errors);
    errors
}

fn has_any_with(env: &Env) -> bool {
    env.any_with_frame()
}

fn walk(expr: &Expr, env: &Env, errors: &mut Vec<Error>) {
    match expr {
        Expr::Sym(name, span) => {
            if env.lookup_lexical_names_only(name.as_str()).is_none() && !has_any_with(env) {
                errors.push(Error::new(
                    ErrorKind::UndefinedVariable(name.to_string()),
                    *span,
                ));
            }
        }

        Expr::Constant(..) | Expr::LiteralPath(..) | Expr::EnvPath(..) => {}

        Expr::Str(parts, _) => {
            for part in parts {
                if let crate::ast::StrPart::Interpolation(e) = part {
                    walk(e, env, errors);
                }
            }
        }

        Expr::List(items, _) => {
            for item in items {
                walk(item, env, errors);
            }
        }

        Expr::Set(bindings, _) => check_bindings(bindings, env, env, errors),

        Expr::RecSet(bindings, _) => {
            let inner = env.push_lexical(bound_names(bindings));
            check_bindings(bindings, &inner, &inner, errors);
        }

        Expr::Let(bindings, body, _) => {
            let inner = env.push_lexical(bound_names(bindings));
            check_bindings(bindings, &inner, env, errors);
            walk(body, &inner, errors);
        }

        Expr::If(cond, then, els, _) => {
            walk(cond, env, errors);
            walk(then, env, errors);
            walk(els, env, errors);
        }

        Expr::With(source, body, _) => {
            walk(source, env, errors);
            let inner = env.push_with(null_thunk(), source.span());
            walk(body, &inner, errors);
        }

        Expr::Assert(cond, body, _) => {
            walk(cond, env, errors);
            walk(body, env, errors);
        }

        Expr::App(f, arg, _) => {
            walk(f, env, errors);
            walk(arg, env, errors);
        }

        Expr::Abs(params, body, _) => {
            let inner = bind_params_for_checking(params, env, errors);
            walk(body, &inner, errors);
        }

        Expr::Unary(_, x, _) => walk(x, env, errors),

        Expr::Binary(_, l, r, _) => {
            walk(l, env, errors);
            walk(r, env, errors);
        }

        Expr::Select(set, path, default, _) => {
            walk(set, env, errors);
            check_path(path, env, errors);
            if let Some(d) = default {
                walk(d, env, errors);
            }
        }

        Expr::HasAttr(set, path, _) => {
            walk(set, env, errors);
            check_path(path, env, errors);
        }
    }
}

fn check_path(path: &crate::ast::AttrPath, env: &Env, errors: &mut Vec<Error>) {
    for seg in &path.0 {
        if let AttrName::Dynamic(e) = seg {
            walk(e, env, errors);
        }
    }
}

fn bound_names(bindings: &[Binding]) -> Vec<(NixString, Thunk)> {
    let mut names = Vec::new();
    for binding in bindings {
        match binding {
            Binding::NamedVar(path, _, _) => {
                if let Some(AttrName::Static(name)) = path.0.first() {
                    names.push((name.clone(), null_thunk()));
                }
            }
            Binding::Inherit(_, inherited, _) => {
                for name in inherited {
                    names.push((name.clone(), null_thunk()));
                }
            }
        }
    }
    names
}

fn check_bindings(bindings: &[Binding], value_env: &Env, inherit_source_env: &Env, errors: &mut Vec<Error>) {
    for binding in bindings {
        match binding {
            Binding::NamedVar(path, value, _) => {
                check_path(path, value_env, errors);
                walk(value, value_env, errors);
            }
            Binding::Inherit(Some(source), _, _) => walk(source, inherit_source_env, errors),
            Binding::Inherit(None, names, span) => {
                for name in names {
                    if inherit_source_env
                        .lookup_lexical_names_only(name.as_str())
                        .is_none()
                        && !has_any_with(inherit_source_env)
                    {
                        errors.push(Error::new(
                            ErrorKind::UndefinedVariable(name.to_string()),
                            *span,
                        ));
                    }
                }
            }
        }
    }
}

fn bind_params_for_checking(params: &Params, env: &Env, errors: &mut Vec<Error>) -> Env {
    match params {
        Params::Named(name) => env.push_lexical(vec![(name.clone(), null_thunk())]),
        Params::FixedParamSet { fields, self_name } | Params::VariadicParamSet { fields, self_name } => {
            let mut names: Vec<(NixString, Thunk)> =
                fields.iter().map(|f| (f.name.clone(), null_thunk())).collect();
            if let Some(self_name) = self_name {
                names.push((self_name.clone(), null_thunk()));
            }
            let inner = env.push_lexical(names);
            for field in fields {
                if let Some(default) = &field.default {
                    walk(default, &inner, errors);
                }
            }
            inner
        }
    }
}
