//! The core evaluator of a Nix-language interpreter: value
//! representation (including lazy thunks), the scope stack, the
//! per-expression-form reduction rules, the function-application
//! protocol, attribute-set construction, and the normalization pass
//! that forces a value to a fully evaluated form.
//!
//! Lexing/parsing Nix source into the [`ast::Expr`] tree this crate
//! consumes, the catalog of concrete builtins, store/derivation
//! realization, and textual rendering are all external collaborators;
//! see the crate-level design notes in `DESIGN.md` for where each one
//! plugs in.

pub mod ast;
pub mod attrpath;
pub mod binder;
pub mod checker;
pub mod errors;
pub mod eval;
pub mod io;
pub mod nix_search_path;
pub mod normalize;
pub mod scope;
pub mod source;
pub mod value;

#[cfg(test)]
mod test_utils;

use std::rc::Rc;

pub use ast::Expr;
pub use errors::{Error, ErrorKind, EvalResult};
pub use eval::{Evaluator, Parser};
pub use io::{EvalIO, StdIO};
pub use nix_search_path::NixSearchPath;
pub use scope::Env;
pub use source::SourceCode;
pub use value::{NormalValue, Value};

/// Bundles the pieces a caller needs to evaluate a piece of Nix code
/// to a normalized value: an I/O handle, a search path, a source map
/// for diagnostics, and (optionally) a [`Parser`] for `import`. This
/// is the session façade a front end (CLI, REPL, test harness)
/// constructs once and reuses across evaluations that should share a
/// source map and import cache.
pub struct Evaluation {
    evaluator: Evaluator,
}

/// The outcome of evaluating one expression: either a fully normalized
/// value, or the errors that aborted evaluation (static-checker
/// failures, if any, come first).
#[derive(Debug, Default)]
pub struct EvaluationResult {
    pub value: Option<NormalValue>,
    pub errors: Vec<Error>,
}

impl Evaluation {
    pub fn new(io: Box<dyn EvalIO>, nix_path: NixSearchPath, source: SourceCode) -> Self {
        Evaluation {
            evaluator: Evaluator::new(io, nix_path, source),
        }
    }

    pub fn with_parser(mut self, parser: Box<dyn Parser>) -> Self {
        self.evaluator = self.evaluator.with_parser(parser);
        self
    }

    pub fn source(&self) -> &SourceCode {
        self.evaluator.source()
    }

    /// Access to the underlying [`Evaluator`], for callers that need a
    /// capability `evaluate` doesn't expose directly (e.g. driving
    /// `import_file` from a builtins catalog, which is the only thing
    /// that would ever call it in a complete interpreter, since `import`
    /// itself is a builtin rather than a dedicated AST form).
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Runs the static checker (spec.md §4.7) over `expr`, then, if it
    /// raised no errors, evaluates and normalizes it (spec.md §4.2,
    /// §4.6). The root scope is always empty: callers that want
    /// pre-bound globals (a `builtins` catalog, say) should wrap `expr`
    /// in a `let`/`with` themselves before calling this, since
    /// populating a globals scope is itself a builtins-catalog concern
    /// and out of scope for the core (spec.md §1).
    pub fn evaluate(&self, expr: &Rc<Expr>) -> EvaluationResult {
        let root_env = Env::root();

        let check_errors = checker::check(expr, &root_env);
        if !check_errors.is_empty() {
            return EvaluationResult {
                value: None,
                errors: check_errors,
            };
        }

        match self.evaluator.eval_expr(&root_env, expr) {
            Ok(value) => match normalize::normalize(&self.evaluator, value) {
                Ok(normal) => EvaluationResult {
                    value: Some(normal),
                    errors: Vec::new(),
                },
                Err(e) => EvaluationResult {
                    value: None,
                    errors: vec![e],
                },
            },
            Err(e) => EvaluationResult {
                value: None,
                errors: vec![e],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttrPath, Binding, Expr, StrPart, UnaryOp};
    use crate::ast::{AttrName, BinaryOp, Params};
    use crate::value::{Atom, Formal};
    use std::rc::Rc;

    fn session() -> Evaluation {
        Evaluation::new(
            Box::new(StdIO),
            NixSearchPath::default(),
            SourceCode::new(),
        )
    }

    fn sp() -> codemap::Span {
        crate::test_utils::dummy_span()
    }

    /// spec.md §8 scenario 1: `let x = 1; y = x + 2; in y` → `3`.
    #[test]
    fn scenario_let_sees_sibling_binding() {
        let span = sp();
        let x_ref = Rc::new(Expr::Sym("x".into(), span));
        let y_expr = Rc::new(Expr::Binary(
            BinaryOp::Plus,
            x_ref,
            Rc::new(Expr::Constant(Atom::Int(2), span)),
            span,
        ));
        let body = Rc::new(Expr::Sym("y".into(), span));
        let bindings = vec![
            Binding::NamedVar(
                AttrPath::new(vec![AttrName::Static("x".into())]),
                Rc::new(Expr::Constant(Atom::Int(1), span)),
                span,
            ),
            Binding::NamedVar(
                AttrPath::new(vec![AttrName::Static("y".into())]),
                y_expr,
                span,
            ),
        ];
        let expr = Rc::new(Expr::Let(bindings, body, span));

        let result = session().evaluate(&expr);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match result.value.unwrap() {
            NormalValue::Constant(Atom::Int(3)) => {}
            other => panic!("expected 3, got {other:?}"),
        }
    }

    /// spec.md §8 scenario 2: `rec { a = 1; b = a + 1; c = b + a; }.c`
    /// → `3`, regardless of field traversal order.
    #[test]
    fn scenario_rec_set_knot() {
        let span = sp();
        let a = Binding::NamedVar(
            AttrPath::new(vec![AttrName::Static("a".into())]),
            Rc::new(Expr::Constant(Atom::Int(1), span)),
            span,
        );
        let b = Binding::NamedVar(
            AttrPath::new(vec![AttrName::Static("b".into())]),
            Rc::new(Expr::Binary(
                BinaryOp::Plus,
                Rc::new(Expr::Sym("a".into(), span)),
                Rc::new(Expr::Constant(Atom::Int(1), span)),
                span,
            )),
            span,
        );
        let c = Binding::NamedVar(
            AttrPath::new(vec![AttrName::Static("c".into())]),
            Rc::new(Expr::Binary(
                BinaryOp::Plus,
                Rc::new(Expr::Sym("b".into(), span)),
                Rc::new(Expr::Sym("a".into(), span)),
                span,
            )),
            span,
        );
        let rec_set = Rc::new(Expr::RecSet(vec![a, b, c], span));
        let select = Rc::new(Expr::Select(
            rec_set,
            AttrPath::new(vec![AttrName::Static("c".into())]),
            None,
            span,
        ));

        let result = session().evaluate(&select);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match result.value.unwrap() {
            NormalValue::Constant(Atom::Int(3)) => {}
            other => panic!("expected 3, got {other:?}"),
        }
    }

    /// spec.md §8 scenario 3: `({x, y ? x + 1}: y) { x = 10; }` → `11`
    /// (a default expression sees a sibling binding).
    #[test]
    fn scenario_default_sees_sibling() {
        let span = sp();
        let params = Rc::new(Params::FixedParamSet {
            fields: vec![
                crate::ast::AstFormal {
                    name: "x".into(),
                    default: None,
                },
                crate::ast::AstFormal {
                    name: "y".into(),
                    default: Some(Rc::new(Expr::Binary(
                        BinaryOp::Plus,
                        Rc::new(Expr::Sym("x".into(), span)),
                        Rc::new(Expr::Constant(Atom::Int(1), span)),
                        span,
                    ))),
                },
            ],
            self_name: None,
        });
        let body = Rc::new(Expr::Sym("y".into(), span));
        let lambda = Rc::new(Expr::Abs(params, body, span));

        let arg_set = Rc::new(Expr::Set(
            vec![Binding::NamedVar(
                AttrPath::new(vec![AttrName::Static("x".into())]),
                Rc::new(Expr::Constant(Atom::Int(10), span)),
                span,
            )],
            span,
        ));
        let app = Rc::new(Expr::App(lambda, arg_set, span));

        let result = session().evaluate(&app);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match result.value.unwrap() {
            NormalValue::Constant(Atom::Int(11)) => {}
            other => panic!("expected 11, got {other:?}"),
        }
    }

    /// spec.md §8 scenario 4: `({x, ...}@self: self.x) { x = 7; z = 9; }`
    /// → `7`, and the variadic extra `z` is reachable through `self`.
    #[test]
    fn scenario_variadic_self_name() {
        let span = sp();
        let params = Rc::new(Params::VariadicParamSet {
            fields: vec![crate::ast::AstFormal {
                name: "x".into(),
                default: None,
            }],
            self_name: Some("self".into()),
        });
        let body = Rc::new(Expr::Select(
            Rc::new(Expr::Sym("self".into(), span)),
            AttrPath::new(vec![AttrName::Static("z".into())]),
            None,
            span,
        ));
        let lambda = Rc::new(Expr::Abs(params, body, span));

        let arg_set = Rc::new(Expr::Set(
            vec![
                Binding::NamedVar(
                    AttrPath::new(vec![AttrName::Static("x".into())]),
                    Rc::new(Expr::Constant(Atom::Int(7), span)),
                    span,
                ),
                Binding::NamedVar(
                    AttrPath::new(vec![AttrName::Static("z".into())]),
                    Rc::new(Expr::Constant(Atom::Int(9), span)),
                    span,
                ),
            ],
            span,
        ));
        let app = Rc::new(Expr::App(lambda, arg_set, span));

        let result = session().evaluate(&app);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match result.value.unwrap() {
            NormalValue::Constant(Atom::Int(9)) => {}
            other => panic!("expected 9, got {other:?}"),
        }
    }

    /// spec.md §8 scenario 5: `with { a = 1; }; a + 2` → `3`.
    #[test]
    fn scenario_with_scope() {
        let span = sp();
        let with_set = Rc::new(Expr::Set(
            vec![Binding::NamedVar(
                AttrPath::new(vec![AttrName::Static("a".into())]),
                Rc::new(Expr::Constant(Atom::Int(1), span)),
                span,
            )],
            span,
        ));
        let body = Rc::new(Expr::Binary(
            BinaryOp::Plus,
            Rc::new(Expr::Sym("a".into(), span)),
            Rc::new(Expr::Constant(Atom::Int(2), span)),
            span,
        ));
        let expr = Rc::new(Expr::With(with_set, body, span));

        let result = session().evaluate(&expr);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match result.value.unwrap() {
            NormalValue::Constant(Atom::Int(3)) => {}
            other => panic!("expected 3, got {other:?}"),
        }
    }

    /// spec.md §8 scenario 6: `if true then "a" + "b" else "c"` →
    /// `Str("ab", ∅)`.
    #[test]
    fn scenario_if_then_else_str_concat() {
        let span = sp();
        let expr = Rc::new(Expr::If(
            Rc::new(Expr::Constant(Atom::Bool(true), span)),
            Rc::new(Expr::Binary(
                BinaryOp::Plus,
                Rc::new(Expr::Str(vec![StrPart::Literal("a".into())], span)),
                Rc::new(Expr::Str(vec![StrPart::Literal("b".into())], span)),
                span,
            )),
            Rc::new(Expr::Str(vec![StrPart::Literal("c".into())], span)),
            span,
        ));

        let result = session().evaluate(&expr);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match result.value.unwrap() {
            NormalValue::Str(s) => {
                assert_eq!(s.as_str(), "ab");
                assert!(!s.has_context());
            }
            other => panic!("expected a string, got {other:?}"),
        }
    }

    /// spec.md §8 scenario 7: `{ a.b.c = 1; a.b.d = 2; }.a.b` normalizes
    /// to `{ c = 1; d = 2; }` (nested alter composes across bindings).
    #[test]
    fn scenario_nested_attrpath_alter_composes() {
        let span = sp();
        let path = |a: &str, b: &str, c: &str| {
            AttrPath::new(vec![
                AttrName::Static(a.into()),
                AttrName::Static(b.into()),
                AttrName::Static(c.into()),
            ])
        };
        let set = Rc::new(Expr::Set(
            vec![
                Binding::NamedVar(path("a", "b", "c"), Rc::new(Expr::Constant(Atom::Int(1), span)), span),
                Binding::NamedVar(path("a", "b", "d"), Rc::new(Expr::Constant(Atom::Int(2), span)), span),
            ],
            span,
        ));
        let select = Rc::new(Expr::Select(
            set,
            AttrPath::new(vec![AttrName::Static("a".into()), AttrName::Static("b".into())]),
            None,
            span,
        ));

        let result = session().evaluate(&select);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match result.value.unwrap() {
            NormalValue::Set(map) => {
                assert_eq!(map.len(), 2);
                assert!(matches!(map.get("c").unwrap(), NormalValue::Constant(Atom::Int(1))));
                assert!(matches!(map.get("d").unwrap(), NormalValue::Constant(Atom::Int(2))));
            }
            other => panic!("expected a set, got {other:?}"),
        }
    }

    /// spec.md §8 scenario 8: `let x = x; in x` is a black hole.
    #[test]
    fn scenario_self_referential_let_is_black_hole() {
        let span = sp();
        let x_ref = Rc::new(Expr::Sym("x".into(), span));
        let bindings = vec![Binding::NamedVar(
            AttrPath::new(vec![AttrName::Static("x".into())]),
            x_ref,
            span,
        )];
        let body = Rc::new(Expr::Sym("x".into(), span));
        let expr = Rc::new(Expr::Let(bindings, body, span));

        let result = session().evaluate(&expr);
        assert!(result.value.is_none());
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(result.errors[0].kind, ErrorKind::InfiniteRecursion));
    }

    /// spec.md §8: `UndefinedVariable` is caught by the static checker
    /// before any evaluation happens, without relying on an unlucky
    /// `with` scope masking it.
    #[test]
    fn undefined_variable_caught_statically() {
        let span = sp();
        let expr = Rc::new(Expr::Sym("nope".into(), span));
        let result = session().evaluate(&expr);
        assert!(result.value.is_none());
        assert!(matches!(result.errors[0].kind, ErrorKind::UndefinedVariable(_)));
    }

    /// spec.md §8: unary negation/not, per spec.md §4.2 `Unary`.
    #[test]
    fn unary_operators() {
        let span = sp();
        let neg = Rc::new(Expr::Unary(
            UnaryOp::Neg,
            Rc::new(Expr::Constant(Atom::Int(5), span)),
            span,
        ));
        let result = session().evaluate(&neg);
        assert!(matches!(result.value.unwrap(), NormalValue::Constant(Atom::Int(-5))));

        let not = Rc::new(Expr::Unary(
            UnaryOp::Not,
            Rc::new(Expr::Constant(Atom::Bool(true), span)),
            span,
        ));
        let result = session().evaluate(&not);
        assert!(matches!(result.value.unwrap(), NormalValue::Constant(Atom::Bool(false))));
    }

    /// Commutativity of key insertion order: `{a=1;b=2;}` and
    /// `{b=2;a=1;}` normalize equal (spec.md §8).
    #[test]
    fn set_rendering_is_insertion_order_independent() {
        let span = sp();
        let make = |order: [(&str, i64); 2]| {
            let bindings = order
                .iter()
                .map(|(name, v)| {
                    Binding::NamedVar(
                        AttrPath::new(vec![AttrName::Static((*name).into())]),
                        Rc::new(Expr::Constant(Atom::Int(*v), span)),
                        span,
                    )
                })
                .collect();
            Rc::new(Expr::Set(bindings, span))
        };

        let ab = session().evaluate(&make([("a", 1), ("b", 2)]));
        let ba = session().evaluate(&make([("b", 2), ("a", 1)]));

        match (ab.value.unwrap(), ba.value.unwrap()) {
            (NormalValue::Set(m1), NormalValue::Set(m2)) => {
                let k1: Vec<_> = m1.keys().map(|k| k.as_str()).collect();
                let k2: Vec<_> = m2.keys().map(|k| k.as_str()).collect();
                assert_eq!(k1, k2);
            }
            _ => panic!("expected sets"),
        }
    }

    /// Avoid an "unused" warning for the `Formal` re-export used only
    /// by `binder`/`function` internally; exercised indirectly above
    /// through `AstFormal::to_runtime`.
    #[allow(dead_code)]
    fn _formal_is_reachable(f: Formal) -> Formal {
        f
    }
}
