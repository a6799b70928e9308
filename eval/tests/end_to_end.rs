//! Integration tests exercising only `nix_lang_eval`'s public API:
//! build an AST by hand (since parsing Nix source is out of scope,
//! spec.md §1), hand it to an [`Evaluation`], and check the normalized
//! result. Complements the per-module unit tests with scenarios that
//! only need what a downstream crate (a parser front end, say) could
//! actually reach.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use rstest::rstest;

use nix_lang_eval::ast::BinaryOp;
use nix_lang_eval::ast::{AstFormal, AttrName, AttrPath, Binding, Expr, Params, StrPart};
use nix_lang_eval::value::{Atom, NormalValue};
use nix_lang_eval::{Evaluation, NixSearchPath, SourceCode, StdIO};

fn dummy_span() -> codemap::Span {
    let mut codemap = codemap::CodeMap::new();
    codemap.add_file("<test>".into(), "<test>".into()).span
}

fn session() -> Evaluation {
    Evaluation::new(Box::new(StdIO), NixSearchPath::default(), SourceCode::new())
}

fn int(i: i64) -> Rc<Expr> {
    Rc::new(Expr::Constant(Atom::Int(i), dummy_span()))
}

fn sym(name: &str) -> Rc<Expr> {
    Rc::new(Expr::Sym(name.into(), dummy_span()))
}

fn bin(op: BinaryOp, l: Rc<Expr>, r: Rc<Expr>) -> Rc<Expr> {
    Rc::new(Expr::Binary(op, l, r, dummy_span()))
}

fn named(name: &str, value: Rc<Expr>) -> Binding {
    Binding::NamedVar(AttrPath::new(vec![AttrName::Static(name.into())]), value, dummy_span())
}

/// Unwraps a successful evaluation's normal-form value down to the
/// plain `i64` it ought to be, panicking with the errors otherwise.
fn as_int(result: nix_lang_eval::EvaluationResult) -> i64 {
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    match result.value.unwrap() {
        NormalValue::Constant(Atom::Int(i)) => i,
        other => panic!("expected an int, got {other:?}"),
    }
}

fn as_bool(result: nix_lang_eval::EvaluationResult) -> bool {
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    match result.value.unwrap() {
        NormalValue::Constant(Atom::Bool(b)) => b,
        other => panic!("expected a bool, got {other:?}"),
    }
}

#[rstest]
#[case::addition(BinaryOp::Plus, 2, 3, 5)]
#[case::subtraction(BinaryOp::Minus, 10, 4, 6)]
#[case::multiplication(BinaryOp::Mult, 6, 7, 42)]
fn arithmetic_scenarios(#[case] op: BinaryOp, #[case] a: i64, #[case] b: i64, #[case] expected: i64) {
    let expr = bin(op, int(a), int(b));
    assert_eq!(as_int(session().evaluate(&expr)), expected);
}

#[test]
fn division_by_zero_is_reported() {
    let expr = bin(BinaryOp::Div, int(1), int(0));
    let result = session().evaluate(&expr);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::DivisionByZero
    ));
}

#[test]
fn let_binding_chain() {
    // let a = 1; b = a + 1; c = b + a; in c   =>   3
    let bindings = vec![
        named("a", int(1)),
        named("b", bin(BinaryOp::Plus, sym("a"), int(1))),
        named("c", bin(BinaryOp::Plus, sym("b"), sym("a"))),
    ];
    let expr = Rc::new(Expr::Let(bindings, sym("c"), dummy_span()));
    assert_eq!(as_int(session().evaluate(&expr)), 3);
}

#[test]
fn list_concat_preserves_order() {
    let list_a = Rc::new(Expr::List(vec![int(1), int(2)], dummy_span()));
    let list_b = Rc::new(Expr::List(vec![int(3)], dummy_span()));
    let expr = bin(BinaryOp::Concat, list_a, list_b);

    let result = session().evaluate(&expr);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    match result.value.unwrap() {
        NormalValue::List(items) => {
            let values: Vec<i64> = items
                .into_iter()
                .map(|v| match v {
                    NormalValue::Constant(Atom::Int(i)) => i,
                    other => panic!("expected int, got {other:?}"),
                })
                .collect();
            assert_eq!(values, vec![1, 2, 3]);
        }
        other => panic!("expected a list, got {other:?}"),
    }
}

#[test]
fn set_merge_is_right_biased_and_shallow() {
    // { x = 1; y = 2; } // { x = 99; }  =>  { x = 99; y = 2; }
    let a = Rc::new(Expr::Set(vec![named("x", int(1)), named("y", int(2))], dummy_span()));
    let b = Rc::new(Expr::Set(vec![named("x", int(99))], dummy_span()));
    let expr = bin(BinaryOp::Update, a, b);

    let result = session().evaluate(&expr);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    match result.value.unwrap() {
        NormalValue::Set(map) => {
            assert_eq!(map.len(), 2);
            match map.get("x").unwrap() {
                NormalValue::Constant(Atom::Int(i)) => assert_eq!(*i, 99),
                other => panic!("expected int, got {other:?}"),
            }
            match map.get("y").unwrap() {
                NormalValue::Constant(Atom::Int(i)) => assert_eq!(*i, 2),
                other => panic!("expected int, got {other:?}"),
            }
        }
        other => panic!("expected a set, got {other:?}"),
    }
}

#[test]
fn has_attr_checks_single_segment_membership() {
    let set = Rc::new(Expr::Set(vec![named("x", int(1))], dummy_span()));
    let has_x = Rc::new(Expr::HasAttr(
        set.clone(),
        AttrPath::new(vec![AttrName::Static("x".into())]),
        dummy_span(),
    ));
    let has_y = Rc::new(Expr::HasAttr(
        set,
        AttrPath::new(vec![AttrName::Static("y".into())]),
        dummy_span(),
    ));

    assert!(as_bool(session().evaluate(&has_x)));
    assert!(!as_bool(session().evaluate(&has_y)));
}

#[test]
fn has_attr_rejects_multi_segment_paths() {
    let set = Rc::new(Expr::Set(vec![named("x", int(1))], dummy_span()));
    let expr = Rc::new(Expr::HasAttr(
        set,
        AttrPath::new(vec![AttrName::Static("x".into()), AttrName::Static("y".into())]),
        dummy_span(),
    ));

    let result = session().evaluate(&expr);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::InvalidHasAttrPath(2)
    ));
}

#[test]
fn select_with_default_on_missing_attribute() {
    let set = Rc::new(Expr::Set(vec![named("x", int(1))], dummy_span()));
    let expr = Rc::new(Expr::Select(
        set,
        AttrPath::new(vec![AttrName::Static("missing".into())]),
        Some(int(42)),
        dummy_span(),
    ));

    assert_eq!(as_int(session().evaluate(&expr)), 42);
}

#[test]
fn select_without_default_on_missing_attribute_fails() {
    let set = Rc::new(Expr::Set(vec![named("x", int(1))], dummy_span()));
    let expr = Rc::new(Expr::Select(
        set,
        AttrPath::new(vec![AttrName::Static("missing".into())]),
        None,
        dummy_span(),
    ));

    let result = session().evaluate(&expr);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::AttrMissing { .. }
    ));
}

#[test]
fn inherit_from_enclosing_scope() {
    // let x = 5; in { inherit x; }.x  =>  5
    let inner_set = Rc::new(Expr::Set(
        vec![Binding::Inherit(None, vec!["x".into()], dummy_span())],
        dummy_span(),
    ));
    let select = Rc::new(Expr::Select(
        inner_set,
        AttrPath::new(vec![AttrName::Static("x".into())]),
        None,
        dummy_span(),
    ));
    let expr = Rc::new(Expr::Let(vec![named("x", int(5))], select, dummy_span()));

    assert_eq!(as_int(session().evaluate(&expr)), 5);
}

#[test]
fn inherit_from_explicit_source() {
    // let src = { a = 1; b = 2; }; in { inherit (src) a b; }.b  =>  2
    let src_set = Rc::new(Expr::Set(vec![named("a", int(1)), named("b", int(2))], dummy_span()));
    let inherit_set = Rc::new(Expr::Set(
        vec![Binding::Inherit(
            Some(sym("src")),
            vec!["a".into(), "b".into()],
            dummy_span(),
        )],
        dummy_span(),
    ));
    let select = Rc::new(Expr::Select(
        inherit_set,
        AttrPath::new(vec![AttrName::Static("b".into())]),
        None,
        dummy_span(),
    ));
    let expr = Rc::new(Expr::Let(vec![named("src", src_set)], select, dummy_span()));

    assert_eq!(as_int(session().evaluate(&expr)), 2);
}

#[test]
fn inherit_in_rec_set_reads_the_enclosing_scope_not_the_knot() {
    // let x = 1; in (rec { inherit x; }).x  =>  1
    //
    // A source-less `inherit` inside `rec { ... }` must resolve against
    // the scope the `rec` sits in, not against the knot it's building:
    // resolving it against the knot would have this binding look itself
    // up and black-hole.
    let rec_set = Rc::new(Expr::RecSet(
        vec![Binding::Inherit(None, vec!["x".into()], dummy_span())],
        dummy_span(),
    ));
    let select = Rc::new(Expr::Select(
        rec_set,
        AttrPath::new(vec![AttrName::Static("x".into())]),
        None,
        dummy_span(),
    ));
    let expr = Rc::new(Expr::Let(vec![named("x", int(1))], select, dummy_span()));

    assert_eq!(as_int(session().evaluate(&expr)), 1);
}

#[test]
fn inherit_in_let_reads_the_enclosing_scope_not_the_knot() {
    // let x = 1; in let inherit x; in x  =>  1
    let inner_let = Rc::new(Expr::Let(
        vec![Binding::Inherit(None, vec!["x".into()], dummy_span())],
        sym("x"),
        dummy_span(),
    ));
    let expr = Rc::new(Expr::Let(vec![named("x", int(1))], inner_let, dummy_span()));

    assert_eq!(as_int(session().evaluate(&expr)), 1);
}

#[test]
fn unexpected_argument_to_fixed_param_set_is_an_error() {
    let params = Rc::new(Params::FixedParamSet {
        fields: vec![AstFormal { name: "x".into(), default: None }],
        self_name: None,
    });
    let lambda = Rc::new(Expr::Abs(params, sym("x"), dummy_span()));
    let arg = Rc::new(Expr::Set(vec![named("x", int(1)), named("z", int(2))], dummy_span()));
    let app = Rc::new(Expr::App(lambda, arg, dummy_span()));

    let result = session().evaluate(&app);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::UnexpectedArg(_)
    ));
}

#[test]
fn missing_required_argument_is_an_error() {
    let params = Rc::new(Params::FixedParamSet {
        fields: vec![AstFormal { name: "x".into(), default: None }],
        self_name: None,
    });
    let lambda = Rc::new(Expr::Abs(params, sym("x"), dummy_span()));
    let arg = Rc::new(Expr::Set(vec![], dummy_span()));
    let app = Rc::new(Expr::App(lambda, arg, dummy_span()));

    let result = session().evaluate(&app);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::MissingArg(_)
    ));
}

#[test]
fn string_interpolation_coerces_and_concatenates() {
    let expr = Rc::new(Expr::Str(
        vec![
            StrPart::Literal("x = ".into()),
            StrPart::Interpolation(int(5)),
        ],
        dummy_span(),
    ));

    let result = session().evaluate(&expr);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    match result.value.unwrap() {
        NormalValue::Str(s) => assert_eq!(s.as_str(), "x = 5"),
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn assert_false_aborts_with_assertion_failed() {
    let expr = Rc::new(Expr::Assert(
        Rc::new(Expr::Constant(Atom::Bool(false), dummy_span())),
        int(1),
        dummy_span(),
    ));

    let result = session().evaluate(&expr);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::AssertionFailed
    ));
}

#[test]
fn with_on_a_non_set_is_an_error() {
    let expr = Rc::new(Expr::With(int(1), sym("x"), dummy_span()));

    let result = session().evaluate(&expr);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::NotAWithScope(_)
    ));
}

#[test]
fn let_rejects_a_dynamic_binding_name() {
    // let ${"x"} = 1; in 1
    let dynamic_path = AttrPath::new(vec![AttrName::Dynamic(Rc::new(Expr::Str(
        vec![StrPart::Literal("x".into())],
        dummy_span(),
    )))]);
    let bindings = vec![Binding::NamedVar(dynamic_path, int(1), dummy_span())];
    let expr = Rc::new(Expr::Let(bindings, int(1), dummy_span()));

    let result = session().evaluate(&expr);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::DynamicKeyNotAllowed
    ));
}

#[test]
fn comparison_across_atom_kinds_is_a_type_error() {
    let expr = Rc::new(Expr::Binary(
        BinaryOp::Lt,
        int(1),
        Rc::new(Expr::Constant(Atom::Bool(true), dummy_span())),
        dummy_span(),
    ));

    let result = session().evaluate(&expr);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::TypeError(_)
    ));
}

#[test]
fn equality_between_non_constants_is_a_type_error() {
    // "a" == "a" is a TypeError here: only Constant,Constant is
    // comparable, structural string/list/set equality is not.
    let expr = Rc::new(Expr::Binary(
        BinaryOp::Eq,
        Rc::new(Expr::Str(vec![StrPart::Literal("a".into())], dummy_span())),
        Rc::new(Expr::Str(vec![StrPart::Literal("a".into())], dummy_span())),
        dummy_span(),
    ));

    let result = session().evaluate(&expr);
    assert!(result.value.is_none());
    assert!(matches!(
        result.errors[0].kind,
        nix_lang_eval::ErrorKind::TypeError(_)
    ));
}

#[test]
fn equality_between_equal_constants_is_true() {
    let expr = bin(BinaryOp::Eq, int(1), int(1));
    assert!(as_bool(session().evaluate(&expr)));
}
