//! The evaluator: ties together the scope stack, thunk machinery, and
//! the per-expression-form reduction rules (spec.md §4.2) into the
//! capability set spec.md §2 describes (`eval_expr`, `lookup_var`,
//! `push_scope`, `build_thunk`, `force_thunk`, `import_file`,
//! `value_ref`).
//!
//! Parsing real Nix source into [`Expr`] is out of scope (spec.md §1);
//! [`Parser`] is the seam a front end plugs into, used only by
//! `import_file` and by callers assembling an [`Evaluator`] for a REPL
//! or CLI.

use std::path::Path;
use std::rc::Rc;

use codemap::Span;

use crate::ast::{AttrName, Binding, Expr, Params, StrPart, UnaryOp};
use crate::ast::BinaryOp;
use crate::attrpath;
use crate::binder;
use crate::errors::{Error, ErrorKind, EvalResult};
use crate::io::EvalIO;
use crate::nix_search_path::NixSearchPath;
use crate::scope::Env;
use crate::source::SourceCode;
use crate::value::{Atom, EnvPath, Function, LiteralPath, NixAttrs, NixString, Thunk, Value};

/// The seam a real Nix parser plugs into. Only needed for `import`,
/// since everywhere else the evaluator is handed an already-built
/// [`Expr`] tree.
pub trait Parser {
    fn parse(&self, code: &str, path: &Path) -> EvalResult<Rc<Expr>>;
}

pub struct Evaluator {
    io: Box<dyn EvalIO>,
    search_path: NixSearchPath,
    source: SourceCode,
    parser: Option<Box<dyn Parser>>,
}

impl Evaluator {
    pub fn new(io: Box<dyn EvalIO>, search_path: NixSearchPath, source: SourceCode) -> Self {
        Evaluator {
            io,
            search_path,
            source,
            parser: None,
        }
    }

    pub fn with_parser(mut self, parser: Box<dyn Parser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn io(&self) -> &dyn EvalIO {
        self.io.as_ref()
    }

    pub fn search_path(&self) -> &NixSearchPath {
        &self.search_path
    }

    pub fn source(&self) -> &SourceCode {
        &self.source
    }

    /// `build_thunk` (spec.md §4.1): wraps `expr` for deferred
    /// evaluation in `env`, without doing any work yet.
    pub fn build_thunk(&self, env: &Env, expr: &Rc<Expr>) -> Thunk {
        let span = expr.span();
        let env = env.clone();
        let expr = expr.clone();
        Thunk::suspended(span, move |ev| ev.eval_expr(&env, &expr))
    }

    /// `eval_expr` (spec.md §4.2): the core reduction function. Runs
    /// to head-normal form, forcing exactly the sub-thunks each rule
    /// requires and no more.
    pub fn eval_expr(&self, env: &Env, expr: &Expr) -> EvalResult<Value> {
        let span = expr.span();

        match expr {
            Expr::Sym(name, _) => match env.lookup_var(self, name.as_str())? {
                Some(thunk) => thunk.force(self),
                None => Err(Error::new(ErrorKind::UndefinedVariable(name.to_string()), span)),
            },

            Expr::Constant(atom, _) => Ok(Value::Constant(atom.clone())),

            Expr::Str(parts, _) => self.eval_str(env, parts),

            Expr::LiteralPath(path, _) => Ok(Value::LiteralPath(LiteralPath::new(path.clone()))),

            Expr::EnvPath(name, _) => Ok(Value::EnvPath(EnvPath(name.clone()))),

            Expr::List(items, _) => {
                let thunks = items.iter().map(|e| self.build_thunk(env, e)).collect();
                Ok(Value::List(crate::value::NixList::from_thunks(thunks)))
            }

            Expr::Set(bindings, _) => {
                let attrs = self.build_attrs(env, env, bindings, span)?;
                Ok(Value::Set(attrs))
            }

            Expr::RecSet(bindings, _) => {
                let rec_env = self.knot_env(env, bindings, span, false)?;
                // `value_env` is the knot (so sibling fields and
                // defaults can see each other), but `inherit_env` stays
                // the *outer* scope: a source-less `inherit` inside
                // `rec { ... }` still means "the name visible outside",
                // not a self-reference into the set being built.
                let attrs = self.build_attrs(&rec_env, env, bindings, span)?;
                Ok(Value::Set(attrs))
            }

            Expr::Let(bindings, body, _) => {
                // Unlike a `rec` set, `let` only ever binds plain names
                // into the lexical scope (spec.md §4.4's `allowDynamic`
                // is false here): a dotted or antiquoted path on the
                // left of a `let` binding isn't a name any reference in
                // `body` could spell.
                let let_env = self.knot_env(env, bindings, span, true)?;
                self.eval_expr(&let_env, body)
            }

            Expr::If(cond, then, els, _) => {
                let cond_value = self.eval_expr(env, cond)?;
                match cond_value.as_bool() {
                    Some(true) => self.eval_expr(env, then),
                    Some(false) => self.eval_expr(env, els),
                    None => Err(Error::new(
                        ErrorKind::TypeError(format!(
                            "expected a bool in `if` condition, got a {}",
                            cond_value.type_name()
                        )),
                        cond.span(),
                    )),
                }
            }

            Expr::With(source, body, _) => {
                let with_thunk = self.build_thunk(env, source);
                let with_env = env.push_with(with_thunk, source.span());
                self.eval_expr(&with_env, body)
            }

            Expr::Assert(cond, body, _) => {
                let cond_value = self.eval_expr(env, cond)?;
                match cond_value.as_bool() {
                    Some(true) => self.eval_expr(env, body),
                    Some(false) => Err(Error::new(ErrorKind::AssertionFailed, span)),
                    None => Err(Error::new(
                        ErrorKind::TypeError(format!(
                            "expected a bool in `assert`, got a {}",
                            cond_value.type_name()
                        )),
                        cond.span(),
                    )),
                }
            }

            Expr::App(f, arg, _) => {
                let fun_value = self.eval_expr(env, f)?;
                let arg_thunk = self.build_thunk(env, arg);
                self.apply(fun_value, arg_thunk, span)
            }

            Expr::Abs(params, body, _) => Ok(Value::Function(Rc::new(Function {
                params: Rc::new(params.to_runtime()),
                body: body.clone(),
                env: env.clone(),
            }))),

            Expr::Unary(op, x, _) => self.eval_unary(env, *op, x),

            Expr::Binary(op, l, r, _) => self.eval_binary(env, *op, l, r, span),

            Expr::Select(set, path, default, _) => {
                let set_value = self.eval_expr(env, set)?;
                let keys = attrpath::resolve(self, env, &path.0)?;
                let attrs = match &set_value {
                    Value::Set(a) => a.clone(),
                    other => {
                        return Err(Error::new(
                            ErrorKind::NotASet {
                                prefix: vec![],
                                actual: other.type_name(),
                            },
                            set.span(),
                        ))
                    }
                };

                match attrpath::select(self, &attrs, &keys, span)? {
                    Some(thunk) => thunk.force(self),
                    None => match default {
                        Some(d) => self.eval_expr(env, d),
                        None => Err(Error::new(
                            ErrorKind::AttrMissing {
                                path: keys.iter().map(|k| k.to_string()).collect(),
                            },
                            span,
                        )),
                    },
                }
            }

            Expr::HasAttr(set, path, _) => {
                if path.0.len() != 1 {
                    return Err(Error::new(ErrorKind::InvalidHasAttrPath(path.0.len()), span));
                }
                let set_value = self.eval_expr(env, set)?;
                let keys = attrpath::resolve(self, env, &path.0)?;
                let found = match &set_value {
                    Value::Set(a) => attrpath::select(self, a, &keys, span)?.is_some(),
                    _ => false,
                };
                Ok(Value::Constant(Atom::Bool(found)))
            }
        }
    }

    fn eval_str(&self, env: &Env, parts: &[StrPart]) -> EvalResult<Value> {
        let mut result = NixString::from("");
        for part in parts {
            match part {
                StrPart::Literal(lit) => result = result.concat(NixString::from(lit.as_str())),
                StrPart::Interpolation(expr) => {
                    let value = self.eval_expr(env, expr)?;
                    let s = self.coerce_to_string(&value, expr.span())?;
                    result = result.concat(s);
                }
            }
        }
        Ok(Value::Str(result))
    }

    /// String-coercion used by interpolation and dynamic attribute
    /// keys (spec.md §4.4; the dynamic-key caller discards context
    /// itself via [`NixString::without_context`]).
    pub fn coerce_to_string(&self, value: &Value, span: Span) -> EvalResult<NixString> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            Value::Constant(Atom::Int(i)) => Ok(NixString::from(i.to_string())),
            Value::LiteralPath(p) => Ok(NixString::from(p.0.to_string_lossy().into_owned())),
            Value::EnvPath(p) => {
                let resolved = self
                    .search_path
                    .resolve(self.io.as_ref(), &p.0)
                    .map_err(|k| Error::new(k, span))?;
                Ok(NixString::from(resolved.to_string_lossy().into_owned()))
            }
            other => Err(Error::new(
                ErrorKind::CoercionError {
                    from: other.type_name(),
                    to: "string",
                },
                span,
            )),
        }
    }

    fn eval_unary(&self, env: &Env, op: UnaryOp, x: &Expr) -> EvalResult<Value> {
        let value = self.eval_expr(env, x)?;
        match (op, &value) {
            (UnaryOp::Neg, Value::Constant(Atom::Int(i))) => Ok(Value::Constant(Atom::Int(-i))),
            (UnaryOp::Not, Value::Constant(Atom::Bool(b))) => Ok(Value::Constant(Atom::Bool(!b))),
            _ => Err(Error::new(
                ErrorKind::TypeError(format!(
                    "operator {op:?} is not defined for a {}",
                    value.type_name()
                )),
                x.span(),
            )),
        }
    }

    fn eval_binary(&self, env: &Env, op: BinaryOp, l: &Expr, r: &Expr, span: Span) -> EvalResult<Value> {
        // Short-circuiting forms evaluate their second operand lazily.
        match op {
            BinaryOp::And => {
                let lv = self.expect_bool(env, l)?;
                if !lv {
                    return Ok(Value::Constant(Atom::Bool(false)));
                }
                return Ok(Value::Constant(Atom::Bool(self.expect_bool(env, r)?)));
            }
            BinaryOp::Or => {
                let lv = self.expect_bool(env, l)?;
                if lv {
                    return Ok(Value::Constant(Atom::Bool(true)));
                }
                return Ok(Value::Constant(Atom::Bool(self.expect_bool(env, r)?)));
            }
            BinaryOp::Impl => {
                let lv = self.expect_bool(env, l)?;
                if !lv {
                    return Ok(Value::Constant(Atom::Bool(true)));
                }
                return Ok(Value::Constant(Atom::Bool(self.expect_bool(env, r)?)));
            }
            _ => {}
        }

        let lv = self.eval_expr(env, l)?;
        let rv = self.eval_expr(env, r)?;

        match op {
            BinaryOp::Plus => self.numeric_or_concat(lv, rv, span),
            BinaryOp::Minus => self.numeric_op(lv, rv, span, i64::checked_sub),
            BinaryOp::Mult => self.numeric_op(lv, rv, span, i64::checked_mul),
            BinaryOp::Div => {
                let (a, b) = self.as_ints(lv, rv, span)?;
                if b == 0 {
                    return Err(Error::new(ErrorKind::DivisionByZero, span));
                }
                Ok(Value::Constant(Atom::Int(a / b)))
            }
            BinaryOp::Update => match (lv, rv) {
                (Value::Set(a), Value::Set(b)) => Ok(Value::Set(a.update(b))),
                (other, _) => Err(Error::new(
                    ErrorKind::TypeError(format!("`//` requires sets, got a {}", other.type_name())),
                    span,
                )),
            },
            BinaryOp::Concat => match (lv, rv) {
                (Value::List(a), Value::List(b)) => Ok(Value::List(a.concat(&b))),
                (other, _) => Err(Error::new(
                    ErrorKind::TypeError(format!("`++` requires lists, got a {}", other.type_name())),
                    span,
                )),
            },
            BinaryOp::Eq => Ok(Value::Constant(Atom::Bool(self.values_equal(&lv, &rv, span)?))),
            BinaryOp::NEq => Ok(Value::Constant(Atom::Bool(!self.values_equal(&lv, &rv, span)?))),
            BinaryOp::Lt => self.compare(lv, rv, span, std::cmp::Ordering::is_lt),
            BinaryOp::Lte => self.compare(lv, rv, span, std::cmp::Ordering::is_le),
            BinaryOp::Gt => self.compare(lv, rv, span, std::cmp::Ordering::is_gt),
            BinaryOp::Gte => self.compare(lv, rv, span, std::cmp::Ordering::is_ge),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Impl => unreachable!("handled above"),
        }
    }

    fn expect_bool(&self, env: &Env, expr: &Expr) -> EvalResult<bool> {
        let value = self.eval_expr(env, expr)?;
        value.as_bool().ok_or_else(|| {
            Error::new(
                ErrorKind::TypeError(format!("expected a bool, got a {}", value.type_name())),
                expr.span(),
            )
        })
    }

    fn as_ints(&self, lv: Value, rv: Value, span: Span) -> EvalResult<(i64, i64)> {
        match (lv.as_int(), rv.as_int()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(Error::new(
                ErrorKind::TypeError(format!(
                    "expected two ints, got a {} and a {}",
                    lv.type_name(),
                    rv.type_name()
                )),
                span,
            )),
        }
    }

    fn numeric_op(
        &self,
        lv: Value,
        rv: Value,
        span: Span,
        op: impl Fn(i64, i64) -> Option<i64>,
    ) -> EvalResult<Value> {
        let (a, b) = self.as_ints(lv, rv, span)?;
        op(a, b)
            .map(|r| Value::Constant(Atom::Int(r)))
            .ok_or_else(|| Error::new(ErrorKind::TypeError("integer overflow".into()), span))
    }

    /// `+` is overloaded between integer addition and string/path
    /// concatenation (spec.md §4.2's `Int, Int` vs `String, String`
    /// rows).
    fn numeric_or_concat(&self, lv: Value, rv: Value, span: Span) -> EvalResult<Value> {
        match (&lv, &rv) {
            (Value::Constant(Atom::Int(_)), Value::Constant(Atom::Int(_))) => {
                self.numeric_op(lv, rv, span, i64::checked_add)
            }
            // `LiteralPath, LiteralPath` (spec.md §4.2): plain textual
            // concatenation, canonicalization deferred same as any
            // other literal path.
            (Value::LiteralPath(a), Value::LiteralPath(b)) => {
                let mut text = a.0.to_string_lossy().into_owned();
                text.push_str(&b.0.to_string_lossy());
                Ok(Value::LiteralPath(LiteralPath::new(text)))
            }
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                let a = self.coerce_to_string(&lv, span)?;
                let b = self.coerce_to_string(&rv, span)?;
                Ok(Value::Str(a.concat(b)))
            }
            _ => Err(Error::new(
                ErrorKind::TypeError(format!(
                    "`+` is not defined between a {} and a {}",
                    lv.type_name(),
                    rv.type_name()
                )),
                span,
            )),
        }
    }

    /// spec.md §4.2/§9: only a `Constant, Constant` pair is comparable
    /// for equality; every other combination (including `Str, Str`,
    /// `List, List`, `Set, Set`) is a `TypeError`, not a structural
    /// comparison.
    fn values_equal(&self, a: &Value, b: &Value, span: Span) -> EvalResult<bool> {
        match (a, b) {
            (Value::Constant(x), Value::Constant(y)) => Ok(x == y),
            _ => Err(Error::new(
                ErrorKind::TypeError(format!(
                    "cannot compare a {} with a {}",
                    a.type_name(),
                    b.type_name()
                )),
                span,
            )),
        }
    }

    fn compare(
        &self,
        lv: Value,
        rv: Value,
        span: Span,
        pred: impl Fn(std::cmp::Ordering) -> bool,
    ) -> EvalResult<Value> {
        let ordering = match (&lv, &rv) {
            (Value::Constant(a), Value::Constant(b)) => a.partial_cmp(b),
            _ => None,
        };

        match ordering {
            Some(o) => Ok(Value::Constant(Atom::Bool(pred(o)))),
            None => Err(Error::new(
                ErrorKind::TypeError(format!(
                    "cannot compare a {} with a {}",
                    lv.type_name(),
                    rv.type_name()
                )),
                span,
            )),
        }
    }

    fn apply(&self, fun_value: Value, arg: Thunk, span: Span) -> EvalResult<Value> {
        match fun_value {
            Value::Function(func) => {
                let env = binder::bind(self, &func, arg, span)?;
                self.eval_expr(&env, &func.body)
            }
            Value::Builtin(b) => b.apply(self, arg),
            other => Err(Error::new(
                ErrorKind::TypeError(format!("cannot apply a {} as a function", other.type_name())),
                span,
            )),
        }
    }

    /// Builds the attrs literal for a `Set`/`RecSet` (spec.md §4.5).
    /// `value_env` is where each binding's value expression is
    /// evaluated (the knot environment for `rec`, the outer one
    /// otherwise); `inherit_env` is where a source-less `inherit`
    /// looks names up (always the outer environment, never the set
    /// being built, even for `rec` — `rec { inherit x; }` still means
    /// "the `x` visible outside", not a self-reference).
    fn build_attrs(
        &self,
        value_env: &Env,
        inherit_env: &Env,
        bindings: &[Binding],
        span: Span,
    ) -> EvalResult<NixAttrs> {
        let mut attrs = NixAttrs::empty();

        for binding in bindings {
            match binding {
                Binding::NamedVar(path, value, bind_span) => {
                    let keys = attrpath::resolve(self, value_env, &path.0)?;
                    let last_key = keys.last().expect("attribute path is non-empty").to_string();
                    let value = value.clone();
                    let value_env = value_env.clone();
                    let bind_span = *bind_span;
                    attrs = attrpath::alter(self, attrs, &keys, bind_span, move |existing| {
                        if existing.is_some() {
                            return Err(Error::new(ErrorKind::DuplicateAttr(last_key), bind_span));
                        }
                        let value_span = value.span();
                        Ok(Thunk::suspended(value_span, move |ev| {
                            ev.eval_expr(&value_env, &value)
                        }))
                    })?;
                }
                Binding::Inherit(source, names, inherit_span) => match source {
                    Some(source_expr) => {
                        let source_thunk = self.build_thunk(inherit_env, source_expr);
                        for name in names {
                            let name = name.clone();
                            let source_thunk = source_thunk.clone();
                            let span = *inherit_span;
                            attrs = attrs.insert(
                                name.clone(),
                                Thunk::suspended(span, move |ev| {
                                    let source_value = source_thunk.force(ev)?;
                                    match source_value {
                                        Value::Set(s) => match s.select(name.as_str()) {
                                            Some(t) => t.force(ev),
                                            None => Err(Error::new(
                                                ErrorKind::AttrMissing {
                                                    path: vec![name.to_string()],
                                                },
                                                span,
                                            )),
                                        },
                                        other => Err(Error::new(
                                            ErrorKind::NotASet {
                                                prefix: vec![],
                                                actual: other.type_name(),
                                            },
                                            span,
                                        )),
                                    }
                                }),
                            );
                        }
                    }
                    None => {
                        for name in names {
                            let name = name.clone();
                            let inherit_env = inherit_env.clone();
                            let span = *inherit_span;
                            attrs = attrs.insert(
                                name.clone(),
                                Thunk::suspended(span, move |ev| match inherit_env
                                    .lookup_var(ev, name.as_str())?
                                {
                                    Some(t) => t.force(ev),
                                    None => {
                                        Err(Error::new(ErrorKind::UndefinedVariable(name.to_string()), span))
                                    }
                                }),
                            );
                        }
                    }
                },
            }
        }

        let _ = span;
        Ok(attrs)
    }

    /// Ties the recursive-binding knot for `rec { ... }` and `let ...
    /// in` (spec.md §4.5, §4.2 `Let`): every binding's value
    /// expression, and every `inherit`-without-source lookup, is
    /// evaluated against the *completed* frame, including bindings
    /// that appear later in the same block.
    fn knot_env(
        &self,
        parent: &Env,
        bindings: &[Binding],
        span: Span,
        reject_dynamic: bool,
    ) -> EvalResult<Env> {
        let env_cell: Rc<std::cell::RefCell<Option<Env>>> = Rc::new(std::cell::RefCell::new(None));
        let mut names = Vec::new();

        for binding in bindings {
            match binding {
                Binding::NamedVar(path, value, bind_span) => match path.0.first() {
                    Some(AttrName::Static(name)) => {
                        if path.0.len() == 1 {
                            let value = value.clone();
                            let env_cell = env_cell.clone();
                            let thunk = Thunk::suspended(value.span(), move |ev| {
                                let env = env_cell.borrow().clone().expect("knot env not yet bound");
                                ev.eval_expr(&env, &value)
                            });
                            names.push((name.clone(), thunk));
                        }
                        // Dotted paths (`a.b = ...;`) inside a `let` are
                        // vanishingly rare and, unlike `rec`/plain sets,
                        // don't merge across multiple bindings sharing a
                        // prefix; only the single-segment case
                        // participates in the knot's own name set.
                    }
                    Some(AttrName::Dynamic(_)) if reject_dynamic => {
                        return Err(Error::new(ErrorKind::DynamicKeyNotAllowed, *bind_span));
                    }
                    _ => {
                        // A dynamic key on a `rec` set binding isn't a
                        // name any sibling field can reference statically
                        // (real Nix has the same limitation); its value
                        // is still produced by `build_attrs`, just not
                        // added to the knot's own lexical name set.
                    }
                },
                Binding::Inherit(None, inherited, _) => {
                    // A source-less `inherit` always reads from the
                    // *enclosing* scope, never from the knot being built
                    // here: `rec { inherit x; }` means "the `x` visible
                    // outside", the same as a plain set's `inherit`
                    // (see `build_attrs`'s doc comment above). Capturing
                    // `parent` rather than `env_cell` is what makes that
                    // true — closing over the knot itself would have
                    // this binding look itself up and black-hole.
                    for name in inherited {
                        let name = name.clone();
                        let parent = parent.clone();
                        let thunk = Thunk::suspended(span, move |ev| {
                            match parent.lookup_var(ev, name.as_str())? {
                                Some(t) => t.force(ev),
                                None => Err(Error::new(
                                    ErrorKind::UndefinedVariable(name.to_string()),
                                    span,
                                )),
                            }
                        });
                        names.push((name, thunk));
                    }
                }
                Binding::Inherit(Some(source), inherited, inherit_span) => {
                    let source_thunk = self.build_thunk(parent, source);
                    for name in inherited {
                        let name = name.clone();
                        let source_thunk = source_thunk.clone();
                        let span = *inherit_span;
                        let thunk = Thunk::suspended(span, move |ev| {
                            let source_value = source_thunk.force(ev)?;
                            match source_value {
                                Value::Set(s) => match s.select(name.as_str()) {
                                    Some(t) => t.force(ev),
                                    None => Err(Error::new(
                                        ErrorKind::AttrMissing {
                                            path: vec![name.to_string()],
                                        },
                                        span,
                                    )),
                                },
                                other => Err(Error::new(
                                    ErrorKind::NotASet {
                                        prefix: vec![],
                                        actual: other.type_name(),
                                    },
                                    span,
                                )),
                            }
                        });
                        names.push((name, thunk));
                    }
                }
            }
        }

        let env = parent.push_lexical(names);
        *env_cell.borrow_mut() = Some(env.clone());
        Ok(env)
    }

    /// `import_file` (spec.md §4.1): parses and evaluates another Nix
    /// file, returning its resulting thunk. Requires a [`Parser`] to
    /// have been configured, since this crate's own scope is limited
    /// to evaluating an already-built [`Expr`].
    pub fn import_file(&self, path: &Path, span: Span) -> EvalResult<Thunk> {
        let parser = self.parser.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::ImportFailed {
                    path: path.display().to_string(),
                    cause: "no parser configured for this evaluator".into(),
                },
                span,
            )
        })?;

        let resolved = self.io.import_path(path).map_err(|k| Error::new(k, span))?;
        tracing::trace!(path = %resolved.display(), "importing file");
        let code = self
            .io
            .read_to_string(&resolved)
            .map_err(|k| Error::new(k, span))?;

        let expr = parser.parse(&code, &resolved)?;
        let env = Env::root();
        Ok(self.build_thunk(&env, &expr))
    }
}
