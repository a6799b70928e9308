//! The abstract syntax tree the evaluator consumes (spec.md §6).
//!
//! Parsing an actual Nix source file into this tree is out of scope
//! (spec.md §1, Non-goals): this module only defines the shape the
//! evaluator walks. A real front end (e.g. `rnix`) would lower its
//! concrete syntax tree into these node types, attaching a [`Span`] to
//! every node so diagnostics can point back at source text.

use std::rc::Rc;

use codemap::Span;

use crate::value::{Formal, NixString, ParamShape};

/// Every expression form spec.md §6 lists, each carrying the [`Span`]
/// it was built from.
#[derive(Clone, Debug)]
pub enum Expr {
    /// A bare identifier reference (spec.md §6, `Sym`).
    Sym(NixString, Span),

    /// An atomic literal (`Constant` in spec.md §6; int, bool, or
    /// null — URI literals lower to `Constant(Atom::Uri(_))` too).
    Constant(crate::value::Atom, Span),

    /// A (possibly interpolated) string literal.
    Str(Vec<StrPart>, Span),

    LiteralPath(std::path::PathBuf, Span),
    EnvPath(String, Span),

    List(Vec<Rc<Expr>>, Span),

    /// A non-recursive attribute-set literal.
    Set(Vec<Binding>, Span),

    /// A `rec { ... }` attribute-set literal (spec.md §4.5).
    RecSet(Vec<Binding>, Span),

    Let(Vec<Binding>, Rc<Expr>, Span),
    If(Rc<Expr>, Rc<Expr>, Rc<Expr>, Span),
    With(Rc<Expr>, Rc<Expr>, Span),
    Assert(Rc<Expr>, Rc<Expr>, Span),
    App(Rc<Expr>, Rc<Expr>, Span),
    Abs(Rc<Params>, Rc<Expr>, Span),

    Unary(UnaryOp, Rc<Expr>, Span),
    Binary(BinaryOp, Rc<Expr>, Rc<Expr>, Span),

    /// `set.a.b.c` / `set.a.b.c or default` (spec.md §4.4).
    Select(Rc<Expr>, AttrPath, Option<Rc<Expr>>, Span),

    /// `set ? a.b.c` (spec.md §4.4).
    HasAttr(Rc<Expr>, AttrPath, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Sym(_, s)
            | Expr::Constant(_, s)
            | Expr::Str(_, s)
            | Expr::LiteralPath(_, s)
            | Expr::EnvPath(_, s)
            | Expr::List(_, s)
            | Expr::Set(_, s)
            | Expr::RecSet(_, s)
            | Expr::Let(_, _, s)
            | Expr::If(_, _, _, s)
            | Expr::With(_, _, s)
            | Expr::Assert(_, _, s)
            | Expr::App(_, _, s)
            | Expr::Abs(_, _, s)
            | Expr::Unary(_, _, s)
            | Expr::Binary(_, _, _, s)
            | Expr::Select(_, _, _, s)
            | Expr::HasAttr(_, _, s) => *s,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Impl,
    Plus,
    Minus,
    Mult,
    Div,
    Update,
    Concat,
}

/// One literal segment or interpolated hole of a string literal.
#[derive(Clone, Debug)]
pub enum StrPart {
    Literal(String),
    Interpolation(Rc<Expr>),
}

/// A single segment of an attribute path (`a.${b}.c`). Spec.md §4.4:
/// static segments are known at parse time, dynamic ones are
/// expressions evaluated and coerced to a string (without context) at
/// selection time.
#[derive(Clone, Debug)]
pub enum AttrName {
    Static(NixString),
    Dynamic(Rc<Expr>),
}

#[derive(Clone, Debug)]
pub struct AttrPath(pub Vec<AttrName>);

impl AttrPath {
    pub fn new(names: Vec<AttrName>) -> Self {
        AttrPath(names)
    }
}

/// A binding inside a `let`, `Set`, or `RecSet` body.
#[derive(Clone, Debug)]
pub enum Binding {
    /// `path = value;`. `path` may have more than one segment
    /// (`a.b.c = value;`), desugared via [`crate::attrpath::alter`] at
    /// set-construction time (spec.md §4.5).
    NamedVar(AttrPath, Rc<Expr>, Span),

    /// `inherit a b;` or `inherit (src) a b;`. Desugars to one
    /// `NamedVar` per name (spec.md §4.5): with a source expression,
    /// each name selects from it; without one, each name is looked up
    /// in the enclosing scope as it stood *before* this set's own
    /// bindings were added.
    Inherit(Option<Rc<Expr>>, Vec<NixString>, Span),
}

/// The parameter list of an `Abs` (spec.md §4.3). Mirrors
/// [`ParamShape`] but at the AST level, where defaults are still
/// unevaluated expressions rather than thunks closed over an `Env`.
#[derive(Clone, Debug)]
pub enum Params {
    Named(NixString),
    FixedParamSet {
        fields: Vec<AstFormal>,
        self_name: Option<NixString>,
    },
    VariadicParamSet {
        fields: Vec<AstFormal>,
        self_name: Option<NixString>,
    },
}

#[derive(Clone, Debug)]
pub struct AstFormal {
    pub name: NixString,
    pub default: Option<Rc<Expr>>,
}

impl AstFormal {
    pub fn to_runtime(&self) -> Formal {
        Formal {
            name: self.name.clone(),
            default: self.default.clone(),
        }
    }
}

impl Params {
    pub fn to_runtime(&self) -> ParamShape {
        match self {
            Params::Named(n) => ParamShape::Named(n.clone()),
            Params::FixedParamSet { fields, self_name } => ParamShape::FixedParamSet {
                fields: fields.iter().map(AstFormal::to_runtime).collect(),
                self_name: self_name.clone(),
            },
            Params::VariadicParamSet { fields, self_name } => ParamShape::VariadicParamSet {
                fields: fields.iter().map(AstFormal::to_runtime).collect(),
                self_name: self_name.clone(),
            },
        }
    }
}
