//! Runtime representation of functions (spec.md §3, "Function" and
//! "Parameter shape").

use std::rc::Rc;

use crate::ast::Expr;
use crate::scope::Env;

use super::NixString;

/// A single formal parameter inside a parameter set: either required,
/// or carrying a default expression evaluated (lazily) against the
/// completed argument knot (spec.md §4.3).
#[derive(Clone, Debug)]
pub struct Formal {
    pub name: NixString,
    pub default: Option<Rc<Expr>>,
}

/// The shape a function's single argument must take (spec.md §3,
/// "Parameter shape").
#[derive(Clone, Debug)]
pub enum ParamShape {
    /// A single identifier receiving the whole argument.
    Named(NixString),

    /// The argument must be a `Set` whose keys are exactly
    /// `dom(fields)`; no extra keys are permitted.
    FixedParamSet {
        fields: Vec<Formal>,
        self_name: Option<NixString>,
    },

    /// Like `FixedParamSet`, but extra keys in the argument set are
    /// permitted and passed through.
    VariadicParamSet {
        fields: Vec<Formal>,
        self_name: Option<NixString>,
    },
}

/// A function value: a parameter shape plus a body, closed over the
/// scope stack in effect at the `Abs` expression's definition site
/// (spec.md §3-iii: defaults never see the call-site scope).
#[derive(Clone, Debug)]
pub struct Function {
    pub params: Rc<ParamShape>,
    pub body: Rc<Expr>,
    pub env: Env,
}
