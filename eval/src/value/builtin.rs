//! Runtime representation of builtin functions.
//!
//! The catalog of builtins (arithmetic helpers, string primitives,
//! filesystem access, ...) is an external collaborator (spec.md §1);
//! this module defines only the uniform value shape every builtin is
//! exposed through.

use std::fmt::{Debug, Display};
use std::rc::Rc;

use crate::errors::EvalResult;
use crate::eval::Evaluator;
use crate::value::Thunk;

use super::Value;

/// A builtin is addressed by the spec's ABI as a named, 1-argument
/// `thunk -> thunk` function (spec.md §6, "Builtin ABI"). Builtins that
/// conceptually take several arguments (e.g. `hasAttr`, arity 2) are
/// curried at construction: each application collects one more
/// argument thunk until `arity` is reached, at which point the
/// underlying function actually runs.
///
/// Per spec.md §4.2 ("App"), builtins receive their argument
/// *unforced*: whether and when to force is the builtin's own
/// decision (this is what makes `builtins.tryEval` or lazy boolean
/// operators implementable as builtins).
type BuiltinFn = Rc<dyn Fn(&Evaluator, &[Thunk]) -> EvalResult<Value>>;

#[derive(Clone)]
pub struct Builtin {
    name: &'static str,
    arity: usize,
    func: BuiltinFn,
    partials: Vec<Thunk>,
}

impl Builtin {
    pub fn new(
        name: &'static str,
        arity: usize,
        func: impl Fn(&Evaluator, &[Thunk]) -> EvalResult<Value> + 'static,
    ) -> Self {
        assert!(arity > 0, "builtin {name} must take at least one argument");
        Builtin {
            name,
            arity,
            func: Rc::new(func),
            partials: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Apply one more argument. Once `arity` arguments have
    /// accumulated, the builtin actually runs; until then, a new
    /// partially-applied `Builtin` is returned, acting like a closure
    /// over its so-far-supplied arguments.
    pub fn apply(mut self, ev: &Evaluator, arg: Thunk) -> EvalResult<Value> {
        self.partials.push(arg);

        if self.partials.len() == self.arity {
            (self.func)(ev, &self.partials)
        } else {
            Ok(Value::Builtin(self))
        }
    }
}

impl Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "builtin[{}]", self.name)
    }
}

impl Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.partials.is_empty() {
            write!(f, "<<primop {}>>", self.name)
        } else {
            write!(f, "<<primop-app {}>>", self.name)
        }
    }
}
