//! Runtime representation of thunks: memoized, deferred computations
//! that yield exactly one head-normal [`Value`] on demand.
//!
//! See spec.md §3 ("Thunk") and §9 ("Black holes"). A thunk carries a
//! three-state tag — `Suspended`, `Forcing`, `Forced` — and forcing it a
//! second time while it is still `Forcing` is the infinite-recursion
//! ("black hole") detector.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use codemap::Span;

use crate::errors::{Error, ErrorKind, EvalResult};
use crate::eval::Evaluator;

use super::Value;

/// A suspended computation, invoked at most once. Takes `&Evaluator`
/// because forcing a thunk recursively re-enters evaluation (the
/// design this crate takes is a direct recursive evaluator rather than
/// a bytecode VM — see spec.md §9's design notes).
type Suspended = Box<dyn FnOnce(&Evaluator) -> EvalResult<Value>>;

enum ThunkState {
    Suspended { span: Span, action: Suspended },
    Forcing { span: Span },
    Forced(Value),
}

impl Debug for ThunkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThunkState::Suspended { .. } => write!(f, "Suspended"),
            ThunkState::Forcing { .. } => write!(f, "Forcing"),
            ThunkState::Forced(v) => write!(f, "Forced({v:?})"),
        }
    }
}

/// A thunk is an `Rc`-shared handle so that every reference to "the
/// same" deferred computation (e.g. a variable looked up twice, or a
/// binding shared between the knot and the body) observes the same
/// memoized result once one of them forces it.
#[derive(Clone, Debug)]
pub struct Thunk(Rc<RefCell<ThunkState>>);

impl Thunk {
    /// Build a new suspended thunk from an evaluation action. This is
    /// the capability `build_thunk` from spec.md §4.1.
    pub fn suspended(span: Span, action: impl FnOnce(&Evaluator) -> EvalResult<Value> + 'static) -> Self {
        Thunk(Rc::new(RefCell::new(ThunkState::Suspended {
            span,
            action: Box::new(action),
        })))
    }

    /// Lift an already-computed value into a thunk without going
    /// through suspension at all. This is `value_ref` from spec.md
    /// §4.1, and is how `Constant`, `List`, `Abs`, and friends avoid
    /// paying for a closure allocation they don't need.
    pub fn forced(value: Value) -> Self {
        Thunk(Rc::new(RefCell::new(ThunkState::Forced(value))))
    }

    pub fn is_forced(&self) -> bool {
        matches!(&*self.0.borrow(), ThunkState::Forced(_))
    }

    /// Stable identity for cycle detection during rendering (see
    /// [`super::ThunkSet`]). Two clones of the same `Thunk` share this
    /// id; two distinct thunks never do, even if both are forced to
    /// equal values.
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Force this thunk to head-normal form. This is `force_thunk` from
    /// spec.md §4.1, implemented as a free-standing method here (rather
    /// than on `Evaluator`) so it can be called as `thunk.force(ev)`.
    pub fn force(&self, ev: &Evaluator) -> EvalResult<Value> {
        let id = self.ptr_id();
        let mut state = self.0.borrow_mut();
        let span = match &*state {
            ThunkState::Forced(v) => return Ok(v.clone()),
            ThunkState::Forcing { span } => {
                tracing::trace!(thunk = id, "black hole: thunk already forcing");
                return Err(Error::new(ErrorKind::InfiniteRecursion, *span));
            }
            ThunkState::Suspended { span, .. } => *span,
        };
        tracing::trace!(thunk = id, "forcing thunk");

        // Enter the blackhole: swap the suspended action out before
        // running it, so that if `action` forces `self` again (a
        // direct or indirect self-reference) the re-entrant call sees
        // `Forcing` rather than recursing forever. The borrow must be
        // dropped before calling `action`, since a self-referential
        // force re-enters this same `RefCell`.
        let ThunkState::Suspended { action, .. } =
            std::mem::replace(&mut *state, ThunkState::Forcing { span })
        else {
            unreachable!("checked above");
        };
        drop(state);

        let result = action(ev);

        match result {
            Ok(value) => {
                *self.0.borrow_mut() = ThunkState::Forced(value.clone());
                Ok(value)
            }
            Err(mut err) => {
                // Leave the thunk black-holed: evaluation is fail-fast
                // (spec.md §7), so nothing will force this thunk again
                // before the whole evaluation aborts. Attach the span
                // this thunk was forced at as extra context.
                tracing::trace!(thunk = id, kind = ?err.kind, "thunk force failed");
                err = err.with_context(span);
                Err(err)
            }
        }
    }
}

impl super::TotalDisplay for Thunk {
    /// Renders the thunk's current state without forcing it: `Forced`
    /// thunks print their value, `Suspended` ones print as a black
    /// lambda-ish placeholder, and a `Thunk` already seen earlier in
    /// this same render prints `<CYCLE>` instead of recursing forever.
    fn total_fmt(&self, f: &mut std::fmt::Formatter<'_>, seen: &mut super::ThunkSet) -> std::fmt::Result {
        if !seen.insert(self) {
            return f.write_str("<CYCLE>");
        }

        match &*self.0.borrow() {
            ThunkState::Forced(v) => v.total_fmt(f, seen),
            ThunkState::Forcing { .. } => f.write_str("<CYCLE>"),
            ThunkState::Suspended { .. } => f.write_str("<expr>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::StdIO;
    use crate::nix_search_path::NixSearchPath;
    use crate::source::SourceCode;
    use crate::value::Atom;
    use std::cell::Cell;
    use std::rc::Rc as StdRc;

    fn test_evaluator() -> Evaluator {
        Evaluator::new(
            Box::new(StdIO) as Box<dyn crate::io::EvalIO>,
            NixSearchPath::default(),
            SourceCode::new(),
        )
    }

    #[test]
    fn forcing_is_memoized() {
        let ev = test_evaluator();
        let calls = StdRc::new(Cell::new(0));
        let calls2 = calls.clone();

        let thunk = Thunk::suspended(crate::test_utils::dummy_span(), move |_ev| {
            calls2.set(calls2.get() + 1);
            Ok(Value::Constant(Atom::Int(1)))
        });

        thunk.force(&ev).unwrap();
        thunk.force(&ev).unwrap();
        thunk.force(&ev).unwrap();

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn self_reference_is_a_black_hole() {
        let ev = test_evaluator();
        let cell: StdRc<RefCell<Option<Thunk>>> = StdRc::new(RefCell::new(None));
        let cell2 = cell.clone();

        let thunk = Thunk::suspended(crate::test_utils::dummy_span(), move |ev| {
            let inner = cell2.borrow().clone().unwrap();
            inner.force(ev)
        });
        *cell.borrow_mut() = Some(thunk.clone());

        let err = thunk.force(&ev).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InfiniteRecursion));
    }
}
