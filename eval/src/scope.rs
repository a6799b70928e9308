//! The scope stack (spec.md §2, capabilities `push_scope`/`lookup_var`;
//! §4.2 `Sym`/`With`).
//!
//! Realized as a persistent, immutable linked list rather than an
//! imperative push/pop stack: `push_lexical`/`push_with` return a new
//! `Env` that shares its parent by `Rc`, and the old `Env` a caller is
//! still holding is untouched. This makes "entering a scope restores
//! the prior scope on every exit path, including early returns and
//! error propagation" (spec.md §2's invariant on `push_scope`) a
//! structural property of the type rather than something every call
//! site has to get right by hand.

use std::rc::Rc;

use codemap::Span;

use crate::value::{NixString, Thunk};

/// One link in the scope chain.
#[derive(Debug)]
enum Frame {
    /// Bindings introduced by `let`, a function's parameter(s), or a
    /// top-level `rec`/non-`rec` set acting as its own scope.
    Lexical {
        names: Vec<(NixString, Thunk)>,
        parent: Env,
    },
    /// A `with EXPR; BODY` scope. Holds the attribute-set thunk rather
    /// than pre-exploded bindings, since which names it provides isn't
    /// known until the set is forced (spec.md §4.2, `With`). `span` is
    /// the `with`-expression's own span, used to anchor the error if
    /// the forced value turns out not to be a set.
    With { set: Thunk, span: Span, parent: Env },
    Root,
}

/// A handle into the scope chain. Cheap to clone (`Rc` bump).
#[derive(Clone, Debug)]
pub struct Env(Rc<Frame>);

impl Env {
    pub fn root() -> Self {
        Env(Rc::new(Frame::Root))
    }

    pub fn push_lexical(&self, names: Vec<(NixString, Thunk)>) -> Self {
        tracing::trace!(depth = self.depth() + 1, names = names.len(), "push lexical scope");
        Env(Rc::new(Frame::Lexical {
            names,
            parent: self.clone(),
        }))
    }

    pub fn push_with(&self, set: Thunk, span: Span) -> Self {
        tracing::trace!(depth = self.depth() + 1, "push with scope");
        Env(Rc::new(Frame::With {
            set,
            span,
            parent: self.clone(),
        }))
    }

    /// Distance from the root frame, used only for trace logging.
    fn depth(&self) -> usize {
        let mut cur = self;
        let mut owned;
        let mut n = 0;
        loop {
            match &*cur.0 {
                Frame::Root => return n,
                Frame::Lexical { parent, .. } | Frame::With { parent, .. } => {
                    n += 1;
                    owned = parent.clone();
                    cur = &owned;
                }
            }
        }
    }

    /// Looks up a name using standard Nix shadowing rules: every
    /// lexical frame between here and the root is checked first
    /// (innermost wins), and only if none of them bind the name do the
    /// `with` frames get consulted, again innermost-first. A `with`
    /// can never shadow a lexical binding, no matter how far out it is
    /// (this is the resolved reading of the "two-pass Lexical/With
    /// lookup" behavior).
    pub fn lookup_var(&self, ev: &crate::eval::Evaluator, name: &str) -> crate::errors::EvalResult<Option<Thunk>> {
        if let Some(thunk) = self.lookup_lexical(name) {
            return Ok(Some(thunk));
        }
        self.lookup_with(ev, name)
    }

    /// Lexical-only lookup, bypassing `with` frames entirely. Used by
    /// [`crate::checker`], which must never force a `with` scope's set
    /// expression.
    pub fn lookup_lexical_names_only(&self, name: &str) -> Option<Thunk> {
        self.lookup_lexical(name)
    }

    /// Whether any enclosing frame is a `with` scope. The checker uses
    /// this as a conservative fallback: a name not found in any
    /// lexical frame is assumed to come from an enclosing `with`
    /// rather than reported as undefined, since what a `with` provides
    /// can't be known without forcing it.
    pub fn any_with_frame(&self) -> bool {
        let mut cur = self;
        let mut owned;
        loop {
            match &*cur.0 {
                Frame::With { .. } => return true,
                Frame::Lexical { parent, .. } => {
                    owned = parent.clone();
                    cur = &owned;
                }
                Frame::Root => return false,
            }
        }
    }

    fn lookup_lexical(&self, name: &str) -> Option<Thunk> {
        let mut cur = self;
        let mut owned;
        loop {
            match &*cur.0 {
                Frame::Lexical { names, parent } => {
                    if let Some((_, t)) = names.iter().find(|(n, _)| n.as_str() == name) {
                        return Some(t.clone());
                    }
                    owned = parent.clone();
                    cur = &owned;
                }
                Frame::With { parent, .. } => {
                    owned = parent.clone();
                    cur = &owned;
                }
                Frame::Root => return None,
            }
        }
    }

    fn lookup_with(&self, ev: &crate::eval::Evaluator, name: &str) -> crate::errors::EvalResult<Option<Thunk>> {
        let mut cur = self;
        let mut owned;
        loop {
            match &*cur.0 {
                Frame::With { set, span, parent } => {
                    let value = set.force(ev)?;
                    match value {
                        crate::value::Value::Set(attrs) => {
                            if let Some(t) = attrs.select(name) {
                                return Ok(Some(t.clone()));
                            }
                        }
                        other => {
                            return Err(crate::errors::Error::new(
                                crate::errors::ErrorKind::NotAWithScope(other.type_name()),
                                *span,
                            ));
                        }
                    }
                    owned = parent.clone();
                    cur = &owned;
                }
                Frame::Lexical { parent, .. } => {
                    owned = parent.clone();
                    cur = &owned;
                }
                Frame::Root => return Ok(None),
            }
        }
    }
}
