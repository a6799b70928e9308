//! The value model: atoms, the head-normal [`Value`] tag union, its
//! fully-forced counterpart [`NormalValue`], and the thunk abstraction
//! that defers computing either of them.
//!
//! See spec.md §3 for the full data model this module implements.

pub mod attrs;
pub mod builtin;
pub mod function;
pub mod list;
pub mod path;
pub mod string;
pub mod thunk;

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

pub use attrs::NixAttrs;
pub use builtin::Builtin;
pub use function::{Formal, Function, ParamShape};
pub use list::NixList;
pub use path::{EnvPath, LiteralPath};
pub use string::{ContextElement, NixContext, NixString};
pub use thunk::Thunk;

/// A primitive scalar (spec.md §3, "Atom"). Comparisons across
/// distinct atom kinds are not total: see [`Atom::partial_cmp`].
#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    Int(i64),
    Bool(bool),
    Null,
    /// A textual literal with URI lexical shape, e.g. `http://foo/bar`.
    /// Nix has no separate URI *value*; this only exists to record that
    /// the literal was written in unquoted URI syntax at parse time.
    /// Once constructed it behaves exactly like any other comparison of
    /// like atoms.
    Uri(String),
}

impl Atom {
    pub fn type_name(&self) -> &'static str {
        match self {
            Atom::Int(_) => "int",
            Atom::Bool(_) => "bool",
            Atom::Null => "null",
            Atom::Uri(_) => "uri",
        }
    }
}

impl PartialOrd for Atom {
    /// Total within a single atom kind (int < int, bool < bool,
    /// lexicographic for URIs); `None` across distinct kinds, matching
    /// spec.md §3's "comparisons across distinct atom kinds fail".
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Atom::Int(a), Atom::Int(b)) => a.partial_cmp(b),
            (Atom::Bool(a), Atom::Bool(b)) => a.partial_cmp(b),
            (Atom::Uri(a), Atom::Uri(b)) => a.partial_cmp(b),
            (Atom::Null, Atom::Null) => Some(std::cmp::Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(i) => write!(f, "{i}"),
            Atom::Bool(b) => write!(f, "{b}"),
            Atom::Null => write!(f, "null"),
            Atom::Uri(u) => write!(f, "{u}"),
        }
    }
}

/// A head-normal value: the outermost tag is known, but recursive
/// slots (list elements, set values, function bodies) may still be
/// unforced [`Thunk`]s. See spec.md §3's value table.
#[derive(Clone, Debug)]
pub enum Value {
    Constant(Atom),
    Str(NixString),
    List(NixList),
    Set(NixAttrs),
    Function(Rc<Function>),
    LiteralPath(LiteralPath),
    EnvPath(EnvPath),
    Builtin(Builtin),
}

impl NormalValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            NormalValue::Constant(a) => a.type_name(),
            NormalValue::Str(_) => "string",
            NormalValue::List(_) => "list",
            NormalValue::Set(_) => "set",
            NormalValue::Function(_) => "lambda",
            NormalValue::LiteralPath(_) => "path",
            NormalValue::EnvPath(_) => "path",
            NormalValue::Builtin(_) => "lambda",
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Constant(a) => a.type_name(),
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
            Value::LiteralPath(_) => "path",
            Value::EnvPath(_) => "path",
            Value::Builtin(_) => "builtin",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Constant(Atom::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Constant(Atom::Int(i)) => Some(*i),
            _ => None,
        }
    }
}

impl From<Atom> for Value {
    fn from(a: Atom) -> Self {
        Value::Constant(a)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Constant(Atom::Int(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Constant(Atom::Bool(b))
    }
}

impl From<NixString> for Value {
    fn from(s: NixString) -> Self {
        Value::Str(s)
    }
}

/// A fully evaluated value: every recursive slot holds another
/// `NormalValue` rather than a `Thunk`. Produced only by
/// [`crate::normalize::normalize`] (spec.md §3, §4.6).
#[derive(Clone, Debug)]
pub enum NormalValue {
    Constant(Atom),
    Str(NixString),
    List(Vec<NormalValue>),
    Set(std::collections::BTreeMap<NixString, NormalValue>),
    /// Functions are never reduced further by normalization: a body is
    /// only evaluable once bound to a call-site argument, which deep
    /// forcing must not invent (spec.md §4.6, §9 "Polymorphic value
    /// tag" — functions stay opaque the same way a `Builtin` does).
    Function(Rc<ParamShape>),
    LiteralPath(LiteralPath),
    EnvPath(EnvPath),
    Builtin(&'static str),
}

/// Quotes a string the way Nix's own pretty-printer does: wrap in `"`
/// and escape the characters that would otherwise break quoting.
fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '$' => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for NormalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalValue::Constant(a) => write!(f, "{a}"),
            NormalValue::Str(s) => write!(f, "{}", quote_str(s.as_str())),
            NormalValue::List(items) => {
                f.write_str("[ ")?;
                for item in items {
                    write!(f, "{item} ")?;
                }
                f.write_str("]")
            }
            NormalValue::Set(map) => {
                f.write_str("{ ")?;
                for (k, v) in map {
                    write!(f, "{k} = {v}; ")?;
                }
                f.write_str("}")
            }
            NormalValue::Function(_) => f.write_str("<<lambda>>"),
            NormalValue::LiteralPath(p) => write!(f, "{p}"),
            NormalValue::EnvPath(p) => write!(f, "{p}"),
            NormalValue::Builtin(name) => write!(f, "<<primop {name}>>"),
        }
    }
}

/// Tracks which thunks have already been visited while rendering a
/// value, so that a cyclic structure (only reachable through a thunk
/// still mid-force, since fully forced values are acyclic trees) prints
/// `<CYCLE>` instead of looping forever.
#[derive(Default)]
pub struct ThunkSet(HashSet<usize>);

impl ThunkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this is the first time `thunk` is seen.
    pub fn insert(&mut self, thunk: &Thunk) -> bool {
        self.0.insert(thunk.ptr_id())
    }
}

/// Display that is aware of possible cycles through in-flight thunks,
/// used for diagnostics and the REPL (rendering to a collaborator is
/// otherwise out of scope, spec.md §1).
pub trait TotalDisplay {
    fn total_fmt(&self, f: &mut fmt::Formatter<'_>, seen: &mut ThunkSet) -> fmt::Result;
}

impl TotalDisplay for Value {
    fn total_fmt(&self, f: &mut fmt::Formatter<'_>, seen: &mut ThunkSet) -> fmt::Result {
        match self {
            Value::Constant(a) => write!(f, "{a}"),
            Value::Str(s) => write!(f, "{}", quote_str(s.as_str())),
            Value::List(l) => l.total_fmt(f, seen),
            Value::Set(s) => s.total_fmt(f, seen),
            Value::Function(_) => f.write_str("<<lambda>>"),
            Value::LiteralPath(p) => write!(f, "{p}"),
            Value::EnvPath(p) => write!(f, "{p}"),
            Value::Builtin(b) => write!(f, "{b}"),
        }
    }
}
