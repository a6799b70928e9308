//! Nix language strings and their context (see [`context`]).

pub mod context;

use std::borrow::Borrow;
use std::fmt::Display;
use std::hash::Hash;

use smol_str::SmolStr;

pub use context::{ContextElement, NixContext};

/// Backing representation for the text of a [`NixString`]. Short
/// strings (the overwhelming majority: attribute names, small
/// literals) are stored inline via `SmolStr`; anything else falls back
/// to a heap `String`. This mirrors how frequently Nix strings are used
/// as attribute-set keys, where the inline representation avoids an
/// allocation entirely.
#[derive(Clone, Debug)]
enum StringRepr {
    Smol(SmolStr),
    Heap(String),
}

/// A Nix string, paired with its [`NixContext`] (spec.md §3,
/// "String-with-context").
#[derive(Clone, Debug, Default)]
pub struct NixString {
    repr: StringRepr,
    context: NixContext,
}

impl Default for StringRepr {
    fn default() -> Self {
        StringRepr::Smol(SmolStr::default())
    }
}

impl NixString {
    pub fn new(text: impl Into<SmolOrHeap>, context: NixContext) -> Self {
        let repr = match text.into() {
            SmolOrHeap::Smol(s) => StringRepr::Smol(s),
            SmolOrHeap::Heap(s) => StringRepr::Heap(s),
        };
        NixString { repr, context }
    }

    pub fn as_str(&self) -> &str {
        match &self.repr {
            StringRepr::Smol(s) => s.as_str(),
            StringRepr::Heap(s) => s.as_str(),
        }
    }

    pub fn context(&self) -> &NixContext {
        &self.context
    }

    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }

    /// Drop the context, keeping only the text. Used when coercing a
    /// dynamic attribute key (spec.md §4.4: "coercing without context").
    pub fn without_context(self) -> Self {
        NixString {
            repr: self.repr,
            context: NixContext::new(),
        }
    }

    /// Concatenate two strings, unioning their contexts. This is the
    /// monoid operation spec.md §3 describes.
    pub fn concat(self, other: NixString) -> Self {
        let mut text = self.as_str().to_owned();
        text.push_str(other.as_str());

        let mut context = self.context;
        context.union(other.context);

        NixString::new(text, context)
    }
}

/// Helper to let [`NixString::new`] accept either representation
/// without the caller having to pick ahead of time.
pub enum SmolOrHeap {
    Smol(SmolStr),
    Heap(String),
}

impl From<&str> for SmolOrHeap {
    fn from(s: &str) -> Self {
        SmolOrHeap::Smol(SmolStr::new(s))
    }
}

impl From<String> for SmolOrHeap {
    fn from(s: String) -> Self {
        SmolOrHeap::Heap(s)
    }
}

impl From<&str> for NixString {
    fn from(s: &str) -> Self {
        NixString::new(s, NixContext::new())
    }
}

impl From<String> for NixString {
    fn from(s: String) -> Self {
        NixString::new(s, NixContext::new())
    }
}

impl PartialEq for NixString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for NixString {}

impl PartialOrd for NixString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NixString {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Hash for NixString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Display for NixString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Borrow<str> for NixString {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}
