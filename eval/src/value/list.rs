//! Nix lists: ordered sequences of lazily-evaluated elements.

use std::rc::Rc;

use super::thunk::Thunk;
use super::TotalDisplay;

/// A Nix list. Backed by an `Rc<Vec<Thunk>>` so that cloning a `Value`
/// that happens to be a list (which the evaluator does constantly,
/// e.g. every time a thunk's memoized result is read back out) stays
/// O(1).
#[derive(Clone, Debug, Default)]
pub struct NixList(Rc<Vec<Thunk>>);

impl NixList {
    pub fn from_thunks(items: Vec<Thunk>) -> Self {
        NixList(Rc::new(items))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Thunk> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thunk> {
        self.0.iter()
    }

    /// `++`: sequence concatenation (spec.md §4.2, `List, List`).
    pub fn concat(&self, other: &NixList) -> Self {
        let mut items = Vec::with_capacity(self.len() + other.len());
        items.extend(self.0.iter().cloned());
        items.extend(other.0.iter().cloned());
        NixList::from_thunks(items)
    }
}

impl FromIterator<Thunk> for NixList {
    fn from_iter<T: IntoIterator<Item = Thunk>>(iter: T) -> Self {
        NixList::from_thunks(iter.into_iter().collect())
    }
}

impl TotalDisplay for NixList {
    fn total_fmt(&self, f: &mut std::fmt::Formatter<'_>, seen: &mut super::ThunkSet) -> std::fmt::Result {
        f.write_str("[ ")?;
        for thunk in self.iter() {
            thunk.total_fmt(f, seen)?;
            f.write_str(" ")?;
        }
        f.write_str("]")
    }
}
