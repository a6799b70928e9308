//! This module contains utilities for dealing with the codemap that
//! needs to be carried across an evaluation session for accurate error
//! reporting.
//!
//! The data type [`SourceCode`] should be passed around instead of
//! copying the codemap structures directly.

use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
    sync::Arc,
};

use codemap::{CodeMap, Span};

/// Tracks all source code in an evaluation session for accurate error
/// reporting. Every file added (the root expression's source, plus any
/// imported files) is kept alive here for as long as the session lives.
#[derive(Clone, Default)]
pub struct SourceCode(Rc<RefCell<CodeMap>>);

impl SourceCode {
    pub fn new() -> Self {
        SourceCode(Rc::new(RefCell::new(CodeMap::new())))
    }

    /// Access a read-only reference to the codemap.
    pub fn codemap(&self) -> Ref<CodeMap> {
        self.0.borrow()
    }

    fn codemap_mut(&self) -> RefMut<CodeMap> {
        self.0.borrow_mut()
    }

    /// Add a file to the codemap. The returned Arc is managed by the
    /// codemap internally and can be used like a normal reference.
    pub fn add_file(&self, name: String, code: String) -> Arc<codemap::File> {
        self.codemap_mut().add_file(name, code)
    }

    /// Retrieve the line number of the given span. If it spans multiple
    /// lines, the first line is returned. Lines are 0-indexed in the
    /// codemap, but callers want 1-indexed line numbers.
    pub fn get_line(&self, span: Span) -> usize {
        self.codemap().look_up_span(span).begin.line + 1
    }
}
